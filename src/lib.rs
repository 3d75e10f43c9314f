//! # chord_practice
//!
//! Real-time chord recognition from a microphone feed, plus a fretboard path
//! planner that binds scale exercises to concrete string/fret positions.
//!
//! ## Example
//! ```rust
//! use chord_practice::{
//!     standard_templates, ChordPipeline, DetectorConfig, NoteName, PathPlanner, ScalePattern,
//!     ScaleType,
//! };
//!
//! fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1) Offline chord detection on one block of samples
//!     let config = DetectorConfig::builder().build()?;
//!     let mut pipeline = ChordPipeline::new(&config)?;
//!     let templates = standard_templates();
//!
//!     let block: Vec<f32> = vec![0.0; config.block_len()]; // fill with actual samples
//!     let chord = pipeline.analyze(&block, &templates)?;
//!     println!("Detected {chord}");
//!
//!     // 2) Fingering for an ascending A minor pentatonic run
//!     let pattern = ScalePattern::for_scale(NoteName::A, ScaleType::PentatonicMinor, 5..=8);
//!     let targets: Vec<String> = ScaleType::PentatonicMinor
//!         .build_scale(57)
//!         .iter()
//!         .map(|n| n.to_string())
//!         .collect();
//!     for pos in PathPlanner::new().plan_path(&targets, pattern.positions()) {
//!         println!("string {} fret {} ({})", pos.string, pos.fret, pos.degree);
//!     }
//!
//!     Ok(())
//! }
//! # run().unwrap();
//! ```
//!
//! For live input, hand an [`AudioDevice`] to a [`ChordDetector`] and call
//! [`ChordDetector::start_detection`] with a listener.
//!
//! ## Features
//! - `cpal`: microphone capture through the default cpal input device

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rust_2018_idioms)]
#![deny(clippy::all)]

/// Live detection API.
pub use chord_detector::{
    rms, ChordDetector, ChordListener, ChordPipeline, DetectionStats, DetectorConfig,
    DetectorConfigBuilder, DetectorError, SILENCE_THRESHOLD,
};

/// Audio device seam.
pub use capture::{
    AudioDevice, AudioInput, CaptureError, SampleEncoding, StreamConfig, BUFFER_SIZE, SAMPLE_RATE,
};

/// Template matching.
pub use classifier::{
    cosine_similarity, standard_templates, ChordClassifier, ChordKind, ChordTemplate, NO_CHORD,
    SIMILARITY_THRESHOLD,
};

/// Pitch class profiles.
pub use chromagram::{
    ChromaHistory, ChromaProjector, ChromaProjectorBuilder, ChromaVector, ChromagramError,
    REFERENCE_FREQUENCY, SMOOTHING_DEPTH,
};

/// Spectral transform.
pub use spectrum::{magnitude_spectrum, SpectralCoefficients, SpectralTransform, SpectrumError};

/// Fretboard planning.
pub use fretboard::{FretPosition, PathPlanner, ScalePattern, STRING_BASE_MIDI};

/// Notes and scales.
pub use note::{NoteError, NoteName};
pub use scale::{ScaleError, ScaleType};

#[cfg(feature = "cpal")]
pub use cpal_input::{CpalDevice, CpalInput};

/// Audio capture traits.
pub mod capture;

/// Chord detection module.
pub mod chord_detector;

/// Chord template classification.
pub mod classifier;

/// Chromagram computation module.
pub mod chromagram;

/// Fretboard path planning.
pub mod fretboard;

/// Note names.
pub mod note;

/// Scales and patterns.
pub mod scale;

/// FFT and magnitude spectrum.
pub mod spectrum;

/// cpal microphone backend.
#[cfg(feature = "cpal")]
pub mod cpal_input;

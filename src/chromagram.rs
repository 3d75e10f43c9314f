//! Chromagram
//!
//! Folds a magnitude spectrum into a 12-bin pitch class profile and smooths
//! successive profiles over a short history.

use crate::note::SEMITONES;
use thiserror::Error;

/// A 12-bin pitch class profile, index 0 = C .. 11 = B.
pub type ChromaVector = [f32; SEMITONES];

/// Reference frequency assigned to pitch class 0 (C4, Hz).
pub const REFERENCE_FREQUENCY: f32 = 261.6;

/// Bins below this frequency (Hz) are treated as DC offset and skipped.
pub const MIN_FREQUENCY: f32 = 20.0;

/// Bins above this frequency (Hz) are not projected.
pub const MAX_FREQUENCY: f32 = 5_000.0;

/// Number of frames averaged by [`ChromaHistory`].
pub const SMOOTHING_DEPTH: usize = 3;

/// Errors returned when configuring a chroma projection.
#[derive(Debug, Error)]
pub enum ChromagramError {
    /// An error occurred during the configuration of the projector.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Builder for a [`ChromaProjector`].
#[derive(Debug, Clone)]
pub struct ChromaProjectorBuilder {
    sampling_rate: f32,
    reference_frequency: f32,
    min_frequency: f32,
    max_frequency: f32,
}

impl ChromaProjectorBuilder {
    /// Start with default parameters:
    /// sampling_rate = 44_100, reference_frequency = 261.6,
    /// min_frequency = 20, max_frequency = 5_000.
    pub fn new() -> Self {
        ChromaProjectorBuilder {
            sampling_rate: 44_100.0,
            reference_frequency: REFERENCE_FREQUENCY,
            min_frequency: MIN_FREQUENCY,
            max_frequency: MAX_FREQUENCY,
        }
    }

    /// Set the sampling rate of the audio.
    pub fn sampling_rate(mut self, rate: u32) -> Self {
        self.sampling_rate = rate as f32;
        self
    }

    /// Set the frequency that maps to pitch class 0.
    pub fn reference_frequency(mut self, hz: f32) -> Self {
        self.reference_frequency = hz;
        self
    }

    /// Set the lowest bin frequency that contributes energy.
    pub fn min_frequency(mut self, hz: f32) -> Self {
        self.min_frequency = hz;
        self
    }

    /// Set the highest bin frequency that contributes energy.
    pub fn max_frequency(mut self, hz: f32) -> Self {
        self.max_frequency = hz;
        self
    }

    /// Finalize and create the projector.
    pub fn build(self) -> Result<ChromaProjector, ChromagramError> {
        if self.sampling_rate <= 0.0 {
            return Err(ChromagramError::Configuration("sampling_rate must be positive".into()));
        }
        if !self.reference_frequency.is_finite() || self.reference_frequency <= 0.0 {
            return Err(ChromagramError::Configuration(
                "reference_frequency must be positive".into(),
            ));
        }
        if self.min_frequency < 0.0 || self.min_frequency >= self.max_frequency {
            return Err(ChromagramError::Configuration(format!(
                "frequency range {}..{} is empty",
                self.min_frequency, self.max_frequency
            )));
        }

        Ok(ChromaProjector {
            sampling_rate: self.sampling_rate,
            reference_frequency: self.reference_frequency,
            min_frequency: self.min_frequency,
            max_frequency: self.max_frequency,
        })
    }
}

impl Default for ChromaProjectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pitch class profile calculator.
///
/// Stateless: the same magnitude spectrum always gives the same chroma.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChromaProjector {
    sampling_rate: f32,
    reference_frequency: f32,
    min_frequency: f32,
    max_frequency: f32,
}

impl ChromaProjector {
    /// Start customizing with a builder.
    pub fn builder() -> ChromaProjectorBuilder {
        ChromaProjectorBuilder::new()
    }

    /// Project a half spectrum of `magnitudes.len()` bins (from a frame of
    /// twice that length) onto the 12 pitch classes.
    ///
    /// Each bin's magnitude is added to the class nearest its centre
    /// frequency, measured in semitones from the reference. The result is not
    /// normalized.
    pub fn project(&self, magnitudes: &[f32]) -> ChromaVector {
        self.project_frame(magnitudes, magnitudes.len() * 2)
    }

    /// Like [`project`](Self::project), for the half spectrum of a frame of
    /// `frame_len` samples. Needed when `frame_len` is odd.
    pub fn project_frame(&self, magnitudes: &[f32], frame_len: usize) -> ChromaVector {
        let mut chroma = [0.0; SEMITONES];
        if frame_len == 0 {
            return chroma;
        }
        let bin_width = self.sampling_rate / frame_len as f32;

        // bin 0 is DC regardless of min_frequency
        for (k, &mag) in magnitudes.iter().enumerate().skip(1) {
            let freq = k as f32 * bin_width;
            if freq > self.max_frequency {
                break;
            }
            if freq < self.min_frequency {
                continue;
            }
            chroma[self.pitch_class(freq)] += mag.abs();
        }
        chroma
    }

    /// Nearest pitch class of `freq`, relative to the reference frequency.
    #[inline]
    pub fn pitch_class(&self, freq: f32) -> usize {
        let semitones = (SEMITONES as f32 * (freq / self.reference_frequency).log2()).round();
        (semitones as i64).rem_euclid(SEMITONES as i64) as usize
    }
}

impl Default for ChromaProjector {
    fn default() -> Self {
        ChromaProjector {
            sampling_rate: 44_100.0,
            reference_frequency: REFERENCE_FREQUENCY,
            min_frequency: MIN_FREQUENCY,
            max_frequency: MAX_FREQUENCY,
        }
    }
}

/// Round-robin history of the last [`SMOOTHING_DEPTH`] chroma vectors.
///
/// Slots that were never written hold zeros, so the first two averages of a
/// session are scaled down. Cosine similarity ignores that scale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChromaHistory {
    slots: [ChromaVector; SMOOTHING_DEPTH],
    average: ChromaVector,
    head: usize,
}

impl ChromaHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the oldest slot with `chroma` and return the new average.
    pub fn push(&mut self, chroma: ChromaVector) -> ChromaVector {
        self.slots[self.head] = chroma;
        self.head = (self.head + 1) % SMOOTHING_DEPTH;

        for (i, avg) in self.average.iter_mut().enumerate() {
            *avg = self.slots.iter().map(|slot| slot[i]).sum::<f32>() / SMOOTHING_DEPTH as f32;
        }
        self.average
    }

    /// Current element-wise mean over all slots.
    pub fn average(&self) -> &ChromaVector {
        &self.average
    }

    /// Forget every stored frame.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_dc_and_out_of_range_bins() {
        let projector = ChromaProjector::builder()
            .sampling_rate(1_000)
            .reference_frequency(100.0)
            .min_frequency(50.0)
            .max_frequency(400.0)
            .build()
            .unwrap();

        // frame of 20 samples, bin width = 50 Hz
        let mut mags = vec![0.0; 10];
        mags[0] = 1_000.0; // DC
        mags[2] = 3.0; // 100 Hz -> class 0
        mags[4] = 5.0; // 200 Hz -> octave of reference, class 0
        mags[9] = 7.0; // 450 Hz, above max
        let chroma = projector.project(&mags);
        assert_eq!(chroma[0], 8.0);
        assert_eq!(chroma.iter().sum::<f32>(), 8.0);
    }

    #[test]
    fn odd_frame_length_sets_bin_width() {
        let projector = ChromaProjector::builder()
            .sampling_rate(5_232)
            .build()
            .unwrap();

        let mut mags = vec![0.0; 10];
        mags[1] = 1.0;
        // 21 samples: bin 1 sits at 249.1 Hz, a semitone under the reference
        assert_eq!(projector.project_frame(&mags, 21)[11], 1.0);
        // 20 samples: bin 1 sits exactly on the reference
        assert_eq!(projector.project(&mags)[0], 1.0);
    }

    #[test]
    fn pitch_class_wraps_below_reference() {
        let projector = ChromaProjector::default();
        // A3 is 3 semitones below C4 -> class 9
        assert_eq!(projector.pitch_class(220.0), 9);
        assert_eq!(projector.pitch_class(440.0), 9);
        assert_eq!(projector.pitch_class(261.6), 0);
        assert_eq!(projector.pitch_class(329.6), 4);
    }

    #[test]
    fn chroma_is_non_negative() {
        let projector = ChromaProjector::default();
        let mags: Vec<f32> = (0..2048).map(|i| (i % 7) as f32).collect();
        assert!(projector.project(&mags).iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(ChromaProjector::builder().reference_frequency(0.0).build().is_err());
        assert!(ChromaProjector::builder().sampling_rate(0).build().is_err());
        assert!(ChromaProjector::builder()
            .min_frequency(600.0)
            .max_frequency(500.0)
            .build()
            .is_err());
    }

    #[test]
    fn history_converges_after_three_frames() {
        let mut history = ChromaHistory::new();
        let mut v = [0.0; SEMITONES];
        v[4] = 3.0;
        v[7] = 6.0;

        let first = history.push(v);
        assert_eq!(first[4], 1.0);
        assert_eq!(first[7], 2.0);
        history.push(v);
        assert_eq!(history.push(v), v);
    }

    #[test]
    fn history_overwrites_oldest_slot() {
        let mut history = ChromaHistory::new();
        let mut a = [0.0; SEMITONES];
        a[0] = 3.0;
        let mut b = [0.0; SEMITONES];
        b[1] = 3.0;

        history.push(a);
        history.push(a);
        history.push(a);
        let avg = history.push(b);
        assert_eq!(avg[0], 2.0);
        assert_eq!(avg[1], 1.0);

        history.reset();
        assert_eq!(history.average(), &[0.0; SEMITONES]);
    }
}

//! Chord Detector
//!
//! Real-time chord detection from a microphone: a single worker thread reads
//! blocks of samples, gates silence by RMS and runs
//! FFT -> magnitude -> chroma -> smoothing -> template matching on the rest.

use crate::{
    capture::{
        AudioDevice, AudioInput, SampleEncoding, StreamConfig, BUFFER_SIZE,
        SAMPLE_RATE,
    },
    chromagram::{
        ChromaHistory, ChromaProjector, ChromaVector, ChromagramError, MAX_FREQUENCY,
        MIN_FREQUENCY, REFERENCE_FREQUENCY,
    },
    classifier::{ChordClassifier, ChordTemplate, NO_CHORD, SIMILARITY_THRESHOLD},
    spectrum::{magnitude_spectrum, SpectralTransform, SpectrumError},
};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, RwLock,
    },
    thread::{self, JoinHandle},
};
use thiserror::Error;

/// RMS level (in raw 16-bit sample units) below which a block is silence.
pub const SILENCE_THRESHOLD: f32 = 3000.0;

const WORKER_NAME: &str = "chord-detector";

/// Errors when building a detection pipeline.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Invalid chroma or detector parameters.
    #[error(transparent)]
    Chromagram(#[from] ChromagramError),

    /// The spectral transform could not be planned or was misused.
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
}

/// Receives one detection result per processed or gated audio block.
///
/// Called on the detector's worker thread, never on the thread that started
/// detection.
pub trait ChordListener: Send + 'static {
    /// A chord name, or [`NO_CHORD`].
    fn on_chord_detected(&mut self, chord: &str);
}

impl<F> ChordListener for F
where
    F: FnMut(&str) + Send + 'static,
{
    fn on_chord_detected(&mut self, chord: &str) {
        self(chord)
    }
}

/// Builder for a [`DetectorConfig`].
#[derive(Debug, Clone)]
pub struct DetectorConfigBuilder {
    sample_rate: u32,
    buffer_size: usize,
    silence_threshold: f32,
    reference_frequency: f32,
    min_frequency: f32,
    max_frequency: f32,
    similarity_threshold: f32,
}

impl DetectorConfigBuilder {
    /// Start with the default policy constants:
    /// sample_rate = 44_100, buffer_size = 8192, silence_threshold = 3000,
    /// reference_frequency = 261.6, min_frequency = 20,
    /// max_frequency = 5_000, similarity_threshold = 0.5.
    pub fn new() -> Self {
        DetectorConfigBuilder {
            sample_rate: SAMPLE_RATE,
            buffer_size: BUFFER_SIZE,
            silence_threshold: SILENCE_THRESHOLD,
            reference_frequency: REFERENCE_FREQUENCY,
            min_frequency: MIN_FREQUENCY,
            max_frequency: MAX_FREQUENCY,
            similarity_threshold: SIMILARITY_THRESHOLD,
        }
    }

    /// Set the capture sample rate.
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Set the minimum device buffer size. Each read fetches half of it.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the RMS level below which blocks are reported as [`NO_CHORD`].
    pub fn silence_threshold(mut self, rms: f32) -> Self {
        self.silence_threshold = rms;
        self
    }

    /// Set the frequency of pitch class 0.
    pub fn reference_frequency(mut self, hz: f32) -> Self {
        self.reference_frequency = hz;
        self
    }

    /// Set the lowest spectral bin frequency that feeds the chromagram.
    pub fn min_frequency(mut self, hz: f32) -> Self {
        self.min_frequency = hz;
        self
    }

    /// Set the highest spectral bin frequency that feeds the chromagram.
    pub fn max_frequency(mut self, hz: f32) -> Self {
        self.max_frequency = hz;
        self
    }

    /// Set the cosine similarity a template must exceed.
    pub fn similarity_threshold(mut self, value: f32) -> Self {
        self.similarity_threshold = value;
        self
    }

    /// Validate and create the configuration.
    pub fn build(self) -> Result<DetectorConfig, ChromagramError> {
        if self.buffer_size < 2 {
            return Err(ChromagramError::Configuration("buffer_size must be at least 2".into()));
        }
        if self.silence_threshold < 0.0 {
            return Err(ChromagramError::Configuration(
                "silence_threshold cannot be negative".into(),
            ));
        }
        let projector = ChromaProjector::builder()
            .sampling_rate(self.sample_rate)
            .reference_frequency(self.reference_frequency)
            .min_frequency(self.min_frequency)
            .max_frequency(self.max_frequency)
            .build()?;

        Ok(DetectorConfig {
            sample_rate: self.sample_rate,
            buffer_size: self.buffer_size,
            silence_threshold: self.silence_threshold,
            projector,
            classifier: ChordClassifier::with_threshold(self.similarity_threshold),
        })
    }
}

impl Default for DetectorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Validated detection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    sample_rate: u32,
    buffer_size: usize,
    silence_threshold: f32,
    projector: ChromaProjector,
    classifier: ChordClassifier,
}

impl DetectorConfig {
    /// Start customizing with a builder.
    pub fn builder() -> DetectorConfigBuilder {
        DetectorConfigBuilder::new()
    }

    /// Capture sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples fetched per read, and the FFT length.
    pub fn block_len(&self) -> usize {
        self.buffer_size / 2
    }

    /// RMS silence gate.
    pub fn silence_threshold(&self) -> f32 {
        self.silence_threshold
    }

    fn stream_config(&self, min_buffer: usize) -> StreamConfig {
        StreamConfig {
            sample_rate: self.sample_rate,
            channels: 1,
            encoding: SampleEncoding::Pcm16,
            buffer_size: self.buffer_size.max(min_buffer),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            sample_rate: SAMPLE_RATE,
            buffer_size: BUFFER_SIZE,
            silence_threshold: SILENCE_THRESHOLD,
            projector: ChromaProjector::default(),
            classifier: ChordClassifier::default(),
        }
    }
}

/// Root mean square of a block, 0 for an empty block.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Spectral half of the detector: everything after the silence gate.
///
/// Holds the smoothing history, so one pipeline belongs to one session.
#[derive(Debug)]
pub struct ChordPipeline {
    transform: SpectralTransform,
    projector: ChromaProjector,
    history: ChromaHistory,
    classifier: ChordClassifier,
}

impl ChordPipeline {
    /// Pipeline for frames of `config.block_len()` samples.
    pub fn new(config: &DetectorConfig) -> Result<Self, DetectorError> {
        Ok(ChordPipeline {
            transform: SpectralTransform::new(config.block_len())?,
            projector: config.projector,
            history: ChromaHistory::new(),
            classifier: config.classifier,
        })
    }

    /// Frame length expected by [`analyze`](Self::analyze).
    pub fn frame_size(&self) -> usize {
        self.transform.frame_size()
    }

    /// Run one frame through the pipeline and name the best template.
    pub fn analyze<'t>(
        &mut self,
        frame: &[f32],
        templates: &'t [ChordTemplate],
    ) -> Result<&'t str, SpectrumError> {
        let chroma = self.chroma(frame)?;
        Ok(self.classifier.classify(&chroma, templates))
    }

    /// Smoothed chroma after adding `frame` to the history.
    pub fn chroma(&mut self, frame: &[f32]) -> Result<ChromaVector, SpectrumError> {
        let coefficients = self.transform.transform(frame)?;
        let magnitudes = magnitude_spectrum(&coefficients);
        let chroma = self
            .projector
            .project_frame(&magnitudes, self.transform.frame_size());
        let average = self.history.push(chroma);
        log::trace!("avg chroma: {average:?}");
        Ok(average)
    }
}

/// Counts of blocks handled by a detector since it was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DetectionStats {
    /// Blocks returned by the audio input.
    pub blocks_read: u64,
    /// Blocks answered with [`NO_CHORD`] without spectral analysis.
    pub blocks_gated: u64,
    /// Blocks that went through the FFT and classifier.
    pub frames_analyzed: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    blocks_read: AtomicU64,
    blocks_gated: AtomicU64,
    frames_analyzed: AtomicU64,
}

impl StatCounters {
    fn snapshot(&self) -> DetectionStats {
        DetectionStats {
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            blocks_gated: self.blocks_gated.load(Ordering::Relaxed),
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
        }
    }
}

type SharedTemplates = Arc<RwLock<Arc<Vec<ChordTemplate>>>>;

struct Session<I> {
    input: Arc<I>,
    worker: JoinHandle<()>,
}

/// Microphone chord detector.
///
/// Idle until [`start_detection`](Self::start_detection), which opens the
/// device and spawns one worker thread. Starting again while recording does
/// nothing; [`stop_detection`](Self::stop_detection) releases the device and
/// joins the worker.
pub struct ChordDetector<D: AudioDevice> {
    device: D,
    config: DetectorConfig,
    templates: SharedTemplates,
    running: Arc<AtomicBool>,
    stats: Arc<StatCounters>,
    session: Option<Session<D::Input>>,
}

impl<D: AudioDevice> ChordDetector<D> {
    /// Detector with the default configuration.
    pub fn new(device: D) -> Self {
        Self::with_config(device, DetectorConfig::default())
    }

    /// Detector with a custom configuration.
    pub fn with_config(device: D, config: DetectorConfig) -> Self {
        ChordDetector {
            device,
            config,
            templates: Arc::new(RwLock::new(Arc::new(Vec::new()))),
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(StatCounters::default()),
            session: None,
        }
    }

    /// Replace the reference templates. `None` clears them.
    ///
    /// Safe while recording: the worker picks up the new list on its next
    /// block and never sees a partial update.
    pub fn set_chord_profiles(&self, profiles: Option<Vec<ChordTemplate>>) {
        let profiles = Arc::new(profiles.unwrap_or_default());
        log::debug!("set chord profiles: {} items", profiles.len());
        match self.templates.write() {
            Ok(mut guard) => *guard = profiles,
            Err(poisoned) => *poisoned.into_inner() = profiles,
        }
    }

    /// Current template count.
    pub fn profile_count(&self) -> usize {
        snapshot(&self.templates).len()
    }

    /// Whether a worker is currently capturing.
    pub fn is_recording(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Block counters since construction.
    pub fn stats(&self) -> DetectionStats {
        self.stats.snapshot()
    }

    /// The detector's configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Begin continuous detection, reporting every block to `listener`.
    ///
    /// Does nothing while already recording. If the device cannot be opened
    /// the failure is logged and the detector stays idle; check
    /// [`is_recording`](Self::is_recording) to observe it.
    pub fn start_detection<L: ChordListener>(&mut self, listener: L) {
        if let Some(session) = &self.session {
            if !session.worker.is_finished() {
                return;
            }
            // worker died on a read error; clean it up before restarting
            self.stop_detection();
        }
        log::debug!("starting detection with {} profiles", self.profile_count());

        let pipeline = match ChordPipeline::new(&self.config) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                log::error!("chord pipeline setup failed: {err}");
                return;
            }
        };

        let request = self.config.stream_config(0);
        let stream = self.config.stream_config(self.device.min_buffer_size(&request));
        let input = match self.device.open(&stream) {
            Ok(input) => Arc::new(input),
            Err(err) => {
                log::error!("audio input initialization failed: {err}");
                return;
            }
        };

        self.running.store(true, Ordering::Release);
        let worker = Worker {
            input: Arc::clone(&input),
            templates: Arc::clone(&self.templates),
            running: Arc::clone(&self.running),
            stats: Arc::clone(&self.stats),
            silence_threshold: self.config.silence_threshold,
            pipeline,
        };
        let spawned = thread::Builder::new()
            .name(WORKER_NAME.into())
            .spawn(move || worker.run(listener));

        match spawned {
            Ok(handle) => self.session = Some(Session { input, worker: handle }),
            Err(err) => {
                log::error!("failed to spawn detection thread: {err}");
                self.running.store(false, Ordering::Release);
                input.stop();
            }
        }
    }

    /// Stop detection and release the audio device. Idempotent.
    ///
    /// Returns once the worker thread has exited.
    pub fn stop_detection(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.running.store(false, Ordering::Release);
        session.input.stop();
        if session.worker.join().is_err() {
            log::error!("detection thread panicked");
        }
        log::debug!("detection stopped");
    }
}

impl<D: AudioDevice> Drop for ChordDetector<D> {
    fn drop(&mut self) {
        self.stop_detection();
    }
}

fn snapshot(templates: &SharedTemplates) -> Arc<Vec<ChordTemplate>> {
    match templates.read() {
        Ok(guard) => Arc::clone(&*guard),
        Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
    }
}

struct Worker<I> {
    input: Arc<I>,
    templates: SharedTemplates,
    running: Arc<AtomicBool>,
    stats: Arc<StatCounters>,
    silence_threshold: f32,
    pipeline: ChordPipeline,
}

impl<I: AudioInput> Worker<I> {
    fn run<L: ChordListener>(mut self, mut listener: L) {
        let _running = RunningGuard(Arc::clone(&self.running));
        let block_len = self.pipeline.frame_size();
        let mut raw = vec![0i16; block_len];
        let mut frame = vec![0.0f32; block_len];

        while self.running.load(Ordering::Acquire) {
            let read = match self.input.read(&mut raw) {
                Ok(0) => continue,
                Ok(n) => n.min(block_len),
                Err(err) => {
                    if self.running.load(Ordering::Acquire) {
                        log::warn!("audio read failed, stopping detection: {err}");
                    }
                    break;
                }
            };
            self.stats.blocks_read.fetch_add(1, Ordering::Relaxed);

            for (dst, &src) in frame.iter_mut().zip(&raw[..read]) {
                *dst = src as f32;
            }

            let templates = snapshot(&self.templates);
            if rms(&frame[..read]) < self.silence_threshold || templates.is_empty() {
                self.stats.blocks_gated.fetch_add(1, Ordering::Relaxed);
                listener.on_chord_detected(NO_CHORD);
                continue;
            }

            // short reads keep the FFT length, so bin spacing stays fixed
            frame[read..].fill(0.0);
            match self.pipeline.analyze(&frame, &templates) {
                Ok(chord) => {
                    self.stats.frames_analyzed.fetch_add(1, Ordering::Relaxed);
                    listener.on_chord_detected(chord);
                }
                Err(err) => log::error!("spectral analysis failed: {err}"),
            }
        }
    }
}

/// Clears the running flag when the worker exits, including by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

//! Integration tests for the capture loop using a scripted audio device.

use chord_practice::{
    standard_templates, AudioDevice, AudioInput, CaptureError, ChordDetector, ChromaProjector,
    ChordTemplate, StreamConfig, NO_CHORD,
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SAMPLE_RATE: f32 = 44_100.0;
const BLOCK_LEN: usize = 4_096;
const WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Input that replays blocks pushed through a channel.
struct ScriptedInput {
    blocks: Receiver<Vec<i16>>,
    stopped: AtomicBool,
}

impl AudioInput for ScriptedInput {
    fn read(&self, buffer: &mut [i16]) -> Result<usize, CaptureError> {
        loop {
            if self.stopped.load(Ordering::Acquire) {
                return Err(CaptureError::Closed);
            }
            match self.blocks.recv_timeout(Duration::from_millis(5)) {
                Ok(block) => {
                    let n = block.len().min(buffer.len());
                    buffer[..n].copy_from_slice(&block[..n]);
                    return Ok(n);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(CaptureError::Closed),
            }
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

struct ScriptedDevice {
    blocks: Receiver<Vec<i16>>,
    opens: Arc<AtomicUsize>,
    last_config: Arc<std::sync::Mutex<Option<StreamConfig>>>,
    fail: bool,
}

impl AudioDevice for ScriptedDevice {
    type Input = ScriptedInput;

    fn open(&self, config: &StreamConfig) -> Result<ScriptedInput, CaptureError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock().unwrap() = Some(*config);
        if self.fail {
            return Err(CaptureError::DeviceUnavailable("not initialized".into()));
        }
        Ok(ScriptedInput {
            blocks: self.blocks.clone(),
            stopped: AtomicBool::new(false),
        })
    }
}

struct Rig {
    detector: ChordDetector<ScriptedDevice>,
    feed: Sender<Vec<i16>>,
    opens: Arc<AtomicUsize>,
    last_config: Arc<std::sync::Mutex<Option<StreamConfig>>>,
}

fn rig(fail: bool) -> Rig {
    init_logging();
    let (feed, blocks) = unbounded();
    let opens = Arc::new(AtomicUsize::new(0));
    let last_config = Arc::new(std::sync::Mutex::new(None));
    let device = ScriptedDevice {
        blocks,
        opens: Arc::clone(&opens),
        last_config: Arc::clone(&last_config),
        fail,
    };
    Rig {
        detector: ChordDetector::new(device),
        feed,
        opens,
        last_config,
    }
}

fn listener() -> (impl FnMut(&str) + Send + 'static, Receiver<String>) {
    let (tx, rx) = unbounded();
    let callback = move |chord: &str| {
        let _ = tx.send(chord.to_string());
    };
    (callback, rx)
}

fn next(rx: &Receiver<String>) -> String {
    rx.recv_timeout(WAIT).expect("no detection arrived")
}

/// First FFT bin (above 300 Hz) whose centre frequency folds onto `pitch_class`.
fn bin_for(pitch_class: usize) -> usize {
    let projector = ChromaProjector::default();
    let bin_width = SAMPLE_RATE / BLOCK_LEN as f32;
    (28..200)
        .find(|&k| projector.pitch_class(k as f32 * bin_width) == pitch_class)
        .expect("no bin for pitch class")
}

/// Sum of cosines that complete a whole number of cycles per block.
fn tone_block(bins: &[usize], amplitude: f32) -> Vec<i16> {
    (0..BLOCK_LEN)
        .map(|i| {
            let s: f32 = bins
                .iter()
                .map(|&k| {
                    amplitude * (2.0 * PI * k as f32 * i as f32 / BLOCK_LEN as f32).cos()
                })
                .sum();
            s.round() as i16
        })
        .collect()
}

fn one_hot(pitch_class: usize) -> [f32; 12] {
    let mut v = [0.0; 12];
    v[pitch_class] = 1.0;
    v
}

#[test]
fn opens_device_with_capture_parameters() {
    let mut rig = rig(false);
    let (callback, _rx) = listener();
    rig.detector.start_detection(callback);
    assert!(rig.detector.is_recording());

    let config = rig.last_config.lock().unwrap().expect("device was not opened");
    assert_eq!(config.sample_rate, 44_100);
    assert_eq!(config.channels, 1);
    assert_eq!(config.buffer_size, 8_192);
    rig.detector.stop_detection();
}

#[test]
fn second_start_is_a_no_op() {
    let mut rig = rig(false);
    let (first, first_rx) = listener();
    let (second, second_rx) = listener();

    rig.detector.start_detection(first);
    rig.detector.start_detection(second);
    assert_eq!(rig.opens.load(Ordering::SeqCst), 1);

    for _ in 0..3 {
        rig.feed.send(vec![0; BLOCK_LEN]).unwrap();
    }
    for _ in 0..3 {
        assert_eq!(next(&first_rx), NO_CHORD);
    }

    rig.detector.stop_detection();
    assert!(!rig.detector.is_recording());
    assert_eq!(first_rx.try_iter().count(), 0);
    assert_eq!(second_rx.try_iter().count(), 0);
    assert_eq!(rig.detector.stats().blocks_read, 3);
}

#[test]
fn silence_skips_spectral_analysis() {
    let mut rig = rig(false);
    rig.detector.set_chord_profiles(Some(standard_templates()));
    let (callback, rx) = listener();
    rig.detector.start_detection(callback);

    rig.feed.send(vec![0; BLOCK_LEN]).unwrap();
    assert_eq!(next(&rx), NO_CHORD);
    rig.detector.stop_detection();

    let stats = rig.detector.stats();
    assert_eq!(stats.blocks_gated, 1);
    assert_eq!(stats.frames_analyzed, 0);
}

#[test]
fn loud_block_without_templates_is_gated() {
    let mut rig = rig(false);
    rig.detector.set_chord_profiles(None);
    let (callback, rx) = listener();
    rig.detector.start_detection(callback);

    rig.feed.send(tone_block(&[bin_for(9)], 10_000.0)).unwrap();
    assert_eq!(next(&rx), NO_CHORD);
    rig.detector.stop_detection();
    assert_eq!(rig.detector.stats().frames_analyzed, 0);
}

/// Continuous sine at `freq` Hz, cut into consecutive blocks.
fn sine_blocks(freq: f64, amplitude: f64, blocks: usize) -> Vec<Vec<i16>> {
    let step = 2.0 * std::f64::consts::PI * freq / SAMPLE_RATE as f64;
    (0..blocks)
        .map(|b| {
            (0..BLOCK_LEN)
                .map(|i| (amplitude * (step * (b * BLOCK_LEN + i) as f64).sin()).round() as i16)
                .collect()
        })
        .collect()
}

#[test]
fn pure_tone_matches_its_pitch_class() {
    let failures: Vec<String> = (0..12usize)
        .into_par_iter()
        .filter_map(|pc| {
            let mut rig = rig(false);
            let name = format!("pc{pc}");
            rig.detector
                .set_chord_profiles(Some(vec![ChordTemplate::new(name.clone(), one_hot(pc))]));
            let (callback, rx) = listener();
            rig.detector.start_detection(callback);

            // equal-tempered pitch, not aligned to any FFT bin
            let freq = 261.6 * 2f64.powf(pc as f64 / 12.0);
            for block in sine_blocks(freq, 10_000.0, 3) {
                rig.feed.send(block).unwrap();
            }
            let detected: Vec<String> = (0..3).map(|_| next(&rx)).collect();
            rig.detector.stop_detection();

            let analyzed = rig.detector.stats().frames_analyzed;
            if detected[2] == name && analyzed == 3 {
                None
            } else {
                Some(format!(
                    "pitch class {pc} ({freq:.1} Hz): got {detected:?} after {analyzed} frames"
                ))
            }
        })
        .collect();

    assert!(
        failures.is_empty(),
        "{} tones failed:\n{}",
        failures.len(),
        failures.join("\n")
    );
}

#[test]
fn panicking_listener_ends_recording() {
    let mut rig = rig(false);
    rig.detector.start_detection(|_: &str| panic!("listener failed"));
    assert!(rig.detector.is_recording());

    rig.feed.send(vec![0; BLOCK_LEN]).unwrap();
    let deadline = Instant::now() + WAIT;
    while rig.detector.is_recording() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(!rig.detector.is_recording());

    // the dead worker is reaped by the next start
    let (callback, rx) = listener();
    rig.detector.start_detection(callback);
    assert_eq!(rig.opens.load(Ordering::SeqCst), 2);
    rig.feed.send(vec![0; BLOCK_LEN]).unwrap();
    assert_eq!(next(&rx), NO_CHORD);
    rig.detector.stop_detection();
}

#[test]
fn triad_is_named_from_standard_templates() {
    let mut rig = rig(false);
    rig.detector.set_chord_profiles(Some(standard_templates()));
    let (callback, rx) = listener();
    rig.detector.start_detection(callback);

    // A, C#, E
    let block = tone_block(&[bin_for(9), bin_for(1), bin_for(4)], 8_000.0);
    for _ in 0..3 {
        rig.feed.send(block.clone()).unwrap();
    }
    for _ in 0..3 {
        assert_eq!(next(&rx), "A");
    }
    rig.detector.stop_detection();
    assert_eq!(rig.detector.stats().frames_analyzed, 3);
}

#[test]
fn templates_can_change_while_recording() {
    let mut rig = rig(false);
    rig.detector
        .set_chord_profiles(Some(vec![ChordTemplate::new("before", one_hot(7))]));
    let (callback, rx) = listener();
    rig.detector.start_detection(callback);

    let block = tone_block(&[bin_for(7)], 10_000.0);
    rig.feed.send(block.clone()).unwrap();
    assert_eq!(next(&rx), "before");

    rig.detector
        .set_chord_profiles(Some(vec![ChordTemplate::new("after", one_hot(7))]));
    assert_eq!(rig.detector.profile_count(), 1);
    rig.feed.send(block).unwrap();
    assert_eq!(next(&rx), "after");
    rig.detector.stop_detection();
}

#[test]
fn device_failure_leaves_detector_idle() {
    let mut rig = rig(true);
    let (callback, rx) = listener();
    rig.detector.start_detection(callback);

    assert_eq!(rig.opens.load(Ordering::SeqCst), 1);
    assert!(!rig.detector.is_recording());
    rig.feed.send(vec![0; BLOCK_LEN]).unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    // stopping an idle detector is harmless
    rig.detector.stop_detection();
}

#[test]
fn stop_is_idempotent_and_allows_restart() {
    let mut rig = rig(false);
    let (callback, rx) = listener();
    rig.detector.start_detection(callback);
    rig.detector.stop_detection();
    rig.detector.stop_detection();
    assert!(!rig.detector.is_recording());

    let (callback, rx2) = listener();
    rig.detector.start_detection(callback);
    assert_eq!(rig.opens.load(Ordering::SeqCst), 2);
    rig.feed.send(vec![0; BLOCK_LEN]).unwrap();
    assert_eq!(next(&rx2), NO_CHORD);
    assert_eq!(rx.try_iter().count(), 0);
}

#[test]
fn short_reads_are_padded() {
    let mut rig = rig(false);
    rig.detector
        .set_chord_profiles(Some(vec![ChordTemplate::new("A", one_hot(9))]));
    let (callback, rx) = listener();
    rig.detector.start_detection(callback);

    let mut block = tone_block(&[bin_for(9)], 10_000.0);
    block.truncate(BLOCK_LEN / 2);
    rig.feed.send(block).unwrap();
    assert_eq!(next(&rx), "A");
    rig.detector.stop_detection();
}

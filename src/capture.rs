//! Audio capture seam
//!
//! The detector only talks to microphones through these traits, so tests and
//! platform backends can supply their own sample source.

use thiserror::Error;

/// Sample rate requested from the capture device (Hz).
pub const SAMPLE_RATE: u32 = 44_100;

/// Minimum capture buffer requested from the device, in samples.
pub const BUFFER_SIZE: usize = 8192;

/// Errors raised by an audio input.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No usable input device, or it refused the requested format.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The running stream reported a failure.
    #[error("audio stream error: {0}")]
    Stream(String),

    /// The input was stopped; no more samples will arrive.
    #[error("audio input closed")]
    Closed,
}

/// Sample layout of the captured stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SampleEncoding {
    /// Signed 16-bit PCM.
    Pcm16,
}

/// Parameters passed to [`AudioDevice::open`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count, 1 for mono.
    pub channels: u16,
    /// Sample encoding.
    pub encoding: SampleEncoding,
    /// Internal buffer size in samples.
    pub buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            sample_rate: SAMPLE_RATE,
            channels: 1,
            encoding: SampleEncoding::Pcm16,
            buffer_size: BUFFER_SIZE,
        }
    }
}

/// An opened, running microphone stream.
///
/// `read` is called from the detector's worker thread while `stop` is called
/// from whichever thread stops detection, so both take `&self`.
pub trait AudioInput: Send + Sync + 'static {
    /// Block until samples are available and copy up to `buffer.len()` of
    /// them into `buffer`, returning how many were written.
    ///
    /// Must return [`CaptureError::Closed`] (or another error) once
    /// [`stop`](AudioInput::stop) has been called, including for a read that
    /// was already blocked.
    fn read(&self, buffer: &mut [i16]) -> Result<usize, CaptureError>;

    /// Stop capturing and release the device. Idempotent.
    fn stop(&self);
}

/// Factory for [`AudioInput`] streams.
pub trait AudioDevice: Send + Sync {
    /// Stream type produced by [`open`](AudioDevice::open).
    type Input: AudioInput;

    /// Open and start a stream with the given parameters.
    fn open(&self, config: &StreamConfig) -> Result<Self::Input, CaptureError>;

    /// Smallest buffer the device accepts for `config`, in samples.
    fn min_buffer_size(&self, _config: &StreamConfig) -> usize {
        0
    }
}

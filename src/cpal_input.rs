//! Microphone input through cpal.
//!
//! cpal pushes samples from its own callback thread; this module downmixes
//! them to mono `i16` and hands them to the blocking [`AudioInput::read`]
//! through a channel.

use crate::capture::{AudioDevice, AudioInput, CaptureError, StreamConfig};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::{
    sync::Mutex,
    thread::{self, JoinHandle},
};

/// Chunks buffered between the cpal callback and the reader before new
/// ones are dropped.
const CHANNEL_DEPTH: usize = 64;

/// The host's default input device.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDevice;

impl CpalDevice {
    /// Use the default input device of the default host.
    pub fn new() -> Self {
        CpalDevice
    }
}

impl AudioDevice for CpalDevice {
    type Input = CpalInput;

    fn open(&self, config: &StreamConfig) -> Result<CpalInput, CaptureError> {
        let (sample_tx, sample_rx) = bounded::<Vec<i16>>(CHANNEL_DEPTH);
        let (ready_tx, ready_rx) = bounded::<Result<(), CaptureError>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let sample_rate = config.sample_rate;

        // cpal streams are not Send on every platform, so the stream lives
        // and dies on this thread.
        let holder = thread::Builder::new()
            .name("chord-detector-input".into())
            .spawn(move || {
                let stream = match build_stream(sample_rate, sample_tx) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if let Err(err) = stream.play() {
                    let _ = ready_tx.send(Err(CaptureError::Stream(err.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                // returns on stop(): the sender is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(CpalInput {
                samples: sample_rx,
                pending: Mutex::new(Vec::new()),
                shutdown: Mutex::new(Some(shutdown_tx)),
                holder: Mutex::new(Some(holder)),
            }),
            Ok(Err(err)) => {
                let _ = holder.join();
                Err(err)
            }
            Err(_) => {
                let _ = holder.join();
                Err(CaptureError::DeviceUnavailable("input thread exited".into()))
            }
        }
    }
}

fn build_stream(sample_rate: u32, tx: Sender<Vec<i16>>) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| CaptureError::DeviceUnavailable("no input device available".into()))?;
    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

    if let Ok(name) = device.name() {
        log::debug!("opening input `{name}` at {sample_rate} Hz ({:?})", supported.sample_format());
    }

    let channels = supported.channels() as usize;
    let config = cpal::StreamConfig {
        channels: supported.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let on_error = |err: cpal::StreamError| log::warn!("input stream error: {err}");

    let stream = match supported.sample_format() {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                forward(&tx, downmix(data, channels, |s| s as f32));
            },
            on_error,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                forward(&tx, downmix(data, channels, |s| s as f32 - 32_768.0));
            },
            on_error,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                forward(&tx, downmix(data, channels, |s| s * i16::MAX as f32));
            },
            on_error,
            None,
        ),
        other => {
            return Err(CaptureError::DeviceUnavailable(format!(
                "unsupported sample format {other:?}"
            )))
        }
    };
    stream.map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))
}

fn downmix<T: Copy>(data: &[T], channels: usize, to_f32: impl Fn(T) -> f32) -> Vec<i16> {
    let channels = channels.max(1);
    data.chunks_exact(channels)
        .map(|frame| {
            let sum: f32 = frame.iter().map(|&s| to_f32(s)).sum();
            (sum / channels as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
        .collect()
}

fn forward(tx: &Sender<Vec<i16>>, chunk: Vec<i16>) {
    // never block the audio callback; a slow reader loses samples
    let _ = tx.try_send(chunk);
}

/// A running cpal input stream.
pub struct CpalInput {
    samples: Receiver<Vec<i16>>,
    pending: Mutex<Vec<i16>>,
    shutdown: Mutex<Option<Sender<()>>>,
    holder: Mutex<Option<JoinHandle<()>>>,
}

impl AudioInput for CpalInput {
    fn read(&self, buffer: &mut [i16]) -> Result<usize, CaptureError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| CaptureError::Stream("sample buffer poisoned".into()))?;

        while pending.len() < buffer.len() {
            match self.samples.recv() {
                Ok(chunk) => pending.extend_from_slice(&chunk),
                Err(_) => return Err(CaptureError::Closed),
            }
        }
        let n = buffer.len();
        buffer.copy_from_slice(&pending[..n]);
        pending.drain(..n);
        Ok(n)
    }

    fn stop(&self) {
        if let Ok(mut shutdown) = self.shutdown.lock() {
            shutdown.take();
        }
        let holder = self.holder.lock().ok().and_then(|mut h| h.take());
        if let Some(holder) = holder {
            let _ = holder.join();
        }
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        self.stop();
    }
}

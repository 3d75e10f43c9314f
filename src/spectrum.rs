//! Spectrum
//!
//! Forward FFT of a real audio frame and the half-spectrum magnitude used by
//! the chroma projection.

use std::{fmt, sync::Arc};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use thiserror::Error;

/// Errors returned by the spectral transform.
#[derive(Debug, Error)]
pub enum SpectrumError {
    /// Frame received was not of the planned size.
    #[error("expected frame of length {expected}, got {got}")]
    InvalidFrameSize {
        /// The planned transform length.
        expected: usize,
        /// The actual length of the received frame.
        got: usize,
    },

    /// The transform could not be planned.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Parallel real / imaginary DFT coefficients of one frame.
///
/// Coefficient `k` corresponds to the frequency `k * sample_rate / len`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralCoefficients {
    /// Real parts, one per input sample.
    pub re: Vec<f32>,
    /// Imaginary parts, one per input sample.
    pub im: Vec<f32>,
}

impl SpectralCoefficients {
    /// Number of coefficients (equal to the frame length).
    pub fn len(&self) -> usize {
        self.re.len()
    }

    /// Whether the transform produced no coefficients.
    pub fn is_empty(&self) -> bool {
        self.re.is_empty()
    }
}

/// Forward DFT planned for one fixed frame length.
///
/// The plan is built once; every call to [`SpectralTransform::transform`] is a
/// pure function of its input, so a single instance can be shared across
/// threads.
#[derive(Clone)]
pub struct SpectralTransform {
    frame_size: usize,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectralTransform {
    /// Plan a forward transform for frames of `frame_size` samples.
    pub fn new(frame_size: usize) -> Result<Self, SpectrumError> {
        if frame_size == 0 {
            return Err(SpectrumError::Configuration("frame_size cannot be zero".into()));
        }
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(frame_size);
        Ok(SpectralTransform { frame_size, fft })
    }

    /// Frame length this transform was planned for.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Transform a real-valued frame. The imaginary input is zero.
    ///
    /// Returns `Err(SpectrumError::InvalidFrameSize)` when `frame` does not
    /// have exactly [`frame_size`](Self::frame_size) samples; that is a caller
    /// bug and no attempt is made to pad or truncate.
    pub fn transform(&self, frame: &[f32]) -> Result<SpectralCoefficients, SpectrumError> {
        if frame.len() != self.frame_size {
            return Err(SpectrumError::InvalidFrameSize {
                expected: self.frame_size,
                got: frame.len(),
            });
        }

        let mut buffer: Vec<Complex<f32>> =
            frame.iter().map(|&s| Complex { re: s, im: 0.0 }).collect();
        self.fft.process(&mut buffer);

        let (re, im) = buffer.iter().map(|c| (c.re, c.im)).unzip();
        Ok(SpectralCoefficients { re, im })
    }
}

impl fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("frame_size", &self.frame_size)
            .finish()
    }
}

/// Half-spectrum magnitudes, `len / 2` bins.
///
/// Each bin is `|re|`, the absolute real part, not `sqrt(re² + im²)`. This is
/// the fast approximation the chord templates were tuned against; a true
/// modulus would shift chroma energy between bins.
pub fn magnitude_spectrum(coefficients: &SpectralCoefficients) -> Vec<f32> {
    let half = coefficients.len() / 2;
    coefficients.re[..half].iter().map(|re| re.abs()).collect()
}

//! Forward-FFT processor with plan reuse
//!
//! Thin wrapper over `rustfft` that plans a transform once and keeps its
//! scratch buffer alive, so per-burst frequency estimation never replans
//! or reallocates. Shared by the FCCH detector (fixed 1024-point plan) and
//! the spectrum display (terminal-width captures).

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

use crate::types::IQSample;

/// A reusable forward FFT of fixed size.
pub struct FftProcessor {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl fmt::Debug for FftProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftProcessor").field("size", &self.size).finish()
    }
}

impl FftProcessor {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Self { size, fft, scratch }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward transform in place. `buffer` must match the planned size.
    pub fn forward_inplace(&mut self, buffer: &mut [Complex<f32>]) {
        assert_eq!(buffer.len(), self.size);
        self.fft.process_with_scratch(buffer, &mut self.scratch);
    }

    /// Forward transform of `input`, zero-padded or truncated to the
    /// planned size, returning a fresh buffer.
    pub fn forward(&mut self, input: &[IQSample]) -> Vec<Complex<f32>> {
        let take = input.len().min(self.size);
        let mut buffer: Vec<Complex<f32>> = input[..take].to_vec();
        buffer.resize(self.size, Complex::default());
        self.forward_inplace(&mut buffer);
        buffer
    }

    /// Frequency of FFT bin `index` (fractional indices allowed).
    pub fn bin_to_hz(&self, index: f32, sample_rate: f64) -> f32 {
        (index as f64 * sample_rate / self.size as f64) as f32
    }
}

/// Four-term Blackman-Harris window.
pub fn blackman_harris(len: usize) -> Vec<f32> {
    const A0: f64 = 0.35875;
    const A1: f64 = 0.48829;
    const A2: f64 = 0.14128;
    const A3: f64 = 0.01168;

    (0..len)
        .map(|i| {
            let ratio = i as f64 / (len - 1) as f64;
            let tau = 2.0 * std::f64::consts::PI * ratio;
            (A0 - A1 * tau.cos() + A2 * (2.0 * tau).cos() - A3 * (3.0 * tau).cos()) as f32
        })
        .collect()
}

/// Coherent gain of the Blackman-Harris window (its a0 term), used for
/// dBFS calibration of windowed spectra.
pub const BLACKMAN_HARRIS_GAIN: f32 = 0.35875;

//! Core types for GSM frequency calibration
//!
//! Shared definitions used throughout the crate: the complex I/Q sample
//! type, the GSM symbol-rate constants, energy helpers, and the error
//! taxonomy for the signal-processing core.
//!
//! Samples are `Complex<f32>` pairs normalized to full scale, meaning
//! |x| <= 1.0 for an undistorted signal. Accumulations over long vectors
//! (norms, averages) are carried in f64 to avoid drift.

use num_complex::Complex;

/// A single I/Q sample point (32-bit float I and Q).
pub type IQSample = Complex<f32>;

/// GSM symbol rate in Hz: 1625000 / 6 = 270833.333... symbols/sec.
pub const GSM_RATE: f64 = 1_625_000.0 / 6.0;

/// Maximum acceptable FCCH frequency offset (Hz).
///
/// Detections further than this from the ideal FCCH position are treated
/// as aliases or false positives and rejected.
pub const FCCH_OFFSET_MAX: f32 = 40e3;

/// Result type for core operations.
pub type KalResult<T> = Result<T, KalError>;

/// Errors surfaced by the signal-processing core.
///
/// A scan that completes without finding an FCCH is not an error; it is
/// reported through counters and `Option` returns. Producer-side sample
/// drops are likewise counted, not raised.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KalError {
    /// Allocation, memory mapping, or FFT plan creation failed.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The underlying radio driver reported a failure.
    #[error("device error: {0}")]
    Device(String),

    /// The process-wide exit flag was observed.
    #[error("operation cancelled")]
    Cancelled,
}

/// Sum of squared magnitudes of a complex vector, accumulated in f64.
pub fn vector_norm2(v: &[IQSample]) -> f64 {
    v.iter().map(|s| s.norm_sqr() as f64).sum()
}

/// Convert an L2 norm over `len` samples to dBFS.
///
/// Full scale is |x| = 1.0. Inputs below the numeric floor report -120 dBFS.
pub fn dbfs(l2_norm: f64, len: usize) -> f64 {
    if l2_norm < 1e-9 || len == 0 {
        return -120.0;
    }
    let rms = l2_norm / (len as f64).sqrt();
    20.0 * rms.log10()
}

/// Cooperative cancellation flag shared between the signal handler,
/// the scan drivers, and the blocking fill path.
///
/// Cloning is cheap; all clones observe the same flag. The only operation
/// performed from signal context is `request`, which is async-signal-safe.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; returns the previous state.
    pub fn request(&self) -> bool {
        self.flag.swap(true, std::sync::atomic::Ordering::SeqCst)
    }

    /// True once cancellation has been requested.
    pub fn is_requested(&self) -> bool {
        self.flag.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_norm2() {
        let v = vec![IQSample::new(3.0, 4.0), IQSample::new(0.0, 1.0)];
        assert!((vector_norm2(&v) - 26.0).abs() < 1e-9);
        assert_eq!(vector_norm2(&[]), 0.0);
    }

    #[test]
    fn test_dbfs_full_scale() {
        // 1000 samples at |x| = 1.0 is 0 dBFS
        let norm = (1000.0f64).sqrt();
        assert!(dbfs(norm, 1000).abs() < 1e-9);
    }

    #[test]
    fn test_dbfs_floor() {
        assert_eq!(dbfs(0.0, 100), -120.0);
        assert_eq!(dbfs(1.0, 0), -120.0);
    }

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_requested());
        assert!(!token.request());
        assert!(clone.is_requested());
        // Second request reports it was already set
        assert!(token.request());
    }

    #[test]
    fn test_gsm_rate_value() {
        assert!((GSM_RATE - 270_833.333).abs() < 0.01);
    }
}

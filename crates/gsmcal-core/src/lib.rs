//! # GSM Frequency Calibration Core
//!
//! Signal-processing core for calibrating a software-defined radio's
//! local oscillator against GSM base stations. GSM downlinks carry a
//! Frequency Correction Channel (FCCH): a pure sinusoid exactly
//! GSM_RATE/4 above the carrier. Measuring where that tone lands in the
//! received spectrum measures the receiver's own clock error, down to
//! parts-per-billion with enough averaging.
//!
//! ## Signal Flow
//!
//! ```text
//! RX thread -> Resampler -> MagicRing -> FcchDetector -> scan drivers
//! (2.5 MS/s)   (x13/120)    (lock-free    (NLMS + FFT)    (statistics)
//!                            handoff)
//! ```
//!
//! The driver's RX callback resamples the native 2.5 MS/s stream to the
//! GSM symbol rate and pushes it into a double-mapped ring buffer. The
//! scan thread blocks until a capture is ready, then runs the adaptive
//! -filter detector over it: regions where a linear predictor's error
//! collapses are pure tone, and a 1024-point FFT pins down the burst
//! frequency. On top of that sit two drivers: a band scan that finds
//! base stations, and an offset loop that aggregates a hundred
//! detections into a trimmed clock-error estimate.
//!
//! Hardware access stays behind the [`source::SampleSource`] trait; this
//! crate never touches USB.
//!
//! ## Example
//!
//! ```rust
//! use gsmcal_core::fcch_detector::FcchDetector;
//! use gsmcal_core::types::{IQSample, GSM_RATE};
//!
//! let mut detector = FcchDetector::new(GSM_RATE).unwrap();
//! // A buffer with no FCCH burst scans clean
//! let silence = vec![IQSample::default(); 4096];
//! let result = detector.scan(&silence);
//! assert!(result.offset.is_none());
//! assert_eq!(result.consumed, 4096);
//! ```

pub mod band;
pub mod calib;
pub mod fcch_detector;
pub mod fft_utils;
pub mod magic_ring;
pub mod resampler;
pub mod scan;
pub mod source;
pub mod types;

pub use band::BandIndicator;
pub use calib::CalibrationRecord;
pub use fcch_detector::{FcchConfig, FcchDetector, ScanResult};
pub use magic_ring::MagicRing;
pub use resampler::Resampler;
pub use scan::{c0_detect, offset_detect, BandScan, OffsetOutcome, OffsetReport, ScanContext};
pub use source::{RxStream, SampleSource};
pub use types::{CancellationToken, IQSample, KalError, KalResult, FCCH_OFFSET_MAX, GSM_RATE};

//! FCCH detector: adaptive-filter tone finder for GSM
//!
//! The Frequency Correction Channel is a pure sinusoid at GSM_RATE/4
//! (about +67.7 kHz) lasting roughly 148 symbols. A pure tone is the
//! easiest possible signal to predict, so a normalized LMS linear
//! predictor trained on the stream collapses to near-zero prediction
//! error exactly where an FCCH burst sits. Detection therefore runs in
//! three stages:
//!
//! 1. run every sample through the NLMS predictor and record the
//!    normalized prediction error,
//! 2. find error regions below 0.7x the buffer average that are at least
//!    100 symbol periods long,
//! 3. confirm each candidate with a 1024-point FFT: a genuine FCCH shows
//!    a single peak whose peak-to-mean power ratio exceeds 50, and the
//!    interpolated peak position is the measured burst frequency.
//!
//! The filter weights deliberately survive from one scan to the next so
//! the predictor keeps adapting across bursts; the internal rings and the
//! edge state machine are flushed after every scan.

use num_complex::Complex;
use std::f32::consts::PI;

use crate::fft_utils::FftProcessor;
use crate::magic_ring::MagicRing;
use crate::types::{IQSample, KalResult, GSM_RATE};

/// FFT length used for tone confirmation and frequency estimation.
pub const FFT_SIZE: usize = 1024;

/// One-sided span of the predictor; weight count is 2 * span + 1.
const FILTER_SPAN: usize = 8;
const WEIGHT_COUNT: usize = 2 * FILTER_SPAN + 1;

const SAMPLE_RING_LEN: usize = 8192;
const OUTPUT_RING_LEN: usize = 8192;
const ERROR_RING_LEN: usize = 1_015_808;

/// Errors are staged in batches before hitting the error ring so the ring
/// mutex is taken once per batch instead of once per sample.
const ERROR_BATCH: usize = 512;

/// A candidate region only counts as FCCH above this peak-to-mean ratio.
const MIN_PEAK_TO_MEAN: f32 = 50.0;

/// Tunable detector parameters. The defaults are the working values; they
/// rarely need changing.
#[derive(Debug, Clone)]
pub struct FcchConfig {
    /// Prediction delay D in samples.
    pub prediction_delay: usize,
    /// Smoothing coefficient p for the running error power.
    pub error_avg_coeff: f32,
    /// Initial NLMS gain, retained whenever input energy is too small to
    /// renormalize.
    pub initial_gain: f32,
    /// Low-error regions are those below `threshold_factor` times the
    /// average normalized error of the scanned buffer.
    pub threshold_factor: f64,
}

impl Default for FcchConfig {
    fn default() -> Self {
        Self {
            prediction_delay: 4,
            error_avg_coeff: 0.25,
            initial_gain: 1.0,
            threshold_factor: 0.7,
        }
    }
}

/// Outcome of one [`FcchDetector::scan`] call.
///
/// `offset` is the raw detected burst frequency in Hz; subtract
/// GSM_RATE/4 to get the error relative to the ideal FCCH position.
/// `consumed` always equals the scanned length, so callers can purge
/// their source buffer unconditionally.
#[derive(Debug, Clone, Copy)]
pub struct ScanResult {
    pub offset: Option<f32>,
    pub consumed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeState {
    Low,
    High,
}

/// State machine that measures the length of below-threshold runs in the
/// error signal, reporting each run as it ends.
#[derive(Debug)]
struct EdgeDetector {
    state: EdgeState,
    count: usize,
}

impl EdgeDetector {
    fn new() -> Self {
        Self { state: EdgeState::High, count: 0 }
    }

    fn reset(&mut self) {
        self.state = EdgeState::High;
        self.count = 0;
    }

    /// Feed one error value. Returns the length of a low region on the
    /// sample that ends it, 0 otherwise.
    fn step(&mut self, e: f32, threshold: f32) -> usize {
        let mut region = 0;
        if e > threshold {
            if self.state == EdgeState::Low {
                region = self.count;
                self.state = EdgeState::High;
                self.count = 0;
            }
            self.count += 1;
        } else {
            if self.state == EdgeState::High {
                self.state = EdgeState::Low;
                self.count = 0;
            }
            self.count += 1;
        }
        region
    }
}

/// GSM FCCH burst detector.
pub struct FcchDetector {
    sample_rate: f64,
    /// Expected FCCH burst length in samples (148 symbols).
    fcch_burst_len: usize,
    delay: usize,
    p: f32,
    gain: f32,
    err_avg: f32,
    threshold_factor: f64,
    weights: Vec<IQSample>,

    x_ring: MagicRing<IQSample>,
    y_ring: MagicRing<IQSample>,
    e_ring: MagicRing<f32>,

    fft: FftProcessor,
    edge: EdgeDetector,
}

impl FcchDetector {
    /// Detector with default parameters for the given sample rate.
    pub fn new(sample_rate: f64) -> KalResult<Self> {
        Self::with_config(sample_rate, FcchConfig::default())
    }

    pub fn with_config(sample_rate: f64, config: FcchConfig) -> KalResult<Self> {
        let sps = sample_rate / GSM_RATE;
        Ok(Self {
            sample_rate,
            fcch_burst_len: (148.0 * sps) as usize,
            delay: config.prediction_delay,
            p: config.error_avg_coeff,
            gain: config.initial_gain,
            err_avg: 0.0,
            threshold_factor: config.threshold_factor,
            weights: vec![IQSample::default(); WEIGHT_COUNT],
            x_ring: MagicRing::new(SAMPLE_RING_LEN, false)?,
            y_ring: MagicRing::new(OUTPUT_RING_LEN, true)?,
            e_ring: MagicRing::new(ERROR_RING_LEN, false)?,
            fft: FftProcessor::new(FFT_SIZE),
            edge: EdgeDetector::new(),
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn filter_len(&self) -> usize {
        WEIGHT_COUNT
    }

    /// Group delay of the predictor path in samples.
    pub fn group_delay(&self) -> usize {
        WEIGHT_COUNT - 1 + self.delay
    }

    /// Scan a buffer for an FCCH burst.
    ///
    /// Never fails: the two observable outcomes are "found with offset"
    /// and "not found". `consumed` is always the full input length.
    pub fn scan(&mut self, s: &[IQSample]) -> ScanResult {
        let sps = (self.sample_rate / GSM_RATE) as f32;
        let min_region = (100.0 * sps) as usize;

        // Stream the buffer through the predictor, batching errors.
        let mut batch = [0f32; ERROR_BATCH];
        let mut batched = 0usize;
        let mut sum = 0f64;
        let mut len = 0usize;
        while len < s.len() {
            len += self.x_ring.write(&s[len..]);
            while let Some(e) = self.next_norm_error() {
                batch[batched] = e;
                batched += 1;
                sum += e as f64;
                if batched == ERROR_BATCH {
                    self.e_ring.write(&batch);
                    batched = 0;
                }
            }
        }
        if batched > 0 {
            self.e_ring.write(&batch[..batched]);
        }
        let consumed = len;

        let e_count = self.e_ring.data_available();
        if e_count == 0 {
            self.flush_rings();
            return ScanResult { offset: None, consumed };
        }
        let mut errors = vec![0f32; e_count];
        self.e_ring.read(&mut errors);

        let limit = (self.threshold_factor * sum / e_count as f64) as f32;
        tracing::debug!(limit, "error limit");

        // Walk the error signal; the error at index i lines up with the
        // input sample at index i, offset only by the filter group delay,
        // so candidate regions index straight into `s`.
        self.edge.reset();
        let mut found = None;
        for (i, &e) in errors.iter().enumerate() {
            let region = self.edge.step(e, limit);
            if region < min_region {
                continue;
            }
            let start = i - region;
            let take = region.min(self.fcch_burst_len);
            let (freq, pm) = self.freq_detect(&s[start..start + take]);
            tracing::debug!(
                symbols = region as f32 / sps,
                pm,
                freq,
                "low-error candidate"
            );
            if pm > MIN_PEAK_TO_MEAN {
                found = Some(freq);
                break;
            }
        }

        self.flush_rings();
        ScanResult { offset: found, consumed }
    }

    /// Estimate the dominant tone of `s` via the 1024-point FFT.
    ///
    /// Returns `(frequency_hz, peak_to_mean)`; the peak-to-mean power
    /// ratio is the detection quality metric.
    pub fn freq_detect(&mut self, s: &[IQSample]) -> (f32, f32) {
        let spectrum = self.fft.forward(s);
        let (peak_index, peak, avg_power) = peak_detect(&spectrum);
        let pm = if avg_power > 0.0 { peak.norm_sqr() / avg_power } else { 0.0 };
        (self.fft.bin_to_hz(peak_index, self.sample_rate), pm)
    }

    /// One normalized-LMS step over the sample ring.
    ///
    /// Consumes one buffered sample and returns its normalized prediction
    /// error, or `None` when fewer than filter-length + delay samples are
    /// buffered.
    fn next_norm_error(&mut self) -> Option<f32> {
        let n = WEIGHT_COUNT - 1;
        let x = self.x_ring.peek();
        if n + self.delay >= x.len() {
            return None;
        }

        let mut energy = 0f32;
        for i in 0..WEIGHT_COUNT {
            energy += x[i].norm_sqr();
        }
        if energy > 1e-10 {
            self.gain = 1.0 / energy;
        }

        let mut y = IQSample::default();
        for i in 0..WEIGHT_COUNT {
            y += self.weights[i].conj() * x[n - i];
        }

        let desired = x[n + self.delay];
        self.y_ring.write(&[desired]);

        let err = desired - y;
        let step = err.conj() * self.gain;
        for i in 0..WEIGHT_COUNT {
            self.weights[i] += step * x[n - i];
        }

        let energy = energy / WEIGHT_COUNT as f32;
        self.err_avg = (1.0 - self.p) * self.err_avg + self.p * err.norm_sqr();
        let ratio = if energy > 1e-20 { self.err_avg / energy } else { 0.0 };

        self.x_ring.purge(1);
        Some(ratio)
    }

    fn flush_rings(&mut self) {
        self.x_ring.flush();
        self.y_ring.flush();
        self.e_ring.flush();
    }
}

fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-4 {
        1.0
    } else {
        x.sin() / x
    }
}

/// Band-limited interpolation of the spectrum at fractional index `pos`,
/// using a 21-point sinc kernel clamped to the buffer.
fn interpolate_point(s: &[Complex<f32>], pos: f32) -> Complex<f32> {
    const KERNEL_LEN: i64 = 21;
    let d = (KERNEL_LEN - 1) / 2;

    let start = ((pos.floor() as i64) - d).max(0);
    let end = ((pos.floor() as i64) + d + 1).min(s.len() as i64 - 1);

    let mut point = Complex::default();
    for i in start..=end {
        point += s[i as usize] * sinc(PI * (i as f32 - pos));
    }
    point
}

/// Locate the power peak of a spectrum with sub-bin resolution.
///
/// The integer maximum seeds a bisection: interpolated probes one bin
/// either side step toward the stronger neighbour with halving increments
/// until the step is below 1/1024 bin. Returns the refined fractional
/// index, the interpolated peak value, and the mean power of the
/// remaining bins.
fn peak_detect(s: &[Complex<f32>]) -> (f32, Complex<f32>, f32) {
    let mut max = -1.0f32;
    let mut max_i = 0f32;
    let mut sum_power = 0f32;
    for (i, v) in s.iter().enumerate() {
        let power = v.norm_sqr();
        sum_power += power;
        if power > max {
            max = power;
            max_i = i as f32;
        }
    }

    let mut early_i = if max_i >= 1.0 { max_i - 1.0 } else { 0.0 };
    let mut late_i = if max_i + 1.0 < s.len() as f32 {
        max_i + 1.0
    } else {
        (s.len() - 1) as f32
    };

    let mut incr = 0.5f32;
    while incr > 1.0 / 1024.0 {
        let early_p = interpolate_point(s, early_i).norm_sqr();
        let late_p = interpolate_point(s, late_i).norm_sqr();
        if early_p < late_p {
            early_i += incr;
        } else if early_p > late_p {
            early_i -= incr;
        } else {
            break;
        }
        incr /= 2.0;
        late_i = early_i + 2.0;
    }

    let refined = early_i + 1.0;
    let peak = interpolate_point(s, refined);
    let avg_power = if s.len() > 1 {
        (sum_power - peak.norm_sqr()) / (s.len() - 1) as f32
    } else {
        sum_power
    };

    (refined, peak, avg_power)
}

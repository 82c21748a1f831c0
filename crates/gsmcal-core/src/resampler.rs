//! Two-stage rational resampler: 2.5 MS/s to the GSM symbol rate
//!
//! The hardware delivers complex samples at 2 500 000 Hz; GSM work wants
//! 1 625 000 / 6 = 270 833.333 Hz. The ratio reduces to 13/120, factored
//! into two cheap stages:
//!
//! ```text
//!   2,500,000 Hz -> [stage 1: decimate by 5] -> 500,000 Hz
//!                -> [stage 2: resample 13/24] -> 270,833.333 Hz
//! ```
//!
//! Stage 1 is a 61-tap lowpass FIR evaluated only at the kept samples.
//! Stage 2 is a 729-tap polyphase rational resampler: conceptually the
//! stream is zero-stuffed by 13, lowpassed, and every 24th result kept.
//! The polyphase decomposition folds that into 13 subfilters of 57 taps,
//! so each output costs one 57-tap inner product; the phase accumulator
//! advances by 24 modulo 13 per output, and its integer carry is the
//! number of stage-1 samples to consume before the next one.
//!
//! Filter history persists across calls, so splitting an input stream into
//! arbitrary chunks yields bit-identical output to a single call.
//!
//! ## Example
//!
//! ```rust
//! use gsmcal_core::resampler::Resampler;
//! use gsmcal_core::types::IQSample;
//!
//! let mut rs = Resampler::new();
//! let input = vec![IQSample::new(1.0, 0.0); 1200];
//! let mut out = vec![IQSample::default(); Resampler::max_output_len(1200)];
//! let produced = rs.process(&input, &mut out);
//! assert_eq!(produced, 130); // 1200 * 13 / 120
//! ```

use std::f64::consts::PI;

use crate::types::IQSample;

/// Native sample rate of the radio front end (Hz).
pub const RAW_SAMPLE_RATE: f64 = 2_500_000.0;

const STAGE1_TAP_COUNT: usize = 61;
const STAGE1_DECIM: usize = 5;

const STAGE2_TAP_COUNT: usize = 729;
const RESAMP_UP: usize = 13;
const RESAMP_DOWN: usize = 24;
/// ceil(729 / 13); the last branch positions beyond the prototype are zero.
const SUBFILTER_LEN: usize = 57;

/// Streaming 2.5 MS/s -> 270.833 kS/s converter.
///
/// Construct once per device and call [`Resampler::reset`] on every retune
/// so transients from the previous frequency do not leak into the new one.
pub struct Resampler {
    stage1_taps: Vec<f32>,
    stage1_hist: Vec<IQSample>,
    stage1_idx: usize,
    stage1_skip: usize,

    /// Polyphase branches, `subfilters[phase][k]` pairs with the k-th
    /// newest stage-1 output.
    subfilters: Vec<Vec<f32>>,
    stage2_hist: Vec<IQSample>,
    stage2_idx: usize,
    /// Current polyphase branch, 0 <= phase < 13.
    stage2_phase: usize,
    /// Stage-1 samples still to consume before the next output.
    stage2_need: usize,
}

impl Resampler {
    pub fn new() -> Self {
        let stage1_taps = design_lowpass(STAGE1_TAP_COUNT, 1.0 / STAGE1_DECIM as f64);
        let prototype = design_prototype(
            STAGE2_TAP_COUNT,
            1.0 / RESAMP_DOWN as f64,
            RESAMP_UP as f64,
        );

        let mut subfilters = vec![vec![0.0f32; SUBFILTER_LEN]; RESAMP_UP];
        for (i, &tap) in prototype.iter().enumerate() {
            subfilters[i % RESAMP_UP][i / RESAMP_UP] = tap;
        }

        Self {
            stage1_taps,
            stage1_hist: vec![IQSample::default(); STAGE1_TAP_COUNT],
            stage1_idx: 0,
            stage1_skip: 0,
            subfilters,
            stage2_hist: vec![IQSample::default(); SUBFILTER_LEN],
            stage2_idx: 0,
            stage2_phase: 0,
            stage2_need: 1,
        }
    }

    /// Worst-case output length for `input_len` input samples.
    pub fn max_output_len(input_len: usize) -> usize {
        input_len * RESAMP_UP / (STAGE1_DECIM * RESAMP_DOWN) + 2
    }

    /// Push `input` through both stages, writing results into `out`.
    ///
    /// Returns the number of samples produced. If `out` is too small the
    /// excess output is silently discarded while internal state still
    /// advances; size `out` with [`Resampler::max_output_len`].
    pub fn process(&mut self, input: &[IQSample], out: &mut [IQSample]) -> usize {
        let mut produced = 0;

        for &s in input {
            self.stage1_hist[self.stage1_idx] = s;
            let newest = self.stage1_idx;
            self.stage1_idx = (self.stage1_idx + 1) % STAGE1_TAP_COUNT;

            self.stage1_skip += 1;
            if self.stage1_skip < STAGE1_DECIM {
                continue;
            }
            self.stage1_skip = 0;

            let mut acc = IQSample::default();
            for (i, &tap) in self.stage1_taps.iter().enumerate() {
                let idx = (newest + STAGE1_TAP_COUNT - i) % STAGE1_TAP_COUNT;
                acc += self.stage1_hist[idx] * tap;
            }
            self.push_stage2(acc, out, &mut produced);
        }

        produced
    }

    /// Clear all filter history and phase counters. The next call starts a
    /// fresh settling transient.
    pub fn reset(&mut self) {
        self.stage1_hist.fill(IQSample::default());
        self.stage1_idx = 0;
        self.stage1_skip = 0;
        self.stage2_hist.fill(IQSample::default());
        self.stage2_idx = 0;
        self.stage2_phase = 0;
        self.stage2_need = 1;
    }

    fn push_stage2(&mut self, sample: IQSample, out: &mut [IQSample], produced: &mut usize) {
        self.stage2_hist[self.stage2_idx] = sample;
        let newest = self.stage2_idx;
        self.stage2_idx = (self.stage2_idx + 1) % SUBFILTER_LEN;

        self.stage2_need -= 1;
        if self.stage2_need > 0 {
            return;
        }

        let branch = &self.subfilters[self.stage2_phase];
        let mut acc = IQSample::default();
        for (k, &tap) in branch.iter().enumerate() {
            let idx = (newest + SUBFILTER_LEN - k) % SUBFILTER_LEN;
            acc += self.stage2_hist[idx] * tap;
        }
        if *produced < out.len() {
            out[*produced] = acc;
            *produced += 1;
        }

        let advanced = self.stage2_phase + RESAMP_DOWN;
        self.stage2_need = advanced / RESAMP_UP;
        self.stage2_phase = advanced % RESAMP_UP;
    }
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Windowed-sinc lowpass, Hamming window, unity DC gain.
///
/// `cutoff` is a fraction of Nyquist.
fn design_lowpass(num_taps: usize, cutoff: f64) -> Vec<f32> {
    let m = (num_taps - 1) as f64 / 2.0;
    let mut taps = Vec::with_capacity(num_taps);

    for i in 0..num_taps {
        let x = i as f64 - m;
        let sinc = if x.abs() < 1e-10 {
            cutoff
        } else {
            (PI * cutoff * x).sin() / (PI * x)
        };
        let window = 0.54 - 0.46 * (2.0 * PI * i as f64 / (num_taps - 1) as f64).cos();
        taps.push(sinc * window);
    }

    let sum: f64 = taps.iter().sum();
    taps.iter().map(|&t| (t / sum) as f32).collect()
}

/// Windowed-sinc prototype for the polyphase stage, Blackman-Harris
/// window, DC gain scaled to `gain` so the zero-stuffed stream keeps unity
/// amplitude through the upsample.
fn design_prototype(num_taps: usize, cutoff: f64, gain: f64) -> Vec<f32> {
    let m = num_taps as f64;
    let mid = (num_taps - 1) as f64 / 2.0;

    let mut taps = Vec::with_capacity(num_taps);
    for i in 0..num_taps {
        let n = i as f64 - mid;
        let sinc = if n.abs() < 1e-10 {
            cutoff
        } else {
            (PI * cutoff * n).sin() / (PI * n)
        };
        let w = 0.35875 - 0.48829 * (2.0 * PI * i as f64 / (m - 1.0)).cos()
            + 0.14128 * (4.0 * PI * i as f64 / (m - 1.0)).cos()
            - 0.01168 * (6.0 * PI * i as f64 / (m - 1.0)).cos();
        taps.push(sinc * w);
    }

    let sum: f64 = taps.iter().sum();
    let scale = gain / sum;
    taps.iter().map(|&t| (t * scale) as f32).collect()
}

//! ASCII spectrum display
//!
//! Renders a Blackman-Harris-windowed power spectrum as a colored Unicode
//! bar chart in the terminal, calibrated in dBFS, with a listing of the
//! strongest peaks. The FFT plan and window are cached per length and the
//! whole thing is an owned context, so several displays can coexist and
//! nothing static needs locking.

use gsmcal_core::fft_utils::{blackman_harris, FftProcessor, BLACKMAN_HARRIS_GAIN};
use gsmcal_core::scan::SpectrumSink;
use gsmcal_core::types::IQSample;
use num_complex::Complex;

const FLOOR_DB: f32 = -115.0;
const CEIL_DB: f32 = -45.0;

const BLOCKS: [&str; 9] = [" ", " ", "\u{2582}", "\u{2583}", "\u{2584}", "\u{2585}", "\u{2586}", "\u{2587}", "\u{2588}"];

struct Plan {
    len: usize,
    fft: FftProcessor,
    window: Vec<f32>,
    /// Subtracted from raw bin power so a full-scale tone reads 0 dBFS.
    db_offset: f32,
}

/// Terminal spectrum renderer with cached FFT state.
pub struct AsciiSpectrum {
    plan: Option<Plan>,
}

impl AsciiSpectrum {
    pub fn new() -> Self {
        Self { plan: None }
    }

    fn plan_for(&mut self, len: usize) -> &mut Plan {
        if self.plan.as_ref().map(|p| p.len) != Some(len) {
            let ref_amplitude = len as f32 * BLACKMAN_HARRIS_GAIN;
            self.plan = Some(Plan {
                len,
                fft: FftProcessor::new(len),
                window: blackman_harris(len),
                db_offset: 20.0 * ref_amplitude.log10(),
            });
        }
        self.plan.as_mut().unwrap()
    }

    /// Draw the spectrum of `data` across `width` terminal columns.
    ///
    /// When `sample_rate` is positive the strongest peaks are listed with
    /// their frequencies relative to the center.
    pub fn draw(&mut self, data: &[IQSample], width: usize, sample_rate: f64) {
        let len = data.len();
        if len < 2 {
            return;
        }
        let plan = self.plan_for(len);

        let mut buf: Vec<Complex<f32>> = data
            .iter()
            .zip(plan.window.iter())
            .map(|(&s, &w)| s * w)
            .collect();
        plan.fft.forward_inplace(&mut buf);

        // Shift so the center frequency sits mid-plot
        let mut mag_db = vec![0.0f32; len];
        let mut max_db = -1000.0f32;
        for i in 0..len {
            let idx = (i + len / 2) % len;
            let db = 10.0 * (buf[idx].norm_sqr() + 1e-12).log10() - plan.db_offset;
            mag_db[i] = db;
            if db > max_db {
                max_db = db;
            }
        }

        // Max-hold downsample onto the plot width
        let plot_width = width.saturating_sub(20).max(10);
        let mut bins = vec![FLOOR_DB; plot_width];
        for (w, bin) in bins.iter_mut().enumerate() {
            let start = w * len / plot_width;
            let end = ((w + 1) * len / plot_width).min(len);
            for &db in &mag_db[start..end] {
                if db > *bin {
                    *bin = db;
                }
            }
        }

        print!("\x1b[36m[-BW/2] \x1b[0m");
        for &val in &bins {
            let norm = ((val - FLOOR_DB) / (CEIL_DB - FLOOR_DB)).clamp(0.0, 1.0);
            let color = if norm < 0.20 {
                "\x1b[90m"
            } else if norm < 0.40 {
                "\x1b[34m"
            } else if norm < 0.60 {
                "\x1b[36m"
            } else if norm < 0.80 {
                "\x1b[32m"
            } else {
                "\x1b[91m"
            };
            let idx = (norm * (BLOCKS.len() - 1) as f32) as usize;
            print!("{color}{}", BLOCKS[idx]);
        }
        println!("\x1b[0m \x1b[36m[+BW/2]\x1b[0m Max: {max_db:.1}dBFS");

        if sample_rate > 0.0 {
            // Local maxima within 40 dB of the top, strongest first
            let mut peaks: Vec<(f32, f32)> = Vec::new();
            for i in 1..len - 1 {
                if mag_db[i] > mag_db[i - 1]
                    && mag_db[i] > mag_db[i + 1]
                    && mag_db[i] > max_db - 40.0
                    && mag_db[i] > -120.0
                {
                    let freq = (i as f64 - len as f64 / 2.0) * sample_rate / len as f64;
                    peaks.push((freq as f32, mag_db[i]));
                }
            }
            peaks.sort_by(|a, b| b.1.total_cmp(&a.1));

            println!("   Peak Detection (Top 6):");
            for (rank, (freq, db)) in peaks.iter().take(6).enumerate() {
                println!("    #{}: {freq:9.1} Hz  ({db:6.1} dBFS)", rank + 1);
            }
        }
    }
}

impl Default for AsciiSpectrum {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumSink for AsciiSpectrum {
    fn show(&mut self, samples: &[IQSample], sample_rate: f64) {
        self.draw(samples, 80, sample_rate);
    }
}

//! Offline DSP pipeline benchmark
//!
//! Generates five seconds of a six-tone test signal at the native
//! 2.5 MS/s rate, pushes it through the resampler and ring in realistic
//! USB-sized chunks, and reports throughput against realtime. The two
//! outermost tones sit beyond the 135 kHz output passband and must be
//! absent from the output spectrum; the four inner ones must survive.

use std::time::Instant;

use gsmcal_core::resampler::RAW_SAMPLE_RATE;
use gsmcal_core::source::SampleSource;
use gsmcal_core::types::{IQSample, GSM_RATE};

use crate::display::AsciiSpectrum;
use crate::sim_source::SimSource;

const DURATION_SECS: f64 = 5.0;
const CHUNK: usize = 65_536;

/// Tone table: (frequency Hz, amplitude). Stepped levels make each tone
/// identifiable on the dBFS scale.
const TONES: [(f64, f64); 6] = [
    (300_000.0, 0.79),
    (67_000.0, 0.5),
    (47_000.0, 0.4),
    (-40_000.0, 0.31),
    (-62_000.0, 0.25),
    (-300_000.0, 0.2),
];

pub fn run(spectrum: &mut AsciiSpectrum) -> Result<(), String> {
    println!("--------------------------------------------------------");
    println!("DSP Benchmark (2.5 MSPS -> 270.833 kSPS)");
    println!("--------------------------------------------------------");

    let num_samples = (RAW_SAMPLE_RATE * DURATION_SECS) as usize;
    println!("Generating {DURATION_SECS:.1} seconds of test signal ({num_samples} samples)...");
    println!(
        "Test signal: {}",
        TONES
            .iter()
            .map(|(f, a)| format!("{:+}kHz({:.2})", f / 1e3, a))
            .collect::<Vec<_>>()
            .join(" ")
    );

    // Phase accumulation in f64: float32 phase drifts into audible noise
    // over 12.5M samples.
    let mut input = Vec::with_capacity(num_samples);
    for i in 0..num_samples {
        let t = i as f64 / RAW_SAMPLE_RATE;
        let mut re = 0.0f64;
        let mut im = 0.0f64;
        for (freq, amp) in TONES {
            let ph = 2.0 * std::f64::consts::PI * freq * t;
            re += amp * ph.cos();
            im += amp * ph.sin();
        }
        input.push(IQSample::new(re as f32, im as f32));
    }

    println!("\nInput spectrum at 2.5 MSPS ({} samples):", input.len());
    spectrum.draw(&input, 120, RAW_SAMPLE_RATE);

    println!("\nRunning DSP pipeline...");
    let mut src = SimSource::new(10).map_err(|e| e.to_string())?;
    src.start_benchmark();

    let mut output: Vec<IQSample> =
        Vec::with_capacity((num_samples as f64 * GSM_RATE / RAW_SAMPLE_RATE * 1.1) as usize);
    let mut drain = vec![IQSample::default(); CHUNK];

    let start = Instant::now();
    for chunk in input.chunks(CHUNK) {
        src.push_raw(chunk);
        loop {
            let n = src.buffer().read(&mut drain);
            if n == 0 {
                break;
            }
            output.extend_from_slice(&drain[..n]);
        }
    }
    let elapsed = start.elapsed().as_secs_f64();

    println!("--------------------------------------------------------");
    println!("Processed {num_samples} samples in {elapsed:.4} seconds");
    println!("Speedup:    {:.2}x realtime", DURATION_SECS / elapsed);
    println!("Throughput: {:.2} MSPS", num_samples as f64 / 1e6 / elapsed);
    println!("--------------------------------------------------------");

    if output.is_empty() {
        return Err("no output data collected".into());
    }
    println!(
        "\nOutput spectrum at {:.3} kSPS ({} samples):",
        GSM_RATE / 1e3,
        output.len()
    );
    spectrum.draw(&output, 120, GSM_RATE);
    Ok(())
}

//! Scan drivers: base-station discovery and clock-offset measurement
//!
//! Two procedures sit on top of the detector. `c0_detect` sweeps a GSM
//! band: a fast power pass tags the channels worth looking at, then each
//! candidate is captured for twelve frames and handed to the FCCH
//! detector. `offset_detect` stays on one channel and aggregates many
//! FCCH detections into a robust clock-error estimate with outlier
//! trimming.
//!
//! Both poll a [`CancellationToken`] at every loop boundary and return
//! cleanly when it fires. Progress is written incrementally because a
//! full band sweep takes minutes; structured results come back to the
//! caller for the final summary.

use std::io::Write;

use crate::band::BandIndicator;
use crate::fcch_detector::FcchDetector;
use crate::source::SampleSource;
use crate::types::{
    dbfs, vector_norm2, CancellationToken, IQSample, KalError, KalResult, FCCH_OFFSET_MAX,
    GSM_RATE,
};

/// Offset samples to collect before computing statistics.
const TARGET_COUNT: usize = 100;
/// Give up after this many capture iterations.
const MAX_ITERATIONS: u32 = 500;
/// Consecutive failed scans of one channel before moving on.
const NOTFOUND_MAX: u32 = 5;
/// Upper bound on ARFCN numbering, sizing the per-channel power table.
const MAX_ARFCN: usize = 2048;

/// Receiver for buffer snapshots when spectrum display is enabled.
pub trait SpectrumSink {
    fn show(&mut self, samples: &[IQSample], sample_rate: f64);
}

/// Explicit per-run context: cancellation, chattiness, optional display.
pub struct ScanContext<'a> {
    pub cancel: CancellationToken,
    pub verbosity: u8,
    pub spectrum: Option<&'a mut dyn SpectrumSink>,
}

impl<'a> ScanContext<'a> {
    pub fn new(cancel: CancellationToken, verbosity: u8) -> Self {
        Self { cancel, verbosity, spectrum: None }
    }
}

/// One base station found by the band scan.
#[derive(Debug, Clone, Copy)]
pub struct ChannelHit {
    pub arfcn: u16,
    pub freq_hz: f64,
    /// Measured FCCH error relative to the ideal GSM_RATE/4 position.
    pub offset_hz: f64,
    pub power_dbfs: f64,
}

/// Result of a full band sweep.
#[derive(Debug, Clone)]
pub struct BandScan {
    pub band: BandIndicator,
    pub hits: Vec<ChannelHit>,
    pub threshold_dbfs: f64,
    pub cancelled: bool,
}

/// Aggregated clock-offset statistics from `offset_detect`.
#[derive(Debug, Clone, Copy)]
pub struct OffsetReport {
    pub count: usize,
    pub iterations: u32,
    pub notfound: u32,
    pub overruns: u32,
    /// Extremes of the trimmed window, Hz.
    pub min_hz: f32,
    pub max_hz: f32,
    pub stddev_hz: f64,
    pub mean_hz: f64,
    pub ppm: f64,
}

/// Outcome of `offset_detect`; only device failures are errors.
#[derive(Debug, Clone, Copy)]
pub enum OffsetOutcome {
    Report(OffsetReport),
    /// Ran to the iteration limit without one valid detection.
    NoBursts { iterations: u32 },
    Cancelled,
}

/// Human-friendly frequency with unit scaling, as used in hit lines.
pub fn format_freq(f: f64) -> String {
    if f.abs() >= 1e6 {
        format!("{:+.0}MHz", f / 1e6)
    } else if f.abs() >= 1e3 {
        format!("{:+.0}kHz", f / 1e3)
    } else {
        format!("{:+.0}Hz", f)
    }
}

/// Samples in one capture of `frames` GSM frames plus one guard burst.
fn capture_len(frames: f64, sps: f64) -> usize {
    ((frames * 8.0 * 156.25 + 156.25) * sps).ceil() as usize
}

/// Mean and population standard deviation.
fn avg_stddev(data: &[f32]) -> (f64, f64) {
    if data.is_empty() {
        return (0.0, 0.0);
    }
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for &v in data {
        sum += v as f64;
        sum_sq += v as f64 * v as f64;
    }
    let mean = sum / data.len() as f64;
    let variance = (sum_sq / data.len() as f64 - mean * mean).max(0.0);
    (mean, variance.sqrt())
}

/// Outlier trim width: drop the top and bottom 10% once ten or more
/// samples are in hand.
fn trim_count(len: usize) -> usize {
    if len >= 10 {
        len / 10
    } else {
        0
    }
}

/// Block until a capture of `len` samples is buffered, flushing and
/// retrying while the producer reports overruns.
///
/// `flush_first` matches the two call sites: the band scan flushes before
/// every attempt, the offset loop only after an overrun.
fn fill_clean(
    src: &mut dyn SampleSource,
    len: usize,
    cancel: &CancellationToken,
    flush_first: bool,
    overruns_total: &mut u32,
) -> KalResult<()> {
    loop {
        if flush_first {
            src.flush();
        }
        match src.fill(len, cancel) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                *overruns_total += n;
                if !flush_first {
                    src.flush();
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Scan `band` for base stations (C0 carriers).
///
/// Pass 1 tunes every channel and records its L2-norm power over one
/// burst length. The detection threshold is the average of the quietest
/// 60% of channels, a floor estimate that the brightest 40% cannot drag
/// up. Pass 2 revisits only channels above the threshold with a
/// twelve-frame capture and the FCCH detector.
pub fn c0_detect(
    src: &mut dyn SampleSource,
    detector: &mut FcchDetector,
    band: BandIndicator,
    ctx: &mut ScanContext,
) -> KalResult<BandScan> {
    let sps = src.sample_rate() / GSM_RATE;
    let frames_len = capture_len(12.0, sps);
    // One frame is enough for a power estimate; that makes pass 1 about
    // twelve times faster than using the detection capture length.
    let power_scan_len = ((8.0 * 156.25 * sps).ceil() as usize).max(1024);

    let mut power = vec![0.0f64; MAX_ARFCN];
    let mut overruns = 0u32;

    src.start()?;
    src.flush();

    // Pass 1: power sweep, one short capture per channel.
    if ctx.verbosity > 2 {
        eprintln!("calculate power in each channel:");
    }
    for chan in band.channels() {
        if ctx.cancel.is_requested() {
            break;
        }
        if chan as usize >= MAX_ARFCN {
            tracing::warn!(chan, "ARFCN exceeds power table, skipping");
            continue;
        }
        let freq = match band.arfcn_to_freq(chan) {
            Some(f) => f,
            None => continue,
        };
        if let Err(e) = src.tune(freq) {
            if ctx.cancel.is_requested() {
                break;
            }
            let _ = src.stop();
            return Err(e);
        }
        match fill_clean(src, power_scan_len, &ctx.cancel, true, &mut overruns) {
            Ok(()) => {}
            Err(KalError::Cancelled) => break,
            Err(e) => {
                let _ = src.stop();
                return Err(e);
            }
        }

        let b = src.buffer().peek();
        let take = power_scan_len.min(b.len());
        let n = vector_norm2(&b[..take]).sqrt();
        power[chan as usize] = n;
        if ctx.verbosity > 2 {
            eprintln!(
                "\tchan {chan} ({:.1}MHz):\tpower: {:6.1} dBFS",
                freq / 1e6,
                dbfs(n, take)
            );
        }
    }

    if ctx.cancel.is_requested() {
        let _ = src.stop();
        return Ok(BandScan {
            band,
            hits: Vec::new(),
            threshold_dbfs: -120.0,
            cancelled: true,
        });
    }

    // Robust floor: average of the quietest 60% of channels.
    let mut spower: Vec<f64> = band
        .channels()
        .filter(|&c| (c as usize) < MAX_ARFCN)
        .map(|c| power[c as usize])
        .collect();
    spower.sort_by(f64::total_cmp);
    let keep = spower.len() - 4 * spower.len() / 10;
    let threshold = if keep > 0 {
        spower[..keep].iter().sum::<f64>() / keep as f64
    } else {
        0.0
    };
    let threshold_dbfs = dbfs(threshold, power_scan_len);
    if ctx.verbosity > 0 {
        eprintln!("channel detect threshold: {threshold_dbfs:6.1} dBFS");
    }

    // Pass 2: FCCH detection on candidates only.
    println!("{band}:");
    let mut hits = Vec::new();
    let mut notfound = 0u32;
    let mut chan = Some(band.first_chan());
    while let Some(i) = chan {
        if ctx.cancel.is_requested() {
            break;
        }
        if i as usize >= MAX_ARFCN || power[i as usize] <= threshold {
            chan = band.next_chan(i);
            continue;
        }
        let freq = match band.arfcn_to_freq(i) {
            Some(f) => f,
            None => {
                chan = band.next_chan(i);
                continue;
            }
        };
        if unsafe { libc::isatty(1) } == 1 {
            print!("...chan {i} ({:.1}MHz)\r", freq / 1e6);
            let _ = std::io::stdout().flush();
        }

        if let Err(e) = src.tune(freq) {
            if ctx.cancel.is_requested() {
                break;
            }
            let _ = src.stop();
            return Err(e);
        }
        match fill_clean(src, frames_len, &ctx.cancel, true, &mut overruns) {
            Ok(()) => {}
            Err(KalError::Cancelled) => break,
            Err(e) => {
                let _ = src.stop();
                return Err(e);
            }
        }

        let b = src.buffer().peek();
        let result = detector.scan(b);
        let effective = result
            .offset
            .map(|raw| raw as f64 - GSM_RATE / 4.0)
            .filter(|off| (off.abs() as f32) < FCCH_OFFSET_MAX);

        if let Some(offset_hz) = effective {
            let power_dbfs = dbfs(vector_norm2(b).sqrt(), b.len());
            println!(
                " chan: {i:4} ({:.1}MHz {}) power: {power_dbfs:6.1} dBFS",
                freq / 1e6,
                format_freq(offset_hz)
            );
            if let Some(sink) = ctx.spectrum.as_deref_mut() {
                let take = b.len().min(2048);
                sink.show(&b[..take], src.sample_rate());
            }
            hits.push(ChannelHit { arfcn: i, freq_hz: freq, offset_hz, power_dbfs });
            notfound = 0;
            chan = band.next_chan(i);
        } else {
            notfound += 1;
            if notfound >= NOTFOUND_MAX {
                notfound = 0;
                chan = band.next_chan(i);
            }
        }
    }

    let _ = src.stop();
    Ok(BandScan {
        band,
        hits,
        threshold_dbfs,
        cancelled: ctx.cancel.is_requested(),
    })
}

/// Measure the receiver clock offset against one pre-tuned channel.
///
/// Captures twelve-frame blocks and scans each for an FCCH burst until
/// [`TARGET_COUNT`] valid offsets are collected or [`MAX_ITERATIONS`]
/// blocks have gone by. Detections further than [`FCCH_OFFSET_MAX`] from
/// the ideal position are rejected as aliases. The final estimate drops
/// the top and bottom 10% of the sorted offsets when at least ten were
/// collected, then reports mean, spread, and ppm against the tuned
/// center frequency.
pub fn offset_detect(
    src: &mut dyn SampleSource,
    detector: &mut FcchDetector,
    hz_adjust: f64,
    ctx: &mut ScanContext,
) -> KalResult<OffsetOutcome> {
    let sps = src.sample_rate() / GSM_RATE;
    let s_len = capture_len(12.0, sps);

    let mut offsets: Vec<f32> = Vec::with_capacity(TARGET_COUNT);
    let mut overruns = 0u32;
    let mut notfound = 0u32;
    let mut iterations = 0u32;

    src.start()?;
    src.flush();

    if ctx.verbosity == 0 {
        println!("Scanning for FCCH bursts ('.' = searching, '+' = found)");
    }

    while offsets.len() < TARGET_COUNT && iterations < MAX_ITERATIONS {
        if ctx.cancel.is_requested() {
            break;
        }
        iterations += 1;

        match fill_clean(src, s_len, &ctx.cancel, false, &mut overruns) {
            Ok(()) => {}
            Err(KalError::Cancelled) => break,
            Err(e) => {
                let _ = src.stop();
                return Err(e);
            }
        }
        if ctx.cancel.is_requested() {
            break;
        }

        let b = src.buffer().peek();
        if iterations % 5 == 0 {
            if let Some(sink) = ctx.spectrum.as_deref_mut() {
                println!("\nFrame {iterations}:");
                sink.show(&b[..b.len().min(2048)], src.sample_rate());
            }
        }

        let result = detector.scan(b);
        match result.offset {
            Some(raw) => {
                let offset = raw - (GSM_RATE / 4.0) as f32;
                if offset.abs() < FCCH_OFFSET_MAX {
                    offsets.push(offset);
                    if ctx.verbosity > 0 {
                        eprintln!(
                            "  [{:3}/{TARGET_COUNT}] Offset: {offset:+.2} Hz",
                            offsets.len()
                        );
                    } else {
                        eprint!("+");
                    }
                } else if ctx.verbosity > 0 {
                    eprintln!("  [Ignored] Offset {offset:.2} Hz out of range");
                }
            }
            None => {
                notfound += 1;
                if ctx.verbosity > 0 {
                    eprintln!("  [---] No FCCH found in frame {iterations}");
                } else {
                    eprint!(".");
                }
            }
        }

        src.buffer().purge(result.consumed);
    }

    if ctx.verbosity == 0 {
        eprintln!();
    }
    let _ = src.stop();

    if ctx.cancel.is_requested() {
        return Ok(OffsetOutcome::Cancelled);
    }
    if offsets.is_empty() {
        return Ok(OffsetOutcome::NoBursts { iterations });
    }

    offsets.sort_by(f32::total_cmp);
    let trim = trim_count(offsets.len());
    let window = &offsets[trim..offsets.len() - trim];
    let (mean_hz, stddev_hz) = avg_stddev(window);
    let min_hz = offsets[trim];
    let max_hz = offsets[offsets.len() - trim - 1];
    let ppm = (mean_hz + hz_adjust) / src.center_freq() * 1e6;

    Ok(OffsetOutcome::Report(OffsetReport {
        count: offsets.len(),
        iterations,
        notfound,
        overruns,
        min_hz,
        max_hz,
        stddev_hz,
        mean_hz,
        ppm,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magic_ring::MagicRing;
    use crate::calib::CalibrationRecord;

    #[test]
    fn test_format_freq_units() {
        assert_eq!(format_freq(12.0), "+12Hz");
        assert_eq!(format_freq(-3_400.0), "-3kHz");
        assert_eq!(format_freq(1_900_000.0), "+2MHz");
    }

    #[test]
    fn test_avg_stddev() {
        let (mean, stddev) = avg_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-9);
        assert!((stddev - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_trim_count() {
        assert_eq!(trim_count(9), 0);
        assert_eq!(trim_count(10), 1);
        assert_eq!(trim_count(100), 10);
    }

    #[test]
    fn test_trimmed_mean_matches_interior_mean() {
        // The reported mean must be the plain mean of the interior 80%
        let mut offsets: Vec<f32> = (0..100).map(|i| i as f32).collect();
        offsets.reverse();
        offsets.sort_by(f32::total_cmp);
        let trim = trim_count(offsets.len());
        let window = &offsets[trim..offsets.len() - trim];
        let (mean, _) = avg_stddev(window);
        let expected: f64 = (10..90).map(|i| i as f64).sum::<f64>() / 80.0;
        assert!((mean - expected).abs() < 1e-9);
    }

    #[test]
    fn test_trim_is_idempotent_on_trimmed_data() {
        let mut offsets: Vec<f32> = (0..80).map(|i| 100.0 + i as f32).collect();
        offsets.sort_by(f32::total_cmp);
        let (first_mean, _) = avg_stddev(&offsets);

        // Trimming an 8-element already-trimmed array keeps the window
        let trim = trim_count(8);
        assert_eq!(trim, 0);
        let small = &offsets[0..8];
        let (small_mean, _) = avg_stddev(&small[trim..8 - trim]);
        let (small_again, _) = avg_stddev(small);
        assert_eq!(small_mean, small_again);
        assert!(first_mean > 0.0);
    }

    #[test]
    fn test_capture_len() {
        // 12 frames and a guard burst at one sample per symbol
        assert_eq!(capture_len(12.0, 1.0), 15157);
        assert_eq!(capture_len(1.0, 1.0), 1407);
    }

    /// Scripted source: every fill loads the ring with a frame produced
    /// by the generator for the currently tuned frequency.
    struct MockSource {
        ring: MagicRing<IQSample>,
        freq: f64,
        started: bool,
        tune_fails: bool,
        frame: Box<dyn Fn(f64, usize) -> Vec<IQSample>>,
    }

    impl MockSource {
        fn new(frame: Box<dyn Fn(f64, usize) -> Vec<IQSample>>) -> Self {
            Self {
                ring: MagicRing::new(crate::source::RX_RING_LEN, false).unwrap(),
                freq: 0.0,
                started: false,
                tune_fails: false,
                frame,
            }
        }
    }

    impl SampleSource for MockSource {
        fn open(&mut self) -> KalResult<()> {
            Ok(())
        }
        fn tune(&mut self, freq_hz: f64) -> KalResult<()> {
            if self.tune_fails {
                return Err(KalError::Device("tune failed".into()));
            }
            self.freq = freq_hz;
            Ok(())
        }
        fn set_gain(&mut self, _gain: u8) -> KalResult<()> {
            Ok(())
        }
        fn start(&mut self) -> KalResult<()> {
            self.started = true;
            Ok(())
        }
        fn stop(&mut self) -> KalResult<()> {
            self.started = false;
            Ok(())
        }
        fn fill(&mut self, num_samples: usize, cancel: &CancellationToken) -> KalResult<u32> {
            if cancel.is_requested() {
                return Err(KalError::Cancelled);
            }
            while self.ring.data_available() < num_samples {
                let chunk = (self.frame)(self.freq, num_samples);
                self.ring.write(&chunk);
            }
            Ok(0)
        }
        fn flush(&mut self) {
            self.ring.flush();
        }
        fn buffer(&self) -> &MagicRing<IQSample> {
            &self.ring
        }
        fn sample_rate(&self) -> f64 {
            GSM_RATE
        }
        fn center_freq(&self) -> f64 {
            self.freq
        }
        fn start_benchmark(&mut self) {}
        fn read_calibration(&mut self) -> KalResult<Option<CalibrationRecord>> {
            Ok(None)
        }
        fn write_calibration(&mut self, ppb: i32) -> KalResult<CalibrationRecord> {
            Ok(CalibrationRecord::new(ppb))
        }
    }

    fn tone_frame(len: usize, freq_hz: f64, amplitude: f32) -> Vec<IQSample> {
        (0..len)
            .map(|i| {
                let ph = 2.0 * std::f64::consts::PI * freq_hz * i as f64 / GSM_RATE;
                IQSample::new(amplitude * ph.cos() as f32, amplitude * ph.sin() as f32)
            })
            .collect()
    }

    fn noise_frame(len: usize, level: f32, seed: u64) -> Vec<IQSample> {
        let mut state = seed.wrapping_mul(0x9E3779B97F4A7C15) | 1;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f32 / (1u64 << 53) as f32 * 2.0 - 1.0
        };
        (0..len).map(|_| IQSample::new(next() * level, next() * level)).collect()
    }

    /// A frame with noise around an FCCH-like burst at the given offset
    /// from the ideal position.
    fn frame_with_burst(len: usize, offset_hz: f64, seed: u64) -> Vec<IQSample> {
        let mut frame = noise_frame(len / 3, 0.005, seed);
        frame.extend(tone_frame(400, GSM_RATE / 4.0 + offset_hz, 0.5));
        frame.extend(noise_frame(len - frame.len(), 0.005, seed + 1));
        frame
    }

    #[test]
    fn test_offset_detect_cancelled_before_work() {
        let mut src = MockSource::new(Box::new(|_, len| noise_frame(len, 0.01, 1)));
        let mut detector = FcchDetector::new(GSM_RATE).unwrap();
        let mut ctx = ScanContext::new(CancellationToken::new(), 1);
        ctx.cancel.request();

        let outcome = offset_detect(&mut src, &mut detector, 0.0, &mut ctx).unwrap();
        assert!(matches!(outcome, OffsetOutcome::Cancelled));
        assert!(!src.started);
    }

    #[test]
    fn test_offset_detect_collects_and_trims() {
        let mut src = MockSource::new(Box::new(|_, len| frame_with_burst(len, 250.0, 42)));
        src.tune(935.2e6).unwrap();
        let mut detector = FcchDetector::new(GSM_RATE).unwrap();
        let mut ctx = ScanContext::new(CancellationToken::new(), 1);

        let outcome = offset_detect(&mut src, &mut detector, 0.0, &mut ctx).unwrap();
        let report = match outcome {
            OffsetOutcome::Report(r) => r,
            other => panic!("expected report, got {other:?}"),
        };
        assert_eq!(report.count, TARGET_COUNT);
        assert!(report.iterations >= TARGET_COUNT as u32);
        assert!(
            (report.mean_hz - 250.0).abs() < 30.0,
            "mean {} Hz",
            report.mean_hz
        );
        assert!(report.min_hz <= report.max_hz);
        // ppm against 935.2 MHz: 250 Hz is roughly 0.267 ppm
        assert!((report.ppm - 0.267).abs() < 0.05, "ppm {}", report.ppm);
        assert!(!src.started, "source still streaming after return");
    }

    #[test]
    fn test_offset_detect_rejects_out_of_band_tone() {
        // Burst 60 kHz off: detected, but past the 40 kHz sanity bound,
        // so it must never enter the statistics.
        let mut src = MockSource::new(Box::new(|_, len| frame_with_burst(len, 60_000.0, 9)));
        src.tune(935.2e6).unwrap();
        let mut detector = FcchDetector::new(GSM_RATE).unwrap();
        let cancel = CancellationToken::new();
        let mut ctx = ScanContext::new(cancel.clone(), 1);

        // Stop after a handful of iterations; the loop only ends on its
        // own after all 500 otherwise.
        let stopper = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(1500));
                cancel.request();
            })
        };
        let outcome = offset_detect(&mut src, &mut detector, 0.0, &mut ctx).unwrap();
        stopper.join().unwrap();
        assert!(matches!(outcome, OffsetOutcome::Cancelled));
    }

    #[test]
    fn test_c0_detect_flat_band_has_no_candidates() {
        // Identical power everywhere means no channel exceeds the floor
        let mut src = MockSource::new(Box::new(|_, len| tone_frame(len, 1_000.0, 0.1)));
        let mut detector = FcchDetector::new(GSM_RATE).unwrap();
        let mut ctx = ScanContext::new(CancellationToken::new(), 0);

        let scan = c0_detect(&mut src, &mut detector, BandIndicator::Gsm900, &mut ctx).unwrap();
        assert!(scan.hits.is_empty());
        assert!(!scan.cancelled);
    }

    #[test]
    fn test_c0_detect_finds_loud_fcch_channel() {
        let target = BandIndicator::Gsm900.arfcn_to_freq(62).unwrap();
        let mut src = MockSource::new(Box::new(move |freq, len| {
            if (freq - target).abs() < 1.0 {
                frame_with_burst(len, 500.0, 5)
            } else {
                noise_frame(len, 0.002, 77)
            }
        }));
        let mut detector = FcchDetector::new(GSM_RATE).unwrap();
        let mut ctx = ScanContext::new(CancellationToken::new(), 0);

        let scan = c0_detect(&mut src, &mut detector, BandIndicator::Gsm900, &mut ctx).unwrap();
        assert_eq!(scan.hits.len(), 1);
        let hit = &scan.hits[0];
        assert_eq!(hit.arfcn, 62);
        assert!((hit.freq_hz - target).abs() < 1.0);
        assert!((hit.offset_hz - 500.0).abs() < 30.0, "offset {}", hit.offset_hz);
    }

    #[test]
    fn test_c0_detect_surfaces_tune_failure() {
        let mut src = MockSource::new(Box::new(|_, len| noise_frame(len, 0.01, 3)));
        src.tune_fails = true;
        let mut detector = FcchDetector::new(GSM_RATE).unwrap();
        let mut ctx = ScanContext::new(CancellationToken::new(), 0);

        let result = c0_detect(&mut src, &mut detector, BandIndicator::Gsm900, &mut ctx);
        assert!(matches!(result, Err(KalError::Device(_))));
    }
}

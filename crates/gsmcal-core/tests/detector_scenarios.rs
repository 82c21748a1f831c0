//! End-to-end FCCH detection scenarios on synthetic captures
//!
//! Full-length buffers (262144 samples, roughly one second at the GSM
//! rate) with Gaussian noise floors, exercising the whole detector path
//! the way a real capture would.

use gsmcal_core::fcch_detector::FcchDetector;
use gsmcal_core::types::{IQSample, FCCH_OFFSET_MAX, GSM_RATE};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

const CAPTURE_LEN: usize = 262_144;

fn gaussian_noise(rng: &mut StdRng, len: usize, sigma: f32) -> Vec<IQSample> {
    let dist = Normal::new(0.0f32, sigma).unwrap();
    (0..len)
        .map(|_| IQSample::new(dist.sample(rng), dist.sample(rng)))
        .collect()
}

fn tone(len: usize, freq_hz: f64, amplitude: f32) -> Vec<IQSample> {
    (0..len)
        .map(|i| {
            let ph = 2.0 * std::f64::consts::PI * freq_hz * i as f64 / GSM_RATE;
            IQSample::new(amplitude * ph.cos() as f32, amplitude * ph.sin() as f32)
        })
        .collect()
}

fn burst_capture(rng: &mut StdRng, burst_hz: f64, sigma: f32) -> Vec<IQSample> {
    let mut buf = gaussian_noise(rng, 50_000, sigma);
    buf.extend(tone(40_000, burst_hz, 0.5));
    buf.extend(gaussian_noise(rng, CAPTURE_LEN - buf.len(), sigma));
    buf
}

#[test]
fn pure_fcch_tone_is_found_at_its_frequency() {
    let mut rng = StdRng::seed_from_u64(0xFCC4_0001);
    let fcch = GSM_RATE / 4.0;
    let buf = burst_capture(&mut rng, fcch, 0.01);

    let mut detector = FcchDetector::new(GSM_RATE).unwrap();
    let result = detector.scan(&buf);

    assert_eq!(result.consumed, CAPTURE_LEN);
    let offset = result.offset.expect("FCCH burst not found") as f64;
    assert!(
        (offset - fcch).abs() < 30.0,
        "detected {offset} Hz, expected {fcch} Hz"
    );
}

#[test]
fn noise_only_capture_yields_no_detection() {
    let mut rng = StdRng::seed_from_u64(0xFCC4_0002);
    let buf = gaussian_noise(&mut rng, CAPTURE_LEN, 0.1);

    let mut detector = FcchDetector::new(GSM_RATE).unwrap();
    let result = detector.scan(&buf);

    assert!(result.offset.is_none(), "false positive on pure noise");
    assert_eq!(result.consumed, CAPTURE_LEN);
}

#[test]
fn off_frequency_tone_is_measured_then_rejected_by_sanity_bound() {
    let mut rng = StdRng::seed_from_u64(0xFCC4_0003);
    let burst_hz = 100_000.0;
    let buf = burst_capture(&mut rng, burst_hz, 0.01);

    let mut detector = FcchDetector::new(GSM_RATE).unwrap();
    let result = detector.scan(&buf);

    // The detector itself reports whatever tone it finds
    let offset = result.offset.expect("tone not found") as f64;
    assert!(
        (offset - burst_hz).abs() < 30.0,
        "detected {offset} Hz, expected {burst_hz} Hz"
    );

    // A burst this far out stays inside the 40 kHz acceptance window,
    // while one past it must be rejected by the drivers' sanity check.
    let error = (offset - GSM_RATE / 4.0) as f32;
    assert!(error.abs() < FCCH_OFFSET_MAX);

    let mut rng = StdRng::seed_from_u64(0xFCC4_0004);
    let far = burst_capture(&mut rng, GSM_RATE / 4.0 + 45_000.0, 0.01);
    let mut detector = FcchDetector::new(GSM_RATE).unwrap();
    let result = detector.scan(&far);
    if let Some(raw) = result.offset {
        let error = raw - (GSM_RATE / 4.0) as f32;
        assert!(
            error.abs() >= FCCH_OFFSET_MAX,
            "a 45 kHz error must fall outside the acceptance window"
        );
    }
}

#[test]
fn detection_repeats_across_scans_with_persistent_weights() {
    // The adaptive filter keeps its weights between calls; repeated scans
    // of fresh captures must keep detecting.
    let mut detector = FcchDetector::new(GSM_RATE).unwrap();
    let fcch = GSM_RATE / 4.0;

    for round in 0u64..3 {
        let mut rng = StdRng::seed_from_u64(0xFCC4_0100 + round);
        let buf = burst_capture(&mut rng, fcch + 120.0, 0.01);
        let result = detector.scan(&buf);
        let offset = result.offset.expect("burst lost in later round") as f64;
        assert!(
            (offset - fcch - 120.0).abs() < 30.0,
            "round {round}: detected {offset} Hz"
        );
    }
}

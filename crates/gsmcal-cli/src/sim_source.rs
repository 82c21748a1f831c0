//! Simulated sample source
//!
//! Stands in for radio hardware when none is attached: a producer thread
//! synthesizes wideband noise at the native 2.5 MS/s rate, runs it
//! through the real resampling pipeline, and pushes the result into the
//! RX stream exactly the way a USB callback would. Everything downstream
//! (fill, overflow accounting, the detector, the scan drivers) runs
//! unmodified. Also the vehicle for the offline DSP benchmark, which
//! drives [`SimSource::push_raw`] directly with a synthetic signal.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use gsmcal_core::calib::CalibrationRecord;
use gsmcal_core::magic_ring::MagicRing;
use gsmcal_core::resampler::{Resampler, RAW_SAMPLE_RATE};
use gsmcal_core::source::{RxStream, SampleSource, GAIN_MAX};
use gsmcal_core::types::{CancellationToken, IQSample, KalResult, GSM_RATE};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, info};

/// Raw samples per producer batch, matching a typical USB transfer.
const CHUNK: usize = 65_536;

/// Hardware stand-in implementing the full source contract.
pub struct SimSource {
    rx: Arc<RxStream>,
    resampler: Arc<Mutex<Resampler>>,
    worker: Option<JoinHandle<()>>,
    center_freq: f64,
    gain: u8,
    opened: bool,
    noise_sigma: f32,
    calib: Option<CalibrationRecord>,
}

impl SimSource {
    pub fn new(gain: u8) -> KalResult<Self> {
        Ok(Self {
            rx: Arc::new(RxStream::new()?),
            resampler: Arc::new(Mutex::new(Resampler::new())),
            worker: None,
            center_freq: 0.0,
            gain: gain.min(GAIN_MAX),
            opened: false,
            noise_sigma: 0.05,
            calib: None,
        })
    }

    /// Feed one batch of raw 2.5 MS/s samples through the resampler into
    /// the RX stream, as the hardware RX callback would.
    pub fn push_raw(&self, raw: &[IQSample]) {
        let mut out = vec![IQSample::default(); Resampler::max_output_len(raw.len())];
        let produced = self.resampler.lock().unwrap().process(raw, &mut out);
        self.rx.push(&out[..produced]);
    }
}

impl SampleSource for SimSource {
    fn open(&mut self) -> KalResult<()> {
        self.opened = true;
        info!("simulated source open (no hardware attached)");
        Ok(())
    }

    fn tune(&mut self, freq_hz: f64) -> KalResult<()> {
        self.center_freq = freq_hz;
        // Retuning restarts the filter transient, same as real hardware
        self.resampler.lock().unwrap().reset();
        debug!(freq_hz, "tuned");
        Ok(())
    }

    fn set_gain(&mut self, gain: u8) -> KalResult<()> {
        self.gain = gain.min(GAIN_MAX);
        Ok(())
    }

    fn start(&mut self) -> KalResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        self.rx.set_streaming(true);

        let rx = Arc::clone(&self.rx);
        let resampler = Arc::clone(&self.resampler);
        let sigma = self.noise_sigma;
        self.worker = Some(std::thread::spawn(move || {
            let mut rng = StdRng::from_entropy();
            let dist = Normal::new(0.0f32, sigma).unwrap();
            let mut out = vec![IQSample::default(); Resampler::max_output_len(CHUNK)];
            while rx.is_streaming() {
                let raw: Vec<IQSample> = (0..CHUNK)
                    .map(|_| IQSample::new(dist.sample(&mut rng), dist.sample(&mut rng)))
                    .collect();
                let produced = resampler.lock().unwrap().process(&raw, &mut out);
                rx.push(&out[..produced]);
                // Pace to the real hardware rate
                std::thread::sleep(Duration::from_micros(
                    (CHUNK as f64 / RAW_SAMPLE_RATE * 1e6) as u64,
                ));
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> KalResult<()> {
        self.rx.set_streaming(false);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        Ok(())
    }

    fn fill(&mut self, num_samples: usize, cancel: &CancellationToken) -> KalResult<u32> {
        self.rx.fill(num_samples, cancel)
    }

    fn flush(&mut self) {
        self.rx.flush();
    }

    fn buffer(&self) -> &MagicRing<IQSample> {
        self.rx.ring()
    }

    fn sample_rate(&self) -> f64 {
        GSM_RATE
    }

    fn center_freq(&self) -> f64 {
        self.center_freq
    }

    fn start_benchmark(&mut self) {
        self.resampler.lock().unwrap().reset();
        self.rx.flush();
        self.rx.set_streaming(true);
    }

    fn read_calibration(&mut self) -> KalResult<Option<CalibrationRecord>> {
        Ok(self.calib)
    }

    fn write_calibration(&mut self, correction_ppb: i32) -> KalResult<CalibrationRecord> {
        let record = CalibrationRecord::new(correction_ppb);
        self.calib = Some(record);
        Ok(record)
    }
}

impl Drop for SimSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_from_worker_thread() {
        let mut src = SimSource::new(10).unwrap();
        src.open().unwrap();
        src.tune(935.2e6).unwrap();
        src.start().unwrap();

        let cancel = CancellationToken::new();
        src.fill(2048, &cancel).unwrap();
        assert!(src.buffer().data_available() >= 2048);
        src.stop().unwrap();
    }

    #[test]
    fn test_benchmark_path_produces_samples() {
        let mut src = SimSource::new(10).unwrap();
        src.start_benchmark();
        let raw = vec![IQSample::new(0.5, 0.0); 65_536];
        src.push_raw(&raw);
        // 65536 * 13 / 120 is about 7100 resampled samples
        let available = src.buffer().data_available();
        assert!(available > 7000 && available < 7200, "got {available}");
    }

    #[test]
    fn test_calibration_roundtrip() {
        let mut src = SimSource::new(10).unwrap();
        assert!(src.read_calibration().unwrap().is_none());
        let written = src.write_calibration(-250).unwrap();
        assert_eq!(written.correction_ppb, -250);
        assert_eq!(src.read_calibration().unwrap(), Some(written));
    }
}

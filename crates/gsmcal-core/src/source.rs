//! Sample source abstraction and RX stream plumbing
//!
//! Hardware drivers live outside this crate; the scan drivers only see the
//! [`SampleSource`] trait, which mirrors what a calibration run needs from
//! a receiver: tune, gain, start/stop, a blocking fill, and access to the
//! ring of resampled samples.
//!
//! [`RxStream`] is the producer/consumer half every driver shares. The
//! driver's RX callback thread resamples raw hardware samples and calls
//! [`RxStream::push`]; the scan thread blocks in [`RxStream::fill`] until
//! enough samples accumulate. The producer never blocks: when the gate
//! mutex is contended it drops the batch and counts it as overflow, which
//! the next `fill` reports and the caller handles by flushing and
//! retrying.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::calib::CalibrationRecord;
use crate::magic_ring::MagicRing;
use crate::types::{CancellationToken, IQSample, KalError, KalResult};

/// RX ring capacity in samples; about 0.9 s of buffering at the GSM rate.
pub const RX_RING_LEN: usize = 256 * 1024;

/// Highest valid gain index of the linearity gain table.
pub const GAIN_MAX: u8 = 21;

/// How long `fill` sleeps between checks of the cancellation flag.
const FILL_POLL: Duration = Duration::from_millis(100);

/// Receiver-side collaborator consumed by the scan drivers.
///
/// Implementations are expected to reset their resampler on every `tune`
/// so settling transients from the previous frequency never reach the
/// detector.
pub trait SampleSource {
    fn open(&mut self) -> KalResult<()>;
    fn tune(&mut self, freq_hz: f64) -> KalResult<()>;
    /// Gain index, clamped to `0..=GAIN_MAX`.
    fn set_gain(&mut self, gain: u8) -> KalResult<()>;
    fn start(&mut self) -> KalResult<()>;
    fn stop(&mut self) -> KalResult<()>;

    /// Block until `num_samples` resampled samples are buffered.
    ///
    /// Returns the number of samples dropped since the previous call.
    /// Fails with [`KalError::Cancelled`] when the token fires and
    /// [`KalError::Device`] when streaming stops underneath the caller.
    fn fill(&mut self, num_samples: usize, cancel: &CancellationToken) -> KalResult<u32>;

    /// Discard buffered samples and the pending overflow count.
    fn flush(&mut self);

    /// The ring of resampled samples at [`SampleSource::sample_rate`].
    fn buffer(&self) -> &MagicRing<IQSample>;

    /// Output sample rate after resampling (the GSM symbol rate).
    fn sample_rate(&self) -> f64;

    fn center_freq(&self) -> f64;

    /// Prepare buffer and resampler without touching hardware, for
    /// offline pipeline benchmarking.
    fn start_benchmark(&mut self);

    /// Read the calibration record from device flash. `Ok(None)` means
    /// the flash holds no valid record.
    fn read_calibration(&mut self) -> KalResult<Option<CalibrationRecord>>;

    /// Write a new calibration record; returns what was written.
    fn write_calibration(&mut self, correction_ppb: i32) -> KalResult<CalibrationRecord>;
}

/// Producer/consumer handoff between a driver's RX thread and the scan
/// thread.
pub struct RxStream {
    ring: MagicRing<IQSample>,
    gate: Mutex<()>,
    data_ready: Condvar,
    streaming: AtomicBool,
    overflow: AtomicU32,
}

impl RxStream {
    pub fn new() -> KalResult<Self> {
        Ok(Self {
            ring: MagicRing::new(RX_RING_LEN, false)?,
            gate: Mutex::new(()),
            data_ready: Condvar::new(),
            streaming: AtomicBool::new(false),
            overflow: AtomicU32::new(0),
        })
    }

    pub fn ring(&self) -> &MagicRing<IQSample> {
        &self.ring
    }

    /// Flip the streaming flag. Stopping wakes every waiter so blocked
    /// `fill` calls can return promptly.
    pub fn set_streaming(&self, on: bool) {
        self.streaming.store(on, Ordering::Release);
        if !on {
            self.data_ready.notify_all();
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Producer entry point, called from the driver's RX thread.
    ///
    /// Never blocks: a contended gate drops the whole batch into the
    /// overflow count, as does a full ring.
    pub fn push(&self, samples: &[IQSample]) {
        if samples.is_empty() || !self.is_streaming() {
            return;
        }
        match self.gate.try_lock() {
            Ok(guard) => {
                let written = self.ring.write(samples);
                if written < samples.len() {
                    self.overflow
                        .fetch_add((samples.len() - written) as u32, Ordering::Relaxed);
                }
                drop(guard);
                self.data_ready.notify_one();
            }
            Err(_) => {
                self.overflow.fetch_add(samples.len() as u32, Ordering::Relaxed);
            }
        }
    }

    /// Consumer entry point; see [`SampleSource::fill`] for the contract.
    pub fn fill(&self, num_samples: usize, cancel: &CancellationToken) -> KalResult<u32> {
        let mut guard = self.gate.lock().unwrap();
        loop {
            if cancel.is_requested() {
                return Err(KalError::Cancelled);
            }
            if self.ring.data_available() >= num_samples || !self.is_streaming() {
                break;
            }
            let (next, _timed_out) = self.data_ready.wait_timeout(guard, FILL_POLL).unwrap();
            guard = next;
        }

        if !self.is_streaming() {
            return Err(KalError::Device("stream stopped".into()));
        }
        Ok(self.overflow.swap(0, Ordering::Relaxed))
    }

    pub fn flush(&self) {
        self.ring.flush();
        self.overflow.store(0, Ordering::Relaxed);
    }

    /// Overflow count accumulated since the last reset, without clearing.
    pub fn overflow_count(&self) -> u32 {
        self.overflow.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fill_returns_once_data_arrives() {
        let stream = Arc::new(RxStream::new().unwrap());
        stream.set_streaming(true);

        let producer_stream = Arc::clone(&stream);
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer_stream.push(&vec![IQSample::new(1.0, 0.0); 512]);
        });

        let cancel = CancellationToken::new();
        let overruns = stream.fill(512, &cancel).unwrap();
        assert_eq!(overruns, 0);
        assert!(stream.ring().data_available() >= 512);
        producer.join().unwrap();
    }

    #[test]
    fn test_fill_observes_cancellation() {
        let stream = RxStream::new().unwrap();
        stream.set_streaming(true);
        let cancel = CancellationToken::new();
        cancel.request();
        assert!(matches!(stream.fill(1024, &cancel), Err(KalError::Cancelled)));
    }

    #[test]
    fn test_stop_wakes_blocked_fill() {
        let stream = Arc::new(RxStream::new().unwrap());
        stream.set_streaming(true);

        let stopper_stream = Arc::clone(&stream);
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            stopper_stream.set_streaming(false);
        });

        let cancel = CancellationToken::new();
        let result = stream.fill(1 << 20, &cancel);
        assert!(matches!(result, Err(KalError::Device(_))));
        stopper.join().unwrap();
    }

    #[test]
    fn test_push_ignored_when_not_streaming() {
        let stream = RxStream::new().unwrap();
        stream.push(&vec![IQSample::default(); 100]);
        assert_eq!(stream.ring().data_available(), 0);
        assert_eq!(stream.overflow_count(), 0);
    }

    #[test]
    fn test_overflow_counted_and_reported_once() {
        let stream = RxStream::new().unwrap();
        stream.set_streaming(true);

        let cap = stream.ring().capacity();
        stream.push(&vec![IQSample::default(); cap]);
        stream.push(&vec![IQSample::default(); 1000]);
        assert_eq!(stream.overflow_count(), 1000);

        let cancel = CancellationToken::new();
        assert_eq!(stream.fill(1, &cancel).unwrap(), 1000);
        assert_eq!(stream.fill(1, &cancel).unwrap(), 0);
    }

    #[test]
    fn test_flush_clears_data_and_overflow() {
        let stream = RxStream::new().unwrap();
        stream.set_streaming(true);
        let cap = stream.ring().capacity();
        stream.push(&vec![IQSample::default(); cap + 10]);
        stream.flush();
        assert_eq!(stream.ring().data_available(), 0);
        assert_eq!(stream.overflow_count(), 0);
    }
}

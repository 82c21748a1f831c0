//! gsmcal: GSM base station scanner and clock-offset calibrator
//!
//! Two ways to use it: scan a band for base stations (`-s GSM900`), or
//! point it at a known channel (`-c 62` or `-f 947.4e6`) and measure the
//! receiver's clock error against the FCCH. Offsets are reported in Hz
//! and ppm/ppb; a measured correction can be stored on the device with
//! `-W` and read back with `-R`.

mod benchmark;
mod display;
mod sim_source;

use std::sync::OnceLock;

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use gsmcal_core::band::{freq_to_arfcn, BandIndicator};
use gsmcal_core::fcch_detector::FcchDetector;
use gsmcal_core::scan::{c0_detect, format_freq, offset_detect, OffsetOutcome, ScanContext};
use gsmcal_core::source::SampleSource;
use gsmcal_core::types::{CancellationToken, KalError};

use display::AsciiSpectrum;
use sim_source::SimSource;

static CANCEL: OnceLock<CancellationToken> = OnceLock::new();

/// SIGINT handler: set the flag and get out. The only calls made here
/// are async-signal-safe; a second interrupt forces termination.
extern "C" fn on_interrupt(_sig: libc::c_int) {
    if let Some(token) = CANCEL.get() {
        if token.request() {
            let msg = b"\nForcing exit.\n";
            unsafe {
                libc::write(2, msg.as_ptr() as *const libc::c_void, msg.len());
                libc::_exit(1);
            }
        }
        let msg = b"\nSignal received, stopping...\n";
        unsafe {
            libc::write(2, msg.as_ptr() as *const libc::c_void, msg.len());
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "gsmcal",
    version,
    about = "GSM base station scanner and clock offset calibrator"
)]
struct Args {
    /// Band to scan for base stations (GSM850, GSM-R, GSM900, EGSM, DCS)
    #[arg(short = 's', value_name = "BAND")]
    scan_band: Option<BandIndicator>,

    /// Frequency of a nearby GSM base station, Hz
    #[arg(short = 'f', value_name = "HZ")]
    freq: Option<f64>,

    /// Channel (ARFCN) of a nearby GSM base station
    #[arg(short = 'c', value_name = "CHAN")]
    chan: Option<u16>,

    /// Band indicator for the channel argument
    #[arg(short = 'b', value_name = "BAND")]
    band: Option<BandIndicator>,

    /// Linearity gain index, 0-21
    #[arg(short = 'g', default_value_t = 10, value_name = "GAIN")]
    gain: u8,

    /// Read calibration data from device flash
    #[arg(short = 'R')]
    read_cal: bool,

    /// Write calibration data (PPB) to device flash
    #[arg(short = 'W', value_name = "PPB", allow_negative_numbers = true)]
    write_cal: Option<i32>,

    /// Show ASCII FFT of the signal
    #[arg(short = 'A')]
    show_fft: bool,

    /// Run the DSP benchmark and exit
    #[arg(short = 'B')]
    benchmark: bool,

    /// Increase verbosity
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,

    /// Enable debug messages
    #[arg(short = 'D')]
    debug: bool,
}

/// The reference front end tops out around 1.8 GHz.
fn check_band_limit(band: BandIndicator) -> Result<(), String> {
    match band {
        BandIndicator::Pcs1900 => {
            Err("PCS-1900 band (~1.9 GHz) is beyond the receiver frequency limit".to_string())
        }
        BandIndicator::Dcs1800 => {
            eprintln!(
                "Warning: DCS-1800 band (~1.8 GHz) is at the edge of the receiver's range."
            );
            eprintln!("         Reception may degrade or fail above 1800 MHz.");
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Pick the conventional band for a bare channel number.
fn deduce_band(chan: u16) -> Option<BandIndicator> {
    match chan {
        1..=124 => Some(BandIndicator::Gsm900),
        128..=251 => Some(BandIndicator::Gsm850),
        512..=885 => Some(BandIndicator::Dcs1800),
        955..=974 => Some(BandIndicator::GsmR),
        0 | 975..=1023 => Some(BandIndicator::Egsm),
        _ => None,
    }
}

fn handle_calibration(src: &mut SimSource, write: Option<i32>) -> i32 {
    match write {
        Some(ppb) => {
            println!("[-] Writing calibration: {ppb} ppb...");
            match src.write_calibration(ppb) {
                Ok(record) => {
                    println!(
                        "[+] Calibration written (timestamp {}).",
                        record.timestamp
                    );
                    0
                }
                Err(e) => {
                    eprintln!("Error: calibration write failed: {e}");
                    -1
                }
            }
        }
        None => match src.read_calibration() {
            Ok(Some(record)) => {
                println!("Stored Calibration Data:");
                println!("  Correction: {} ppb", record.correction_ppb);
                println!("  Timestamp:  {} (unix)", record.timestamp);
                0
            }
            Ok(None) => {
                println!("No valid calibration found.");
                0
            }
            Err(e) => {
                eprintln!("Error: calibration read failed: {e}");
                -1
            }
        },
    }
}

fn run() -> i32 {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            let usage_ok = matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            return if usage_ok { 0 } else { 1 };
        }
    };

    let default_filter = if args.debug {
        "gsmcal=debug,gsmcal_core=debug,gsmcal_cli=debug"
    } else {
        "gsmcal=info,gsmcal_core=info,gsmcal_cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CANCEL.get_or_init(CancellationToken::new).clone();
    unsafe {
        libc::signal(libc::SIGINT, on_interrupt as libc::sighandler_t);
    }

    if args.read_cal && args.write_cal.is_some() {
        eprintln!("Error: cannot read (-R) and write (-W) calibration at the same time.");
        return 1;
    }

    if args.benchmark {
        let mut spectrum = AsciiSpectrum::new();
        return match benchmark::run(&mut spectrum) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: benchmark failed: {e}");
                -1
            }
        };
    }

    let mut src = match SimSource::new(args.gain) {
        Ok(src) => src,
        Err(e) => {
            eprintln!("Error: failed to create source: {e}");
            return -1;
        }
    };
    if let Err(e) = src.open() {
        eprintln!("Error: failed to open source: {e}");
        return -1;
    }

    if args.read_cal || args.write_cal.is_some() {
        return handle_calibration(&mut src, args.write_cal);
    }

    let mut detector = match FcchDetector::new(src.sample_rate()) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: failed to build detector: {e}");
            return -1;
        }
    };

    let mut spectrum = args.show_fft.then(AsciiSpectrum::new);
    let mut ctx = ScanContext::new(cancel, args.verbose);
    if let Some(sp) = spectrum.as_mut() {
        ctx.spectrum = Some(sp);
    }

    // Band scan mode
    if let Some(band) = args.scan_band {
        if let Err(msg) = check_band_limit(band) {
            eprintln!("Error: {msg}");
            return 1;
        }
        eprintln!("gsmcal: Scanning for {band} base stations.");
        return match c0_detect(&mut src, &mut detector, band, &mut ctx) {
            Ok(scan) => {
                if scan.hits.is_empty() && !scan.cancelled {
                    println!("No base stations found above the noise floor.");
                }
                0
            }
            Err(e) => {
                eprintln!("Error: {e}");
                -1
            }
        };
    }

    // Offset measurement mode: resolve channel and frequency
    let (band, chan, freq) = match (args.freq, args.chan) {
        (Some(freq), _) => match freq_to_arfcn(freq) {
            Some((band, chan)) => (band, chan, freq),
            None => {
                eprintln!("Error: {freq} Hz is not near any GSM downlink channel.");
                return 1;
            }
        },
        (None, Some(chan)) => {
            let band = match args.band.or_else(|| deduce_band(chan)) {
                Some(b) => b,
                None => {
                    eprintln!("Error: channel {chan} is not valid in any known band.");
                    return 1;
                }
            };
            match band.arfcn_to_freq(chan) {
                Some(freq) => (band, chan, freq),
                None => {
                    eprintln!("Error: channel {chan} is not valid in {band}.");
                    return 1;
                }
            }
        }
        (None, None) => {
            eprintln!(
                "Error: need a scan band (-s), a channel (-c), a frequency (-f), or -R / -W."
            );
            return 1;
        }
    };

    if let Err(msg) = check_band_limit(band) {
        eprintln!("Error: {msg}");
        return 1;
    }
    if let Err(e) = src.tune(freq) {
        eprintln!("Error: tune failed: {e}");
        return -1;
    }

    eprintln!("gsmcal: Calculating clock frequency offset.");
    eprintln!("Using {band} channel {chan} ({:.1}MHz)", freq / 1e6);

    match offset_detect(&mut src, &mut detector, 0.0, &mut ctx) {
        Ok(OffsetOutcome::Report(report)) => {
            println!("\n--------------------------------------------------");
            println!(
                "Results ({} valid bursts out of {} attempts)",
                report.count, report.iterations
            );
            println!("--------------------------------------------------");
            println!("average\t\t[min, max]\t(range, stddev)");
            println!(
                "{}\t\t[{}, {}]\t({}, {:.3})",
                format_freq(report.mean_hz),
                report.min_hz.round(),
                report.max_hz.round(),
                (report.max_hz - report.min_hz).round(),
                report.stddev_hz
            );
            println!("overruns: {}", report.overruns);
            println!("not found: {}", report.notfound);
            println!(
                "\nAverage Error: {:.3} ppm ({:.3} ppb)",
                report.ppm,
                report.ppm * 1000.0
            );
            0
        }
        Ok(OffsetOutcome::NoBursts { iterations }) => {
            println!("\nError: No valid FCCH bursts found after {iterations} attempts.");
            println!("Tips:");
            println!(" - Use '-s' scan to find a stronger channel.");
            println!(" - Use '-g' to increase gain.");
            -1
        }
        Ok(OffsetOutcome::Cancelled) => 0,
        Err(KalError::Cancelled) => 0,
        Err(e) => {
            eprintln!("Error: {e}");
            -1
        }
    }
}

fn main() {
    std::process::exit(run());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deduce_band() {
        assert_eq!(deduce_band(62), Some(BandIndicator::Gsm900));
        assert_eq!(deduce_band(128), Some(BandIndicator::Gsm850));
        assert_eq!(deduce_band(700), Some(BandIndicator::Dcs1800));
        assert_eq!(deduce_band(960), Some(BandIndicator::GsmR));
        assert_eq!(deduce_band(1000), Some(BandIndicator::Egsm));
        assert_eq!(deduce_band(300), None);
    }

    #[test]
    fn test_band_limit() {
        assert!(check_band_limit(BandIndicator::Gsm900).is_ok());
        assert!(check_band_limit(BandIndicator::Dcs1800).is_ok());
        assert!(check_band_limit(BandIndicator::Pcs1900).is_err());
    }

    #[test]
    fn test_cli_parses_scan_invocation() {
        let args = Args::try_parse_from(["gsmcal", "-s", "GSM900", "-g", "15", "-vv"]).unwrap();
        assert_eq!(args.scan_band, Some(BandIndicator::Gsm900));
        assert_eq!(args.gain, 15);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_parses_offset_invocation() {
        let args = Args::try_parse_from(["gsmcal", "-c", "62", "-b", "GSM900", "-A"]).unwrap();
        assert_eq!(args.chan, Some(62));
        assert_eq!(args.band, Some(BandIndicator::Gsm900));
        assert!(args.show_fft);
        assert!(!args.benchmark);
    }
}

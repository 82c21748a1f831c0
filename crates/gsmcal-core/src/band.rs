//! GSM band plan and ARFCN mapping
//!
//! Downlink frequencies only; this tool never transmits. Channel numbering
//! follows the GSM specifications: 200 kHz spacing, with the extended and
//! railway bands wrapping through the 1024-offset region below GSM900.

use std::fmt;
use std::str::FromStr;

/// GSM frequency band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BandIndicator {
    Gsm850,
    GsmR,
    Gsm900,
    Egsm,
    Dcs1800,
    Pcs1900,
}

impl BandIndicator {
    pub const ALL: [BandIndicator; 6] = [
        BandIndicator::Gsm850,
        BandIndicator::GsmR,
        BandIndicator::Gsm900,
        BandIndicator::Egsm,
        BandIndicator::Dcs1800,
        BandIndicator::Pcs1900,
    ];

    /// Valid ARFCN ranges, in scan order.
    fn segments(self) -> &'static [(u16, u16)] {
        match self {
            BandIndicator::Gsm850 => &[(128, 251)],
            BandIndicator::GsmR => &[(955, 1023), (0, 124)],
            BandIndicator::Gsm900 => &[(1, 124)],
            BandIndicator::Egsm => &[(975, 1023), (0, 124)],
            BandIndicator::Dcs1800 => &[(512, 885)],
            BandIndicator::Pcs1900 => &[(512, 810)],
        }
    }

    /// First valid ARFCN of the band.
    pub fn first_chan(self) -> u16 {
        self.segments()[0].0
    }

    /// Next valid ARFCN after `chan`, or `None` at the end of the band.
    pub fn next_chan(self, chan: u16) -> Option<u16> {
        let segments = self.segments();
        for (k, &(lo, hi)) in segments.iter().enumerate() {
            if chan >= lo && chan <= hi {
                return if chan < hi {
                    Some(chan + 1)
                } else {
                    segments.get(k + 1).map(|&(next_lo, _)| next_lo)
                };
            }
        }
        None
    }

    /// Iterate every valid ARFCN of the band in scan order.
    pub fn channels(self) -> impl Iterator<Item = u16> {
        let band = self;
        let mut next = Some(band.first_chan());
        std::iter::from_fn(move || {
            let chan = next?;
            next = band.next_chan(chan);
            Some(chan)
        })
    }

    /// Downlink center frequency of `chan` in Hz, if valid in this band.
    pub fn arfcn_to_freq(self, chan: u16) -> Option<f64> {
        if !self.segments().iter().any(|&(lo, hi)| chan >= lo && chan <= hi) {
            return None;
        }
        let n = chan as f64;
        Some(match self {
            BandIndicator::Gsm850 => 869.2e6 + 0.2e6 * (n - 128.0),
            BandIndicator::Gsm900 => 935.0e6 + 0.2e6 * n,
            BandIndicator::GsmR | BandIndicator::Egsm => {
                if chan >= 955 {
                    935.0e6 + 0.2e6 * (n - 1024.0)
                } else {
                    935.0e6 + 0.2e6 * n
                }
            }
            BandIndicator::Dcs1800 => 1805.2e6 + 0.2e6 * (n - 512.0),
            BandIndicator::Pcs1900 => 1930.2e6 + 0.2e6 * (n - 512.0),
        })
    }
}

impl fmt::Display for BandIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BandIndicator::Gsm850 => "GSM850",
            BandIndicator::GsmR => "GSM-R",
            BandIndicator::Gsm900 => "GSM900",
            BandIndicator::Egsm => "EGSM",
            BandIndicator::Dcs1800 => "DCS1800",
            BandIndicator::Pcs1900 => "PCS1900",
        };
        f.write_str(name)
    }
}

impl FromStr for BandIndicator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GSM850" | "GSM-850" => Ok(BandIndicator::Gsm850),
            "GSM-R" | "GSMR" | "GSM_R" => Ok(BandIndicator::GsmR),
            "GSM900" | "GSM-900" => Ok(BandIndicator::Gsm900),
            "EGSM" | "E-GSM" => Ok(BandIndicator::Egsm),
            "DCS" | "DCS1800" | "DCS-1800" => Ok(BandIndicator::Dcs1800),
            "PCS" | "PCS1900" | "PCS-1900" => Ok(BandIndicator::Pcs1900),
            other => Err(format!("bad band indicator: {other}")),
        }
    }
}

/// Find the band and channel whose downlink center is nearest `freq_hz`.
///
/// Returns `None` when no channel center lies within half a channel
/// spacing (100 kHz) of the frequency.
pub fn freq_to_arfcn(freq_hz: f64) -> Option<(BandIndicator, u16)> {
    let mut best: Option<(f64, BandIndicator, u16)> = None;
    for band in BandIndicator::ALL {
        for chan in band.channels() {
            let delta = (band.arfcn_to_freq(chan).unwrap_or(f64::MAX) - freq_hz).abs();
            if delta <= 100e3 && best.map_or(true, |(d, _, _)| delta < d) {
                best = Some((delta, band, chan));
            }
        }
    }
    best.map(|(_, band, chan)| (band, chan))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_downlink_frequencies() {
        assert_eq!(BandIndicator::Gsm850.arfcn_to_freq(128), Some(869.2e6));
        assert_eq!(BandIndicator::Gsm900.arfcn_to_freq(1), Some(935.2e6));
        assert_eq!(BandIndicator::Gsm900.arfcn_to_freq(62), Some(947.4e6));
        assert_eq!(BandIndicator::Egsm.arfcn_to_freq(975), Some(925.2e6));
        assert_eq!(BandIndicator::GsmR.arfcn_to_freq(955), Some(921.2e6));
        assert_eq!(BandIndicator::Dcs1800.arfcn_to_freq(512), Some(1805.2e6));
        assert_eq!(BandIndicator::Pcs1900.arfcn_to_freq(512), Some(1930.2e6));
    }

    #[test]
    fn test_invalid_arfcn_rejected() {
        assert_eq!(BandIndicator::Gsm900.arfcn_to_freq(0), None);
        assert_eq!(BandIndicator::Gsm900.arfcn_to_freq(125), None);
        assert_eq!(BandIndicator::Gsm850.arfcn_to_freq(127), None);
        assert_eq!(BandIndicator::Dcs1800.arfcn_to_freq(886), None);
    }

    #[test]
    fn test_channel_counts() {
        assert_eq!(BandIndicator::Gsm850.channels().count(), 124);
        assert_eq!(BandIndicator::Gsm900.channels().count(), 124);
        assert_eq!(BandIndicator::Egsm.channels().count(), 49 + 125);
        assert_eq!(BandIndicator::GsmR.channels().count(), 69 + 125);
        assert_eq!(BandIndicator::Dcs1800.channels().count(), 374);
        assert_eq!(BandIndicator::Pcs1900.channels().count(), 299);
    }

    #[test]
    fn test_next_chan_crosses_segment_boundary() {
        // EGSM wraps from the extension range into the base range
        assert_eq!(BandIndicator::Egsm.next_chan(1023), Some(0));
        assert_eq!(BandIndicator::Egsm.next_chan(124), None);
        assert_eq!(BandIndicator::Gsm850.next_chan(251), None);
    }

    #[test]
    fn test_freq_to_arfcn_roundtrip() {
        for band in [BandIndicator::Gsm850, BandIndicator::Dcs1800] {
            for chan in band.channels().step_by(17) {
                let freq = band.arfcn_to_freq(chan).unwrap();
                let (found_band, found_chan) = freq_to_arfcn(freq).unwrap();
                assert_eq!(found_chan, chan);
                assert_eq!(found_band, band);
            }
        }
    }

    #[test]
    fn test_freq_to_arfcn_rejects_far_frequency() {
        assert_eq!(freq_to_arfcn(100.0e6), None);
        assert_eq!(freq_to_arfcn(2.5e9), None);
    }

    #[test]
    fn test_band_string_roundtrip() {
        for band in BandIndicator::ALL {
            let parsed: BandIndicator = band.to_string().parse().unwrap();
            assert_eq!(parsed, band);
        }
        assert_eq!("dcs".parse::<BandIndicator>(), Ok(BandIndicator::Dcs1800));
        assert!("LTE".parse::<BandIndicator>().is_err());
    }
}

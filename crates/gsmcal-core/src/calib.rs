//! Persisted calibration record
//!
//! Twelve bytes written to device flash at [`CALIB_FLASH_OFFSET`]: a magic
//! header, the Unix time of calibration, and the measured oscillator
//! correction in parts per billion. All fields little-endian.

use std::time::{SystemTime, UNIX_EPOCH};

/// Flash byte offset of the calibration record.
pub const CALIB_FLASH_OFFSET: u32 = 0x20000;

const CALIB_MAGIC: u32 = 0xCA1B_0001;

/// Oscillator correction stored on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRecord {
    /// Unix seconds at the time of calibration.
    pub timestamp: u32,
    /// Signed frequency correction in parts per billion.
    pub correction_ppb: i32,
}

impl CalibrationRecord {
    /// Record for `correction_ppb`, stamped with the current time.
    pub fn new(correction_ppb: i32) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        Self { timestamp, correction_ppb }
    }

    /// Serialize as written to flash.
    pub fn to_bytes(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&CALIB_MAGIC.to_le_bytes());
        out[4..8].copy_from_slice(&self.timestamp.to_le_bytes());
        out[8..12].copy_from_slice(&self.correction_ppb.to_le_bytes());
        out
    }

    /// Parse a flash image. Returns `None` for short buffers or when the
    /// magic header does not match (unprogrammed or foreign flash).
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 12 {
            return None;
        }
        let header = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        if header != CALIB_MAGIC {
            return None;
        }
        Some(Self {
            timestamp: u32::from_le_bytes(bytes[4..8].try_into().ok()?),
            correction_ppb: i32::from_le_bytes(bytes[8..12].try_into().ok()?),
        })
    }
}

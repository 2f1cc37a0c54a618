//! Concept2 PM5 rowing status frame decoding.
//!
//! The PM5 exposes its live rowing state on a vendor characteristic. Each read
//! returns an 11-byte frame with fixed offsets; all multi-byte fields are
//! little-endian.

use thiserror::Error;
use uuid::Uuid;

/// PM5 Rowing Service UUID (CE060030-43E5-11E4-916C-0800200C9A66)
pub const PM5_ROWING_SERVICE_UUID: Uuid =
    Uuid::from_u128(0xce06_0030_43e5_11e4_916c_0800_200c_9a66);

/// Rowing General Status Characteristic UUID (CE060031-43E5-11E4-916C-0800200C9A66)
pub const ROWING_STATUS_UUID: Uuid = Uuid::from_u128(0xce06_0031_43e5_11e4_916c_0800_200c_9a66);

/// Number of meaningful bytes in a rowing status frame.
///
/// Longer frames are accepted and the extra bytes ignored. Some firmware pads
/// the payload; no documentation confirms what the padding means.
pub const FRAME_LEN: usize = 11;

/// Metrics decoded from a single rowing status frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowingMetrics {
    /// Device-defined stroke phase code
    pub stroke_state: u8,
    /// Strokes per minute
    pub stroke_rate: u8,
    /// Distance rowed in meters (24-bit on the wire)
    pub distance_meters: u32,
    /// Elapsed workout time in seconds, 0.01 s resolution
    pub elapsed_time_seconds: f64,
    /// Instantaneous power in watts
    pub power_watts: u16,
    /// Calories burned
    pub calories_burned: u16,
}

impl RowingMetrics {
    /// Elapsed time in the device's native hundredths of a second.
    pub fn elapsed_time_centiseconds(&self) -> u32 {
        (self.elapsed_time_seconds * 100.0).round() as u32
    }
}

/// Errors produced while decoding a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame is shorter than the fixed layout
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },
}

/// Decode a rowing status frame.
///
/// The layout is:
/// - Byte 0: stroke state
/// - Byte 1: stroke rate
/// - Bytes 2-4: distance in meters (u24)
/// - Bytes 5-6: elapsed time in 0.01 s units
/// - Bytes 7-8: power in watts
/// - Bytes 9-10: calories
pub fn decode(data: &[u8]) -> Result<RowingMetrics, DecodeError> {
    if data.len() < FRAME_LEN {
        return Err(DecodeError::ShortBuffer {
            expected: FRAME_LEN,
            actual: data.len(),
        });
    }

    let distance_meters = u32::from_le_bytes([data[2], data[3], data[4], 0]);
    let elapsed_raw = u16::from_le_bytes([data[5], data[6]]);

    Ok(RowingMetrics {
        stroke_state: data[0],
        stroke_rate: data[1],
        distance_meters,
        elapsed_time_seconds: f64::from(elapsed_raw) / 100.0,
        power_watts: u16::from_le_bytes([data[7], data[8]]),
        calories_burned: u16::from_le_bytes([data[9], data[10]]),
    })
}

//! Row layouts shared by the raw log, the decoded log and the translator.
//!
//! Raw bytes are stored as lowercase hex so every payload, including leading
//! zero bytes and empty reads, round-trips exactly.

use crate::sensors::pm5::RowingMetrics;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Column names of the raw log.
pub const RAW_HEADERS: [&str; 2] = ["Timestamp", "Raw Data"];

/// Column names of the decoded log.
pub const DECODED_HEADERS: [&str; 7] = [
    "Timestamp",
    "stroke_state",
    "stroke_rate",
    "distance_meters",
    "elapsed_time_seconds",
    "power_watts",
    "calories_burned",
];

/// One row of the raw log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Raw Data")]
    pub raw_data: String,
}

/// One row of the decoded log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    pub stroke_state: u8,
    pub stroke_rate: u8,
    pub distance_meters: u32,
    #[serde(serialize_with = "serialize_hundredths")]
    pub elapsed_time_seconds: f64,
    pub power_watts: u16,
    pub calories_burned: u16,
}

impl DecodedRow {
    /// Build a row from decoded metrics and an already formatted timestamp.
    pub fn new(timestamp: String, metrics: &RowingMetrics) -> Self {
        Self {
            timestamp,
            stroke_state: metrics.stroke_state,
            stroke_rate: metrics.stroke_rate,
            distance_meters: metrics.distance_meters,
            elapsed_time_seconds: metrics.elapsed_time_seconds,
            power_watts: metrics.power_watts,
            calories_burned: metrics.calories_burned,
        }
    }
}

fn serialize_hundredths<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.2}", value))
}

/// Format a capture time the way both logs store it.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Encode bytes as lowercase hex, two digits per byte.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a hex string produced by [`encode_hex`]. Upper case and
/// surrounding whitespace are accepted.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(text.trim())
}

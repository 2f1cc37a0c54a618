//! Durable destinations for the raw and decoded frame streams.

use crate::recording::log_format::{
    encode_hex, format_timestamp, DecodedRow, RawRow, DECODED_HEADERS, RAW_HEADERS,
};
use crate::sensors::pm5::RowingMetrics;
use crate::sensors::types::RawFrame;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors writing to a sink. Always fatal to an acquisition run.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Append-only destination for captured frames.
///
/// Calls are synchronous. A call that returns `Ok` has handed a complete row to
/// the underlying storage.
pub trait FrameSink {
    /// Append a raw frame.
    fn write_raw(&mut self, frame: &RawFrame) -> Result<(), SinkError>;

    /// Append a decoded frame stamped with its raw frame's capture time.
    fn write_decoded(
        &mut self,
        timestamp: &DateTime<Utc>,
        metrics: &RowingMetrics,
    ) -> Result<(), SinkError>;

    /// Push any buffered data to storage.
    fn flush(&mut self) -> Result<(), SinkError>;
}

/// Writes the raw and decoded streams as two CSV logs.
pub struct CsvFrameSink<W: Write> {
    raw: csv::Writer<W>,
    decoded: csv::Writer<W>,
}

impl<W: Write> CsvFrameSink<W> {
    /// Wrap two writers and emit both header rows.
    pub fn from_writers(raw: W, decoded: W) -> Result<Self, SinkError> {
        let mut raw = csv::WriterBuilder::new().has_headers(false).from_writer(raw);
        let mut decoded = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(decoded);

        raw.write_record(RAW_HEADERS)?;
        raw.flush()?;
        decoded.write_record(DECODED_HEADERS)?;
        decoded.flush()?;

        Ok(Self { raw, decoded })
    }

    /// Flush and return the underlying writers as `(raw, decoded)`.
    pub fn into_inner(self) -> Result<(W, W), SinkError> {
        let raw = self.raw.into_inner().map_err(|e| e.into_error())?;
        let decoded = self.decoded.into_inner().map_err(|e| e.into_error())?;
        Ok((raw, decoded))
    }
}

impl CsvFrameSink<File> {
    /// Create (truncating) both log files.
    pub fn create(raw_path: &Path, decoded_path: &Path) -> Result<Self, SinkError> {
        for path in [raw_path, decoded_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }

        let sink = Self::from_writers(File::create(raw_path)?, File::create(decoded_path)?)?;

        tracing::info!(
            "Logging raw frames to {} and decoded frames to {}",
            raw_path.display(),
            decoded_path.display()
        );
        Ok(sink)
    }
}

impl<W: Write> FrameSink for CsvFrameSink<W> {
    fn write_raw(&mut self, frame: &RawFrame) -> Result<(), SinkError> {
        self.raw.serialize(RawRow {
            timestamp: format_timestamp(&frame.timestamp),
            raw_data: encode_hex(&frame.bytes),
        })?;
        self.raw.flush()?;
        Ok(())
    }

    fn write_decoded(
        &mut self,
        timestamp: &DateTime<Utc>,
        metrics: &RowingMetrics,
    ) -> Result<(), SinkError> {
        self.decoded
            .serialize(DecodedRow::new(format_timestamp(timestamp), metrics))?;
        self.decoded.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.raw.flush()?;
        self.decoded.flush()?;
        Ok(())
    }
}

/// Paths of the two logs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub raw: PathBuf,
    pub decoded: PathBuf,
}

/// Generate timestamped log file names inside `dir`.
pub fn generate_log_paths(dir: &Path, started_at: &DateTime<Utc>) -> LogPaths {
    let stamp = started_at.format("%Y%m%d_%H%M%S");
    LogPaths {
        raw: dir.join(format!("rowing_raw_{}.csv", stamp)),
        decoded: dir.join(format!("rowing_decoded_{}.csv", stamp)),
    }
}

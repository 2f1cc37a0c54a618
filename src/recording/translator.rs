//! Offline re-decoding of a raw log into a decoded log.

use crate::recording::log_format::{decode_hex, DecodedRow, RawRow, DECODED_HEADERS};
use crate::sensors::pm5::decode;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Counters from a translation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslateSummary {
    /// Data rows read from the raw log
    pub rows_read: usize,
    /// Rows written to the decoded log
    pub rows_decoded: usize,
    /// Rows whose payload was too short to decode
    pub rows_skipped: usize,
}

/// Errors during translation.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Output path names the input log
    #[error("output {0} would overwrite the raw log being translated")]
    SameFile(PathBuf),

    /// Payload column is not valid hex
    #[error("row {row}: invalid raw data: {source}")]
    InvalidHex {
        row: usize,
        #[source]
        source: hex::FromHexError,
    },
}

/// Decode every row of a raw log and write the decoded log.
///
/// Timestamps are copied verbatim. Rows too short to decode are skipped with a
/// warning; a malformed row aborts the translation.
pub fn translate<R: Read, W: Write>(
    input: R,
    output: W,
) -> Result<TranslateSummary, TranslateError> {
    let mut reader = csv::Reader::from_reader(input);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    writer.write_record(DECODED_HEADERS)?;

    let mut summary = TranslateSummary::default();

    for (index, result) in reader.deserialize::<RawRow>().enumerate() {
        // Line 1 is the header
        let row = index + 2;
        let raw: RawRow = result?;
        summary.rows_read += 1;

        let bytes = decode_hex(&raw.raw_data)
            .map_err(|source| TranslateError::InvalidHex { row, source })?;

        match decode(&bytes) {
            Ok(metrics) => {
                writer.serialize(DecodedRow::new(raw.timestamp, &metrics))?;
                summary.rows_decoded += 1;
            }
            Err(e) => {
                tracing::warn!("Skipping row {}: {}", row, e);
                summary.rows_skipped += 1;
            }
        }
    }

    writer.flush()?;
    Ok(summary)
}

/// Translate the raw log at `input` into a decoded log at `output`.
///
/// Fails with [`TranslateError::SameFile`] before touching either file when
/// both paths resolve to the same log.
pub fn translate_file(input: &Path, output: &Path) -> Result<TranslateSummary, TranslateError> {
    let source = File::open(input)?;
    if output.exists() && std::fs::canonicalize(input)? == std::fs::canonicalize(output)? {
        return Err(TranslateError::SameFile(output.to_path_buf()));
    }

    let summary = translate(source, File::create(output)?)?;

    tracing::info!(
        "Processed {} rows from {} ({} decoded, {} skipped); saved to {}",
        summary.rows_read,
        input.display(),
        summary.rows_decoded,
        summary.rows_skipped,
        output.display()
    );

    Ok(summary)
}

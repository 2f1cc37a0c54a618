//! Recording module for frame logs and offline translation.

pub mod log_format;
pub mod sink;
pub mod translator;

pub use log_format::{decode_hex, encode_hex, format_timestamp, DecodedRow, RawRow};
pub use sink::{generate_log_paths, CsvFrameSink, FrameSink, LogPaths, SinkError};
pub use translator::{translate, translate_file, TranslateError, TranslateSummary};

//! RustRow - Concept2 PM5 Telemetry Logger
//!
//! Connects to a PM5 rowing monitor over Bluetooth LE, polls its rowing status
//! characteristic, decodes each frame and logs both the raw bytes and the
//! decoded metrics as CSV. Raw logs can be re-decoded offline.

pub mod acquisition;
pub mod recording;
pub mod sensors;
pub mod storage;

// Re-export commonly used types
pub use acquisition::{AcquisitionLoop, AcquisitionSummary};
pub use recording::sink::CsvFrameSink;
pub use sensors::locator::DeviceLocator;
pub use sensors::pm5::{decode, RowingMetrics};
pub use storage::config::AppConfig;

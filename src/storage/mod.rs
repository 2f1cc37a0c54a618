//! Storage module for configuration.

pub mod config;

pub use config::{load_config, AcquisitionConfig, AppConfig, ConfigError, RecordingSettings};

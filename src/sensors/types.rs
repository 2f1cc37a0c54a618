//! Device, frame and connection types shared by the locator and transport.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A peripheral seen during a discovery scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Platform peripheral identifier (address on Linux/Windows, UUID on macOS)
    pub device_id: String,
    /// Advertised local name, if the peripheral sent one
    pub name: Option<String>,
    /// Signal strength (RSSI)
    pub signal_strength: Option<i16>,
}

impl DiscoveredDevice {
    /// Whether the advertised name contains `target` (case-sensitive).
    pub fn matches(&self, target: &str) -> bool {
        self.name.as_deref().is_some_and(|name| name.contains(target))
    }
}

/// Handle to the located monitor, valid for one acquisition run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Platform peripheral identifier
    pub id: String,
    /// Advertised name at discovery time
    pub name: String,
}

impl std::fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A frame exactly as read from the telemetry characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Wall-clock time taken right after the read completed
    pub timestamp: DateTime<Utc>,
    /// Payload bytes, untouched
    pub bytes: Vec<u8>,
}

impl RawFrame {
    /// Stamp a payload with the current time.
    pub fn now(bytes: Vec<u8>) -> Self {
        Self {
            timestamp: Utc::now(),
            bytes,
        }
    }
}

/// Connection state of a transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection held
    #[default]
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Connected and idle
    Connected,
    /// A characteristic read is outstanding
    Reading,
    /// Non-retriable protocol error; needs a fresh open
    Failed,
}

/// Errors from device discovery.
#[derive(Debug, Error)]
pub enum LocatorError {
    /// Scan finished without a matching advertisement
    #[error("no device advertising a name containing {0:?} was found")]
    NotFound(String),

    /// Adapter missing, disabled, or refused to scan
    #[error("scan failed: {0}")]
    ScanFailed(String),
}

/// Errors from a transport session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Operation requires an open session
    #[error("not connected")]
    NotConnected,

    /// Connection handshake did not finish in time
    #[error("connection timed out")]
    ConnectTimeout,

    /// Peripheral rejected or failed the connection handshake
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// Link dropped while connected
    #[error("link lost: {0}")]
    LinkLost(String),

    /// Characteristic read did not answer in time
    #[error("read timed out")]
    ReadTimeout,

    /// Non-retriable protocol error, e.g. missing characteristic
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Whether the acquisition loop may reconnect after this error.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectTimeout
                | TransportError::ConnectFailed(_)
                | TransportError::LinkLost(_)
                | TransportError::ReadTimeout
        )
    }
}

//! Sensor module for PM5 discovery, connection and frame decoding.

pub mod locator;
pub mod pm5;
pub mod transport;
pub mod types;

pub use locator::{find_device_or_cancel, locate_in_stream, DeviceFinder, DeviceLocator};
pub use pm5::{decode, DecodeError, RowingMetrics, FRAME_LEN, ROWING_STATUS_UUID};
pub use transport::{BleTransport, FrameTransport, TransportTimeouts};
pub use types::{
    ConnectionState, DeviceHandle, DiscoveredDevice, LocatorError, RawFrame, TransportError,
};

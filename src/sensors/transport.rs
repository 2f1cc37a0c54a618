//! Connection session against the monitor's telemetry characteristic.
//!
//! A session moves through [`ConnectionState`]:
//!
//! ```text
//! Disconnected -> Connecting -> Connected <-> Reading
//!      ^              |             |            |
//!      +--------------+-------------+------------+   (close / link loss / timeout)
//!                                   +-> Failed       (protocol error)
//! ```
//!
//! Reconnection policy belongs to the acquisition loop; a transport only
//! reports what happened.

use crate::sensors::pm5::{PM5_ROWING_SERVICE_UUID, ROWING_STATUS_UUID};
use crate::sensors::types::{ConnectionState, DeviceHandle, RawFrame, TransportError};
use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use std::time::Duration;
use uuid::Uuid;

/// A session that yields raw telemetry frames one read at a time.
#[async_trait]
pub trait FrameTransport: Send {
    /// Connect to `device` and resolve the telemetry characteristic.
    async fn open(&mut self, device: &DeviceHandle) -> Result<(), TransportError>;

    /// Issue one characteristic read and return the stamped payload.
    ///
    /// Takes `&mut self`, so a session can never have two reads in flight.
    async fn read_next_frame(&mut self) -> Result<RawFrame, TransportError>;

    /// Release the connection. Always legal, and a no-op when already closed.
    async fn close(&mut self);

    /// Current session state.
    fn state(&self) -> ConnectionState;
}

/// Timeouts applied by [`BleTransport`].
#[derive(Debug, Clone, Copy)]
pub struct TransportTimeouts {
    /// Bound on connect + service discovery
    pub connect: Duration,
    /// Bound on a single characteristic read
    pub read: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(2),
        }
    }
}

/// An open peripheral plus its resolved telemetry characteristic.
struct Session {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

/// [`FrameTransport`] backed by a btleplug adapter.
pub struct BleTransport {
    adapter: Adapter,
    timeouts: TransportTimeouts,
    characteristic_uuid: Uuid,
    state: ConnectionState,
    session: Option<Session>,
}

impl BleTransport {
    /// Create a transport reading the PM5 rowing status characteristic.
    pub fn new(adapter: Adapter, timeouts: TransportTimeouts) -> Self {
        Self {
            adapter,
            timeouts,
            characteristic_uuid: ROWING_STATUS_UUID,
            state: ConnectionState::Disconnected,
            session: None,
        }
    }

    async fn find_peripheral(&self, device_id: &str) -> Result<Peripheral, TransportError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        peripherals
            .into_iter()
            .find(|p| p.id().to_string() == device_id)
            .ok_or_else(|| {
                TransportError::ConnectFailed(format!("device {} not in range", device_id))
            })
    }

    /// Connect, discover services and resolve the characteristic.
    async fn handshake(&self, peripheral: &Peripheral) -> Result<Characteristic, TransportError> {
        peripheral
            .connect()
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        peripheral
            .discover_services()
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        if let Some(characteristic) = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == self.characteristic_uuid)
        {
            return Ok(characteristic);
        }

        let has_rowing_service = peripheral
            .services()
            .iter()
            .any(|s| s.uuid == PM5_ROWING_SERVICE_UUID);
        let message = if has_rowing_service {
            format!(
                "rowing service present but characteristic {} missing",
                self.characteristic_uuid
            )
        } else {
            format!(
                "peripheral does not expose the PM5 rowing service {}",
                PM5_ROWING_SERVICE_UUID
            )
        };
        Err(TransportError::Protocol(message))
    }

    /// Map a failed read to link loss or a protocol error.
    async fn classify_read_error(
        peripheral: &Peripheral,
        error: btleplug::Error,
    ) -> TransportError {
        match error {
            btleplug::Error::NotConnected | btleplug::Error::DeviceNotFound => {
                TransportError::LinkLost(error.to_string())
            }
            btleplug::Error::TimedOut(_) => TransportError::ReadTimeout,
            other => {
                if peripheral.is_connected().await.unwrap_or(false) {
                    TransportError::Protocol(other.to_string())
                } else {
                    TransportError::LinkLost(other.to_string())
                }
            }
        }
    }

    async fn disconnect_quietly(peripheral: &Peripheral) {
        if let Err(e) = peripheral.disconnect().await {
            tracing::debug!("Disconnect after session end failed: {}", e);
        }
    }

    async fn drop_session(&mut self) {
        if let Some(session) = self.session.take() {
            Self::disconnect_quietly(&session.peripheral).await;
        }
    }
}

#[async_trait]
impl FrameTransport for BleTransport {
    async fn open(&mut self, device: &DeviceHandle) -> Result<(), TransportError> {
        self.close().await;

        tracing::info!("Connecting to {}", device);
        self.state = ConnectionState::Connecting;

        let peripheral = match self.find_peripheral(&device.id).await {
            Ok(p) => p,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        let characteristic =
            match tokio::time::timeout(self.timeouts.connect, self.handshake(&peripheral)).await {
                Ok(Ok(characteristic)) => characteristic,
                Ok(Err(e)) => {
                    Self::disconnect_quietly(&peripheral).await;
                    self.state = match &e {
                        TransportError::Protocol(_) => ConnectionState::Failed,
                        _ => ConnectionState::Disconnected,
                    };
                    return Err(e);
                }
                Err(_) => {
                    Self::disconnect_quietly(&peripheral).await;
                    self.state = ConnectionState::Disconnected;
                    return Err(TransportError::ConnectTimeout);
                }
            };

        self.session = Some(Session {
            peripheral,
            characteristic,
        });
        self.state = ConnectionState::Connected;

        tracing::info!("Connected to {}", device);
        Ok(())
    }

    async fn read_next_frame(&mut self) -> Result<RawFrame, TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        let Some(session) = self.session.as_ref() else {
            return Err(TransportError::NotConnected);
        };

        self.state = ConnectionState::Reading;

        let read = session.peripheral.read(&session.characteristic);
        let error = match tokio::time::timeout(self.timeouts.read, read).await {
            Ok(Ok(bytes)) => {
                let frame = RawFrame::now(bytes);
                self.state = ConnectionState::Connected;
                tracing::debug!("Raw frame: {:02x?}", frame.bytes);
                return Ok(frame);
            }
            Ok(Err(e)) => Self::classify_read_error(&session.peripheral, e).await,
            Err(_) => TransportError::ReadTimeout,
        };

        self.state = match &error {
            TransportError::Protocol(_) => ConnectionState::Failed,
            _ => ConnectionState::Disconnected,
        };
        if self.state == ConnectionState::Disconnected {
            self.drop_session().await;
        }

        Err(error)
    }

    async fn close(&mut self) {
        if self.session.is_some() {
            tracing::info!("Closing transport session");
        }
        self.drop_session().await;
        self.state = ConnectionState::Disconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

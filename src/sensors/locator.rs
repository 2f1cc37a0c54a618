//! BLE discovery of the rowing monitor.
//!
//! The scan reports every peripheral it sees and stops at the first one whose
//! advertised name contains the target substring. Selection is kept apart from
//! the radio in [`locate_in_stream`] so it works over any stream of
//! [`DiscoveredDevice`]s.

use crate::sensors::types::{DeviceHandle, DiscoveredDevice, LocatorError};
use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use futures::stream::{Stream, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::watch;

/// Something that can resolve a target name to a device handle.
#[async_trait]
pub trait DeviceFinder: Send + Sync {
    /// Scan for up to `timeout` and return the first device whose name
    /// contains `target`.
    async fn find_device(
        &self,
        target: &str,
        timeout: Duration,
    ) -> Result<DeviceHandle, LocatorError>;

    /// Stop any scan left running by an abandoned [`find_device`](Self::find_device).
    async fn stop_scan(&self) {}
}

/// Run `find_device` until it resolves or `cancel` fires.
///
/// Returns `Ok(None)` when cancelled; the finder's scan is stopped before
/// returning in that case as well.
pub async fn find_device_or_cancel<F: DeviceFinder + ?Sized>(
    finder: &F,
    target: &str,
    timeout: Duration,
    cancel: &mut watch::Receiver<bool>,
) -> Result<Option<DeviceHandle>, LocatorError> {
    if *cancel.borrow() {
        return Ok(None);
    }

    let cancelled = async {
        // A dropped sender also cancels
        while cancel.changed().await.is_ok() {
            if *cancel.borrow() {
                return;
            }
        }
    };

    tokio::select! {
        found = finder.find_device(target, timeout) => found.map(Some),
        _ = cancelled => {
            tracing::info!("Discovery cancelled");
            finder.stop_scan().await;
            Ok(None)
        }
    }
}

/// Pick the first device in `devices` whose name contains `target`.
///
/// Every distinct device is logged once. Returns `NotFound` when the stream
/// ends or `timeout` elapses first.
pub async fn locate_in_stream<S>(
    mut devices: S,
    target: &str,
    timeout: Duration,
) -> Result<DeviceHandle, LocatorError>
where
    S: Stream<Item = DiscoveredDevice> + Unpin,
{
    let search = async {
        let mut reported = HashSet::new();

        while let Some(device) = devices.next().await {
            if reported.insert((device.device_id.clone(), device.name.clone())) {
                tracing::info!(
                    name = device.name.as_deref().unwrap_or("(unknown)"),
                    address = %device.device_id,
                    rssi = ?device.signal_strength,
                    "Found device"
                );
            }

            if device.matches(target) {
                return Some(DeviceHandle {
                    name: device.name.unwrap_or_default(),
                    id: device.device_id,
                });
            }
        }

        None
    };

    match tokio::time::timeout(timeout, search).await {
        Ok(Some(handle)) => {
            tracing::info!("Target device found: {}", handle);
            Ok(handle)
        }
        Ok(None) | Err(_) => {
            tracing::warn!(
                "No device matching {:?}; ensure the monitor is powered on and in Bluetooth mode",
                target
            );
            Err(LocatorError::NotFound(target.to_string()))
        }
    }
}

/// Locates the monitor using the first available BLE adapter.
pub struct DeviceLocator {
    adapter: Adapter,
}

impl DeviceLocator {
    /// Acquire the first BLE adapter on the system.
    pub async fn initialize() -> Result<Self, LocatorError> {
        tracing::info!("Initializing BLE adapter");

        let manager = Manager::new()
            .await
            .map_err(|e| LocatorError::ScanFailed(e.to_string()))?;

        let adapter = manager
            .adapters()
            .await
            .map_err(|e| LocatorError::ScanFailed(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| LocatorError::ScanFailed("no Bluetooth adapter found".to_string()))?;

        Ok(Self { adapter })
    }

    /// Adapter used for scanning; transports connect through the same one.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }
}

#[async_trait]
impl DeviceFinder for DeviceLocator {
    async fn find_device(
        &self,
        target: &str,
        timeout: Duration,
    ) -> Result<DeviceHandle, LocatorError> {
        tracing::info!("Scanning for BLE devices (timeout {:?})", timeout);

        // Subscribe before scanning so early advertisements are not missed
        let events = self
            .adapter
            .events()
            .await
            .map_err(|e| LocatorError::ScanFailed(e.to_string()))?;

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| LocatorError::ScanFailed(e.to_string()))?;

        let adapter = self.adapter.clone();
        let devices = events.filter_map(move |event| {
            let adapter = adapter.clone();
            async move {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => return None,
                };
                let peripheral = adapter.peripheral(&id).await.ok()?;
                let properties = peripheral.properties().await.ok()??;

                Some(DiscoveredDevice {
                    device_id: peripheral.id().to_string(),
                    name: properties.local_name,
                    signal_strength: properties.rssi,
                })
            }
        });

        let result = locate_in_stream(Box::pin(devices), target, timeout).await;
        DeviceFinder::stop_scan(self).await;
        result
    }

    async fn stop_scan(&self) {
        if let Err(e) = self.adapter.stop_scan().await {
            tracing::warn!("Failed to stop scan: {}", e);
        }
    }
}

//! The acquisition loop: read, stamp, decode, emit, sleep, repeat.
//!
//! Reads never overlap. The characteristic holds the monitor's current state
//! rather than a queue, so each frame is fully emitted before the next read is
//! issued and rows reach the sink in read order.
//!
//! Cancellation arrives on a `watch` channel and is only observed between
//! iterations: before a read, during the poll sleep, or during reconnect
//! backoff. An in-flight read always completes or times out on its own.

use crate::recording::sink::{FrameSink, SinkError};
use crate::sensors::locator::{find_device_or_cancel, DeviceFinder};
use crate::sensors::pm5::decode;
use crate::sensors::transport::FrameTransport;
use crate::sensors::types::{DeviceHandle, LocatorError, RawFrame, TransportError};
use crate::storage::config::AcquisitionConfig;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Counters from a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionSummary {
    /// Frames read from the device (all written to the raw log)
    pub frames_read: u64,
    /// Frames written to the decoded log
    pub frames_decoded: u64,
    /// Frames that failed to decode
    pub decode_failures: u64,
    /// Successful reconnections after the first connection
    pub reconnects: u32,
}

/// Errors that end an acquisition run.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("device lookup failed: {0}")]
    Locator(#[from] LocatorError),

    /// Non-retriable transport failure
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    /// Connection could not be re-established within the configured bound
    #[error("gave up after {attempts} consecutive connection attempts: {last}")]
    ReconnectExhausted {
        attempts: u32,
        #[source]
        last: TransportError,
    },

    #[error("sink write failed: {0}")]
    Sink(#[from] SinkError),
}

/// Runs the read/decode/emit cycle against one located device.
pub struct AcquisitionLoop<T: FrameTransport> {
    transport: T,
    config: AcquisitionConfig,
}

impl<T: FrameTransport> AcquisitionLoop<T> {
    pub fn new(transport: T, config: AcquisitionConfig) -> Self {
        Self { transport, config }
    }

    /// The transport driven by this loop.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Poll `device` until cancelled or a fatal error occurs.
    ///
    /// The transport is closed and the sink flushed on every exit path.
    pub async fn run<S: FrameSink + ?Sized>(
        &mut self,
        device: &DeviceHandle,
        sink: &mut S,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<AcquisitionSummary, AcquisitionError> {
        let result = self.poll(device, sink, cancel).await;

        self.transport.close().await;
        let flushed = sink.flush();

        match result {
            Ok(summary) => {
                flushed?;
                tracing::info!(
                    "Data collection stopped: {} frames read, {} decoded, {} decode failures",
                    summary.frames_read,
                    summary.frames_decoded,
                    summary.decode_failures
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(flush_err) = flushed {
                    tracing::error!("Failed to flush sink after error: {}", flush_err);
                }
                Err(e)
            }
        }
    }

    async fn poll<S: FrameSink + ?Sized>(
        &mut self,
        device: &DeviceHandle,
        sink: &mut S,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<AcquisitionSummary, AcquisitionError> {
        let mut summary = AcquisitionSummary::default();
        // Connection attempts since the last frame was read
        let mut attempts = 0u32;
        let mut connected = false;
        let mut opened_before = false;

        tracing::info!("Collecting rowing data from {}", device);

        loop {
            if *cancel.borrow() {
                return Ok(summary);
            }

            if !connected {
                attempts += 1;
                match self.transport.open(device).await {
                    Ok(()) => {
                        connected = true;
                        if opened_before {
                            summary.reconnects += 1;
                            tracing::info!("Reconnected to {}", device);
                        }
                        opened_before = true;
                        continue;
                    }
                    Err(e) if e.is_retriable() => {
                        if self.back_off(e, attempts, cancel).await? {
                            return Ok(summary);
                        }
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            match self.transport.read_next_frame().await {
                Ok(frame) => {
                    attempts = 0;
                    Self::emit(&frame, sink, &mut summary)?;
                }
                Err(e) if e.is_retriable() => {
                    connected = false;
                    self.transport.close().await;
                    let max = self.config.max_reconnect_attempts;
                    if attempts >= max {
                        tracing::error!("Connection lost with no attempts left: {}", e);
                        return Err(AcquisitionError::ReconnectExhausted {
                            attempts,
                            last: e,
                        });
                    }
                    tracing::warn!(
                        "Connection to {} lost: {}; reconnecting in {:?}",
                        device,
                        e,
                        self.config.reconnect_delay()
                    );
                    if wait_or_cancel(cancel, self.config.reconnect_delay()).await {
                        return Ok(summary);
                    }
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            if wait_or_cancel(cancel, self.config.poll_interval()).await {
                return Ok(summary);
            }
        }
    }

    /// Handle a failed connection attempt. Returns `Ok(true)` if cancelled
    /// while waiting, or the terminal error once the attempt bound is reached.
    async fn back_off(
        &mut self,
        error: TransportError,
        attempts: u32,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<bool, AcquisitionError> {
        self.transport.close().await;

        let max = self.config.max_reconnect_attempts;
        if attempts >= max {
            tracing::error!("Connection attempt {}/{} failed: {}", attempts, max, error);
            return Err(AcquisitionError::ReconnectExhausted {
                attempts,
                last: error,
            });
        }

        tracing::warn!(
            "Connection attempt {}/{} failed: {}; retrying in {:?}",
            attempts,
            max,
            error,
            self.config.reconnect_delay()
        );
        Ok(wait_or_cancel(cancel, self.config.reconnect_delay()).await)
    }

    /// Write the raw row, then the decoded row if the frame decodes.
    fn emit<S: FrameSink + ?Sized>(
        frame: &RawFrame,
        sink: &mut S,
        summary: &mut AcquisitionSummary,
    ) -> Result<(), SinkError> {
        sink.write_raw(frame)?;
        summary.frames_read += 1;

        match decode(&frame.bytes) {
            Ok(metrics) => {
                sink.write_decoded(&frame.timestamp, &metrics)?;
                summary.frames_decoded += 1;
                tracing::debug!(
                    stroke_rate = metrics.stroke_rate,
                    distance_m = metrics.distance_meters,
                    power_w = metrics.power_watts,
                    "Decoded frame"
                );
            }
            Err(e) => {
                summary.decode_failures += 1;
                tracing::warn!("Error parsing frame captured at {}: {}", frame.timestamp, e);
            }
        }

        Ok(())
    }
}

/// Sleep for `duration` unless cancelled first. Returns whether the run
/// should stop. A dropped sender counts as cancellation.
async fn wait_or_cancel(cancel: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *cancel.borrow() {
        return true;
    }

    let sender_gone = tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        changed = cancel.changed() => changed.is_err(),
    };

    sender_gone || *cancel.borrow()
}

/// Locate the device named in `config`, then poll it into `sink` until
/// cancelled. Cancelling during discovery returns an empty summary.
pub async fn run<F, T, S>(
    finder: &F,
    transport: T,
    config: &AcquisitionConfig,
    sink: &mut S,
    mut cancel: watch::Receiver<bool>,
) -> Result<AcquisitionSummary, AcquisitionError>
where
    F: DeviceFinder + ?Sized,
    T: FrameTransport,
    S: FrameSink + ?Sized,
{
    let found = find_device_or_cancel(
        finder,
        &config.device_name,
        config.discovery_timeout(),
        &mut cancel,
    )
    .await?;
    let Some(device) = found else {
        sink.flush()?;
        return Ok(AcquisitionSummary::default());
    };

    AcquisitionLoop::new(transport, config.clone())
        .run(&device, sink, &mut cancel)
        .await
}

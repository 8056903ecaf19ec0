//! Per-consumer delivery task
//!
//! Drains a consumer's mailbox into its transport. A failing transport only
//! ends its own delivery; the caller turns that into a detach.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::broadcast::MailboxReceiver;
use crate::error::TransportError;
use crate::registry::{CameraKey, ConsumerId};
use crate::stats::SessionMetrics;

use super::transport::Transport;

/// Why a delivery task finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEnd {
    /// The consumer was detached (cancelled or mailbox closed)
    Detached,
    /// The transport failed; the consumer still needs detaching
    TransportFailed(TransportError),
}

/// Delivery loop for one consumer
pub struct ClientDelivery<W: Transport> {
    key: CameraKey,
    id: ConsumerId,
    mailbox: MailboxReceiver,
    transport: W,
    cancel: CancellationToken,
    write_timeout: Option<Duration>,
    metrics: Arc<SessionMetrics>,
}

impl<W: Transport> ClientDelivery<W> {
    pub fn new(
        key: CameraKey,
        id: ConsumerId,
        mailbox: MailboxReceiver,
        transport: W,
        cancel: CancellationToken,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        Self {
            key,
            id,
            mailbox,
            transport,
            cancel,
            write_timeout: None,
            metrics,
        }
    }

    /// Fail a write that takes longer than `timeout`
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Run until detached or the transport fails
    ///
    /// The transport is closed before returning.
    pub async fn run(self) -> DeliveryEnd {
        let ClientDelivery {
            key,
            id,
            mut mailbox,
            mut transport,
            cancel,
            write_timeout,
            metrics,
        } = self;

        tracing::debug!(camera = %key, consumer = %id, "Delivery started");

        let end = loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => break DeliveryEnd::Detached,
                frame = mailbox.recv() => match frame {
                    Some(frame) => frame,
                    None => break DeliveryEnd::Detached,
                },
            };

            let written = tokio::select! {
                biased;
                _ = cancel.cancelled() => break DeliveryEnd::Detached,
                written = write(&mut transport, frame.data().clone(), write_timeout) => written,
            };

            match written {
                Ok(()) => {
                    metrics.record_delivered(frame.len());
                    tracing::trace!(
                        camera = %key,
                        consumer = %id,
                        sequence = frame.sequence(),
                        "Frame delivered"
                    );
                }
                Err(e) => break DeliveryEnd::TransportFailed(e),
            }
        };

        transport.close().await;

        match &end {
            DeliveryEnd::Detached => {
                tracing::debug!(camera = %key, consumer = %id, "Delivery stopped");
            }
            DeliveryEnd::TransportFailed(e) => {
                tracing::info!(camera = %key, consumer = %id, error = %e, "Consumer transport failed");
            }
        }

        end
    }
}

async fn write<W: Transport>(
    transport: &mut W,
    payload: Bytes,
    timeout: Option<Duration>,
) -> Result<(), TransportError> {
    match timeout {
        Some(limit) => time::timeout(limit, transport.send_frame(payload))
            .await
            .map_err(|_| TransportError::Timeout(limit))?,
        None => transport.send_frame(payload).await,
    }
}

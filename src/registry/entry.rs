//! Relay session entry
//!
//! This module defines the per-camera state stored in the registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::broadcast::{FrameBroadcaster, MailboxSender};
use crate::capture::{CaptureSession, CaptureState};
use crate::stats::{SessionCounters, SessionMetrics};

use super::frame::{CameraKey, ConsumerId, SourceDescriptor};

/// One attached viewer, as seen by its relay session
#[derive(Debug)]
pub struct ConsumerHandle {
    pub id: ConsumerId,
    /// Cancels the consumer's delivery task
    cancel: CancellationToken,
    pub attached_at: Instant,
}

impl ConsumerHandle {
    pub(super) fn new(id: ConsumerId, cancel: CancellationToken) -> Self {
        Self {
            id,
            cancel,
            attached_at: Instant::now(),
        }
    }

    /// Whether the delivery task is still meant to run
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

/// Live state binding one capture session to its consumers
///
/// Exists exactly as long as at least one consumer is attached; the
/// registry creates it on the first attach and removes it on the last
/// detach.
#[derive(Debug)]
pub struct RelaySession {
    pub key: CameraKey,
    pub descriptor: SourceDescriptor,
    pub(super) broadcaster: Arc<FrameBroadcaster>,
    capture: CaptureSession,
    consumers: HashMap<ConsumerId, ConsumerHandle>,
    metrics: Arc<SessionMetrics>,
    pub created_at: Instant,
    pub last_activity: Instant,
}

impl RelaySession {
    pub(super) fn new(
        key: CameraKey,
        descriptor: SourceDescriptor,
        broadcaster: Arc<FrameBroadcaster>,
        capture: CaptureSession,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        let now = Instant::now();
        Self {
            key,
            descriptor,
            broadcaster,
            capture,
            consumers: HashMap::new(),
            metrics,
            created_at: now,
            last_activity: now,
        }
    }

    /// Add a consumer and start feeding its mailbox
    pub(super) fn attach(&mut self, handle: ConsumerHandle, mailbox: MailboxSender) {
        self.broadcaster.attach(handle.id, mailbox);
        self.consumers.insert(handle.id, handle);
        self.last_activity = Instant::now();
    }

    /// Remove a consumer and cancel its delivery task
    ///
    /// Returns `false` if the consumer was not attached.
    pub(super) fn detach(&mut self, id: ConsumerId) -> bool {
        let Some(handle) = self.consumers.remove(&id) else {
            return false;
        };

        handle.cancel.cancel();
        self.broadcaster.detach(id);
        self.last_activity = Instant::now();
        true
    }

    /// Stop capture after detaching every remaining consumer
    pub(super) async fn close(mut self) {
        for (_, handle) in self.consumers.drain() {
            handle.cancel.cancel();
        }
        self.broadcaster.detach_all();
        self.capture.stop().await;
    }

    /// Number of attached consumers
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    pub fn has_consumer(&self, id: ConsumerId) -> bool {
        self.consumers.contains_key(&id)
    }

    /// Current capture state
    pub fn state(&self) -> CaptureState {
        self.capture.state()
    }

    /// Shared counters of this session
    pub fn metrics(&self) -> &Arc<SessionMetrics> {
        &self.metrics
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            state: self.state(),
            consumer_count: self.consumers.len() as u32,
            last_sequence: self.broadcaster.last_sequence(),
            uptime: self.created_at.elapsed(),
            counters: self.metrics.snapshot(),
        }
    }
}

/// Statistics for a relay session
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Capture lifecycle state
    pub state: CaptureState,
    /// Number of attached consumers
    pub consumer_count: u32,
    /// Sequence number of the last published frame
    pub last_sequence: Option<u64>,
    /// Time since the session was created
    pub uptime: Duration,
    /// Frame and connection counters
    pub counters: SessionCounters,
}

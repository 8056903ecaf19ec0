//! Per-camera frame fan-out
//!
//! The broadcaster keeps the last published frame of a relay session and a
//! mailbox per attached consumer. Publishing overwrites every mailbox in
//! place, so a slow consumer skips frames instead of slowing down the
//! producer or the other consumers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use bytes::Bytes;

use crate::registry::{CameraKey, ConsumerId, Frame};
use crate::stats::SessionMetrics;

use super::mailbox::MailboxSender;

#[derive(Debug, Default)]
struct FanOut {
    /// Last published frame, back-filled into late joiners
    last: Option<Frame>,
    consumers: HashMap<ConsumerId, MailboxSender>,
}

/// Latest-wins fan-out for one camera
#[derive(Debug)]
pub struct FrameBroadcaster {
    key: CameraKey,
    fan_out: Mutex<FanOut>,
    metrics: Arc<SessionMetrics>,
}

impl FrameBroadcaster {
    /// Create a broadcaster with no consumers and no frame
    pub fn new(key: CameraKey, metrics: Arc<SessionMetrics>) -> Self {
        Self {
            key,
            fan_out: Mutex::new(FanOut::default()),
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FanOut> {
        self.fan_out.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Camera this broadcaster serves
    pub fn key(&self) -> &CameraKey {
        &self.key
    }

    /// Publish a frame to every attached consumer
    ///
    /// The frame becomes the last published frame and replaces whatever is
    /// waiting in each consumer's mailbox. Returns `false` (and drops the
    /// frame) when its sequence number is not newer than the last published
    /// one.
    pub fn publish(&self, frame: Frame) -> bool {
        let mut fan_out = self.lock();
        self.publish_locked(&mut fan_out, frame)
    }

    fn publish_locked(&self, fan_out: &mut FanOut, frame: Frame) -> bool {
        if let Some(last) = fan_out.last.as_ref() {
            if frame.sequence() <= last.sequence() {
                tracing::debug!(
                    camera = %self.key,
                    sequence = frame.sequence(),
                    last = last.sequence(),
                    "Dropping out-of-order frame"
                );
                return false;
            }
        }

        for mailbox in fan_out.consumers.values() {
            if mailbox.replace(frame.clone()).is_some() {
                self.metrics.record_skipped();
            }
        }

        tracing::trace!(
            camera = %self.key,
            sequence = frame.sequence(),
            size = frame.len(),
            consumers = fan_out.consumers.len(),
            "Frame published"
        );

        fan_out.last = Some(frame);
        self.metrics.record_published();
        true
    }

    /// Sequence and publish an encoded payload
    ///
    /// A payload bit-identical to the last published one is treated as a
    /// stalled upstream repeating itself: nothing is published and the
    /// sequence number does not advance. Returns the published frame, or
    /// `None` when suppressed.
    pub fn publish_payload(&self, data: Bytes, captured_at: Instant) -> Option<Frame> {
        let mut fan_out = self.lock();

        let frame = match fan_out.last.as_ref() {
            Some(last) if *last.data() == data => {
                self.metrics.record_duplicate();
                tracing::trace!(
                    camera = %self.key,
                    sequence = last.sequence(),
                    "Suppressed duplicate payload"
                );
                return None;
            }
            Some(last) => Frame::new(last.sequence() + 1, data, captured_at),
            None => Frame::new(1, data, captured_at),
        };

        // Sequencing and fan-out share one critical section, so the next
        // sequence number is always newer than the last published one
        self.publish_locked(&mut fan_out, frame.clone())
            .then_some(frame)
    }

    /// Shared counters of the session this broadcaster belongs to
    pub fn metrics(&self) -> &Arc<SessionMetrics> {
        &self.metrics
    }

    /// Add a consumer to the fan-out set
    ///
    /// If a frame has already been published it is placed in the new
    /// mailbox right away, so the consumer does not wait a full capture
    /// cycle for its first frame.
    pub fn attach(&self, id: ConsumerId, mailbox: MailboxSender) {
        let mut fan_out = self.lock();

        if let Some(last) = fan_out.last.as_ref() {
            mailbox.replace(last.clone());
        }

        if let Some(previous) = fan_out.consumers.insert(id, mailbox) {
            // Re-attaching an id closes its old mailbox
            previous.close();
        }
    }

    /// Remove a consumer from the fan-out set
    ///
    /// Closes its mailbox so the delivery task wakes up and stops. Returns
    /// `false` if the consumer was not attached.
    pub fn detach(&self, id: ConsumerId) -> bool {
        let removed = self.lock().consumers.remove(&id);
        match removed {
            Some(mailbox) => {
                mailbox.close();
                true
            }
            None => false,
        }
    }

    /// Detach every consumer
    pub fn detach_all(&self) {
        let consumers = std::mem::take(&mut self.lock().consumers);
        for mailbox in consumers.into_values() {
            mailbox.close();
        }
    }

    /// Last published frame
    pub fn last_frame(&self) -> Option<Frame> {
        self.lock().last.clone()
    }

    /// Sequence number of the last published frame
    pub fn last_sequence(&self) -> Option<u64> {
        self.lock().last.as_ref().map(Frame::sequence)
    }

    /// Number of attached consumers
    pub fn consumer_count(&self) -> usize {
        self.lock().consumers.len()
    }

    /// Whether a consumer is attached
    pub fn is_attached(&self, id: ConsumerId) -> bool {
        self.lock().consumers.contains_key(&id)
    }
}

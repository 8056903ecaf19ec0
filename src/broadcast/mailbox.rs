//! Latest-wins single-slot mailbox
//!
//! A capacity-1 channel where a new write replaces any undelivered value
//! instead of queueing behind it. Each consumer gets one: the broadcaster
//! holds the [`MailboxSender`] and the consumer's delivery task holds the
//! [`MailboxReceiver`]. Writes never wait on the reader.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::registry::Frame;

#[derive(Debug, Default)]
struct Slot {
    frame: Option<Frame>,
    /// Sender side closed; the receiver drains what is left, then stops
    closed: bool,
    /// Receiver dropped; writes are discarded
    orphaned: bool,
}

#[derive(Debug, Default)]
struct Shared {
    slot: Mutex<Slot>,
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        // The slot is never left half-updated, so a poisoned lock is still usable
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a connected mailbox pair
pub fn mailbox() -> (MailboxSender, MailboxReceiver) {
    let shared = Arc::new(Shared::default());
    (
        MailboxSender {
            shared: Arc::clone(&shared),
        },
        MailboxReceiver { shared },
    )
}

/// Writing half of a mailbox
#[derive(Debug)]
pub struct MailboxSender {
    shared: Arc<Shared>,
}

impl MailboxSender {
    /// Put a frame in the slot
    ///
    /// Returns the undelivered frame that was overwritten, if any. Never
    /// blocks.
    pub fn replace(&self, frame: Frame) -> Option<Frame> {
        let displaced = {
            let mut slot = self.shared.lock();
            if slot.closed || slot.orphaned {
                return None;
            }
            slot.frame.replace(frame)
        };
        self.shared.notify.notify_one();
        displaced
    }

    /// Frame currently waiting in the slot
    pub fn peek(&self) -> Option<Frame> {
        self.shared.lock().frame.clone()
    }

    /// Whether the receiver has been dropped
    pub fn is_orphaned(&self) -> bool {
        self.shared.lock().orphaned
    }

    /// Close the mailbox, waking the receiver
    ///
    /// A pending frame is discarded: a consumer being detached has no use
    /// for it.
    pub fn close(&self) {
        {
            let mut slot = self.shared.lock();
            slot.closed = true;
            slot.frame = None;
        }
        self.shared.notify.notify_one();
    }
}

impl Drop for MailboxSender {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reading half of a mailbox
#[derive(Debug)]
pub struct MailboxReceiver {
    shared: Arc<Shared>,
}

impl MailboxReceiver {
    /// Wait for the next frame
    ///
    /// Returns `None` once the sender has closed the mailbox.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            {
                let mut slot = self.shared.lock();
                if let Some(frame) = slot.frame.take() {
                    return Some(frame);
                }
                if slot.closed {
                    return None;
                }
            }
            // notify_one stores a permit when nobody is waiting, so a write
            // between the check above and this await is not lost
            self.shared.notify.notified().await;
        }
    }

    /// Take the pending frame without waiting
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.shared.lock().frame.take()
    }

    /// Whether the sender has closed the mailbox
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl Drop for MailboxReceiver {
    fn drop(&mut self) {
        let mut slot = self.shared.lock();
        slot.orphaned = true;
        slot.frame = None;
    }
}

//! Per-event FIFO buffer of received payloads.
//!
//! Backed by an unbounded crossbeam channel, which gives lock-free
//! multi-producer / multi-consumer FIFO semantics. The buffer owns both ends,
//! so a push can never observe a disconnected channel.

use crate::types::Payload;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Unbounded, thread-safe queue of payloads for one event name.
pub struct EventBuffer {
    sender: Sender<Payload>,
    receiver: Receiver<Payload>,
}

impl EventBuffer {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Append a payload at the tail.
    pub fn push(&self, payload: Payload) {
        // Receiver lives in self, send only fails once both ends are gone.
        let _ = self.sender.send(payload);
    }

    /// Remove and return the head, if any.
    pub fn try_pop(&self) -> Option<Payload> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for a payload, waking as soon as one is pushed.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Payload> {
        match self.receiver.recv_timeout(timeout) {
            Ok(payload) => Some(payload),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Remove everything currently queued, in FIFO order.
    pub fn drain(&self) -> Vec<Payload> {
        self.receiver.try_iter().collect()
    }

    /// Discard everything currently queued. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        self.receiver.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBuffer").field("len", &self.len()).finish()
    }
}

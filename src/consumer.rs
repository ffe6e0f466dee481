//! Consumer-side dequeue protocol.
//!
//! All operations first resolve the event's buffer through the registry and
//! fail with [`ClientError::NotSubscribed`] if there is no active
//! subscription. An empty buffer is `Ok(None)`, never an error.
//!
//! Waiting comes in two flavours, picked by [`WaitStrategy`]:
//! - `Poll` sleeps one interval between attempts. Latency is up to one
//!   interval, and delivery never has to wake anybody.
//! - `Notify` blocks on the buffer itself and returns as soon as a payload is
//!   pushed, waiting in slices of at most one interval.
//!
//! Between attempts the subscription is re-checked, so a wait on an event
//! that gets unsubscribed ends with `NotSubscribed` instead of running on.
//! No lock is held while sleeping.

use crate::buffer::EventBuffer;
use crate::error::{ClientError, Result};
use crate::subscriptions::SubscriptionRegistry;
use crate::types::{EventName, Payload};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Floor for the wait interval. A zero interval would turn polling into a
/// busy spin.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How a waiting dequeue sleeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Sleep a fixed interval between attempts.
    #[default]
    Poll,
    /// Wake on push.
    Notify,
}

/// Total time a dequeue may wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitTimeout {
    /// Single attempt.
    Immediate,
    /// Wait until a payload arrives.
    Infinite,
    /// Give up once this much time has elapsed.
    Total(Duration),
}

impl WaitTimeout {
    /// Millisecond sentinel for [`WaitTimeout::Infinite`].
    pub const INFINITE_MILLIS: i64 = -1;

    /// `0` is immediate, `-1` is infinite, positive values are a total wait.
    pub fn from_millis(ms: i64) -> Result<Self> {
        match ms {
            0 => Ok(WaitTimeout::Immediate),
            Self::INFINITE_MILLIS => Ok(WaitTimeout::Infinite),
            ms if ms > 0 => Ok(WaitTimeout::Total(Duration::from_millis(ms as u64))),
            ms => Err(ClientError::InvalidTimeout(ms)),
        }
    }

    fn total(self) -> Option<Duration> {
        match self {
            WaitTimeout::Immediate => Some(Duration::ZERO),
            WaitTimeout::Infinite => None,
            WaitTimeout::Total(total) => Some(total),
        }
    }
}

impl From<Duration> for WaitTimeout {
    fn from(total: Duration) -> Self {
        if total.is_zero() {
            WaitTimeout::Immediate
        } else {
            WaitTimeout::Total(total)
        }
    }
}

/// Drains event buffers. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct Consumer {
    registry: Arc<SubscriptionRegistry>,
    strategy: WaitStrategy,
    interval: Duration,
}

impl Consumer {
    /// `interval` is raised to [`MIN_POLL_INTERVAL`] if shorter.
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        strategy: WaitStrategy,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            strategy,
            interval: interval.max(MIN_POLL_INTERVAL),
        }
    }

    pub fn strategy(&self) -> WaitStrategy {
        self.strategy
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Single non-blocking attempt.
    pub fn try_dequeue(&self, event: &str) -> Result<Option<Payload>> {
        Ok(self.lookup(event)?.try_pop())
    }

    /// Wait until a payload arrives.
    pub fn dequeue(&self, event: &str) -> Result<Payload> {
        // Infinite waits only end with a payload or an error.
        self.dequeue_timeout(event, WaitTimeout::Infinite)?
            .ok_or_else(|| ClientError::NotSubscribed(EventName::from(event)))
    }

    /// Millisecond form of [`dequeue_timeout`](Self::dequeue_timeout):
    /// `0` is a single attempt, `-1` waits forever.
    pub fn dequeue_with_timeout(&self, event: &str, total_ms: i64) -> Result<Option<Payload>> {
        self.dequeue_timeout(event, WaitTimeout::from_millis(total_ms)?)
    }

    /// Wait up to `timeout` for a payload. `Ok(None)` once the wait expires.
    pub fn dequeue_timeout(&self, event: &str, timeout: WaitTimeout) -> Result<Option<Payload>> {
        let buffer = self.lookup(event)?;
        if let Some(payload) = buffer.try_pop() {
            return Ok(Some(payload));
        }

        let total = timeout.total();
        if total == Some(Duration::ZERO) {
            return Ok(None);
        }

        let interval = match total {
            Some(total) => self.interval.min(total),
            None => self.interval,
        };
        let started = Instant::now();

        loop {
            let payload = match self.strategy {
                WaitStrategy::Poll => {
                    thread::sleep(interval);
                    buffer.try_pop()
                }
                WaitStrategy::Notify => {
                    let slice = match total {
                        Some(total) => interval.min(total.saturating_sub(started.elapsed())),
                        None => interval,
                    };
                    buffer.pop_timeout(slice)
                }
            };
            if payload.is_some() {
                return Ok(payload);
            }

            if let Some(total) = total {
                if started.elapsed() >= total {
                    return Ok(None);
                }
            }
            if !self.registry.is_active(event) {
                return Err(ClientError::NotSubscribed(EventName::from(event)));
            }
        }
    }

    /// Everything currently buffered, oldest first. Keeps draining until the
    /// buffer is observed empty.
    pub fn dequeue_all(&self, event: &str) -> Result<Vec<Payload>> {
        Ok(self.lookup(event)?.drain())
    }

    fn lookup(&self, event: &str) -> Result<Arc<EventBuffer>> {
        self.registry
            .buffer(event)
            .ok_or_else(|| ClientError::NotSubscribed(EventName::from(event)))
    }
}

//! Subscription types.

use crate::transport::EventRegistration;
use crate::types::EventName;
use std::fmt;

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Live registration for one event name.
///
/// Dropping a handle does NOT cancel the transport registration; call
/// [`dispose`](Self::dispose).
pub struct SubscriptionHandle {
    id: SubscriptionId,
    event: EventName,
    registration: Box<dyn EventRegistration>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: SubscriptionId,
        event: EventName,
        registration: Box<dyn EventRegistration>,
    ) -> Self {
        Self {
            id,
            event,
            registration,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn event(&self) -> &EventName {
        &self.event
    }

    /// Cancel the transport registration.
    pub fn dispose(self) {
        self.registration.cancel();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Registry entry for an event name.
pub(crate) enum Slot {
    /// Reserved, transport registration not confirmed yet.
    Pending,
    Active(SubscriptionHandle),
}

impl Slot {
    pub(crate) fn state(&self) -> SlotState {
        match self {
            Slot::Pending => SlotState::Pending,
            Slot::Active(_) => SlotState::Active,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(self, Slot::Active(_))
    }

    pub(crate) fn id(&self) -> Option<SubscriptionId> {
        match self {
            Slot::Pending => None,
            Slot::Active(handle) => Some(handle.id()),
        }
    }

    pub(crate) fn into_handle(self) -> Option<SubscriptionHandle> {
        match self {
            Slot::Pending => None,
            Slot::Active(handle) => Some(handle),
        }
    }
}

/// Observable state of a registry entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Pending,
    Active,
}

/// Point-in-time registry counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Entries of any state.
    pub subscriptions: usize,
    /// Entries still waiting for the transport.
    pub pending: usize,
    /// Buffers ever created (they outlive subscriptions).
    pub buffers: usize,
    /// Payloads waiting across all buffers.
    pub buffered_payloads: usize,
}

//! Registry tying event names to transport registrations and buffers.

use crate::buffer::EventBuffer;
use crate::error::{ClientError, Result};
use crate::transport::{DeliveryCallback, HubTransport};
use crate::types::{EventName, Payload};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::types::{RegistryStats, Slot, SlotState, SubscriptionHandle, SubscriptionId};

/// At most one subscription per event name, plus one buffer per event name
/// that lives as long as the registry.
///
/// Both maps are sharded, so unrelated event streams never contend on a
/// single lock.
pub struct SubscriptionRegistry {
    /// Subscription entries by event name.
    slots: DashMap<EventName, Slot>,
    /// Buffers by event name. Created lazily, never removed.
    buffers: DashMap<EventName, Arc<EventBuffer>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Discard buffered payloads on unsubscribe.
    clear_on_unsubscribe: bool,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::with_clear_on_unsubscribe(false)
    }

    pub fn with_clear_on_unsubscribe(clear: bool) -> Self {
        Self {
            slots: DashMap::new(),
            buffers: DashMap::new(),
            next_id: AtomicU64::new(1),
            clear_on_unsubscribe: clear,
        }
    }

    /// Register `event` with the transport and route its deliveries into the
    /// event's buffer.
    ///
    /// On failure no entry is left behind for `event` (unless it already
    /// existed, in which case it is untouched).
    pub fn subscribe<T>(&self, event: &EventName, transport: &T) -> Result<SubscriptionId>
    where
        T: HubTransport + ?Sized,
    {
        let reserved = match self.slots.entry(event.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Pending);
                true
            }
        };
        if !reserved {
            debug!(event = %event, subscriptions = self.slots.len(), "Already subscribed");
            return Err(ClientError::AlreadySubscribed(event.clone()));
        }

        let buffer = self.buffer_entry(event);
        let registration = match transport.on_event(event, delivery_callback(event, buffer)) {
            Some(registration) => registration,
            None => {
                self.slots.remove_if(event, |_, slot| !slot.is_active());
                debug!(event = %event, subscriptions = self.slots.len(), "Transport refused handler");
                return Err(ClientError::HandlerRejected(event.clone()));
            }
        };

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let handle = SubscriptionHandle::new(id, event.clone(), registration);

        // The Pending entry belongs to this call: `unsubscribe` and `rollback`
        // never remove it. Only direct removal through the map can get here,
        // and then the fresh registration must not outlive the entry.
        let leftover = match self.slots.get_mut(event) {
            Some(mut slot) if !slot.is_active() => {
                *slot = Slot::Active(handle);
                None
            }
            _ => Some(handle),
        };
        if let Some(handle) = leftover {
            handle.dispose();
            debug!(event = %event, subscriptions = self.slots.len(), "Entry changed while registering");
            return Err(ClientError::RegistrationRace(event.clone()));
        }

        Ok(id)
    }

    /// Remove and dispose the active subscription for `event`.
    pub fn unsubscribe(&self, event: &str) -> Result<()> {
        let removed = self.slots.remove_if(event, |_, slot| slot.is_active());
        let handle = match removed.and_then(|(_, slot)| slot.into_handle()) {
            Some(handle) => handle,
            None => {
                let pending = self.slots.contains_key(event);
                debug!(event = %event, subscriptions = self.slots.len(), pending, "Unsubscribe failed");
                return Err(if pending {
                    ClientError::RegistrationPending(EventName::from(event))
                } else {
                    ClientError::NotSubscribed(EventName::from(event))
                });
            }
        };

        handle.dispose();

        if self.clear_on_unsubscribe {
            if let Some(buffer) = self.buffers.get(event) {
                let dropped = buffer.clear();
                if dropped > 0 {
                    debug!(event = %event, dropped, "Cleared buffer on unsubscribe");
                }
            }
        }
        Ok(())
    }

    /// Unsubscribe every active entry. Returns how many were removed.
    pub fn unsubscribe_all(&self) -> usize {
        let names: Vec<EventName> = self
            .slots
            .iter()
            .filter(|entry| entry.value().is_active())
            .map(|entry| entry.key().clone())
            .collect();

        names
            .iter()
            .filter(|name| self.unsubscribe(name.as_str()).is_ok())
            .count()
    }

    /// Undo a subscription that could not be completed. Only removes the
    /// entry if it is still the one identified by `id`.
    pub fn rollback(&self, event: &str, id: SubscriptionId) -> bool {
        match self.slots.remove_if(event, |_, slot| slot.id() == Some(id)) {
            Some((_, slot)) => {
                if let Some(handle) = slot.into_handle() {
                    handle.dispose();
                }
                true
            }
            None => false,
        }
    }

    /// Buffer for `event`, only while it has an active subscription.
    pub fn buffer(&self, event: &str) -> Option<Arc<EventBuffer>> {
        if !self.is_active(event) {
            return None;
        }
        self.buffers.get(event).map(|b| Arc::clone(b.value()))
    }

    pub fn is_active(&self, event: &str) -> bool {
        self.slots.get(event).map_or(false, |slot| slot.is_active())
    }

    pub fn state(&self, event: &str) -> Option<SlotState> {
        self.slots.get(event).map(|slot| slot.state())
    }

    /// Payloads waiting for `event`, whether or not it is subscribed.
    pub fn buffered(&self, event: &str) -> usize {
        self.buffers.get(event).map_or(0, |b| b.len())
    }

    /// Event names with an active subscription.
    pub fn event_names(&self) -> Vec<EventName> {
        self.slots
            .iter()
            .filter(|entry| entry.value().is_active())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Active subscriptions only; entries still registering are left out.
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().is_active())
            .count()
    }

    /// Entries of any state, pending included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let pending = self
            .slots
            .iter()
            .filter(|entry| !entry.value().is_active())
            .count();
        let buffered_payloads = self.buffers.iter().map(|b| b.value().len()).sum();

        RegistryStats {
            subscriptions: self.slots.len(),
            pending,
            buffers: self.buffers.len(),
            buffered_payloads,
        }
    }

    fn buffer_entry(&self, event: &EventName) -> Arc<EventBuffer> {
        let entry = self
            .buffers
            .entry(event.clone())
            .or_insert_with(|| Arc::new(EventBuffer::new()));
        Arc::clone(entry.value())
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn delivery_callback(event: &EventName, buffer: Arc<EventBuffer>) -> DeliveryCallback {
    let event = event.clone();
    Arc::new(move |payload: Payload| {
        trace!(event = %event, bytes = payload.len(), "Enqueue payload");
        buffer.push(payload);
    })
}

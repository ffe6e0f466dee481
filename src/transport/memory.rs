//! Loopback transport that delivers in-process.

use super::{DeliveryCallback, EventRegistration, HubTransport};
use crate::config::HubEndpoint;
use crate::error::TransportError;
use crate::types::{EventName, Payload};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared hub state. Clones of [`InMemoryHub`] all point here.
#[derive(Default)]
struct HubState {
    endpoint: Option<HubEndpoint>,
    /// Live registrations: event -> (registration id, callback).
    handlers: RwLock<HashMap<EventName, Vec<(u64, DeliveryCallback)>>>,
    next_id: AtomicU64,
    connected: AtomicBool,
    closed: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    /// Error returned by the next connect attempts, if set.
    connect_failure: RwLock<Option<String>>,
    /// Events whose registrations are refused.
    refused: RwLock<HashSet<EventName>>,
}

/// In-process hub. Cloning yields another handle to the same hub, so a test
/// can keep one clone while the connection owns another.
#[derive(Clone, Default)]
pub struct InMemoryHub {
    state: Arc<HubState>,
}

impl InMemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub that remembers the endpoint it was built for.
    pub fn for_endpoint(endpoint: &HubEndpoint) -> Self {
        Self {
            state: Arc::new(HubState {
                endpoint: Some(endpoint.clone()),
                ..Default::default()
            }),
        }
    }

    pub fn endpoint(&self) -> Option<&HubEndpoint> {
        self.state.endpoint.as_ref()
    }

    /// Deliver `payload` to every live registration for `event`.
    ///
    /// Returns how many callbacks ran. Nothing is delivered while the hub is
    /// disconnected.
    pub fn deliver(&self, event: &str, payload: impl Into<Payload>) -> usize {
        if !self.is_connected() {
            return 0;
        }

        // Snapshot so callbacks run without the lock held.
        let callbacks: Vec<DeliveryCallback> = match self.state.handlers.read().get(event) {
            Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return 0,
        };

        let payload = payload.into();
        for cb in &callbacks {
            cb(payload.clone());
        }
        callbacks.len()
    }

    /// Make subsequent `connect` calls fail with `reason` (`None` to heal).
    pub fn fail_connect(&self, reason: Option<&str>) {
        *self.state.connect_failure.write() = reason.map(str::to_string);
    }

    /// Refuse (or stop refusing) registrations for `event`.
    pub fn refuse_event(&self, event: &str, refuse: bool) {
        let mut refused = self.state.refused.write();
        if refuse {
            refused.insert(EventName::from(event));
        } else {
            refused.remove(event);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Live registrations for `event`.
    pub fn registration_count(&self, event: &str) -> usize {
        self.state.handlers.read().get(event).map_or(0, Vec::len)
    }

    /// Live registrations across all events.
    pub fn total_registrations(&self) -> usize {
        self.state.handlers.read().values().map(Vec::len).sum()
    }
}

impl HubTransport for InMemoryHub {
    fn connect(&self) -> Result<(), TransportError> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if let Some(reason) = self.state.connect_failure.read().clone() {
            return Err(TransportError::Connect(reason));
        }
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        self.state.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.state.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn on_event(
        &self,
        event: &EventName,
        callback: DeliveryCallback,
    ) -> Option<Box<dyn EventRegistration>> {
        if self.is_closed() || self.state.refused.read().contains(event) {
            return None;
        }

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        self.state
            .handlers
            .write()
            .entry(event.clone())
            .or_default()
            .push((id, callback));

        Some(Box::new(MemoryRegistration {
            state: Arc::clone(&self.state),
            event: event.clone(),
            id,
        }))
    }

    fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.connected.store(false, Ordering::SeqCst);
    }
}

struct MemoryRegistration {
    state: Arc<HubState>,
    event: EventName,
    id: u64,
}

impl EventRegistration for MemoryRegistration {
    fn cancel(self: Box<Self>) {
        let mut handlers = self.state.handlers.write();
        if let Some(list) = handlers.get_mut(&self.event) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                handlers.remove(&self.event);
            }
        }
    }
}

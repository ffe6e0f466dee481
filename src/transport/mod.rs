//! Transport contract the connection is built on.
//!
//! A transport owns the persistent link to the hub. The client only needs
//! three things from it:
//! - `connect` / `disconnect` of the link
//! - per-event delivery callbacks, each returned as a cancellable registration
//!
//! [`InMemoryHub`] is a loopback implementation useful for tests and local
//! wiring.

mod memory;

pub use memory::InMemoryHub;

use crate::error::TransportError;
use crate::types::{EventName, Payload};
use std::sync::Arc;

/// Invoked by the transport for every payload delivered under one event name.
/// May be called from any thread, concurrently with everything else.
pub type DeliveryCallback = Arc<dyn Fn(Payload) + Send + Sync>;

/// A live delivery registration. Must be cancelled explicitly.
pub trait EventRegistration: Send + Sync {
    /// Stop delivering to the callback this registration was created for.
    fn cancel(self: Box<Self>);
}

/// Persistent connection to a hub.
pub trait HubTransport: Send + Sync {
    /// Open the link, blocking until the hub reports ready.
    fn connect(&self) -> Result<(), TransportError>;

    /// Close the link.
    fn disconnect(&self) -> Result<(), TransportError>;

    /// Route payloads for `event` to `callback`. `None` if the transport
    /// refuses the registration.
    fn on_event(
        &self,
        event: &EventName,
        callback: DeliveryCallback,
    ) -> Option<Box<dyn EventRegistration>>;

    /// Release transport resources. Called once during shutdown.
    fn close(&self) {}
}

impl<T: HubTransport + ?Sized> HubTransport for Arc<T> {
    fn connect(&self) -> Result<(), TransportError> {
        (**self).connect()
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        (**self).disconnect()
    }

    fn on_event(
        &self,
        event: &EventName,
        callback: DeliveryCallback,
    ) -> Option<Box<dyn EventRegistration>> {
        (**self).on_event(event, callback)
    }

    fn close(&self) {
        (**self).close()
    }
}

impl<T: HubTransport + ?Sized> HubTransport for Box<T> {
    fn connect(&self) -> Result<(), TransportError> {
        (**self).connect()
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        (**self).disconnect()
    }

    fn on_event(
        &self,
        event: &EventName,
        callback: DeliveryCallback,
    ) -> Option<Box<dyn EventRegistration>> {
        (**self).on_event(event, callback)
    }

    fn close(&self) {
        (**self).close()
    }
}

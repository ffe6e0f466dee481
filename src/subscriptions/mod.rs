//! Subscription bookkeeping for hub events.
//!
//! Each event name maps to:
//! - at most one transport registration (a [`SubscriptionHandle`])
//! - one [`EventBuffer`](crate::buffer::EventBuffer) that collects delivered
//!   payloads and outlives the subscription
//!
//! An entry is `Pending` between reservation and transport confirmation and
//! is never readable in that state.
//!
//! # Example
//!
//! ```
//! use hub_client::{InMemoryHub, HubTransport, SubscriptionRegistry};
//!
//! let hub = InMemoryHub::new();
//! hub.connect().unwrap();
//!
//! let registry = SubscriptionRegistry::new();
//! registry.subscribe(&"ping".into(), &hub).unwrap();
//!
//! hub.deliver("ping", "pong");
//! let buffer = registry.buffer("ping").unwrap();
//! assert_eq!(buffer.try_pop().as_deref(), Some("pong"));
//!
//! registry.unsubscribe("ping").unwrap();
//! ```

mod registry;
mod types;

pub use registry::SubscriptionRegistry;
pub use types::{RegistryStats, SlotState, SubscriptionHandle, SubscriptionId};

//! # Hub Client
//!
//! Client-side subscription manager for publish/subscribe messaging hubs.
//!
//! ## Core Concepts
//!
//! - **Transport**: the persistent link to the hub, behind [`HubTransport`]
//! - **Subscriptions**: at most one per event name, tracked by the
//!   [`SubscriptionRegistry`]
//! - **Buffers**: an unbounded FIFO per event name that collects delivered
//!   payloads until a consumer drains them
//! - **Consumers**: non-blocking, blocking and time-bounded dequeue
//!
//! The transport is connected lazily on the first subscription and
//! disconnected when the last one is removed.
//!
//! ## Example
//!
//! ```
//! use hub_client::{ConnectionConfig, HubConnection, InMemoryHub};
//!
//! let hub = InMemoryHub::new();
//! let remote = hub.clone();
//! let conn = HubConnection::new(
//!     ConnectionConfig::new("https://hub.example/", "cmds"),
//!     move |_endpoint| Ok(remote),
//! )?;
//!
//! conn.subscribe("ping")?;
//! hub.deliver("ping", "pong1");
//!
//! assert_eq!(conn.try_dequeue("ping")?.as_deref(), Some("pong1"));
//! assert_eq!(conn.try_dequeue("ping")?, None);
//!
//! conn.unsubscribe("ping")?;
//! assert!(conn.try_dequeue("ping").is_err());
//! # Ok::<(), hub_client::ClientError>(())
//! ```

pub mod buffer;
pub mod config;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod subscriptions;
pub mod transport;
pub mod types;

// Re-exports
pub use buffer::EventBuffer;
pub use config::{ConnectionConfig, Credentials, HubEndpoint, DEFAULT_POLL_INTERVAL_MS};
pub use connection::{HubConnection, LinkState};
pub use consumer::{Consumer, WaitStrategy, WaitTimeout, MIN_POLL_INTERVAL};
pub use error::{ClientError, ConfigError, Result, TransportError};
pub use subscriptions::{
    RegistryStats, SlotState, SubscriptionHandle, SubscriptionId, SubscriptionRegistry,
};
pub use transport::{DeliveryCallback, EventRegistration, HubTransport, InMemoryHub};
pub use types::*;

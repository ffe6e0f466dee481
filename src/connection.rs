//! Hub connection tying transport, registry and consumers together.

use crate::config::{ConnectionConfig, HubEndpoint};
use crate::consumer::{Consumer, WaitTimeout};
use crate::error::{ClientError, Result, TransportError};
use crate::subscriptions::{RegistryStats, SubscriptionRegistry};
use crate::transport::HubTransport;
use crate::types::{EventName, Payload};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Transport link state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    /// Built but not connected (initial state).
    Stopped,
    /// Connected; at least one subscription was made since the last stop.
    Started,
    /// Shut down. Terminal.
    Closed,
}

/// Client connection to one hub.
///
/// The transport is built at construction but only connected on the first
/// successful subscription, and disconnected again when the last subscription
/// is removed. [`shutdown`](Self::shutdown) (or dropping the connection)
/// removes every subscription and releases the transport.
pub struct HubConnection<T: HubTransport> {
    endpoint: HubEndpoint,
    transport: T,
    registry: Arc<SubscriptionRegistry>,
    consumer: Consumer,
    /// Guards connect/disconnect; the idle check for stopping runs under it.
    link: Mutex<LinkState>,
}

impl<T: HubTransport> HubConnection<T> {
    /// Validate `config` and build (but do not connect) the transport.
    pub fn new<F>(config: ConnectionConfig, build: F) -> Result<Self>
    where
        F: FnOnce(&HubEndpoint) -> std::result::Result<T, TransportError>,
    {
        let endpoint = config.validate()?;
        let transport = build(&endpoint)?;

        let registry = Arc::new(SubscriptionRegistry::with_clear_on_unsubscribe(
            config.clear_on_unsubscribe,
        ));
        let consumer = Consumer::new(
            Arc::clone(&registry),
            config.wait_strategy,
            config.poll_interval,
        );

        info!(
            address = %endpoint.address,
            hub = %endpoint.hub_name,
            "Hub connection configured"
        );

        Ok(Self {
            endpoint,
            transport,
            registry,
            consumer,
            link: Mutex::new(LinkState::Stopped),
        })
    }

    pub fn endpoint(&self) -> &HubEndpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn link_state(&self) -> LinkState {
        *self.link.lock()
    }

    // --- Subscriptions ---

    /// Subscribe to `event`, connecting the transport if this is the first
    /// subscription.
    ///
    /// Any failure after the registry entry was created rolls it back.
    pub fn subscribe(&self, event: impl Into<EventName>) -> Result<()> {
        let event = event.into();
        if self.link_state() == LinkState::Closed {
            return Err(ClientError::Closed);
        }

        let id = self.registry.subscribe(&event, &self.transport)?;

        if let Err(e) = self.ensure_started() {
            debug!(
                event = %event,
                subscriptions = self.registry.len(),
                error = %e,
                "Rolling back subscription"
            );
            self.registry.rollback(event.as_str(), id);
            self.stop_if_idle();
            return Err(e);
        }

        debug!(event = %event, subscriptions = self.registry.len(), "Subscribed");
        Ok(())
    }

    /// Remove the subscription for `event`, disconnecting if it was the last.
    pub fn unsubscribe(&self, event: &str) -> Result<()> {
        self.registry.unsubscribe(event)?;
        debug!(event = %event, subscriptions = self.registry.len(), "Unsubscribed");
        self.stop_if_idle();
        Ok(())
    }

    /// Remove every subscription. Returns how many were removed.
    pub fn unsubscribe_all(&self) -> usize {
        let removed = self.registry.unsubscribe_all();
        self.stop_if_idle();
        removed
    }

    pub fn is_subscribed(&self, event: &str) -> bool {
        self.registry.is_active(event)
    }

    pub fn subscribed_events(&self) -> Vec<EventName> {
        self.registry.event_names()
    }

    /// Active subscriptions. Subscribes still waiting on the transport are
    /// not counted; see [`stats`](Self::stats) for those.
    pub fn subscription_count(&self) -> usize {
        self.registry.active_count()
    }

    /// Payloads waiting for `event`, subscribed or not.
    pub fn buffered_count(&self, event: &str) -> usize {
        self.registry.buffered(event)
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    // --- Consumption ---

    /// A consumer sharing this connection's buffers, for use on other threads.
    pub fn consumer(&self) -> Consumer {
        self.consumer.clone()
    }

    pub fn try_dequeue(&self, event: &str) -> Result<Option<Payload>> {
        self.consumer.try_dequeue(event)
    }

    pub fn dequeue(&self, event: &str) -> Result<Payload> {
        self.consumer.dequeue(event)
    }

    pub fn dequeue_with_timeout(&self, event: &str, total_ms: i64) -> Result<Option<Payload>> {
        self.consumer.dequeue_with_timeout(event, total_ms)
    }

    pub fn dequeue_timeout(&self, event: &str, timeout: WaitTimeout) -> Result<Option<Payload>> {
        self.consumer.dequeue_timeout(event, timeout)
    }

    pub fn dequeue_all(&self, event: &str) -> Result<Vec<Payload>> {
        self.consumer.dequeue_all(event)
    }

    // --- Lifecycle ---

    /// Unsubscribe everything, disconnect and release the transport.
    ///
    /// Idempotent. Later subscribes fail with [`ClientError::Closed`]. A
    /// disconnect failure is reported after teardown has completed.
    pub fn shutdown(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.link.lock(), LinkState::Closed);
        if previous == LinkState::Closed {
            return Ok(());
        }

        let removed = self.registry.unsubscribe_all();
        info!(
            hub = %self.endpoint.hub_name,
            removed,
            "Shutting down hub connection"
        );

        let result = if previous == LinkState::Started {
            self.transport.disconnect().map_err(ClientError::from)
        } else {
            Ok(())
        };
        self.transport.close();
        result
    }

    fn ensure_started(&self) -> Result<()> {
        let mut link = self.link.lock();
        match *link {
            LinkState::Started => Ok(()),
            LinkState::Closed => Err(ClientError::Closed),
            LinkState::Stopped => {
                info!(address = %self.endpoint.address, hub = %self.endpoint.hub_name, "Connecting");
                self.transport.connect()?;
                *link = LinkState::Started;
                info!(hub = %self.endpoint.hub_name, "Connected");
                Ok(())
            }
        }
    }

    fn stop_if_idle(&self) {
        let mut link = self.link.lock();
        if *link != LinkState::Started || !self.registry.is_empty() {
            return;
        }

        info!(hub = %self.endpoint.hub_name, "No subscriptions left, disconnecting");
        if let Err(e) = self.transport.disconnect() {
            warn!(hub = %self.endpoint.hub_name, error = %e, "Disconnect failed");
        }
        *link = LinkState::Stopped;
    }
}

impl<T: HubTransport> Drop for HubConnection<T> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(hub = %self.endpoint.hub_name, error = %e, "Shutdown on drop failed");
        }
    }
}

impl<T: HubTransport> std::fmt::Debug for HubConnection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConnection")
            .field("endpoint", &self.endpoint)
            .field("link", &self.link_state())
            .field("subscriptions", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryHub;

    fn open() -> (InMemoryHub, HubConnection<InMemoryHub>) {
        let hub = InMemoryHub::new();
        let shared = hub.clone();
        let conn = HubConnection::new(
            ConnectionConfig::new("https://hub.example/", "cmds"),
            move |_| Ok(shared),
        )
        .unwrap();
        (hub, conn)
    }

    #[test]
    fn test_initially_stopped() {
        let (hub, conn) = open();
        assert_eq!(conn.link_state(), LinkState::Stopped);
        assert_eq!(hub.connect_calls(), 0);
    }

    #[test]
    fn test_connects_once_per_active_period() {
        let (hub, conn) = open();

        conn.subscribe("a").unwrap();
        conn.subscribe("b").unwrap();
        assert_eq!(hub.connect_calls(), 1);
        assert_eq!(conn.link_state(), LinkState::Started);

        conn.unsubscribe("a").unwrap();
        assert_eq!(hub.disconnect_calls(), 0);
        conn.unsubscribe("b").unwrap();
        assert_eq!(hub.disconnect_calls(), 1);
        assert_eq!(conn.link_state(), LinkState::Stopped);

        conn.subscribe("c").unwrap();
        assert_eq!(hub.connect_calls(), 2);
    }

    #[test]
    fn test_connect_failure_rolls_back() {
        let (hub, conn) = open();
        hub.fail_connect(Some("unreachable"));

        let result = conn.subscribe("ping");
        assert!(matches!(
            result,
            Err(ClientError::Transport(TransportError::Connect(_)))
        ));
        assert!(!conn.is_subscribed("ping"));
        assert_eq!(conn.subscription_count(), 0);
        assert_eq!(hub.total_registrations(), 0);
        assert_eq!(conn.link_state(), LinkState::Stopped);

        hub.fail_connect(None);
        conn.subscribe("ping").unwrap();
        assert_eq!(conn.link_state(), LinkState::Started);
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let (hub, conn) = open();
        conn.subscribe("ping").unwrap();

        conn.shutdown().unwrap();
        assert_eq!(conn.link_state(), LinkState::Closed);
        assert_eq!(conn.subscription_count(), 0);
        assert_eq!(hub.disconnect_calls(), 1);
        assert!(hub.is_closed());

        assert!(matches!(conn.subscribe("ping"), Err(ClientError::Closed)));
        conn.shutdown().unwrap();
        assert_eq!(hub.disconnect_calls(), 1);
    }

    #[test]
    fn test_drop_tears_down() {
        let (hub, conn) = open();
        conn.subscribe("ping").unwrap();
        drop(conn);

        assert_eq!(hub.total_registrations(), 0);
        assert!(!hub.is_connected());
        assert!(hub.is_closed());
    }

    #[test]
    fn test_factory_sees_endpoint() {
        let conn = HubConnection::new(
            ConnectionConfig::new("https://hub.example/signalr", "cmds").basic_auth("svc", "pw"),
            |endpoint| Ok(InMemoryHub::for_endpoint(endpoint)),
        )
        .unwrap();

        let endpoint = conn.transport().endpoint().unwrap();
        assert_eq!(endpoint.absolute_uri(), "https://hub.example/signalr");
        assert_eq!(endpoint.hub_name, "cmds");
    }

    #[test]
    fn test_factory_error_propagates() {
        let result: Result<HubConnection<InMemoryHub>> = HubConnection::new(
            ConnectionConfig::new("https://hub.example/", "cmds"),
            |_| Err(TransportError::Connect("no route".into())),
        );
        assert!(matches!(result, Err(ClientError::Transport(_))));
    }
}

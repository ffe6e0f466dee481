//! Integration tests for the hub client.

use hub_client::{
    ConnectionConfig, Credentials, HubConnection, InMemoryHub, LinkState, WaitStrategy,
    WaitTimeout,
};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn open_with(config: ConnectionConfig) -> (InMemoryHub, HubConnection<InMemoryHub>) {
    init_logging();
    let hub = InMemoryHub::new();
    let remote = hub.clone();
    let conn = HubConnection::new(config, move |_| Ok(remote)).unwrap();
    (hub, conn)
}

fn open() -> (InMemoryHub, HubConnection<InMemoryHub>) {
    open_with(ConnectionConfig::new("https://hub.example/", "cmds"))
}

// --- Realistic Workflow Tests ---

#[test]
fn test_ping_pong_scenario() {
    let (hub, conn) = open();

    conn.subscribe("ping").unwrap();
    hub.deliver("ping", "pong1");

    assert_eq!(conn.try_dequeue("ping").unwrap().as_deref(), Some("pong1"));
    assert_eq!(conn.try_dequeue("ping").unwrap(), None);

    conn.unsubscribe("ping").unwrap();
    assert!(conn.try_dequeue("ping").is_err());
}

#[test]
fn test_fifo_per_event() {
    let (hub, conn) = open();
    conn.subscribe("orders").unwrap();
    conn.subscribe("alerts").unwrap();

    hub.deliver("orders", "p1");
    hub.deliver("alerts", "a1");
    hub.deliver("orders", "p2");
    hub.deliver("orders", "p3");

    assert_eq!(conn.dequeue_all("orders").unwrap(), vec!["p1", "p2", "p3"]);
    assert_eq!(conn.dequeue_all("alerts").unwrap(), vec!["a1"]);
    assert!(conn.dequeue_all("orders").unwrap().is_empty());
}

#[test]
fn test_blocking_dequeue_receives_later_delivery() {
    let (hub, conn) = open_with(
        ConnectionConfig::new("https://hub.example/", "cmds").poll_interval(Duration::from_millis(10)),
    );
    conn.subscribe("jobs").unwrap();

    let producer = hub.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        producer.deliver("jobs", "job-1");
    });

    assert_eq!(conn.dequeue("jobs").unwrap(), "job-1");
    handle.join().unwrap();
}

#[test]
fn test_zero_timeout_matches_try_dequeue() {
    let (hub, conn) = open();
    conn.subscribe("ping").unwrap();

    let start = Instant::now();
    assert_eq!(conn.dequeue_with_timeout("ping", 0).unwrap(), None);
    assert_eq!(conn.try_dequeue("ping").unwrap(), None);
    assert!(start.elapsed() < Duration::from_millis(50));

    hub.deliver("ping", "a");
    hub.deliver("ping", "b");
    assert_eq!(conn.dequeue_with_timeout("ping", 0).unwrap().as_deref(), Some("a"));
    assert_eq!(conn.try_dequeue("ping").unwrap().as_deref(), Some("b"));
}

#[test]
fn test_total_timeout_not_early() {
    let (_hub, conn) = open();
    conn.subscribe("ping").unwrap();

    let start = Instant::now();
    assert_eq!(conn.dequeue_with_timeout("ping", 500).unwrap(), None);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_millis(500 + 400));
}

#[test]
fn test_notify_strategy_timeout() {
    let (hub, conn) = open_with(
        ConnectionConfig::new("https://hub.example/", "cmds").wait_strategy(WaitStrategy::Notify),
    );
    conn.subscribe("ping").unwrap();

    let start = Instant::now();
    let got = conn
        .dequeue_timeout("ping", WaitTimeout::Total(Duration::from_millis(150)))
        .unwrap();
    assert_eq!(got, None);
    assert!(start.elapsed() >= Duration::from_millis(150));

    hub.deliver("ping", "now");
    let got = conn
        .dequeue_timeout("ping", Duration::from_millis(150).into())
        .unwrap();
    assert_eq!(got.as_deref(), Some("now"));
}

// --- Lifecycle ---

#[test]
fn test_lazy_connect_and_idle_disconnect() {
    let (hub, conn) = open();
    assert_eq!(hub.connect_calls(), 0);
    assert!(!hub.is_connected());

    conn.subscribe("a").unwrap();
    conn.subscribe("b").unwrap();
    conn.subscribe("c").unwrap();
    assert_eq!(hub.connect_calls(), 1);

    assert_eq!(conn.unsubscribe_all(), 3);
    assert_eq!(hub.disconnect_calls(), 1);
    assert_eq!(conn.link_state(), LinkState::Stopped);

    conn.subscribe("a").unwrap();
    assert_eq!(hub.connect_calls(), 2);
    assert!(hub.is_connected());
}

#[test]
fn test_buffer_survives_resubscribe() {
    let (hub, conn) = open();
    conn.subscribe("keep").unwrap();
    conn.subscribe("ping").unwrap();
    hub.deliver("ping", "unread");

    conn.unsubscribe("ping").unwrap();
    assert_eq!(conn.buffered_count("ping"), 1);

    conn.subscribe("ping").unwrap();
    assert_eq!(conn.try_dequeue("ping").unwrap().as_deref(), Some("unread"));
}

#[test]
fn test_clear_on_unsubscribe_drops_backlog() {
    let (hub, conn) = open_with(
        ConnectionConfig::new("https://hub.example/", "cmds").clear_on_unsubscribe(true),
    );
    conn.subscribe("ping").unwrap();
    hub.deliver("ping", "unread");

    conn.unsubscribe("ping").unwrap();
    conn.subscribe("ping").unwrap();
    assert_eq!(conn.try_dequeue("ping").unwrap(), None);
}

#[test]
fn test_unsubscribed_event_no_longer_delivered() {
    let (hub, conn) = open();
    conn.subscribe("keep").unwrap();
    conn.subscribe("ping").unwrap();
    conn.unsubscribe("ping").unwrap();

    assert_eq!(hub.deliver("ping", "lost"), 0);
    assert_eq!(conn.buffered_count("ping"), 0);
}

#[test]
fn test_shutdown_releases_everything() {
    let (hub, conn) = open();
    conn.subscribe("a").unwrap();
    conn.subscribe("b").unwrap();

    conn.shutdown().unwrap();
    assert_eq!(hub.total_registrations(), 0);
    assert!(!hub.is_connected());
    assert!(hub.is_closed());
    assert!(conn.subscribed_events().is_empty());
}

#[test]
fn test_stats_snapshot() {
    let (hub, conn) = open();
    conn.subscribe("a").unwrap();
    conn.subscribe("b").unwrap();
    hub.deliver("a", "1");
    hub.deliver("a", "2");

    let stats = conn.stats();
    assert_eq!(stats.subscriptions, 2);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.buffered_payloads, 2);
}

// --- Configuration ---

#[test]
fn test_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hub.json");
    std::fs::write(
        &path,
        r#"{
            "address": "https://hub.example/",
            "hub_name": "cmds",
            "credentials": { "kind": "basic", "username": "svc", "password": "secret" },
            "poll_interval_ms": 10
        }"#,
    )
    .unwrap();

    let config = ConnectionConfig::from_file(&path).unwrap();
    let conn = HubConnection::new(config, |endpoint| Ok(InMemoryHub::for_endpoint(endpoint)))
        .unwrap();

    assert_eq!(
        conn.endpoint().credentials,
        Credentials::basic("svc", "secret")
    );
    assert_eq!(conn.consumer().interval(), Duration::from_millis(10));
}

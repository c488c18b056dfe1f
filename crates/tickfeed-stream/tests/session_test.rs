use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tickfeed_core::types::{SessionState, Tick};
use tickfeed_stream::memory::MemoryTransport;
use tickfeed_stream::{SessionConfig, SessionController};
use tokio::sync::mpsc;

fn config() -> SessionConfig {
    SessionConfig {
        max_reconnect_attempts: 3,
        base_reconnect_delay: Duration::from_millis(100),
        ..SessionConfig::default()
    }
}

fn controller(transport: &MemoryTransport) -> (SessionController, mpsc::UnboundedReceiver<Tick>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = SessionController::new(config(), Arc::new(transport.clone()), Arc::new(tx));
    (controller, rx)
}

/// Let spawned tasks run to quiescence.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn subscribe(symbol: &str) -> serde_json::Value {
    json!({"ticks": symbol, "subscribe": 1})
}

fn tick_frame(symbol: &str, quote: f64) -> serde_json::Value {
    json!({"msg_type": "tick", "tick": {"symbol": symbol, "quote": quote, "epoch": 1700000000}})
}

#[tokio::test(start_paused = true)]
async fn test_symbol_set_before_open_subscribes_once() {
    let transport = MemoryTransport::new();
    transport.hold_opens();
    let (controller, _ticks) = controller(&transport);
    let handle = controller.start();

    handle.set_desired_symbol("R_100").unwrap();
    settle().await;
    assert!(transport.sent().is_empty());
    assert_eq!(handle.connection_status().state, SessionState::Connecting);
    assert!(!handle.is_connected());

    transport.release_opens();
    settle().await;

    assert_eq!(transport.sent_json(), vec![subscribe("R_100")]);
    let status = handle.connection_status();
    assert!(status.is_connected);
    assert_eq!(status.state, SessionState::Connected);
    assert_eq!(status.symbol.as_deref(), Some("R_100"));
    assert_eq!(status.error, None);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_symbol_switch_forgets_then_subscribes() {
    let transport = MemoryTransport::new();
    let (controller, _ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;
    transport.clear_sent();

    handle.set_desired_symbol("R_75").unwrap();
    settle().await;

    assert_eq!(
        transport.sent_json(),
        vec![json!({"forget_all": "ticks"}), subscribe("R_75")]
    );
    assert_eq!(handle.connection_status().symbol.as_deref(), Some("R_75"));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_repeated_symbol_sends_nothing() {
    let transport = MemoryTransport::new();
    let (controller, _ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;
    transport.clear_sent();

    for _ in 0..3 {
        handle.set_desired_symbol("R_100").unwrap();
    }
    handle.set_desired_symbol("   ").unwrap();
    settle().await;

    assert!(transport.sent().is_empty());
    assert_eq!(handle.connection_status().symbol.as_deref(), Some("R_100"));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_ticks_reach_sink_for_active_symbol_only() {
    let transport = MemoryTransport::new();
    let (controller, mut ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;

    transport.push_json(tick_frame("R_100", 123.45));
    settle().await;

    let tick = ticks.try_recv().unwrap();
    assert_eq!(tick.symbol, "R_100");
    assert_eq!(tick.price, 123.45);
    assert!(ticks.try_recv().is_err());

    handle.set_desired_symbol("R_75").unwrap();
    settle().await;

    // A late tick from the old stream is dropped.
    transport.push_json(tick_frame("R_100", 124.0));
    transport.push_json(tick_frame("R_75", 50.5));
    settle().await;

    let tick = ticks.try_recv().unwrap();
    assert_eq!(tick.symbol, "R_75");
    assert_eq!(tick.price, 50.5);
    assert!(ticks.try_recv().is_err());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_placeholder_token_never_sent() {
    let transport = MemoryTransport::new();
    let (controller, _ticks) = controller(&transport);
    let handle = controller
        .with_authorization("YOUR_API_KEY")
        .with_symbol("R_100")
        .start();
    settle().await;

    assert_eq!(transport.sent_json(), vec![subscribe("R_100")]);

    handle.set_authorization("").unwrap();
    handle.set_authorization("YOUR_API_KEY").unwrap();
    settle().await;
    assert_eq!(transport.sent_json(), vec![subscribe("R_100")]);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_real_token_authorizes_before_subscribe() {
    let transport = MemoryTransport::new();
    let (controller, _ticks) = controller(&transport);
    let handle = controller
        .with_authorization("real-token")
        .with_symbol("R_100")
        .start();
    settle().await;

    assert_eq!(
        transport.sent_json(),
        vec![json!({"authorize": "real-token"}), subscribe("R_100")]
    );

    // A new token while connected goes out immediately.
    transport.clear_sent();
    handle.set_authorization("second-token").unwrap();
    settle().await;
    assert_eq!(transport.sent_json(), vec![json!({"authorize": "second-token"})]);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhaust_then_stop() {
    let transport = MemoryTransport::new();
    let (controller, _ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;
    assert_eq!(transport.open_count(), 1);

    transport.fail_all_opens(true);
    transport.drop_link(Some(1006), "abnormal");
    settle().await;

    let status = handle.connection_status();
    assert_eq!(status.state, SessionState::Reconnecting);
    assert!(!status.is_connected);
    assert_eq!(status.error.as_deref(), Some("Connection lost: abnormal (1006)"));
    assert_eq!(status.symbol, None);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.open_count(), 4);

    let status = handle.connection_status();
    assert!(status.is_terminal());
    assert_eq!(status.state, SessionState::Closed);
    assert!(!status.is_connected);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.open_count(), 4);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_after_exhaustion() {
    let transport = MemoryTransport::new();
    let (controller, _ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;

    transport.fail_all_opens(true);
    transport.drop_link(None, "reset");
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(handle.connection_status().is_terminal());

    transport.fail_all_opens(false);
    transport.clear_sent();
    handle.request_reconnect().unwrap();
    settle().await;
    assert_eq!(handle.connection_status().state, SessionState::Reconnecting);
    assert_eq!(handle.last_error(), None);

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(transport.open_count(), 5);
    assert_eq!(transport.sent_json(), vec![subscribe("R_100")]);
    let status = handle.connection_status();
    assert!(status.is_connected);
    assert_eq!(status.error, None);
    assert_eq!(status.symbol.as_deref(), Some("R_100"));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_successful_reconnect_resets_backoff() {
    let transport = MemoryTransport::new();
    let (controller, _ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;

    transport.drop_link(Some(1006), "first");
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(transport.open_count(), 2);
    assert!(handle.is_connected());

    // Back to the first-retry delay, not the second.
    transport.drop_link(Some(1006), "second");
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(transport.open_count(), 3);
    assert!(handle.is_connected());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_retry() {
    let transport = MemoryTransport::new();
    let (controller, _ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;

    transport.drop_link(Some(1006), "gone");
    settle().await;
    assert_eq!(handle.connection_status().state, SessionState::Reconnecting);

    let status = handle.watch_status();
    handle.shutdown().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(transport.open_count(), 1);
    assert_eq!(status.borrow().state, SessionState::Closed);
    assert!(!status.borrow().is_connected);
}

#[tokio::test(start_paused = true)]
async fn test_symbol_change_during_reconnect_applied_once() {
    let transport = MemoryTransport::new();
    let (controller, _ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;
    transport.clear_sent();

    transport.fail_next_opens(1);
    transport.drop_link(Some(1006), "gone");
    settle().await;

    handle.set_desired_symbol("R_75").unwrap();
    settle().await;
    assert!(transport.sent().is_empty());

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(transport.open_count(), 3);
    assert_eq!(transport.sent_json(), vec![subscribe("R_75")]);
    let status = handle.connection_status();
    assert!(status.is_connected);
    assert_eq!(status.symbol.as_deref(), Some("R_75"));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_bad_frames_do_not_disturb_session() {
    let transport = MemoryTransport::new();
    let (controller, mut ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;

    transport.push_frame("not json");
    transport.push_json(json!({"tick": {"symbol": "R_100"}}));
    transport.push_json(json!({
        "msg_type": "ticks",
        "error": {"code": "InvalidSymbol", "message": "Symbol R_999 is invalid"}
    }));
    transport.push_json(tick_frame("R_100", 101.5));
    settle().await;

    let tick = ticks.try_recv().unwrap();
    assert_eq!(tick.price, 101.5);
    assert!(ticks.try_recv().is_err());
    assert!(handle.is_connected());
    assert_eq!(handle.last_error(), None);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_stops_session() {
    let transport = MemoryTransport::new();
    let (controller, _ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;

    let status = handle.watch_status();
    drop(handle);
    settle().await;

    assert_eq!(status.borrow().state, SessionState::Closed);
    transport.drop_link(Some(1006), "gone");
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_transport_is_retried() {
    let transport = MemoryTransport::new();
    transport.panic_next_opens(1);
    let (controller, _ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;

    let status = handle.connection_status();
    assert_eq!(status.state, SessionState::Reconnecting);
    assert!(status
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("Failed to connect to live data feed")));

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(transport.open_count(), 2);
    assert_eq!(transport.link_count(), 1);
    assert_eq!(transport.sent_json(), vec![subscribe("R_100")]);
    let status = handle.connection_status();
    assert!(status.is_connected);
    assert_eq!(status.error, None);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_cancels_pending_retry() {
    let transport = MemoryTransport::new();
    let (controller, _ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;
    transport.clear_sent();

    // First retry fails, the second is waiting on its 200ms backoff.
    transport.fail_next_opens(1);
    transport.drop_link(Some(1006), "gone");
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(transport.open_count(), 2);
    assert_eq!(handle.connection_status().state, SessionState::Reconnecting);

    handle.request_reconnect().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(transport.open_count(), 3);
    assert_eq!(transport.link_count(), 2);
    assert_eq!(transport.sent_json(), vec![subscribe("R_100")]);
    assert!(handle.is_connected());

    // The cancelled backoff retry never fires.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.open_count(), 3);
    assert_eq!(transport.sent_json(), vec![subscribe("R_100")]);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_during_connect_opens_one_link() {
    let transport = MemoryTransport::new();
    transport.hold_opens();
    let (controller, _ticks) = controller(&transport);
    let handle = controller.with_symbol("R_100").start();
    settle().await;
    assert_eq!(transport.open_count(), 1);

    handle.request_reconnect().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.open_count(), 2);
    assert_eq!(handle.connection_status().state, SessionState::Connecting);

    transport.release_opens();
    settle().await;

    assert_eq!(transport.link_count(), 1);
    assert_eq!(transport.sent_json(), vec![subscribe("R_100")]);
    assert!(handle.is_connected());

    handle.shutdown().await;
}

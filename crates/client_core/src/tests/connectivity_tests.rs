use super::*;
use std::sync::Arc;

use tokio::sync::Notify;

use crate::test_support::{drain_requests, expect_event, expect_request, Route, ScriptedTransport};

fn monitor_with(
    transport: Arc<ScriptedTransport>,
) -> (
    ConnectivityMonitor,
    Arc<AddressRegistry>,
    broadcast::Receiver<SessionEvent>,
) {
    let (events, rx) = broadcast::channel(64);
    let address = Arc::new(AddressRegistry::new(RobotAddress::new("10.0.0.5")));
    (
        ConnectivityMonitor::new(transport, Arc::clone(&address), Duration::from_secs(3), events),
        address,
        rx,
    )
}

fn is_connection(state: ConnectionState) -> impl Fn(&SessionEvent) -> bool {
    move |event| *event == SessionEvent::ConnectionChanged(state)
}

#[tokio::test(start_paused = true)]
async fn first_probe_fires_immediately_and_marks_connected() {
    let (transport, mut requests) = ScriptedTransport::new();
    let (monitor, address, mut events) = monitor_with(transport);
    let started = time::Instant::now();

    monitor.restart().await;

    assert_eq!(
        expect_request(&mut requests, "/ping").await,
        "http://10.0.0.5/ping"
    );
    expect_event(&mut events, is_connection(ConnectionState::Connected)).await;
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(monitor.state().await, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn single_failed_probe_flips_state_and_next_success_restores_it() {
    let (transport, _requests) = ScriptedTransport::new();
    let (monitor, address, mut events) = monitor_with(Arc::clone(&transport));

    monitor.restart().await;
    expect_event(&mut events, is_connection(ConnectionState::Connected)).await;

    transport.route("ping", Route::status(503));
    expect_event(&mut events, is_connection(ConnectionState::Disconnected)).await;
    assert_eq!(monitor.state().await, ConnectionState::Disconnected);

    transport.route("ping", Route::ok("pong"));
    expect_event(&mut events, is_connection(ConnectionState::Connected)).await;

    transport.route("ping", Route::Unreachable);
    expect_event(&mut events, is_connection(ConnectionState::Disconnected)).await;
}

#[tokio::test(start_paused = true)]
async fn probes_repeat_on_the_configured_interval() {
    let (transport, mut requests) = ScriptedTransport::new();
    let (monitor, address, _events) = monitor_with(transport);

    monitor.restart().await;
    expect_request(&mut requests, "/ping").await;
    let first = time::Instant::now();
    expect_request(&mut requests, "/ping").await;

    let gap = first.elapsed();
    assert!(gap >= Duration::from_secs(3) && gap < Duration::from_secs(4), "gap {gap:?}");
}

#[tokio::test(start_paused = true)]
async fn address_switch_discards_in_flight_probe_of_previous_address() {
    let (transport, mut requests) = ScriptedTransport::new();
    let release = Arc::new(Notify::new());
    transport.route(
        "10.0.0.1/ping",
        Route::Held {
            release: Arc::clone(&release),
            status: 200,
            body: String::new(),
        },
    );
    transport.route("10.0.0.2/ping", Route::Unreachable);
    let (monitor, address, mut events) = monitor_with(transport);

    address.set("10.0.0.1").await;
    monitor.restart().await;
    expect_request(&mut requests, "10.0.0.1/ping").await;

    address.set("10.0.0.2").await;
    monitor.restart().await;
    expect_request(&mut requests, "10.0.0.2/ping").await;
    release.notify_waiters();

    time::sleep(Duration::from_secs(10)).await;
    assert_eq!(monitor.state().await, ConnectionState::Disconnected);
    assert!(drain_requests(&mut requests)
        .await
        .iter()
        .all(|url| url.contains("10.0.0.2")));
    while let Ok(event) = events.try_recv() {
        assert_ne!(
            event,
            SessionEvent::ConnectionChanged(ConnectionState::Connected)
        );
    }
}

#[tokio::test(start_paused = true)]
async fn address_switch_resets_state_until_new_address_answers() {
    let (transport, _requests) = ScriptedTransport::new();
    transport.route("10.0.0.2/ping", Route::Unreachable);
    let (monitor, address, mut events) = monitor_with(transport);

    address.set("10.0.0.1").await;
    monitor.restart().await;
    expect_event(&mut events, is_connection(ConnectionState::Connected)).await;

    address.set("10.0.0.2").await;
    monitor.restart().await;
    assert_eq!(monitor.state().await, ConnectionState::Disconnected);
    expect_event(&mut events, is_connection(ConnectionState::Disconnected)).await;
}

#[tokio::test(start_paused = true)]
async fn overlapping_restarts_keep_one_live_loop_on_the_latest_address() {
    let (transport, mut requests) = ScriptedTransport::new();
    transport.route("10.0.0.1/ping", Route::Unreachable);
    let (monitor, address, mut events) = monitor_with(transport);
    address.set("10.0.0.1").await;

    tokio::join!(monitor.restart(), monitor.restart(), async {
        address.set("10.0.0.2").await;
        monitor.restart().await;
    });

    expect_event(&mut events, is_connection(ConnectionState::Connected)).await;
    drain_requests(&mut requests).await;
    time::sleep(Duration::from_secs(3)).await;
    let later = drain_requests(&mut requests).await;
    assert!(!later.is_empty(), "probing died after overlapping restarts");
    assert!(later.iter().all(|url| url == "http://10.0.0.2/ping"), "{later:?}");
    assert_eq!(monitor.state().await, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_probing() {
    let (transport, mut requests) = ScriptedTransport::new();
    let (monitor, address, _events) = monitor_with(transport);

    monitor.restart().await;
    expect_request(&mut requests, "/ping").await;
    monitor.stop().await;

    time::sleep(Duration::from_secs(30)).await;
    assert!(drain_requests(&mut requests).await.is_empty());
    assert_eq!(monitor.state().await, ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_monitor_aborts_its_timer() {
    let (transport, mut requests) = ScriptedTransport::new();
    let (monitor, address, _events) = monitor_with(transport);

    monitor.restart().await;
    expect_request(&mut requests, "/ping").await;
    drop(monitor);

    time::sleep(Duration::from_secs(30)).await;
    assert!(drain_requests(&mut requests).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unusable_address_reads_as_disconnected_without_requests() {
    let (transport, mut requests) = ScriptedTransport::new();
    let (monitor, address, _events) = monitor_with(transport);

    address.set("").await;
    monitor.restart().await;

    time::sleep(Duration::from_secs(10)).await;
    assert!(drain_requests(&mut requests).await.is_empty());
    assert_eq!(monitor.state().await, ConnectionState::Disconnected);
}

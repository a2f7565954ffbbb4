//! Lifecycle tests for NotificationChannel
//!
//! These run the channel against MockHubConnector and check:
//! - Racing start calls open exactly one connection
//! - Stop during a pending attempt leaves nothing behind
//! - Listener failures are isolated
//! - The optional backoff policy re-resolves the token per attempt

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mbp_core::channel::{
    ChannelConfig, ChannelError, ChannelState, MockHubConnector, NotificationChannel,
    ReconnectConfig, RetryPolicy, StartOutcome,
};
use mbp_core::token::{SessionToken, TokenSupplier};
use url::Url;

fn root() -> Url {
    Url::parse("http://localhost:5000").unwrap()
}

fn create_channel(mock: &MockHubConnector, retry: RetryPolicy) -> NotificationChannel {
    let config = ChannelConfig::new(root())
        .with_retry(retry)
        .with_stop_timeout(Duration::from_secs(1));
    NotificationChannel::new(config, Arc::new(mock.clone()))
}

fn fixed_token(value: &'static str) -> TokenSupplier {
    Arc::new(move || Some(SessionToken::new(value)))
}

async fn wait_for_state(channel: &NotificationChannel, state: ChannelState) {
    let mut changes = channel.state_changes();
    tokio::time::timeout(Duration::from_secs(5), changes.wait_for(|s| *s == state))
        .await
        .expect("timed out waiting for channel state")
        .unwrap();
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_open_one_connection() {
    let mock = MockHubConnector::new().with_connect_delay(Duration::from_millis(20));
    let channel = create_channel(&mock, RetryPolicy::Never);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let channel = channel.clone();
        handles.push(tokio::spawn(async move {
            channel.start(42, fixed_token("tok"))
        }));
    }

    let mut started = 0;
    for handle in handles {
        if handle.await.unwrap() == StartOutcome::Started {
            started += 1;
        }
    }
    assert_eq!(started, 1);

    wait_for_state(&channel, ChannelState::Connected).await;
    assert_eq!(mock.attempts(), 1);
    assert_eq!(mock.open_connections(), 1);

    channel.stop().await;
    assert_eq!(channel.state(), ChannelState::Idle);
    assert_eq!(mock.connections_closed(), 1);
    assert_eq!(mock.open_connections(), 0);
}

#[tokio::test]
async fn stop_while_connecting_abandons_attempt() {
    let mock = MockHubConnector::new();
    mock.pause();
    let channel = create_channel(&mock, RetryPolicy::Never);

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    let _sub = channel.on_message(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    channel.start(1, fixed_token("tok"));
    // Let the task reach the paused connector.
    eventually(|| mock.attempts() == 1).await;
    assert_eq!(channel.state(), ChannelState::Connecting);

    channel.stop().await;
    assert_eq!(channel.state(), ChannelState::Idle);

    // The server side would now complete the attempt.
    mock.resume();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(mock.connections_opened(), 0);
    assert_eq!(mock.push_notification("late"), 0);
    assert_eq!(delivered.load(Ordering::SeqCst), 0);
    assert_eq!(channel.state(), ChannelState::Idle);
}

#[tokio::test]
async fn no_delivery_after_stop() {
    let mock = MockHubConnector::new();
    let channel = create_channel(&mock, RetryPolicy::Never);
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    let _sub = channel.on_message(move |msg| sink.lock().unwrap().push(msg.payload.clone()));

    channel.start(1, fixed_token("tok"));
    wait_for_state(&channel, ChannelState::Connected).await;
    mock.push_notification("before");
    eventually(|| delivered.lock().unwrap().len() == 1).await;

    channel.stop().await;
    assert_eq!(mock.push_notification("after"), 0);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(*delivered.lock().unwrap(), vec!["before"]);
}

#[tokio::test]
async fn panicking_listener_does_not_break_channel() {
    let mock = MockHubConnector::new();
    let channel = create_channel(&mock, RetryPolicy::Never);
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);

    let _bad = channel.on_message(|_| panic!("listener bug"));
    let _good = channel.on_message(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    channel.start(1, fixed_token("tok"));
    wait_for_state(&channel, ChannelState::Connected).await;
    mock.push_notification("one");
    mock.push_notification("two");

    eventually(|| count.load(Ordering::SeqCst) == 2).await;
    assert_eq!(channel.state(), ChannelState::Connected);
}

#[tokio::test]
async fn unsubscribed_listener_stops_receiving() {
    let mock = MockHubConnector::new();
    let channel = create_channel(&mock, RetryPolicy::Never);
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let sub = channel.on_message(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    channel.start(1, fixed_token("tok"));
    wait_for_state(&channel, ChannelState::Connected).await;
    mock.push_notification("one");
    eventually(|| count.load(Ordering::SeqCst) == 1).await;

    sub.unsubscribe();
    assert_eq!(channel.listener_count(), 0);
    mock.push_notification("two");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn backoff_retries_with_fresh_token() {
    let mock = MockHubConnector::new();
    mock.fail_next(ChannelError::Connect("refused".into()));
    mock.fail_next(ChannelError::Connect("refused".into()));
    let channel = create_channel(&mock, RetryPolicy::Backoff(ReconnectConfig::default()));

    let calls = Arc::new(AtomicUsize::new(0));
    let supplier_calls = Arc::clone(&calls);
    let supplier: TokenSupplier = Arc::new(move || {
        let n = supplier_calls.fetch_add(1, Ordering::SeqCst);
        Some(SessionToken::new(format!("tok-{n}")))
    });

    channel.start(7, supplier);
    wait_for_state(&channel, ChannelState::Connected).await;

    assert_eq!(mock.attempts(), 3);
    assert_eq!(
        mock.seen_tokens(),
        vec![
            Some("tok-0".to_string()),
            Some("tok-1".to_string()),
            Some("tok-2".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn backoff_gives_up_after_max_attempts() {
    let mock = MockHubConnector::new();
    for _ in 0..3 {
        mock.fail_next(ChannelError::Connect("refused".into()));
    }
    let retry = RetryPolicy::Backoff(ReconnectConfig {
        max_attempts: Some(1),
        ..Default::default()
    });
    let channel = create_channel(&mock, retry);

    channel.start(7, fixed_token("tok"));
    wait_for_state(&channel, ChannelState::Idle).await;

    // One initial attempt plus one retry.
    assert_eq!(mock.attempts(), 2);
    assert_eq!(channel.active_user(), None);
}

#[tokio::test(start_paused = true)]
async fn backoff_reconnects_after_server_disconnect() {
    let mock = MockHubConnector::new();
    let channel = create_channel(&mock, RetryPolicy::Backoff(ReconnectConfig::default()));

    channel.start(7, fixed_token("tok"));
    wait_for_state(&channel, ChannelState::Connected).await;

    mock.disconnect_all(None);
    wait_for_state(&channel, ChannelState::Connecting).await;
    wait_for_state(&channel, ChannelState::Connected).await;

    assert_eq!(mock.attempts(), 2);
    assert_eq!(mock.open_connections(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_during_backoff_returns_to_idle() {
    let mock = MockHubConnector::new();
    mock.fail_next(ChannelError::Connect("refused".into()));
    let retry = RetryPolicy::Backoff(ReconnectConfig {
        initial_delay: Duration::from_secs(60),
        ..Default::default()
    });
    let channel = create_channel(&mock, retry);

    channel.start(7, fixed_token("tok"));
    eventually(|| mock.attempts() == 1).await;

    channel.stop().await;
    assert_eq!(channel.state(), ChannelState::Idle);
    assert_eq!(mock.attempts(), 1);
}

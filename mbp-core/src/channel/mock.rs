//! Mock hub connector for testing
//!
//! MockHubConnector stands in for the real hub so channel and session logic
//! can be tested without a server. Connection attempts can be paused, delayed
//! or failed; live connections can be fed messages or dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use super::connector::{HubConnection, HubConnector, HubEndpoint};
use super::error::ChannelError;
use super::state::NotificationMessage;
use crate::token::SessionToken;

enum MockEvent {
    Message(NotificationMessage),
    Disconnect(Option<ChannelError>),
}

struct MockState {
    attempts: AtomicUsize,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    hang_on_close: Arc<AtomicBool>,
    connect_delay: Mutex<Option<Duration>>,
    paused: watch::Sender<bool>,
    failures: Mutex<VecDeque<ChannelError>>,
    last_endpoint: Mutex<Option<HubEndpoint>>,
    seen_tokens: Mutex<Vec<Option<String>>>,
    connections: Mutex<Vec<mpsc::UnboundedSender<MockEvent>>>,
}

/// Scriptable in-process implementation of [`HubConnector`]
///
/// Clones share state, so a test can keep one handle while the channel owns
/// another.
#[derive(Clone)]
pub struct MockHubConnector {
    state: Arc<MockState>,
}

impl MockHubConnector {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            state: Arc::new(MockState {
                attempts: AtomicUsize::new(0),
                opened: AtomicUsize::new(0),
                closed: Arc::new(AtomicUsize::new(0)),
                hang_on_close: Arc::new(AtomicBool::new(false)),
                connect_delay: Mutex::new(None),
                paused,
                failures: Mutex::new(VecDeque::new()),
                last_endpoint: Mutex::new(None),
                seen_tokens: Mutex::new(Vec::new()),
                connections: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Delay every connection attempt by `delay`.
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        *lock(&self.state.connect_delay) = Some(delay);
        self
    }

    /// Hold connection attempts until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        self.state.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.state.paused.send_replace(false);
    }

    /// Fail the next connection attempt with `error`.
    pub fn fail_next(&self, error: ChannelError) {
        lock(&self.state.failures).push_back(error);
    }

    /// Make `close` on live and future connections never complete.
    pub fn hang_on_close(&self, hang: bool) {
        self.state.hang_on_close.store(hang, Ordering::SeqCst);
    }

    /// Number of `connect` calls so far.
    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    /// Connections successfully handed to the caller.
    pub fn connections_opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Connections that have been dropped.
    pub fn connections_closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Connections currently alive.
    pub fn open_connections(&self) -> usize {
        self.connections_opened()
            .saturating_sub(self.connections_closed())
    }

    pub fn last_endpoint(&self) -> Option<HubEndpoint> {
        lock(&self.state.last_endpoint).clone()
    }

    /// Raw token value passed to each `connect` call, in order.
    pub fn seen_tokens(&self) -> Vec<Option<String>> {
        lock(&self.state.seen_tokens).clone()
    }

    /// Deliver `message` on every live connection. Returns how many got it.
    pub fn push(&self, message: NotificationMessage) -> usize {
        self.broadcast(|| MockEvent::Message(message.clone()))
    }

    /// Convenience for pushing a `ReceiveNotification` message.
    pub fn push_notification(&self, payload: &str) -> usize {
        self.push(NotificationMessage::notification(payload))
    }

    /// Drop every live connection as if the server went away.
    pub fn disconnect_all(&self, error: Option<ChannelError>) -> usize {
        self.broadcast(|| MockEvent::Disconnect(error.clone()))
    }

    fn broadcast(&self, event: impl Fn() -> MockEvent) -> usize {
        let mut connections = lock(&self.state.connections);
        connections.retain(|tx| tx.send(event()).is_ok());
        connections.len()
    }
}

impl Default for MockHubConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockHubConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHubConnector")
            .field("attempts", &self.attempts())
            .field("open_connections", &self.open_connections())
            .finish()
    }
}

#[async_trait]
impl HubConnector for MockHubConnector {
    async fn connect(
        &self,
        endpoint: &HubEndpoint,
        token: Option<SessionToken>,
    ) -> Result<Box<dyn HubConnection>, ChannelError> {
        self.state.attempts.fetch_add(1, Ordering::SeqCst);
        *lock(&self.state.last_endpoint) = Some(endpoint.clone());
        lock(&self.state.seen_tokens).push(token.map(|t| t.expose_secret().to_string()));

        let mut paused = self.state.paused.subscribe();
        // The sender lives in `self`, so this cannot fail while we wait.
        let _ = paused.wait_for(|paused| !*paused).await;

        let delay = *lock(&self.state.connect_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = lock(&self.state.failures).pop_front() {
            return Err(error);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.state.connections).push(tx);
        self.state.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockHubConnection {
            rx,
            closed: Arc::clone(&self.state.closed),
            hang_on_close: Arc::clone(&self.state.hang_on_close),
        }))
    }
}

struct MockHubConnection {
    rx: mpsc::UnboundedReceiver<MockEvent>,
    closed: Arc<AtomicUsize>,
    hang_on_close: Arc<AtomicBool>,
}

#[async_trait]
impl HubConnection for MockHubConnection {
    async fn recv(&mut self) -> Result<Option<NotificationMessage>, ChannelError> {
        match self.rx.recv().await {
            Some(MockEvent::Message(message)) => Ok(Some(message)),
            Some(MockEvent::Disconnect(Some(error))) => Err(error),
            Some(MockEvent::Disconnect(None)) | None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        if self.hang_on_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.rx.close();
        Ok(())
    }
}

impl Drop for MockHubConnection {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

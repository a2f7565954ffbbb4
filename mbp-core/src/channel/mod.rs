//! Real-time notification channel.
//!
//! [`NotificationChannel`] owns at most one connection to the notification
//! hub and drives it through a small state machine:
//!
//! ```text
//! Idle ──start──▶ Connecting ──established──▶ Connected
//!  ▲                 │   ▲                        │
//!  │          failed │   └──── retry (optional) ──┤ interrupted
//!  ├─────────────────┘                            │
//!  └──────────── Stopping ◀──────stop─────────────┘
//! ```
//!
//! `start` while connecting or connected does nothing, so racing callers
//! never open a second connection. Every attempt carries a generation number;
//! `stop` bumps it, and an attempt that resolves under a stale generation is
//! closed immediately instead of going live.

mod connector;
mod error;
mod listeners;
mod mock;
pub mod protocol;
mod retry;
mod state;
mod ws;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::token::TokenSupplier;

pub use connector::{HUB_PATH, HubConnection, HubConnector, HubEndpoint};
pub use error::ChannelError;
pub use listeners::{MessageListener, Subscription};
pub use mock::MockHubConnector;
pub use retry::{ReconnectConfig, RetryPolicy};
pub use state::{ChannelState, NotificationMessage, RECEIVE_NOTIFICATION, StartOutcome};
pub use ws::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_KEEPALIVE, WsHubConnector};

use listeners::ListenerRegistry;

/// Default time `stop` waits for the connection task before aborting it.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Channel settings
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Root host URL; the hub lives at `<root>/notificationHub`
    pub root_url: Url,
    /// What to do after a failed or interrupted connection
    pub retry: RetryPolicy,
    /// How long `stop` waits for a graceful close
    pub stop_timeout: Duration,
}

impl ChannelConfig {
    pub fn new(root_url: Url) -> Self {
        Self {
            root_url,
            retry: RetryPolicy::default(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }
}

struct ChannelHandle {
    user_id: i64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    state: ChannelState,
    generation: u64,
    handle: Option<ChannelHandle>,
}

struct Inner {
    config: ChannelConfig,
    connector: Arc<dyn HubConnector>,
    slot: Mutex<Slot>,
    state_tx: watch::Sender<ChannelState>,
    listeners: ListenerRegistry,
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, slot: &mut Slot, state: ChannelState) {
        let previous = std::mem::replace(&mut slot.state, state);
        if previous != state {
            debug!(from = %previous, to = %state, "notification channel state changed");
            self.state_tx.send_replace(state);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_slot().generation == generation
    }

    /// Promote a pending attempt to `Connected`. False if it was superseded.
    fn mark_connected(&self, generation: u64) -> bool {
        let mut slot = self.lock_slot();
        if slot.generation != generation || slot.state != ChannelState::Connecting {
            return false;
        }
        self.set_state(&mut slot, ChannelState::Connected);
        true
    }

    fn mark_reconnecting(&self, generation: u64) -> bool {
        let mut slot = self.lock_slot();
        if slot.generation != generation || !slot.state.is_active() {
            return false;
        }
        self.set_state(&mut slot, ChannelState::Connecting);
        true
    }

    /// The connection task gave up on its own: back to idle.
    fn finish(&self, generation: u64) {
        let mut slot = self.lock_slot();
        if slot.generation != generation || !slot.state.is_active() {
            return;
        }
        slot.handle = None;
        self.set_state(&mut slot, ChannelState::Idle);
    }
}

enum StopStep {
    Nothing,
    WaitForOther,
    Stop {
        generation: u64,
        handle: Option<ChannelHandle>,
    },
}

/// Handle to the notification channel. Clones share the same channel.
#[derive(Clone)]
pub struct NotificationChannel {
    inner: Arc<Inner>,
}

impl NotificationChannel {
    pub fn new(config: ChannelConfig, connector: Arc<dyn HubConnector>) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Idle);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                slot: Mutex::new(Slot::default()),
                state_tx,
                listeners: ListenerRegistry::default(),
            }),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ChannelState {
        self.inner.lock_slot().state
    }

    /// Watch state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.inner.state_tx.subscribe()
    }

    /// User the channel is connecting or connected for.
    pub fn active_user(&self) -> Option<i64> {
        self.inner.lock_slot().handle.as_ref().map(|h| h.user_id)
    }

    /// Register a listener for incoming messages.
    ///
    /// Listeners persist across stop/start until their [`Subscription`] is
    /// dropped or unsubscribed.
    pub fn on_message<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NotificationMessage) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(Arc::new(listener))
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Begin connecting for `user_id`.
    ///
    /// Returns immediately; the connection is established in the background.
    /// `token` is called on every connection attempt so the latest token is
    /// used. Must be called from within a Tokio runtime.
    pub fn start(&self, user_id: i64, token: TokenSupplier) -> StartOutcome {
        let mut slot = self.inner.lock_slot();
        match slot.state {
            ChannelState::Connecting | ChannelState::Connected => {
                let active = slot.handle.as_ref().map(|h| h.user_id);
                if active != Some(user_id) {
                    warn!(
                        requested = user_id,
                        active = ?active,
                        "notification channel already active for another user; log out first"
                    );
                } else {
                    debug!(user_id, "notification channel already active");
                }
                return StartOutcome::AlreadyActive;
            }
            ChannelState::Stopping => {
                debug!(user_id, "notification channel is stopping; start ignored");
                return StartOutcome::Stopping;
            }
            ChannelState::Idle => {}
        }

        slot.generation += 1;
        let generation = slot.generation;
        let cancel = CancellationToken::new();
        self.inner.set_state(&mut slot, ChannelState::Connecting);

        let task = tokio::spawn(run_connection(
            Arc::clone(&self.inner),
            generation,
            user_id,
            token,
            cancel.clone(),
        ));
        slot.handle = Some(ChannelHandle {
            user_id,
            cancel,
            task,
        });

        info!(user_id, "notification channel starting");
        StartOutcome::Started
    }

    /// Tear down the connection and return to `Idle`.
    ///
    /// Cancels a pending attempt if one is in flight. Waits up to the
    /// configured stop timeout for a graceful close, then aborts. A no-op
    /// when already idle; when another `stop` is in progress, waits for it.
    ///
    /// The teardown runs on its own task: dropping this future part-way
    /// still brings the channel back to `Idle`.
    pub async fn stop(&self) {
        let step = {
            let mut slot = self.inner.lock_slot();
            match slot.state {
                ChannelState::Idle => StopStep::Nothing,
                ChannelState::Stopping => StopStep::WaitForOther,
                ChannelState::Connecting | ChannelState::Connected => {
                    slot.generation += 1;
                    self.inner.set_state(&mut slot, ChannelState::Stopping);
                    StopStep::Stop {
                        generation: slot.generation,
                        handle: slot.handle.take(),
                    }
                }
            }
        };

        match step {
            StopStep::Nothing => {}
            StopStep::WaitForOther => {
                let mut changes = self.state_changes();
                let _ = tokio::time::timeout(
                    self.inner.config.stop_timeout,
                    changes.wait_for(|state| *state != ChannelState::Stopping),
                )
                .await;
            }
            StopStep::Stop { generation, handle } => {
                info!("notification channel stopping");
                let inner = Arc::clone(&self.inner);
                let teardown = tokio::spawn(tear_down(inner, generation, handle));
                if let Err(e) = teardown.await {
                    warn!(error = %e, "notification channel teardown failed");
                }
            }
        }
    }
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("state", &self.state())
            .field("root_url", &self.inner.config.root_url.as_str())
            .field("listeners", &self.inner.listeners)
            .finish()
    }
}

/// Wait out the connection task within the stop timeout, then go `Idle`.
async fn tear_down(inner: Arc<Inner>, generation: u64, handle: Option<ChannelHandle>) {
    if let Some(ChannelHandle {
        user_id,
        cancel,
        mut task,
    }) = handle
    {
        cancel.cancel();
        match tokio::time::timeout(inner.config.stop_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(user_id, error = %e, "notification channel task failed"),
            Err(_) => {
                warn!(user_id, "notification channel did not close in time; aborting");
                task.abort();
                // Resolves once the aborted task has been dropped.
                let _ = task.await;
            }
        }
    }

    let mut slot = inner.lock_slot();
    if slot.generation == generation && slot.state == ChannelState::Stopping {
        inner.set_state(&mut slot, ChannelState::Idle);
    }
    drop(slot);
    info!("notification channel stopped");
}

enum PumpExit {
    Cancelled,
    Superseded,
    Ended,
    Failed(ChannelError),
}

/// Connection task: connect, dispatch, and retry per policy.
async fn run_connection(
    inner: Arc<Inner>,
    generation: u64,
    user_id: i64,
    token: TokenSupplier,
    cancel: CancellationToken,
) {
    let endpoint = HubEndpoint::new(inner.config.root_url.clone(), user_id);
    let mut attempt: u32 = 0;

    loop {
        // Re-resolved per attempt so a rotated token is used.
        let current_token = token();
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(user_id, "connection attempt cancelled");
                return;
            }
            result = inner.connector.connect(&endpoint, current_token) => result,
        };

        match connected {
            Ok(mut connection) => {
                if cancel.is_cancelled() || !inner.mark_connected(generation) {
                    debug!(user_id, "connection resolved after stop; closing it");
                    if let Err(e) = connection.close().await {
                        debug!(error = %e, "close after stop failed");
                    }
                    return;
                }
                attempt = 0;
                info!(user_id, url = %endpoint.url(), "notification channel connected");

                match pump(&inner, generation, &cancel, connection.as_mut()).await {
                    PumpExit::Cancelled | PumpExit::Superseded => {
                        if let Err(e) = connection.close().await {
                            debug!(error = %e, "graceful close failed");
                        }
                        return;
                    }
                    PumpExit::Ended => info!(user_id, "notification channel closed by server"),
                    PumpExit::Failed(e) => {
                        warn!(user_id, error = %e, "notification channel interrupted")
                    }
                }
            }
            Err(e) => warn!(user_id, error = %e, "notification channel connection failed"),
        }

        if cancel.is_cancelled() {
            return;
        }

        let Some(delay) = inner.config.retry.delay_for(attempt) else {
            inner.finish(generation);
            return;
        };
        if !inner.mark_reconnecting(generation) {
            return;
        }
        attempt += 1;
        info!(user_id, attempt, ?delay, "reconnecting notification channel");

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn pump(
    inner: &Inner,
    generation: u64,
    cancel: &CancellationToken,
    connection: &mut dyn HubConnection,
) -> PumpExit {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PumpExit::Cancelled,
            next = connection.recv() => next,
        };

        match next {
            Ok(Some(message)) => {
                // Stop may have been requested while this message was in flight.
                if cancel.is_cancelled() {
                    return PumpExit::Cancelled;
                }
                if !inner.is_current(generation) {
                    return PumpExit::Superseded;
                }
                debug!(event = %message.event, "notification received");
                inner.listeners.dispatch(&message);
            }
            Ok(None) => return PumpExit::Ended,
            Err(e) => return PumpExit::Failed(e),
        }
    }
}

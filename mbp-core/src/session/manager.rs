//! Session orchestrator

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::context::SessionContext;
use crate::channel::{NotificationChannel, StartOutcome};
use crate::error::SessionError;
use crate::identity::{Identity, IdentityDecoder};
use crate::token::{SessionToken, TokenStore, TokenSupplier};
use crate::transport::ApiTransport;

#[derive(Debug, Default)]
struct SessionState {
    token: Option<SessionToken>,
    identity: Option<Identity>,
}

/// Owns the session: token, identity and the notification channel.
///
/// Token and identity are always set and cleared together. Clones share the
/// same session.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    transport: Arc<ApiTransport>,
    channel: NotificationChannel,
    state: Arc<RwLock<SessionState>>,
}

impl SessionManager {
    pub fn new(context: SessionContext) -> Self {
        let channel = NotificationChannel::new(context.channel_config(), context.connector);
        Self {
            store: context.store,
            transport: context.transport,
            channel,
            state: Arc::new(RwLock::new(SessionState::default())),
        }
    }

    /// Restore the session from the token store.
    ///
    /// A missing, unreadable or malformed stored token leaves the session
    /// logged out; the stored value is not touched. Calling this again with
    /// the same stored token changes nothing.
    pub fn initialize(&self) -> Option<Identity> {
        let token = match self.store.get() {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!(store = %self.store.location(), "no stored session token");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "token storage unavailable; starting logged out");
                return None;
            }
        };

        let identity = match IdentityDecoder::decode(token.expose_secret()) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, store = %self.store.location(), "stored token is malformed; starting logged out");
                return None;
            }
        };

        if identity.is_expired(Utc::now()) {
            // The server decides; expired tokens are still used as-is.
            debug!(user_id = identity.id, "stored token has expired");
        }

        info!(user_id = identity.id, "session restored");
        self.activate(token, identity.clone());
        Some(identity)
    }

    /// Start a session with `token`, replacing any current one.
    ///
    /// A malformed token is rejected with nothing changed. If persisting the
    /// token fails the session is still live in memory and the storage error
    /// is returned. Switching to a different user should go through
    /// [`logout`](Self::logout) first; otherwise the channel stays connected
    /// for the previous user.
    ///
    /// A login that lands while a `logout` is still stopping the channel is
    /// authenticated but has no live channel; the next `login` or
    /// `initialize` after the stop completes connects it.
    pub fn login(&self, token: impl Into<SessionToken>) -> Result<Identity, SessionError> {
        let token = token.into();
        let identity = IdentityDecoder::decode(token.expose_secret())?;

        {
            let mut state = self.write_state();
            state.token = Some(token.clone());
            state.identity = Some(identity.clone());
        }

        let persisted = self.store.set(&token);
        if let Err(e) = &persisted {
            warn!(error = %e, "failed to persist session token; session will not survive restart");
        }

        self.connect(identity.id);
        info!(user_id = identity.id, "logged in");

        persisted?;
        Ok(identity)
    }

    /// End the session: clear memory and storage, then stop the channel.
    ///
    /// Safe without a session. The channel is stopped even when clearing
    /// storage fails; that failure is returned afterwards.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let previous = {
            let mut state = self.write_state();
            std::mem::take(&mut *state)
        };

        let cleared = self.store.clear();
        if let Err(e) = &cleared {
            warn!(error = %e, "failed to clear stored token");
        }

        self.channel.stop().await;

        match previous.identity {
            Some(identity) => info!(user_id = identity.id, "logged out"),
            None => debug!("logout without an active session"),
        }

        cleared?;
        Ok(())
    }

    /// Teardown hook for process exit: stop the channel.
    ///
    /// Never fails. The caller may drop the future; the session state is left
    /// as it is.
    pub async fn shutdown(&self) {
        self.channel.stop().await;
    }

    /// Supplier that yields the token current at call time.
    pub fn token_supplier(&self) -> TokenSupplier {
        let state = Arc::clone(&self.state);
        Arc::new(move || {
            state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .token
                .clone()
        })
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.read_state().token.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.read_state().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().identity.is_some()
    }

    /// The notification channel, for listeners and state observation.
    pub fn channel(&self) -> &NotificationChannel {
        &self.channel
    }

    pub fn transport(&self) -> &Arc<ApiTransport> {
        &self.transport
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    fn activate(&self, token: SessionToken, identity: Identity) {
        let user_id = identity.id;
        {
            let mut state = self.write_state();
            state.token = Some(token);
            state.identity = Some(identity);
        }
        self.connect(user_id);
    }

    /// Install the auth hook, then start the channel.
    fn connect(&self, user_id: i64) {
        if self.transport.install_auth_once(self.token_supplier()) {
            debug!("auth interceptor installed");
        }
        match self.channel.start(user_id, self.token_supplier()) {
            StartOutcome::Stopping => warn!(
                user_id,
                "notification channel is still stopping; session has no live channel"
            ),
            outcome => debug!(user_id, ?outcome, "notification channel start requested"),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("SessionManager")
            .field("user_id", &state.identity.as_ref().map(|i| i.id))
            .field("store", &self.store.location())
            .field("channel", &self.channel)
            .finish()
    }
}

//! mbp-core: session and real-time notification manager for the mbp client
//!
//! This crate owns the authenticated session of a client application:
//!
//! - **Token storage** - [`TokenStore`] with file, keyring and in-memory backends
//! - **Identity** - [`IdentityDecoder`] turns a JWT into an [`Identity`] without verifying it
//! - **Transport** - [`ApiTransport`] attaches `Authorization: Bearer` to every request
//! - **Notification channel** - [`NotificationChannel`] keeps one hub connection per session
//! - **Session** - [`SessionManager`] ties the above together behind `login`/`logout`/`initialize`
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mbp_core::{FileTokenStore, SessionConfig, SessionContext, SessionManager, UnreadCounter};
//!
//! async fn example() -> Result<(), mbp_core::SessionError> {
//!     let config = SessionConfig::default();
//!     let store = Arc::new(FileTokenStore::in_data_dir(&config.app_prefix));
//!     let session = SessionManager::new(SessionContext::websocket(config, store)?);
//!
//!     let unread = UnreadCounter::new();
//!     unread.attach(session.channel()).detach();
//!
//!     if session.initialize().is_none() {
//!         session.login("eyJhbGciOi...")?;
//!     }
//!
//!     // ... on exit
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────── SessionManager ────────────────────────┐
//! │  TokenStore ──▶ IdentityDecoder ──▶ { token, identity }        │
//! │                                         │                      │
//! │            ApiTransport ◀── auth hook ──┤                      │
//! │                                         ▼                      │
//! │            NotificationChannel ──▶ HubConnector (ws / mock)    │
//! │                    │                                           │
//! │                    └──▶ listeners (UnreadCounter, ...)         │
//! └────────────────────────────────────────────────────────────────┘
//! ```

pub mod channel;
pub mod error;
pub mod identity;
pub mod notifications;
pub mod session;
pub mod token;
pub mod transport;

// Re-export key types for convenience
pub use channel::{
    ChannelConfig, ChannelError, ChannelState, HubConnector, HubEndpoint, MockHubConnector,
    NotificationChannel, NotificationMessage, ReconnectConfig, RetryPolicy, StartOutcome,
    Subscription, WsHubConnector,
};
pub use error::{SessionError, StorageError, TokenError};
pub use identity::{Identity, IdentityDecoder};
pub use notifications::UnreadCounter;
pub use session::{SessionConfig, SessionContext, SessionManager};
pub use token::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, SessionToken, TokenStore, TokenSupplier,
};
pub use transport::{ApiErrorResponse, ApiTransport, TransportError};

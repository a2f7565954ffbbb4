//! Session token handling and durable token storage.
//!
//! The raw token is wrapped in [`SessionToken`] so it never shows up in logs
//! or `Debug` output. Persistence goes through the [`TokenStore`] trait, with
//! file, keyring and in-memory backends.

mod file;
mod keyring_store;
mod store;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

pub use file::FileTokenStore;
pub use keyring_store::KeyringTokenStore;
pub use store::{MemoryTokenStore, TokenStore};

/// Supplies the token that is current at the moment of the call.
///
/// Request hooks and the notification channel hold one of these instead of a
/// copy of the token, so a rotated token is picked up on the next use.
pub type TokenSupplier = Arc<dyn Fn() -> Option<SessionToken> + Send + Sync>;

/// Storage key for the persisted token: `<app-prefix>_token`.
pub fn storage_key(app_prefix: &str) -> String {
    format!("{app_prefix}_token")
}

/// A bearer token for the current session.
///
/// Debug output is redacted; use [`SessionToken::expose_secret`] only when
/// the value is actually sent or stored.
#[derive(Clone)]
pub struct SessionToken(SecretString);

impl SessionToken {
    /// Wrap a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Expose the raw token value.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    /// Value for an `Authorization` header.
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.expose_secret())
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionToken([REDACTED])")
    }
}

impl PartialEq for SessionToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose_secret() == other.expose_secret()
    }
}

impl Eq for SessionToken {}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

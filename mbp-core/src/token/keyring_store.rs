//! System keyring token store.
//!
//! The token is stored as a keyring password with the app prefix as service
//! name and `<app-prefix>_token` as the entry name.

use tracing::debug;

use super::{SessionToken, TokenStore, storage_key};
use crate::error::StorageError;

/// Token store backed by the platform keyring.
pub struct KeyringTokenStore {
    service: String,
    key: String,
    entry: keyring::Entry,
}

impl KeyringTokenStore {
    /// Open the keyring entry for `app_prefix`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Keyring` if the platform keyring cannot create
    /// the entry (for example when no secret service is running).
    pub fn new(app_prefix: &str) -> Result<Self, StorageError> {
        let key = storage_key(app_prefix);
        let entry = keyring::Entry::new(app_prefix, &key)
            .map_err(|e| StorageError::Keyring(e.to_string()))?;
        Ok(Self {
            service: app_prefix.to_string(),
            key,
            entry,
        })
    }
}

impl std::fmt::Debug for KeyringTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringTokenStore")
            .field("service", &self.service)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self) -> Result<Option<SessionToken>, StorageError> {
        match self.entry.get_password() {
            Ok(token) => Ok(Some(SessionToken::new(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::Keyring(e.to_string())),
        }
    }

    fn set(&self, token: &SessionToken) -> Result<(), StorageError> {
        self.entry
            .set_password(token.expose_secret())
            .map_err(|e| StorageError::Keyring(e.to_string()))?;
        debug!(service = %self.service, key = %self.key, "stored session token in keyring");
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::Keyring(e.to_string())),
        }
    }

    fn location(&self) -> String {
        format!("keyring:{}/{}", self.service, self.key)
    }
}

//! The `TokenStore` contract and its in-memory backend

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::SessionToken;
use crate::error::StorageError;

/// Durable key/value storage for the session token.
///
/// Operations are synchronous. Contents are not validated and there is no
/// locking across processes: the last writer wins.
pub trait TokenStore: Send + Sync {
    /// Read the persisted token, if any.
    fn get(&self) -> Result<Option<SessionToken>, StorageError>;

    /// Persist the token, replacing any previous value.
    fn set(&self, token: &SessionToken) -> Result<(), StorageError>;

    /// Remove the persisted token. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), StorageError>;

    /// Short human-readable description of where tokens live.
    fn location(&self) -> String;
}

/// Process-local token store.
///
/// Used by tests and for sessions that should not survive a restart. It can
/// be switched to an unavailable mode to simulate disabled storage.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<SessionToken>>,
    unavailable: AtomicBool,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `token`.
    pub fn with_token(token: impl Into<SessionToken>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every operation fail with [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("storage disabled".to_string()));
        }
        Ok(())
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<SessionToken>, StorageError> {
        self.check_available()?;
        Ok(self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set(&self, token: &SessionToken) -> Result<(), StorageError> {
        self.check_available()?;
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.check_available()?;
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_starts_empty() {
        let store = MemoryTokenStore::new();
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn memory_store_set_then_get() {
        let store = MemoryTokenStore::new();
        store.set(&SessionToken::new("t1")).unwrap();
        assert_eq!(store.get().unwrap(), Some(SessionToken::new("t1")));
    }

    #[test]
    fn memory_store_last_writer_wins() {
        let store = MemoryTokenStore::new();
        store.set(&SessionToken::new("first")).unwrap();
        store.set(&SessionToken::new("second")).unwrap();
        assert_eq!(store.get().unwrap().unwrap().expose_secret(), "second");
    }

    #[test]
    fn memory_store_clear_is_idempotent() {
        let store = MemoryTokenStore::with_token("t1");
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn memory_store_unavailable_fails_every_operation() {
        let store = MemoryTokenStore::with_token("t1");
        store.set_unavailable(true);

        assert!(matches!(store.get(), Err(StorageError::Unavailable(_))));
        assert!(store.set(&SessionToken::new("t2")).is_err());
        assert!(store.clear().is_err());

        store.set_unavailable(false);
        assert_eq!(store.get().unwrap().unwrap().expose_secret(), "t1");
    }
}

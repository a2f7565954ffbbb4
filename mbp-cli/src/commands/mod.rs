//! Subcommands for the mbp CLI

pub mod config;
pub mod listen;
pub mod login;
pub mod logout;
pub mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use mbp_core::{
    FileTokenStore, KeyringTokenStore, SessionContext, SessionManager, TokenStore,
};

use crate::config::{MbpConfig, TokenBackend};

/// Open the configured token store.
pub fn token_store(config: &MbpConfig) -> Result<Arc<dyn TokenStore>> {
    let prefix = &config.session.app_prefix;
    let store: Arc<dyn TokenStore> = match config.session.token_backend {
        TokenBackend::File => Arc::new(FileTokenStore::in_data_dir(prefix)),
        TokenBackend::Keyring => {
            Arc::new(KeyringTokenStore::new(prefix).context("Failed to open the OS keyring")?)
        }
    };
    Ok(store)
}

/// Build a session manager that talks to the configured server.
pub fn session(config: &MbpConfig) -> Result<SessionManager> {
    let store = token_store(config)?;
    let context = SessionContext::websocket(config.session_config(), store)
        .context("Invalid session configuration")?;
    Ok(SessionManager::new(context))
}

//! Session configuration and collaborators

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::channel::{
    ChannelConfig, DEFAULT_KEEPALIVE, DEFAULT_STOP_TIMEOUT, HubConnector, RetryPolicy,
    WsHubConnector,
};
use crate::error::SessionError;
use crate::token::TokenStore;
use crate::transport::ApiTransport;

/// Default REST API base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// Default root host for the notification hub.
pub const DEFAULT_ROOT_HOST_URL: &str = "http://localhost:5000";

/// Default application prefix for the storage key.
pub const DEFAULT_APP_PREFIX: &str = "mbp";

/// Session settings
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Prefix for the persisted token key (`<prefix>_token`)
    pub app_prefix: String,
    /// Base URL for REST requests
    pub api_base_url: String,
    /// Root host URL for the notification hub
    pub root_host_url: String,
    /// Client keep-alive interval on the hub connection
    pub keepalive: Duration,
    /// Reconnection behavior of the notification channel
    pub retry: RetryPolicy,
    /// Bound on graceful channel shutdown
    pub stop_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_prefix: DEFAULT_APP_PREFIX.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            root_host_url: DEFAULT_ROOT_HOST_URL.to_string(),
            keepalive: DEFAULT_KEEPALIVE,
            retry: RetryPolicy::Never,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// Everything a [`SessionManager`](super::SessionManager) is built from.
pub struct SessionContext {
    pub(crate) config: SessionConfig,
    pub(crate) root_url: Url,
    pub(crate) store: Arc<dyn TokenStore>,
    pub(crate) transport: Arc<ApiTransport>,
    pub(crate) connector: Arc<dyn HubConnector>,
}

impl SessionContext {
    /// Build a context, validating both URLs in `config`.
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn TokenStore>,
        connector: Arc<dyn HubConnector>,
    ) -> Result<Self, SessionError> {
        let api_url = parse_url("api base", &config.api_base_url)?;
        let root_url = parse_url("root host", &config.root_host_url)?;

        Ok(Self {
            config,
            root_url,
            store,
            transport: Arc::new(ApiTransport::new(api_url)),
            connector,
        })
    }

    /// Build a context that connects to the hub over WebSockets.
    pub fn websocket(
        config: SessionConfig,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, SessionError> {
        let connector = WsHubConnector::new().with_keepalive(config.keepalive);
        Self::new(config, store, Arc::new(connector))
    }

    /// Use a shared transport instead of the one built from the config.
    pub fn with_transport(mut self, transport: Arc<ApiTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::new(self.root_url.clone())
            .with_retry(self.config.retry.clone())
            .with_stop_timeout(self.config.stop_timeout)
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("config", &self.config)
            .field("store", &self.store.location())
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

fn parse_url(what: &str, value: &str) -> Result<Url, SessionError> {
    Url::parse(value).map_err(|e| SessionError::Config(format!("invalid {what} URL '{value}': {e}")))
}

use std::time::Duration;

use mbp_core::session::{DEFAULT_API_BASE_URL, DEFAULT_APP_PREFIX, DEFAULT_ROOT_HOST_URL};
use mbp_core::{ReconnectConfig, RetryPolicy, SessionConfig};
use serde::{Deserialize, Serialize};

/// Default keep-alive interval on the notification hub, in seconds
pub const DEFAULT_KEEPALIVE_SECS: u64 = 15;

/// Default bound on channel shutdown, in milliseconds
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5000;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawMbpConfig {
    #[serde(default)]
    pub api: RawApiConfig,

    #[serde(default)]
    pub session: RawSessionConfig,

    #[serde(default)]
    pub notifications: RawNotificationsConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawApiConfig {
    pub base_url: Option<String>,
    pub root_host_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSessionConfig {
    pub app_prefix: Option<String>,
    pub token_backend: Option<TokenBackend>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawNotificationsConfig {
    pub keepalive_secs: Option<u64>,
    pub stop_timeout_ms: Option<u64>,
    pub retry: Option<bool>,
    pub max_attempts: Option<u32>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MbpConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Base URL for REST requests
    pub base_url: String,

    /// Root host of the notification hub
    pub root_host_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            root_host_url: DEFAULT_ROOT_HOST_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    /// Prefix for the persisted token key
    pub app_prefix: String,

    /// Where the token is persisted
    pub token_backend: TokenBackend,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            app_prefix: DEFAULT_APP_PREFIX.to_string(),
            token_backend: TokenBackend::File,
        }
    }
}

/// Token persistence backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    /// `<data_dir>/<prefix>_token`
    #[default]
    File,
    /// OS keyring
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationsConfig {
    pub keepalive_secs: u64,
    pub stop_timeout_ms: u64,

    /// Reconnect with backoff after a failed or dropped connection
    pub retry: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: DEFAULT_KEEPALIVE_SECS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            retry: false,
            max_attempts: None,
        }
    }
}

impl MbpConfig {
    /// Settings for the session manager.
    pub fn session_config(&self) -> SessionConfig {
        let retry = if self.notifications.retry {
            RetryPolicy::Backoff(ReconnectConfig {
                max_attempts: self.notifications.max_attempts,
                ..Default::default()
            })
        } else {
            RetryPolicy::Never
        };

        SessionConfig {
            app_prefix: self.session.app_prefix.clone(),
            api_base_url: self.api.base_url.clone(),
            root_host_url: self.api.root_host_url.clone(),
            keepalive: Duration::from_secs(self.notifications.keepalive_secs),
            retry,
            stop_timeout: Duration::from_millis(self.notifications.stop_timeout_ms),
        }
    }
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::types::{
    ApiConfig, MbpConfig, NotificationsConfig, RawApiConfig, RawMbpConfig,
    RawNotificationsConfig, RawSessionConfig, SessionSection,
};

/// Overrides `api.base_url`
pub const API_BASE_URL_ENV: &str = "MBP_API_BASE_URL";

/// Overrides `api.root_host_url`
pub const ROOT_HOST_URL_ENV: &str = "MBP_API_ROOT_HOST_URL";

/// Replaces the `.mbp` project config directory
pub const PROJECT_CONFIG_DIR_ENV: &str = "MBP_PROJECT_CONFIG_DIR";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + environment)
    pub fn load() -> Result<MbpConfig> {
        let config = Self::load_from(&Self::user_config_path(), &Self::project_config_path())?;
        Ok(Self::apply_env_overrides(config, |key| std::env::var(key).ok()))
    }

    /// Load and merge the two config files; missing files are skipped.
    pub fn load_from(user_path: &Path, project_path: &Path) -> Result<MbpConfig> {
        let mut raw = RawMbpConfig::default();

        // Layer 1: User config
        if let Some(user_config) = Self::read_raw(user_path)? {
            raw = Self::merge_raw(raw, user_config);
        }

        // Layer 2: Project config
        if let Some(project_config) = Self::read_raw(project_path)? {
            raw = Self::merge_raw(raw, project_config);
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path
    pub fn user_config_path() -> PathBuf {
        mbp_paths::config_dir().join("config.toml")
    }

    /// Get project config path
    /// Can be overridden with MBP_PROJECT_CONFIG_DIR (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        match std::env::var(PROJECT_CONFIG_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir).join("config.toml"),
            _ => PathBuf::from(".mbp/config.toml"),
        }
    }

    fn read_raw(path: &Path) -> Result<Option<RawMbpConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(Some(raw))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawMbpConfig, overlay: RawMbpConfig) -> RawMbpConfig {
        RawMbpConfig {
            api: RawApiConfig {
                base_url: overlay.api.base_url.or(base.api.base_url),
                root_host_url: overlay.api.root_host_url.or(base.api.root_host_url),
            },
            session: RawSessionConfig {
                app_prefix: overlay.session.app_prefix.or(base.session.app_prefix),
                token_backend: overlay.session.token_backend.or(base.session.token_backend),
            },
            notifications: RawNotificationsConfig {
                keepalive_secs: overlay
                    .notifications
                    .keepalive_secs
                    .or(base.notifications.keepalive_secs),
                stop_timeout_ms: overlay
                    .notifications
                    .stop_timeout_ms
                    .or(base.notifications.stop_timeout_ms),
                retry: overlay.notifications.retry.or(base.notifications.retry),
                max_attempts: overlay
                    .notifications
                    .max_attempts
                    .or(base.notifications.max_attempts),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawMbpConfig) -> MbpConfig {
        let api = ApiConfig::default();
        let session = SessionSection::default();
        let notifications = NotificationsConfig::default();

        MbpConfig {
            api: ApiConfig {
                base_url: raw.api.base_url.unwrap_or(api.base_url),
                root_host_url: raw.api.root_host_url.unwrap_or(api.root_host_url),
            },
            session: SessionSection {
                app_prefix: raw.session.app_prefix.unwrap_or(session.app_prefix),
                token_backend: raw.session.token_backend.unwrap_or(session.token_backend),
            },
            notifications: NotificationsConfig {
                keepalive_secs: raw
                    .notifications
                    .keepalive_secs
                    .unwrap_or(notifications.keepalive_secs),
                stop_timeout_ms: raw
                    .notifications
                    .stop_timeout_ms
                    .unwrap_or(notifications.stop_timeout_ms),
                retry: raw.notifications.retry.unwrap_or(notifications.retry),
                max_attempts: raw.notifications.max_attempts,
            },
        }
    }

    /// Apply environment overrides on top of the file layers.
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(
        mut config: MbpConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> MbpConfig {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(base_url) = var(API_BASE_URL_ENV) {
            config.api.base_url = base_url;
        }
        if let Some(root_host_url) = var(ROOT_HOST_URL_ENV) {
            config.api.root_host_url = root_host_url;
        }
        config
    }
}

//! XDG Base Directory paths for mbp.
//!
//! The client stores its config and its persisted session token under XDG
//! paths on every platform, so a token written on one machine layout is found
//! in the same place by every mbp binary.

use std::path::PathBuf;

/// Directory name used under the XDG base directories.
pub const APP_DIR: &str = "mbp";

/// Get the mbp config directory.
///
/// Returns `$XDG_CONFIG_HOME/mbp` if set, otherwise `~/.config/mbp`.
///
/// # Examples
///
/// ```
/// use mbp_paths::config_dir;
///
/// let config_file = config_dir().join("config.toml");
/// ```
pub fn config_dir() -> PathBuf {
    resolve("XDG_CONFIG_HOME", ".config")
}

/// Get the mbp data directory.
///
/// Returns `$XDG_DATA_HOME/mbp` if set, otherwise `~/.local/share/mbp`.
/// The file-backed token store keeps `<prefix>_token` here.
///
/// # Examples
///
/// ```
/// use mbp_paths::data_dir;
///
/// let token_file = data_dir().join("mbp_token");
/// ```
pub fn data_dir() -> PathBuf {
    resolve("XDG_DATA_HOME", ".local/share")
}

fn resolve(env_var: &str, home_relative: &str) -> PathBuf {
    match std::env::var(env_var) {
        Ok(base) if !base.is_empty() => PathBuf::from(base).join(APP_DIR),
        _ => match dirs::home_dir() {
            Some(home) => home.join(home_relative).join(APP_DIR),
            None => PathBuf::from(home_relative).join(APP_DIR),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_dir_ends_with_mbp() {
        let path = config_dir();
        assert!(path.ends_with("mbp"), "config_dir should end with 'mbp'");
    }

    #[test]
    #[serial]
    fn test_data_dir_ends_with_mbp() {
        let path = data_dir();
        assert!(path.ends_with("mbp"), "data_dir should end with 'mbp'");
    }

    #[test]
    #[serial]
    fn test_config_dir_respects_xdg_env() {
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-config");
        }
        let path = config_dir();
        unsafe {
            std::env::remove_var("XDG_CONFIG_HOME");
        }
        assert_eq!(path, PathBuf::from("/tmp/test-config/mbp"));
    }

    #[test]
    #[serial]
    fn test_data_dir_respects_xdg_env() {
        unsafe {
            std::env::set_var("XDG_DATA_HOME", "/tmp/test-data");
        }
        let path = data_dir();
        unsafe {
            std::env::remove_var("XDG_DATA_HOME");
        }
        assert_eq!(path, PathBuf::from("/tmp/test-data/mbp"));
    }

    #[test]
    #[serial]
    fn test_empty_xdg_env_falls_back_to_home() {
        unsafe {
            std::env::set_var("XDG_DATA_HOME", "");
        }
        let path = data_dir();
        unsafe {
            std::env::remove_var("XDG_DATA_HOME");
        }
        assert!(path.ends_with(".local/share/mbp"));
    }
}

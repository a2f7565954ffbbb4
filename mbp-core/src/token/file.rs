//! File-backed token store under the XDG data directory

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{SessionToken, TokenStore, storage_key};
use crate::error::StorageError;

/// Stores the token in a single file named `<app-prefix>_token`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store the token in `dir/<app_prefix>_token`.
    pub fn new(dir: impl AsRef<Path>, app_prefix: &str) -> Self {
        Self {
            path: dir.as_ref().join(storage_key(app_prefix)),
        }
    }

    /// Store the token in the mbp data directory.
    pub fn in_data_dir(app_prefix: &str) -> Self {
        Self::new(mbp_paths::data_dir(), app_prefix)
    }

    /// Path of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Result<Option<SessionToken>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(SessionToken::new(token)))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn set(&self, token: &SessionToken) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path).map_err(|e| self.io_error(e))?;
        file.write_all(token.expose_secret().as_bytes())
            .map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), "persisted session token");
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed persisted session token");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_store_uses_prefixed_file_name() {
        let store = FileTokenStore::new("/tmp/mbp", "mbp");
        assert_eq!(store.path(), Path::new("/tmp/mbp/mbp_token"));
    }

    #[test]
    fn file_store_missing_file_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path(), "mbp");
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn file_store_set_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("deep"), "mbp");

        store.set(&SessionToken::new("abc.def.ghi")).unwrap();

        assert!(store.path().exists());
        assert_eq!(store.get().unwrap().unwrap().expose_secret(), "abc.def.ghi");
    }

    #[test]
    fn file_store_set_overwrites_previous_token() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path(), "mbp");

        store.set(&SessionToken::new("a-much-longer-first-token")).unwrap();
        store.set(&SessionToken::new("short")).unwrap();

        assert_eq!(store.get().unwrap().unwrap().expose_secret(), "short");
    }

    #[test]
    fn file_store_trims_whitespace_and_treats_blank_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path(), "mbp");

        fs::write(store.path(), "  tok\n").unwrap();
        assert_eq!(store.get().unwrap().unwrap().expose_secret(), "tok");

        fs::write(store.path(), "\n").unwrap();
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn file_store_clear_removes_file_and_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path(), "mbp");

        store.set(&SessionToken::new("tok")).unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());

        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn file_store_token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path(), "mbp");
        store.set(&SessionToken::new("tok")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn file_store_read_error_surfaces_path() {
        let dir = TempDir::new().unwrap();
        // A directory where the token file should be makes reads fail.
        let store = FileTokenStore::new(dir.path(), "mbp");
        fs::create_dir_all(store.path()).unwrap();

        let err = store.get().unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        assert!(err.to_string().contains("mbp_token"));
    }
}

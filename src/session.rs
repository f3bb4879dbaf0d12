//! Access Token Storage
//!
//! The token is the only thing the client persists. It is attached to REST
//! calls as a bearer header and to the live socket as a query parameter, and
//! it is cleared on logout or on any 401.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// Fixed storage key (file name natively, `localStorage` key in the browser)
pub const TOKEN_KEY: &str = "access_token";

/// Holder for the bearer token
pub trait TokenStore: Send + Sync {
    /// Current token, if logged in
    fn load(&self) -> Option<String>;

    /// Persist a new token
    fn save(&self, token: &str) -> Result<(), SessionError>;

    /// Forget the token
    fn clear(&self) -> Result<(), SessionError>;

    fn is_logged_in(&self) -> bool {
        self.load().is_some()
    }
}

/// Token kept in a single file on disk
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under `dir/access_token`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(TOKEN_KEY))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let token = content.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    fn save(&self, token: &str) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SessionError::Io {
                path: self.path.clone(),
                error: e.to_string(),
            })?;
        }

        std::fs::write(&self.path, token.trim()).map_err(|e| SessionError::Io {
            path: self.path.clone(),
            error: e.to_string(),
        })?;

        tracing::debug!(path = ?self.path, "Access token saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = ?self.path, "Access token cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io {
                path: self.path.clone(),
                error: e.to_string(),
            }),
        }
    }
}

/// In-process token, nothing written to disk
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn save(&self, token: &str) -> Result<(), SessionError> {
        let mut guard = self.token.write().map_err(|_| SessionError::Poisoned)?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        let mut guard = self.token.write().map_err(|_| SessionError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}

/// Token storage errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Token file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Token store lock poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::in_dir(&dir.path().join("nested"));

        assert!(store.load().is_none());
        assert!(!store.is_logged_in());

        store.save("jwt-token\n").unwrap();
        assert_eq!(store.load().as_deref(), Some("jwt-token"));
        assert!(store.path().ends_with(TOKEN_KEY));

        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_file_store_clear_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::in_dir(dir.path());
        assert!(store.clear().is_ok());
    }

    #[test]
    fn test_file_store_blank_is_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::in_dir(dir.path());
        std::fs::write(store.path(), "   \n").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::with_token("abc");
        assert_eq!(store.load().as_deref(), Some("abc"));
        store.save("def").unwrap();
        assert_eq!(store.load().as_deref(), Some("def"));
        store.clear().unwrap();
        assert!(!store.is_logged_in());
    }
}

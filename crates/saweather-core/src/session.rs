//! Signed-in user session.
//!
//! Holds who is signed in and which location they follow. The weather
//! coordinator reads the location from here and stays idle while nobody is
//! signed in.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SessionError;

pub const DEFAULT_LOCATION: &str = "Johannesburg";

/// Persisted session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
}

pub trait SessionStore: Send + Sync {
    fn save_user(&self, email: &str, name: &str, location: &str) -> Result<(), SessionError>;

    fn current_user_name(&self) -> Option<String>;

    /// Falls back to the store's default location when none was chosen.
    fn current_location(&self) -> String;

    fn is_logged_in(&self) -> bool;

    fn update_location(&self, location: &str) -> Result<(), SessionError>;

    fn logout(&self) -> Result<(), SessionError>;
}

fn validate_location(location: &str) -> Result<&str, SessionError> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(SessionError::EmptyLocation);
    }
    Ok(trimmed)
}

/// In-memory session, used by tests and headless runs.
#[derive(Debug)]
pub struct MemorySessionStore {
    default_location: String,
    session: Mutex<Session>,
}

impl MemorySessionStore {
    pub fn new(default_location: impl Into<String>) -> Self {
        Self {
            default_location: default_location.into(),
            session: Mutex::new(Session::default()),
        }
    }

    /// A store with a user already signed in.
    pub fn signed_in(email: &str, name: &str, location: &str) -> Self {
        let store = Self::new(DEFAULT_LOCATION);
        *store.session.lock() = Session {
            email: Some(email.to_string()),
            name: Some(name.to_string()),
            location: Some(location.to_string()),
        };
        store
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOCATION)
    }
}

impl SessionStore for MemorySessionStore {
    fn save_user(&self, email: &str, name: &str, location: &str) -> Result<(), SessionError> {
        let location = validate_location(location)?;
        *self.session.lock() = Session {
            email: Some(email.to_string()),
            name: Some(name.to_string()),
            location: Some(location.to_string()),
        };
        Ok(())
    }

    fn current_user_name(&self) -> Option<String> {
        self.session.lock().name.clone()
    }

    fn current_location(&self) -> String {
        self.session
            .lock()
            .location
            .clone()
            .unwrap_or_else(|| self.default_location.clone())
    }

    fn is_logged_in(&self) -> bool {
        self.session.lock().email.is_some()
    }

    fn update_location(&self, location: &str) -> Result<(), SessionError> {
        let location = validate_location(location)?;
        self.session.lock().location = Some(location.to_string());
        Ok(())
    }

    fn logout(&self) -> Result<(), SessionError> {
        *self.session.lock() = Session::default();
        Ok(())
    }
}

/// Session persisted as JSON next to the config file.
///
/// Every mutation rewrites the whole file; the in-memory copy is only
/// updated once the write succeeded.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    default_location: String,
    session: Mutex<Session>,
}

impl FileSessionStore {
    /// Open the session file, starting signed out if it doesn't exist yet.
    pub fn open(
        path: impl AsRef<Path>,
        default_location: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();
        let session = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Session::default()
        };

        tracing::debug!("Opened session store at {}", path.display());

        Ok(Self {
            path,
            default_location: default_location.into(),
            session: Mutex::new(session),
        })
    }

    fn persist(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut Session)) -> Result<(), SessionError> {
        let mut guard = self.session.lock();
        let mut next = guard.clone();
        f(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn save_user(&self, email: &str, name: &str, location: &str) -> Result<(), SessionError> {
        let location = validate_location(location)?.to_string();
        self.update(|s| {
            s.email = Some(email.to_string());
            s.name = Some(name.to_string());
            s.location = Some(location);
        })?;
        tracing::info!("Saved session for {}", email);
        Ok(())
    }

    fn current_user_name(&self) -> Option<String> {
        self.session.lock().name.clone()
    }

    fn current_location(&self) -> String {
        self.session
            .lock()
            .location
            .clone()
            .unwrap_or_else(|| self.default_location.clone())
    }

    fn is_logged_in(&self) -> bool {
        self.session.lock().email.is_some()
    }

    fn update_location(&self, location: &str) -> Result<(), SessionError> {
        let location = validate_location(location)?.to_string();
        self.update(|s| s.location = Some(location))
    }

    fn logout(&self) -> Result<(), SessionError> {
        self.update(|s| *s = Session::default())?;
        tracing::info!("Session cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_memory_store_defaults() {
        let store = MemorySessionStore::default();
        assert!(!store.is_logged_in());
        assert_eq!(store.current_location(), "Johannesburg");
        assert!(store.current_user_name().is_none());
    }

    #[test]
    fn test_save_user_logs_in() {
        let store = MemorySessionStore::default();
        store.save_user("thandi@example.com", "Thandi", "Durban").unwrap();

        assert!(store.is_logged_in());
        assert_eq!(store.current_user_name().as_deref(), Some("Thandi"));
        assert_eq!(store.current_location(), "Durban");
    }

    #[test]
    fn test_update_location_rejects_empty() {
        let store = MemorySessionStore::signed_in("a@b.c", "A", "Pretoria");
        assert!(matches!(
            store.update_location("  "),
            Err(SessionError::EmptyLocation)
        ));
        assert_eq!(store.current_location(), "Pretoria");
    }

    #[test]
    fn test_logout_resets_to_default_location() {
        let store = MemorySessionStore::signed_in("a@b.c", "A", "Pretoria");
        store.logout().unwrap();
        assert!(!store.is_logged_in());
        assert_eq!(store.current_location(), "Johannesburg");
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileSessionStore::open(&path, DEFAULT_LOCATION).unwrap();
        store.save_user("sipho@example.com", "Sipho", "Cape Town").unwrap();
        store.update_location("Bloemfontein").unwrap();
        drop(store);

        let reopened = FileSessionStore::open(&path, DEFAULT_LOCATION).unwrap();
        assert!(reopened.is_logged_in());
        assert_eq!(reopened.current_location(), "Bloemfontein");
        assert_eq!(reopened.current_user_name().as_deref(), Some("Sipho"));
    }

    #[test]
    fn test_file_store_logout_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileSessionStore::open(&path, "Durban").unwrap();
        store.save_user("sipho@example.com", "Sipho", "Cape Town").unwrap();
        store.logout().unwrap();

        let reopened = FileSessionStore::open(&path, "Durban").unwrap();
        assert!(!reopened.is_logged_in());
        assert_eq!(reopened.current_location(), "Durban");
    }

    #[test]
    fn test_file_store_corrupted_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = FileSessionStore::open(&path, DEFAULT_LOCATION);
        assert!(matches!(result, Err(SessionError::Corrupted(_))));
    }
}

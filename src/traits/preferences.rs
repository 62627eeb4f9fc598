//! Preferences provider trait abstraction.
//!
//! A preferences provider is the durable key-value store behind the
//! credential store and the cookie jar. Reads are served from an in-memory
//! snapshot that is published on a watch channel after every durable edit.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::watch;

/// A snapshot of every stored preference.
pub type Preferences = BTreeMap<String, Value>;

/// Preferences operation errors.
#[derive(Debug, Clone)]
pub enum PreferencesError {
    /// Failed to read the backing store
    LoadFailed(String),
    /// Failed to write the backing store
    WriteFailed(String),
    /// IO error
    Io(String),
    /// Serialization/deserialization error
    Serialization(String),
}

impl std::fmt::Display for PreferencesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreferencesError::LoadFailed(msg) => write!(f, "Failed to load preferences: {}", msg),
            PreferencesError::WriteFailed(msg) => {
                write!(f, "Failed to write preferences: {}", msg)
            }
            PreferencesError::Io(msg) => write!(f, "IO error: {}", msg),
            PreferencesError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for PreferencesError {}

impl From<std::io::Error> for PreferencesError {
    fn from(e: std::io::Error) -> Self {
        PreferencesError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for PreferencesError {
    fn from(e: serde_json::Error) -> Self {
        PreferencesError::Serialization(e.to_string())
    }
}

/// Trait for durable key-value preference storage.
///
/// Implementations include the production JSON-file store and an in-memory
/// store for tests.
///
/// # Example
///
/// ```ignore
/// use myssue::traits::PreferencesProvider;
///
/// async fn remember_uuid<P: PreferencesProvider>(prefs: &P, uuid: &str) {
///     prefs.edit("uuid", Some(serde_json::json!(uuid))).await?;
///     assert_eq!(prefs.snapshot()["uuid"], uuid);
/// }
/// ```
#[async_trait]
pub trait PreferencesProvider: Send + Sync {
    /// Subscribe to snapshots.
    ///
    /// The receiver starts at the latest durable snapshot and is notified on
    /// every edit, including edits that store an unchanged value.
    fn subscribe(&self) -> watch::Receiver<Preferences>;

    /// The latest durable snapshot.
    fn snapshot(&self) -> Preferences {
        self.subscribe().borrow().clone()
    }

    /// Set (`Some`) or remove (`None`) a single key.
    ///
    /// Resolves once the edit is durable and the new snapshot is published.
    async fn edit(&self, key: &str, value: Option<Value>) -> Result<(), PreferencesError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_error_display() {
        assert_eq!(
            PreferencesError::LoadFailed("corrupt".to_string()).to_string(),
            "Failed to load preferences: corrupt"
        );
        assert_eq!(
            PreferencesError::WriteFailed("disk full".to_string()).to_string(),
            "Failed to write preferences: disk full"
        );
        assert_eq!(
            PreferencesError::Io("denied".to_string()).to_string(),
            "IO error: denied"
        );
        assert_eq!(
            PreferencesError::Serialization("bad".to_string()).to_string(),
            "Serialization error: bad"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PreferencesError = io_err.into();
        assert!(matches!(err, PreferencesError::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<Value>("{").unwrap_err();
        let err: PreferencesError = json_err.into();
        assert!(matches!(err, PreferencesError::Serialization(_)));
    }
}

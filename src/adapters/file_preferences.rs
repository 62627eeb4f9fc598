//! File-based preferences provider adapter.
//!
//! Preferences are stored as one pretty-printed JSON object. Every edit
//! rewrites the whole document through a sibling temp file that is renamed
//! into place, so a crash mid-write leaves the previous document intact.

use async_trait::async_trait;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tokio::sync::{watch, Mutex};

use crate::traits::{Preferences, PreferencesError, PreferencesProvider};

/// The preferences file name inside the data directory.
pub const PREFERENCES_FILE: &str = "auth_preferences.json";

/// File-based preferences provider.
///
/// # Example
///
/// ```ignore
/// use myssue::adapters::FilePreferences;
/// use myssue::traits::PreferencesProvider;
///
/// let prefs = FilePreferences::open(data_dir.join(PREFERENCES_FILE));
/// prefs.edit("uuid", Some(serde_json::json!("4b0c..."))).await?;
/// ```
#[derive(Debug)]
pub struct FilePreferences {
    /// Path to the preferences document.
    path: PathBuf,
    /// Latest durable snapshot.
    state: watch::Sender<Preferences>,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl FilePreferences {
    /// Open the preferences document at `path`.
    ///
    /// A missing or unreadable document opens as empty preferences; the file
    /// is created on the first edit.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = Self::load(&path);
        let (state, _) = watch::channel(initial);
        Self {
            path,
            state,
            write_lock: Mutex::new(()),
        }
    }

    /// Get the path to the preferences document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Preferences {
        if !path.exists() {
            return Preferences::new();
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Could not open preferences at {:?}: {}", path, e);
                return Preferences::new();
            }
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!("Ignoring unreadable preferences at {:?}: {}", path, e);
                Preferences::new()
            }
        }
    }

    async fn persist(&self, prefs: &Preferences) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(prefs)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| PreferencesError::WriteFailed(format!("{:?}: {}", tmp_path, e)))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| PreferencesError::WriteFailed(format!("{:?}: {}", self.path, e)))?;
        Ok(())
    }
}

#[async_trait]
impl PreferencesProvider for FilePreferences {
    fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.state.subscribe()
    }

    async fn edit(&self, key: &str, value: Option<Value>) -> Result<(), PreferencesError> {
        let _guard = self.write_lock.lock().await;

        let mut next = self.state.borrow().clone();
        match value {
            Some(value) => {
                next.insert(key.to_string(), value);
            }
            None => {
                next.remove(key);
            }
        }

        self.persist(&next).await?;
        self.state.send_replace(next);
        Ok(())
    }
}

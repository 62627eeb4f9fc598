//! In-memory preferences provider for testing.
//!
//! Provides a preferences provider that keeps everything in memory,
//! suitable for testing without file system access.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::traits::{Preferences, PreferencesError, PreferencesProvider};

/// In-memory preferences provider for testing.
///
/// # Example
///
/// ```ignore
/// use myssue::adapters::mock::InMemoryPreferences;
/// use myssue::traits::PreferencesProvider;
///
/// let prefs = InMemoryPreferences::new();
/// prefs.edit("access_token", Some(serde_json::json!("abc"))).await?;
/// assert_eq!(prefs.edit_count(), 1);
///
/// prefs.set_edit_should_fail(true);
/// assert!(prefs.edit("access_token", None).await.is_err());
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryPreferences {
    /// Latest snapshot
    state: Arc<watch::Sender<Preferences>>,
    /// Whether edits should fail
    edit_should_fail: Arc<AtomicBool>,
    /// Number of successful edits
    edits: Arc<AtomicUsize>,
}

impl InMemoryPreferences {
    /// Create an empty in-memory provider.
    pub fn new() -> Self {
        Self::with_preferences(Preferences::new())
    }

    /// Create a provider with initial contents.
    pub fn with_preferences(prefs: Preferences) -> Self {
        let (state, _) = watch::channel(prefs);
        Self {
            state: Arc::new(state),
            edit_should_fail: Arc::new(AtomicBool::new(false)),
            edits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure whether edits should fail.
    pub fn set_edit_should_fail(&self, should_fail: bool) {
        self.edit_should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Number of edits applied so far.
    pub fn edit_count(&self) -> usize {
        self.edits.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryPreferences {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PreferencesProvider for InMemoryPreferences {
    fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.state.subscribe()
    }

    async fn edit(&self, key: &str, value: Option<Value>) -> Result<(), PreferencesError> {
        if self.edit_should_fail.load(Ordering::SeqCst) {
            return Err(PreferencesError::WriteFailed("Mock edit failure".to_string()));
        }

        self.state.send_modify(|prefs| match value {
            Some(value) => {
                prefs.insert(key.to_string(), value);
            }
            None => {
                prefs.remove(key);
            }
        });
        self.edits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

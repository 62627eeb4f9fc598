//! Typed preference keys and the persist queue.
//!
//! The persist queue is the single writer that makes in-memory updates
//! durable. Writes are applied strictly in enqueue order, so the stored value
//! of a key never goes back to something written earlier in the process.
//! Durability lags the in-memory value until the queue drains; [`PersistQueue::flush`]
//! waits for that.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::traits::{Preferences, PreferencesProvider};

/// The data directory name under the user's home directory.
pub const DATA_DIR: &str = ".myssue";

/// Get the default data directory (`~/.myssue`).
///
/// Falls back to a relative `.myssue` when no home directory is known.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR))
}

/// A named preference holding values of type `T`.
pub struct PreferenceKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PreferenceKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for PreferenceKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PreferenceKey<T> {}

impl<T> fmt::Debug for PreferenceKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreferenceKey").field(&self.name).finish()
    }
}

impl<T: DeserializeOwned> PreferenceKey<T> {
    /// Read this key from a snapshot. A value of the wrong shape reads as absent.
    pub fn read(&self, prefs: &Preferences) -> Option<T> {
        let value = prefs.get(self.name)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Preference '{}' has an unexpected shape: {}", self.name, e);
                None
            }
        }
    }
}

type Ack = Box<dyn FnOnce() + Send>;

enum PersistJob {
    Edit {
        key: &'static str,
        value: Option<Value>,
        ack: Option<Ack>,
    },
    Flush(oneshot::Sender<()>),
}

/// Ordered, fire-and-forget durable writes.
///
/// Cloning shares the same worker. The worker stops once every clone is
/// dropped and the queue has drained.
#[derive(Debug, Clone)]
pub struct PersistQueue {
    tx: mpsc::UnboundedSender<PersistJob>,
}

impl PersistQueue {
    /// Spawn the writer task on the current tokio runtime.
    pub fn spawn(prefs: Arc<dyn PreferencesProvider>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PersistJob>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    PersistJob::Edit { key, value, ack } => {
                        if let Err(e) = prefs.edit(key, value).await {
                            tracing::error!("Dropping write of '{}': {}", key, e);
                        }
                        if let Some(ack) = ack {
                            ack();
                        }
                    }
                    PersistJob::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { tx }
    }

    /// Queue a durable write of `value` (`None` removes the key).
    pub fn enqueue<T: Serialize>(&self, key: PreferenceKey<T>, value: Option<&T>) {
        self.enqueue_with_ack(key, value, None);
    }

    /// Queue a durable write and run `ack` after it has been attempted.
    pub(crate) fn enqueue_with_ack<T: Serialize>(
        &self,
        key: PreferenceKey<T>,
        value: Option<&T>,
        ack: Option<Ack>,
    ) {
        let value = match value.map(serde_json::to_value).transpose() {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Could not serialize '{}': {}", key.name(), e);
                if let Some(ack) = ack {
                    ack();
                }
                return;
            }
        };

        let job = PersistJob::Edit {
            key: key.name(),
            value,
            ack,
        };
        if let Err(mpsc::error::SendError(job)) = self.tx.send(job) {
            tracing::error!("Persist queue is closed; write lost");
            if let PersistJob::Edit { ack: Some(ack), .. } = job {
                ack();
            }
        }
    }

    /// Wait until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(PersistJob::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

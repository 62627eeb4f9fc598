//! Durable credential store.
//!
//! [`AuthStore`] is the only owner of persisted credentials. Reads are
//! observable: every stream starts with the current value and yields again
//! after each write to the underlying preferences. The watch channel
//! underneath keeps only the latest snapshot, so a slow reader may skip
//! intermediate values but always ends on the newest one.

use futures::stream::{BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;

use super::credentials::{Credentials, ACCESS_TOKEN, USER_ID, UUID};
use crate::storage::PreferenceKey;
use crate::traits::{PreferencesError, PreferencesProvider};

/// Observable, durable storage for credential fields.
#[derive(Clone)]
pub struct AuthStore {
    prefs: Arc<dyn PreferencesProvider>,
}

impl std::fmt::Debug for AuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStore").finish_non_exhaustive()
    }
}

impl AuthStore {
    pub fn new(prefs: Arc<dyn PreferencesProvider>) -> Self {
        Self { prefs }
    }

    /// The preferences backing this store.
    pub fn preferences(&self) -> &Arc<dyn PreferencesProvider> {
        &self.prefs
    }

    /// Stream the value of `key`: current value first, then one item per write.
    pub fn observe<T>(&self, key: PreferenceKey<T>) -> BoxStream<'static, Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        WatchStream::new(self.prefs.subscribe())
            .map(move |prefs| key.read(&prefs))
            .boxed()
    }

    /// Like [`observe`](Self::observe) but only yields after the next write.
    pub fn observe_changes<T>(&self, key: PreferenceKey<T>) -> BoxStream<'static, Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        WatchStream::from_changes(self.prefs.subscribe())
            .map(move |prefs| key.read(&prefs))
            .boxed()
    }

    /// The current durable value of `key`.
    pub fn current<T: DeserializeOwned>(&self, key: PreferenceKey<T>) -> Option<T> {
        key.read(&self.prefs.snapshot())
    }

    /// All three credential fields as currently stored.
    pub fn load(&self) -> Credentials {
        let prefs = self.prefs.snapshot();
        Credentials {
            access_token: ACCESS_TOKEN.read(&prefs),
            user_id: USER_ID.read(&prefs),
            device_uuid: UUID.read(&prefs),
        }
    }

    /// Persist `value` under `key`. Resolves once durable.
    pub async fn save<T: Serialize + Sync>(
        &self,
        key: PreferenceKey<T>,
        value: &T,
    ) -> Result<(), PreferencesError> {
        let value = serde_json::to_value(value)?;
        self.prefs.edit(key.name(), Some(value)).await
    }

    /// Remove `key`. Resolves once durable.
    pub async fn delete<T>(&self, key: PreferenceKey<T>) -> Result<(), PreferencesError> {
        self.prefs.edit(key.name(), None).await
    }

    pub fn access_token_stream(&self) -> BoxStream<'static, Option<String>> {
        self.observe(ACCESS_TOKEN)
    }

    pub fn user_id_stream(&self) -> BoxStream<'static, Option<i64>> {
        self.observe(USER_ID)
    }

    pub fn uuid_stream(&self) -> BoxStream<'static, Option<String>> {
        self.observe(UUID)
    }

    pub async fn save_access_token(&self, token: &str) -> Result<(), PreferencesError> {
        self.save(ACCESS_TOKEN, &token.to_string()).await
    }

    pub async fn delete_access_token(&self) -> Result<(), PreferencesError> {
        self.delete(ACCESS_TOKEN).await
    }

    pub async fn save_user_id(&self, id: i64) -> Result<(), PreferencesError> {
        self.save(USER_ID, &id).await
    }

    pub async fn delete_user_id(&self) -> Result<(), PreferencesError> {
        self.delete(USER_ID).await
    }

    pub async fn save_uuid(&self, uuid: &str) -> Result<(), PreferencesError> {
        self.save(UUID, &uuid.to_string()).await
    }

    pub async fn delete_uuid(&self) -> Result<(), PreferencesError> {
        self.delete(UUID).await
    }
}

//! In-memory session cache.
//!
//! The HTTP layer reads credentials from synchronous call sites, so the
//! cache keeps a copy of the stored fields behind a `RwLock`. Three
//! subscription tasks keep the copy current with the store. Writes land in
//! memory first and reach the store through the [`PersistQueue`].
//!
//! While a write to a field is still queued, store emissions for that field
//! are ignored so that a read right after a write never sees an older value.
//! Emissions caused by edits of other keys are ignored as well; a value that
//! only lives in memory because its write failed stays until the field's
//! stored value actually changes.

use futures::stream::{BoxStream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::task::JoinHandle;

use super::credentials::{Credentials, ACCESS_TOKEN, USER_ID, UUID};
use super::store::AuthStore;
use crate::storage::{PersistQueue, PreferenceKey};

#[derive(Debug, Default)]
struct PendingWrites {
    access_token: AtomicUsize,
    user_id: AtomicUsize,
    device_uuid: AtomicUsize,
}

#[derive(Debug, Default)]
struct Shared {
    credentials: RwLock<Credentials>,
    pending: PendingWrites,
}

impl Shared {
    fn update(&self, apply: impl FnOnce(&mut Credentials)) {
        let mut creds = self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        apply(&mut creds);
    }
}

/// Synchronous view of the stored credentials.
#[derive(Debug)]
pub struct SessionCache {
    shared: Arc<Shared>,
    queue: PersistQueue,
    subscriptions: Vec<JoinHandle<()>>,
}

impl SessionCache {
    /// Seed the cache from the store and start following it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: &AuthStore, queue: PersistQueue) -> Self {
        // Subscribe before seeding so no write falls between the two.
        let tokens = store.observe_changes(ACCESS_TOKEN);
        let user_ids = store.observe_changes(USER_ID);
        let uuids = store.observe_changes(UUID);

        let initial = store.load();
        let shared = Arc::new(Shared {
            credentials: RwLock::new(initial.clone()),
            pending: PendingWrites::default(),
        });

        let subscriptions = vec![
            follow(
                tokens,
                initial.access_token,
                shared.clone(),
                |p| &p.access_token,
                |creds, token| {
                    tracing::debug!("Cached access token updated (present: {})", token.is_some());
                    creds.access_token = token;
                },
            ),
            follow(
                user_ids,
                initial.user_id,
                shared.clone(),
                |p| &p.user_id,
                |creds, id| {
                    tracing::debug!("Cached user id updated: {:?}", id);
                    creds.user_id = id;
                },
            ),
            follow(
                uuids,
                initial.device_uuid,
                shared.clone(),
                |p| &p.device_uuid,
                |creds, uuid| {
                    tracing::debug!("Cached device uuid updated: {:?}", uuid);
                    creds.device_uuid = uuid;
                },
            ),
        ];

        Self {
            shared,
            queue,
            subscriptions,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Credentials> {
        self.shared
            .credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.read().user_id
    }

    pub fn device_uuid(&self) -> Option<String> {
        self.read().device_uuid.clone()
    }

    /// Copy of all cached fields.
    pub fn credentials(&self) -> Credentials {
        self.read().clone()
    }

    pub fn save_token(&self, access_token: &str) {
        let token = access_token.to_string();
        begin(&self.shared, |p| &p.access_token);
        self.shared
            .update(|creds| creds.access_token = Some(token.clone()));
        self.persist(ACCESS_TOKEN, Some(&token), |p| &p.access_token);
    }

    pub fn save_user_id(&self, user_id: i64) {
        begin(&self.shared, |p| &p.user_id);
        self.shared.update(|creds| creds.user_id = Some(user_id));
        self.persist(USER_ID, Some(&user_id), |p| &p.user_id);
    }

    pub fn save_device_uuid(&self, uuid: &str) {
        let uuid = uuid.to_string();
        begin(&self.shared, |p| &p.device_uuid);
        self.shared
            .update(|creds| creds.device_uuid = Some(uuid.clone()));
        self.persist(UUID, Some(&uuid), |p| &p.device_uuid);
    }

    /// Forget every credential, in memory and on disk.
    pub fn clear(&self) {
        begin(&self.shared, |p| &p.access_token);
        begin(&self.shared, |p| &p.user_id);
        begin(&self.shared, |p| &p.device_uuid);
        self.shared.update(|creds| *creds = Credentials::default());
        self.persist(ACCESS_TOKEN, None, |p| &p.access_token);
        self.persist(USER_ID, None, |p| &p.user_id);
        self.persist(UUID, None, |p| &p.device_uuid);
    }

    /// Wait until every write made so far is durable.
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// Queue the durable write for a field already counted by [`begin`].
    fn persist<T: serde::Serialize>(
        &self,
        key: PreferenceKey<T>,
        value: Option<&T>,
        counter: fn(&PendingWrites) -> &AtomicUsize,
    ) {
        let shared = self.shared.clone();
        self.queue.enqueue_with_ack(
            key,
            value,
            Some(Box::new(move || {
                counter(&shared.pending).fetch_sub(1, Ordering::SeqCst);
            })),
        );
    }
}

impl Drop for SessionCache {
    fn drop(&mut self) {
        for task in &self.subscriptions {
            task.abort();
        }
    }
}

/// Mark a write of one field as in flight. Must happen before the memory
/// update so a follower holding the lock either sees the mark or is
/// overwritten afterwards.
fn begin(shared: &Shared, counter: fn(&PendingWrites) -> &AtomicUsize) {
    counter(&shared.pending).fetch_add(1, Ordering::SeqCst);
}

/// Apply store emissions for one field.
///
/// Every edit of any key publishes a new snapshot, so emissions where this
/// field's stored value did not change are skipped. Emissions that arrive
/// while a write of the field is queued are skipped too.
fn follow<T: Clone + PartialEq + Send + Sync + 'static>(
    mut updates: BoxStream<'static, Option<T>>,
    mut durable: Option<T>,
    shared: Arc<Shared>,
    counter: fn(&PendingWrites) -> &AtomicUsize,
    apply: fn(&mut Credentials, Option<T>),
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(value) = updates.next().await {
            if value == durable {
                continue;
            }
            durable = value.clone();

            let mut creds = shared
                .credentials
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if counter(&shared.pending).load(Ordering::SeqCst) > 0 {
                continue;
            }
            apply(&mut creds, value);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::InMemoryPreferences;
    use std::time::Duration;

    fn setup() -> (AuthStore, SessionCache, InMemoryPreferences) {
        let prefs = InMemoryPreferences::new();
        let shared: Arc<dyn crate::traits::PreferencesProvider> = Arc::new(prefs.clone());
        let store = AuthStore::new(shared.clone());
        let cache = SessionCache::new(&store, PersistQueue::spawn(shared));
        (store, cache, prefs)
    }

    async fn eventually(check: impl Fn() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_empty_on_first_launch() {
        let (_, cache, _) = setup();
        assert_eq!(cache.credentials(), Credentials::default());
    }

    #[tokio::test]
    async fn test_seeded_from_store() {
        let prefs = InMemoryPreferences::new();
        let shared: Arc<dyn crate::traits::PreferencesProvider> = Arc::new(prefs);
        let store = AuthStore::new(shared.clone());
        store.save_uuid("u-1").await.unwrap();
        store.save_user_id(9).await.unwrap();

        let cache = SessionCache::new(&store, PersistQueue::spawn(shared));
        assert_eq!(cache.device_uuid().as_deref(), Some("u-1"));
        assert_eq!(cache.user_id(), Some(9));
    }

    #[tokio::test]
    async fn test_read_after_write_is_immediate() {
        let (_, cache, _) = setup();
        cache.save_token("abc");
        assert_eq!(cache.access_token().as_deref(), Some("abc"));
        cache.save_user_id(5);
        assert_eq!(cache.user_id(), Some(5));
        cache.save_device_uuid("u-2");
        assert_eq!(cache.device_uuid().as_deref(), Some("u-2"));
    }

    #[tokio::test]
    async fn test_flush_makes_writes_durable() {
        let (store, cache, _) = setup();
        cache.save_token("abc");
        cache.save_user_id(5);
        cache.flush().await;

        assert_eq!(store.current(ACCESS_TOKEN).as_deref(), Some("abc"));
        assert_eq!(store.current(USER_ID), Some(5));
    }

    #[tokio::test]
    async fn test_follows_external_store_writes() {
        let (store, cache, _) = setup();
        store.save_access_token("from-store").await.unwrap();
        eventually(|| cache.access_token().as_deref() == Some("from-store")).await;
    }

    #[tokio::test]
    async fn test_rapid_writes_end_on_latest() {
        let (store, cache, _) = setup();
        for i in 0..20 {
            cache.save_token(&format!("token-{i}"));
        }
        assert_eq!(cache.access_token().as_deref(), Some("token-19"));
        cache.flush().await;
        assert_eq!(store.current(ACCESS_TOKEN).as_deref(), Some("token-19"));
        eventually(|| cache.access_token().as_deref() == Some("token-19")).await;
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_memory_value() {
        let (store, cache, prefs) = setup();
        prefs.set_edit_should_fail(true);
        cache.save_token("memory-only");
        cache.flush().await;

        assert_eq!(cache.access_token().as_deref(), Some("memory-only"));
        assert_eq!(store.current(ACCESS_TOKEN), None);
    }

    #[tokio::test]
    async fn test_unrelated_writes_keep_memory_only_value() {
        let (store, cache, prefs) = setup();
        prefs.set_edit_should_fail(true);
        cache.save_token("memory-only");
        cache.flush().await;
        prefs.set_edit_should_fail(false);

        store
            .save(PreferenceKey::<String>::new("Cookies"), &"c".to_string())
            .await
            .unwrap();
        store.save_user_id(4).await.unwrap();
        eventually(|| cache.user_id() == Some(4)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.access_token().as_deref(), Some("memory-only"));
    }

    #[tokio::test]
    async fn test_external_change_replaces_memory_only_value() {
        let (store, cache, prefs) = setup();
        prefs.set_edit_should_fail(true);
        cache.save_token("memory-only");
        cache.flush().await;
        prefs.set_edit_should_fail(false);

        store.save_access_token("from-store").await.unwrap();
        eventually(|| cache.access_token().as_deref() == Some("from-store")).await;
    }

    #[tokio::test]
    async fn test_interleaved_external_writes_never_regress_cache() {
        let (store, cache, _) = setup();
        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    store.save_access_token(&format!("ext-{i}")).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };
        for i in 0..50 {
            cache.save_token(&format!("own-{i}"));
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        cache.save_token("final");
        assert_eq!(cache.access_token().as_deref(), Some("final"));
        cache.flush().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.current(ACCESS_TOKEN).as_deref(), Some("final"));
        assert_eq!(cache.access_token().as_deref(), Some("final"));
    }

    #[tokio::test]
    async fn test_clear() {
        let (store, cache, _) = setup();
        cache.save_token("abc");
        cache.save_user_id(1);
        cache.save_device_uuid("u-1");
        cache.clear();
        cache.flush().await;

        assert_eq!(cache.credentials(), Credentials::default());
        assert_eq!(store.load(), Credentials::default());
    }
}

//! First-launch device registration.
//!
//! Every installation gets a random device uuid that never changes, and
//! registers it with the backend once to receive a user id and its first
//! access token. A failed registration leaves the uuid in place; the flow
//! runs again on the next launch as long as no user id is stored.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::api::{AddUserRequest, AuthApi};
use super::session::SessionCache;
use super::store::AuthStore;

/// Result of one registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A user id was already stored; nothing was sent.
    AlreadyRegistered { user_id: i64 },
    /// The backend accepted the device.
    Registered {
        device_uuid: String,
        user_id: Option<i64>,
        token_received: bool,
    },
    /// The call failed; the device uuid is kept for the next attempt.
    Failed { device_uuid: String, reason: String },
}

impl RegistrationOutcome {
    pub fn is_registered(&self) -> bool {
        !matches!(self, RegistrationOutcome::Failed { .. })
    }
}

/// Runs the device registration flow against the session cache.
#[derive(Debug)]
pub struct DeviceRegistration {
    cache: Arc<SessionCache>,
    api: AuthApi,
    running: Mutex<()>,
}

impl DeviceRegistration {
    pub fn new(cache: Arc<SessionCache>, api: AuthApi) -> Self {
        Self {
            cache,
            api,
            running: Mutex::new(()),
        }
    }

    /// Register this installation unless it already has a user id.
    ///
    /// Concurrent calls run one after the other, so at most one device uuid is
    /// ever generated.
    pub async fn register_if_needed(&self, push_token: Option<&str>) -> RegistrationOutcome {
        let _guard = self.running.lock().await;

        if let Some(user_id) = self.cache.user_id() {
            tracing::debug!("Device already registered as user {}", user_id);
            return RegistrationOutcome::AlreadyRegistered { user_id };
        }

        let device_uuid = match self.cache.device_uuid() {
            Some(uuid) => uuid,
            None => {
                let uuid = Uuid::new_v4().to_string();
                tracing::info!("Generated device uuid {}", uuid);
                self.cache.save_device_uuid(&uuid);
                uuid
            }
        };

        let mut request = AddUserRequest::new(device_uuid.clone());
        if let Some(token) = push_token.filter(|t| !t.trim().is_empty()) {
            request = request.with_fcm_token(token);
        }

        match self.api.register_device(&request).await {
            Ok(issued) => {
                let token_received = match issued.access_token.as_deref() {
                    Some(token) => {
                        self.cache.save_token(token);
                        true
                    }
                    None => {
                        tracing::warn!("Registration succeeded without an access token");
                        false
                    }
                };
                if let Some(user_id) = issued.user_id {
                    self.cache.save_user_id(user_id);
                }
                tracing::info!(
                    "Registered device {} (user id: {:?})",
                    device_uuid,
                    issued.user_id
                );
                RegistrationOutcome::Registered {
                    device_uuid,
                    user_id: issued.user_id,
                    token_received,
                }
            }
            Err(e) => {
                tracing::warn!("Device registration failed: {}", e);
                RegistrationOutcome::Failed {
                    device_uuid,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Wait for the first stored device uuid observation and register when
    /// the installation is new or never finished registering.
    ///
    /// Resolves to `None` when nothing needed doing.
    pub fn spawn_on_first_launch(
        self: Arc<Self>,
        store: &AuthStore,
        push_token: Option<String>,
    ) -> JoinHandle<Option<RegistrationOutcome>> {
        let mut uuids = store.uuid_stream();
        let mut user_ids = store.user_id_stream();

        tokio::spawn(async move {
            let uuid = uuids.next().await.flatten();
            let user_id = user_ids.next().await.flatten();

            match (uuid, user_id) {
                (_, Some(_)) => None,
                (None, None) => {
                    tracing::info!("First launch; registering device");
                    Some(self.register_if_needed(push_token.as_deref()).await)
                }
                (Some(uuid), None) => {
                    tracing::info!("Device {} never finished registering; retrying", uuid);
                    Some(self.register_if_needed(push_token.as_deref()).await)
                }
            }
        })
    }
}

//! Credential model and the preference keys it is stored under.

use serde::{Deserialize, Serialize};

use crate::storage::PreferenceKey;

/// Bearer token attached to backend requests.
pub const ACCESS_TOKEN: PreferenceKey<String> = PreferenceKey::new("access_token");

/// Backend user id issued at device registration.
pub const USER_ID: PreferenceKey<i64> = PreferenceKey::new("user_id");

/// Locally generated device identifier.
pub const UUID: PreferenceKey<String> = PreferenceKey::new("uuid");

/// Session credentials for one installation.
///
/// `device_uuid` never changes once generated, `user_id` is set once by
/// device registration, and `access_token` is replaced on every reissue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// Current bearer token.
    pub access_token: Option<String>,
    /// The registered user's ID.
    pub user_id: Option<i64>,
    /// Device identifier for this installation.
    pub device_uuid: Option<String>,
}

impl Credentials {
    /// Check if the credentials hold a non-blank access token.
    pub fn has_token(&self) -> bool {
        self.access_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// Check if this installation finished device registration.
    pub fn is_registered(&self) -> bool {
        self.user_id.is_some()
    }
}

//! Client for the backend authentication endpoints.
//!
//! Two calls make up the whole surface:
//!
//! | Method | Path           | Body                                | Returns                                  |
//! |--------|----------------|-------------------------------------|------------------------------------------|
//! | POST   | `auth/device`  | `{ "deviceUuid", "fcmToken"? }`     | `{ "userId" }` + `Authorization` header  |
//! | POST   | `auth/reissue` | none                                | `Authorization` header                   |
//!
//! Both hand back the access token in the `Authorization` response header
//! as `Bearer <token>`. The reissue call carries no credentials of its own and
//! relies on the session cookie attached by the HTTP client.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::traits::{Headers, HttpClient, HttpError, Request, Response};

/// Path of the device registration endpoint.
pub const DEVICE_PATH: &str = "auth/device";

/// Path of the token reissue endpoint.
pub const REISSUE_PATH: &str = "auth/reissue";

const BEARER_PREFIX: &str = "Bearer ";

/// Body of `POST auth/device`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserRequest {
    pub device_uuid: String,
    /// Push notification token, omitted when the device has none yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcm_token: Option<String>,
}

impl AddUserRequest {
    pub fn new(device_uuid: impl Into<String>) -> Self {
        Self {
            device_uuid: device_uuid.into(),
            fcm_token: None,
        }
    }

    pub fn with_fcm_token(mut self, token: impl Into<String>) -> Self {
        self.fcm_token = Some(token.into());
        self
    }
}

/// Body returned by `POST auth/device`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserResponse {
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// What a successful registration returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    /// Token from the `Authorization` header, prefix stripped. `None` when the
    /// header was missing or blank.
    pub access_token: Option<String>,
    pub user_id: Option<i64>,
}

/// Errors from the authentication endpoints.
#[derive(Debug, Error)]
pub enum AuthApiError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Response carried no access token")]
    MissingToken,

    #[error("Invalid request body: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthApiError {
    /// HTTP status of a rejected call, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthApiError::ServerError { status, .. } => Some(*status),
            AuthApiError::Http(HttpError::ServerError { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

/// Extract the access token from an `Authorization` header value set.
///
/// Strips one literal `Bearer ` prefix and surrounding whitespace. A missing
/// or blank value yields `None`.
pub fn bearer_token(headers: &Headers) -> Option<String> {
    crate::traits::find_header(headers, "Authorization").and_then(strip_bearer)
}

/// Token part of a single `Authorization` value, or `None` when blank.
pub fn strip_bearer(value: &str) -> Option<String> {
    let token = value.strip_prefix(BEARER_PREFIX).unwrap_or(value).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Format a token as an `Authorization` header value.
pub fn bearer_header(token: &str) -> String {
    format!("{}{}", BEARER_PREFIX, token)
}

/// Join a base URL and an endpoint path with exactly one slash.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Authentication endpoints of the backend.
///
/// The HTTP client given here must not run the token authenticator itself,
/// otherwise a failed reissue would trigger another reissue.
#[derive(Clone)]
pub struct AuthApi {
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for AuthApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AuthApi {
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register this installation with the backend.
    ///
    /// A 2xx response without a token still counts as registered; the caller
    /// decides what to do with a missing token.
    pub async fn register_device(
        &self,
        request: &AddUserRequest,
    ) -> Result<IssuedSession, AuthApiError> {
        let url = join_url(&self.base_url, DEVICE_PATH);
        let response = self
            .http
            .execute(Request::post(url).with_json(request)?)
            .await?;
        let response = Self::check_status(response)?;

        let access_token = bearer_token(&response.headers);
        let user_id = if response.body.is_empty() {
            None
        } else {
            match response.json::<AddUserResponse>() {
                Ok(body) => body.user_id,
                Err(e) => {
                    tracing::warn!("Registration response body was not understood: {}", e);
                    None
                }
            }
        };

        Ok(IssuedSession {
            access_token,
            user_id,
        })
    }

    /// Exchange the session cookie for a fresh access token.
    pub async fn reissue_token(&self) -> Result<String, AuthApiError> {
        let url = join_url(&self.base_url, REISSUE_PATH);
        let response = self.http.execute(Request::post(url)).await?;
        let response = Self::check_status(response)?;
        bearer_token(&response.headers).ok_or(AuthApiError::MissingToken)
    }

    fn check_status(response: Response) -> Result<Response, AuthApiError> {
        if response.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(AuthApiError::ServerError {
            status: response.status,
            message,
        })
    }
}

//! Client configuration.
//!
//! Defaults match the mobile client: 100 second timeouts and at most three
//! chained authentication attempts. Environment variables override the
//! backend URL and the data directory.

use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::PREFERENCES_FILE;
use crate::auth::MAX_RETRY_COUNT;
use crate::storage::default_data_dir;

/// Default backend base URL, a locally running backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/";

/// Environment variable overriding [`ClientConfig::base_url`].
pub const BASE_URL_ENV: &str = "MYSSUE_BASE_URL";

/// Environment variable overriding [`ClientConfig::data_dir`].
pub const DATA_DIR_ENV: &str = "MYSSUE_DATA_DIR";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// Configuration for a client session.
///
/// # Example
///
/// ```ignore
/// use myssue::startup::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_base_url("http://localhost:8080/api")
///     .with_request_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL; endpoint paths are appended to it
    pub base_url: String,
    /// Directory holding the preferences file
    pub data_dir: PathBuf,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// Chained responses after which token refresh gives up
    pub max_auth_attempts: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: default_data_dir(),
            connect_timeout: DEFAULT_TIMEOUT,
            request_timeout: DEFAULT_TIMEOUT,
            max_auth_attempts: MAX_RETRY_COUNT,
        }
    }
}

impl ClientConfig {
    /// Create a new ClientConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_auth_attempts(mut self, attempts: usize) -> Self {
        self.max_auth_attempts = attempts;
        self
    }

    /// Defaults overridden by `MYSSUE_BASE_URL` and `MYSSUE_DATA_DIR`.
    /// Empty values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = non_empty_var(BASE_URL_ENV) {
            config = config.with_base_url(url);
        }
        if let Some(dir) = non_empty_var(DATA_DIR_ENV) {
            config = config.with_data_dir(dir);
        }
        config
    }

    /// Path of the preferences file inside the data directory.
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join(PREFERENCES_FILE)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

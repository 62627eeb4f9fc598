//! Common test utilities for integration tests.
//!
//! Sessions here talk to a [`wiremock::MockServer`] through the real reqwest
//! client, so headers, cookies and the 401 retry chain all go over the wire.
//!
//! # Example
//!
//! ```ignore
//! let server = MockServer::start().await;
//! let fixture = TestSessionBuilder::new(&server).with_token("old").build();
//! fixture.session.get("news").await?;
//! ```

#![allow(dead_code)]

pub mod mocks;

pub use mocks::*;

use std::sync::Arc;

use myssue::adapters::mock::InMemoryPreferences;
use myssue::startup::{ClientConfig, Session};
use myssue::traits::Preferences;
use serde_json::json;
use tempfile::TempDir;
use wiremock::MockServer;

/// A session plus everything that must outlive it.
pub struct TestSession {
    pub session: Session,
    pub prefs: InMemoryPreferences,
    pub data_dir: TempDir,
}

/// Builder for sessions pointed at a mock backend.
pub struct TestSessionBuilder {
    base_url: String,
    prefs: Preferences,
}

impl TestSessionBuilder {
    pub fn new(server: &MockServer) -> Self {
        Self {
            base_url: server.uri(),
            prefs: Preferences::new(),
        }
    }

    /// Start with an access token already stored.
    pub fn with_token(mut self, token: &str) -> Self {
        self.prefs.insert("access_token".to_string(), json!(token));
        self
    }

    /// Start as an installation that finished registering.
    pub fn registered(mut self, uuid: &str, user_id: i64) -> Self {
        self.prefs.insert("uuid".to_string(), json!(uuid));
        self.prefs.insert("user_id".to_string(), json!(user_id));
        self
    }

    /// Start with a generated uuid but no user id.
    pub fn with_uuid(mut self, uuid: &str) -> Self {
        self.prefs.insert("uuid".to_string(), json!(uuid));
        self
    }

    /// Start with stored cookies.
    pub fn with_cookies(mut self, cookies: &[&str]) -> Self {
        self.prefs.insert("Cookies".to_string(), json!(cookies));
        self
    }

    pub fn build(self) -> TestSession {
        let data_dir = TempDir::new().expect("Failed to create temp dir");
        let prefs = InMemoryPreferences::with_preferences(self.prefs);
        let config = ClientConfig::new()
            .with_base_url(self.base_url)
            .with_data_dir(data_dir.path());
        let session = Session::with_preferences(config, Arc::new(prefs.clone()))
            .expect("Failed to build session");
        TestSession {
            session,
            prefs,
            data_dir,
        }
    }
}

/// Bearer header value for `token`.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

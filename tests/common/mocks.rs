//! Canned backend responses for integration tests.
//!
//! # Example
//!
//! ```ignore
//! use common::mocks::BackendResponse;
//!
//! let template = BackendResponse::new(200)
//!     .with_token("abc123")
//!     .with_cookie("refreshToken=r1; Path=/; HttpOnly")
//!     .build();
//! ```

use std::time::Duration;

use serde_json::Value;
use wiremock::ResponseTemplate;

/// Builder for a backend response.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    status: u16,
    token: Option<String>,
    cookies: Vec<String>,
    json: Option<Value>,
    body: Option<String>,
    delay: Option<Duration>,
}

impl BackendResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            token: None,
            cookies: Vec::new(),
            json: None,
            body: None,
            delay: None,
        }
    }

    /// Issue an access token in the `Authorization` response header.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_cookie(mut self, set_cookie: &str) -> Self {
        self.cookies.push(set_cookie.to_string());
        self
    }

    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn build(self) -> ResponseTemplate {
        let mut template = ResponseTemplate::new(self.status);
        if let Some(token) = self.token {
            template = template.insert_header("Authorization", format!("Bearer {}", token).as_str());
        }
        for cookie in self.cookies {
            template = template.append_header("Set-Cookie", cookie.as_str());
        }
        if let Some(json) = self.json {
            template = template.set_body_json(json);
        } else if let Some(body) = self.body {
            template = template.set_body_string(body);
        }
        if let Some(delay) = self.delay {
            template = template.set_delay(delay);
        }
        template
    }
}

/// `401` with a short body, as the backend sends for an expired token.
pub fn expired() -> ResponseTemplate {
    BackendResponse::new(401).with_body("token expired").build()
}

/// Successful reissue carrying `token`.
pub fn reissued(token: &str) -> ResponseTemplate {
    BackendResponse::new(200).with_token(token).build()
}

//! Mock implementations for testing.
//!
//! # Available Mocks
//!
//! - [`MockHttpClient`] - HTTP client with configurable responses
//! - [`InMemoryPreferences`] - In-memory preference storage

pub mod http;
pub mod preferences;

pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use preferences::InMemoryPreferences;

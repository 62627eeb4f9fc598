//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`FilePreferences`] - JSON-file preference storage
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles:
//! - [`mock::MockHttpClient`] - Configurable HTTP responses
//! - [`mock::InMemoryPreferences`] - In-memory preference storage

pub mod file_preferences;
pub mod mock;
pub mod reqwest_http;

pub use file_preferences::{FilePreferences, PREFERENCES_FILE};
pub use mock::{InMemoryPreferences, MockHttpClient};
pub use reqwest_http::ReqwestHttpClient;

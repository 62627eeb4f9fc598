//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP client operations
//! - [`PreferencesProvider`] - Durable key-value storage with snapshots
//! - [`Authenticator`] - Reaction to authentication challenges
//! - [`RequestInterceptor`] - Rewriting of outgoing requests

pub mod authenticator;
pub mod http;
pub mod preferences;

pub use authenticator::{Authenticator, RequestInterceptor};
pub use http::{find_header, Headers, HttpClient, HttpError, Method, Request, Response};
pub use preferences::{Preferences, PreferencesError, PreferencesProvider};

//! HTTP plumbing around the session: the persisted cookie jar, the
//! interceptor that attaches the access token, and the client that drives
//! the authenticator.

pub mod client;
pub mod cookie_jar;
pub mod interceptor;

pub use client::{AuthenticatedClient, MAX_FOLLOW_UPS};
pub use cookie_jar::{PreferencesCookieJar, COOKIES};
pub use interceptor::AuthInterceptor;

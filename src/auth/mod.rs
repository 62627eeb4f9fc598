//! Authentication for the Myssue client.
//!
//! This module provides:
//! - Credential storage and its in-memory session cache
//! - Client for the backend authentication endpoints
//! - First-launch device registration
//! - Token refresh when a request comes back unauthorized

pub mod api;
pub mod authenticator;
pub mod credentials;
pub mod registration;
pub mod session;
pub mod store;

pub use api::{AddUserRequest, AuthApi, AuthApiError, IssuedSession};
pub use authenticator::{TokenAuthenticator, MAX_RETRY_COUNT};
pub use credentials::{Credentials, ACCESS_TOKEN, USER_ID, UUID};
pub use registration::{DeviceRegistration, RegistrationOutcome};
pub use session::SessionCache;
pub use store::AuthStore;

//! Startup: configuration and assembly of a client session.
//!
//! # Components
//!
//! - [`config`] - Client configuration and environment overrides
//! - [`session`] - Construction and wiring of the shared components
//!
//! # Usage
//!
//! ```ignore
//! use myssue::startup::{ClientConfig, Session};
//!
//! let session = Session::connect(ClientConfig::from_env())?;
//! session.spawn_registration(None);
//! let response = session.get("news").await?;
//! ```

pub mod config;
pub mod session;

pub use config::{ClientConfig, BASE_URL_ENV, DATA_DIR_ENV, DEFAULT_BASE_URL};
pub use session::Session;

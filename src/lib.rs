//! Myssue - authenticated HTTP session core of the Myssue news client
//!
//! This library exposes modules for use by the binary and integration tests.

pub mod adapters;
pub mod auth;
pub mod error;
pub mod network;
pub mod startup;
pub mod storage;
pub mod traits;

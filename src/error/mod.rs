//! Error handling for the Myssue client.
//!
//! - **Error Categories**: high-level classification for retry decisions
//! - **Unified Error Type**: `MyssueError` wraps transport, endpoint and
//!   storage errors
//! - **Result Type Alias**: `MyssueResult<T>`
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | Network | Connection, DNS, timeout | Yes |
//! | Auth | Session refused or token missing | No |
//! | Server | Backend errors (5xx) | Yes |
//! | Client | Malformed request or response | No |
//! | System | Local storage | No |
//! | Configuration | Config issues | No |

mod category;
mod myssue_error;
mod result;

pub use category::ErrorCategory;
pub use myssue_error::MyssueError;
pub use result::{MyssueResult, ResultExt};
pub use crate::traits::{HttpError, PreferencesError};

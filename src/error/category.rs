//! Error category classification.
//!
//! Categories drive retry decisions and the hint printed next to an error.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection, DNS or timeout failures. Transient.
    Network,

    /// The backend refused the session or returned no token.
    Auth,

    /// HTTP 5xx from the backend. Transient.
    Server,

    /// Malformed requests or responses; retrying will not help.
    Client,

    /// Local storage failures.
    System,

    /// Invalid configuration such as an unusable base URL.
    Configuration,
}

impl ErrorCategory {
    /// Returns true if errors in this category are generally transient
    /// and the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Server => "server",
            ErrorCategory::Client => "client",
            ErrorCategory::System => "system",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Check your internet connection and try again",
            ErrorCategory::Auth => "Run `myssue register` or `myssue reissue` to restore the session",
            ErrorCategory::Server => "The server may be experiencing issues. Please try again later",
            ErrorCategory::Client => "This may be a bug. Please report this issue if it persists",
            ErrorCategory::System => "Check file permissions and available disk space in the data directory",
            ErrorCategory::Configuration => "Check MYSSUE_BASE_URL and MYSSUE_DATA_DIR",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

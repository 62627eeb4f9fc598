//! Unified error type for the Myssue client.

use thiserror::Error;

use super::category::ErrorCategory;
use crate::auth::AuthApiError;
use crate::traits::{HttpError, PreferencesError};

/// Any failure surfaced by the session layer.
///
/// The authentication core itself recovers locally (an aborted refresh or a
/// failed registration is an outcome, not an error); this type covers the
/// operations that do report failure to their caller.
#[derive(Debug, Error)]
pub enum MyssueError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Auth(#[from] AuthApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] PreferencesError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{operation}: {source}")]
    WithContext {
        operation: String,
        #[source]
        source: Box<MyssueError>,
    },
}

impl MyssueError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            MyssueError::Http(err) => http_category(err),
            MyssueError::Auth(err) => match err {
                AuthApiError::Http(err) => http_category(err),
                AuthApiError::ServerError { status, .. } => status_category(*status),
                AuthApiError::MissingToken => ErrorCategory::Auth,
                AuthApiError::Json(_) => ErrorCategory::Client,
            },
            MyssueError::Storage(_) => ErrorCategory::System,
            MyssueError::Configuration(_) => ErrorCategory::Configuration,
            MyssueError::WithContext { source, .. } => source.category(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Get the recovery hint for this error.
    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }

    /// Name the operation that failed.
    pub fn with_context(self, operation: impl Into<String>) -> Self {
        MyssueError::WithContext {
            operation: operation.into(),
            source: Box::new(self),
        }
    }
}

fn http_category(err: &HttpError) -> ErrorCategory {
    match err {
        HttpError::ConnectionFailed(_) | HttpError::Timeout(_) | HttpError::Io(_) => {
            ErrorCategory::Network
        }
        HttpError::ServerError { status, .. } => status_category(*status),
        HttpError::InvalidUrl(_) => ErrorCategory::Configuration,
        HttpError::TooManyFollowUps(_) => ErrorCategory::Auth,
        HttpError::Cancelled | HttpError::Other(_) => ErrorCategory::Client,
    }
}

fn status_category(status: u16) -> ErrorCategory {
    match status {
        401 | 403 => ErrorCategory::Auth,
        500..=599 => ErrorCategory::Server,
        _ => ErrorCategory::Client,
    }
}

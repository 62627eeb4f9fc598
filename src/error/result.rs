//! Result type alias for Myssue operations.

use super::myssue_error::MyssueError;

/// Type alias for Results using MyssueError.
pub type MyssueResult<T> = Result<T, MyssueError>;

/// Extension trait for Result types to name the failed operation.
///
/// # Example
///
/// ```ignore
/// use myssue::error::ResultExt;
///
/// let token = api.reissue_token().await.context("reissue")?;
/// ```
pub trait ResultExt<T> {
    fn context(self, operation: &str) -> MyssueResult<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<MyssueError>,
{
    fn context(self, operation: &str) -> MyssueResult<T> {
        self.map_err(|e| e.into().with_context(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::HttpError;

    #[test]
    fn test_context_wraps_error() {
        let result: Result<(), HttpError> = Err(HttpError::Cancelled);
        let err = result.context("get /news").unwrap_err();
        assert_eq!(err.to_string(), "get /news: Request cancelled");
    }

    #[test]
    fn test_context_passes_ok_through() {
        let result: Result<u8, HttpError> = Ok(1);
        assert_eq!(result.context("noop").unwrap(), 1);
    }
}

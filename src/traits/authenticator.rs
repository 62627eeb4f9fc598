//! Authentication hook traits used by the authenticated HTTP client.

use async_trait::async_trait;

use super::http::{Request, Response};

/// Reacts to an authentication challenge (HTTP 401).
///
/// Returning `Some(request)` asks the client to send that request as a
/// follow-up; `None` gives up and surfaces the failing response to the
/// caller.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, response: &Response) -> Option<Request>;
}

/// Rewrites every outgoing request before it is sent.
pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, request: Request) -> Request;
}

//! Request interceptor that attaches the cached access token.

use std::sync::Arc;

use crate::auth::api::bearer_header;
use crate::auth::SessionCache;
use crate::traits::{Request, RequestInterceptor};

/// Adds `Authorization: Bearer <token>` from the session cache.
///
/// Requests that already carry an `Authorization` header are left alone, as
/// are all requests while no usable token is cached.
#[derive(Debug, Clone)]
pub struct AuthInterceptor {
    cache: Arc<SessionCache>,
}

impl AuthInterceptor {
    pub fn new(cache: Arc<SessionCache>) -> Self {
        Self { cache }
    }
}

impl RequestInterceptor for AuthInterceptor {
    fn intercept(&self, request: Request) -> Request {
        if request.header("Authorization").is_some() {
            return request;
        }
        let creds = self.cache.credentials();
        if !creds.has_token() {
            return request;
        }
        match creds.access_token {
            Some(token) => request.with_header("Authorization", bearer_header(&token)),
            None => request,
        }
    }
}

//! HTTP client that authenticates its requests.
//!
//! [`AuthenticatedClient`] wraps a plain [`HttpClient`]. Interceptors run once
//! on every outgoing call. When a response comes back `401` the
//! [`Authenticator`] gets a chance to produce a follow-up request; each
//! follow-up response is linked to the one before it through
//! [`Response::prior_response`], which is how the authenticator bounds its
//! retries.

use async_trait::async_trait;
use std::sync::Arc;

use crate::traits::{Authenticator, HttpClient, HttpError, Request, RequestInterceptor, Response};

/// Hard cap on follow-up requests for a single call.
pub const MAX_FOLLOW_UPS: usize = 20;

const UNAUTHORIZED: u16 = 401;

/// [`HttpClient`] with request interceptors and an authenticator.
#[derive(Clone)]
pub struct AuthenticatedClient {
    inner: Arc<dyn HttpClient>,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("interceptors", &self.interceptors.len())
            .field("authenticator", &self.authenticator.is_some())
            .finish()
    }
}

impl AuthenticatedClient {
    pub fn new(inner: Arc<dyn HttpClient>) -> Self {
        Self {
            inner,
            interceptors: Vec::new(),
            authenticator: None,
        }
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    fn prepare(&self, request: Request) -> Request {
        self.interceptors
            .iter()
            .fold(request, |request, interceptor| interceptor.intercept(request))
    }
}

#[async_trait]
impl HttpClient for AuthenticatedClient {
    async fn execute(&self, request: Request) -> Result<Response, HttpError> {
        let mut request = self.prepare(request);
        let mut prior: Option<Response> = None;
        let mut follow_ups = 0;

        loop {
            let mut response = self.inner.execute(request.clone()).await?;
            if response.request.is_none() {
                response.request = Some(request);
            }
            if let Some(prior) = prior.take() {
                response = response.with_prior_response(prior.stripped());
            }

            if response.status != UNAUTHORIZED {
                return Ok(response);
            }
            let Some(authenticator) = self.authenticator.as_ref() else {
                return Ok(response);
            };

            match authenticator.authenticate(&response).await {
                Some(next) => {
                    follow_ups += 1;
                    if follow_ups > MAX_FOLLOW_UPS {
                        return Err(HttpError::TooManyFollowUps(follow_ups));
                    }
                    tracing::debug!("Retrying {} {} after 401", next.method, next.url);
                    request = next;
                    prior = Some(response);
                }
                None => return Ok(response),
            }
        }
    }
}

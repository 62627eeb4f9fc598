//! Token refresh on authentication failure.
//!
//! [`TokenAuthenticator`] is called by the authenticated client whenever a
//! response comes back `401`. It refreshes the access token through the
//! reissue endpoint and hands back the original request with the new token,
//! or `None` when recovery is not possible and the failure should reach the
//! caller unchanged.
//!
//! When many requests fail together because the same token expired, only
//! one of them performs the reissue. The others wait on the refresh lock and
//! then reuse what that single reissue produced.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::api::{bearer_header, strip_bearer, AuthApi};
use super::session::SessionCache;
use crate::traits::{Authenticator, Request, Response};

/// Number of chained responses after which recovery is abandoned.
pub const MAX_RETRY_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
enum RefreshResult {
    Success(String),
    Failure,
}

/// Count `response` and every response chained before it.
pub fn response_count(response: &Response) -> usize {
    let mut count = 1;
    let mut prior = response.prior_response.as_deref();
    while let Some(r) = prior {
        count += 1;
        prior = r.prior_response.as_deref();
    }
    count
}

/// Refreshes the access token and replays failed requests.
#[derive(Debug)]
pub struct TokenAuthenticator {
    cache: Arc<SessionCache>,
    api: AuthApi,
    max_attempts: usize,
    /// Bumped under `last_refresh` each time a reissue completes.
    generation: AtomicU64,
    last_refresh: Mutex<Option<RefreshResult>>,
}

impl TokenAuthenticator {
    /// `api` must be backed by a client that does not itself run this
    /// authenticator.
    pub fn new(cache: Arc<SessionCache>, api: AuthApi) -> Self {
        Self {
            cache,
            api,
            max_attempts: MAX_RETRY_COUNT,
            generation: AtomicU64::new(0),
            last_refresh: Mutex::new(None),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Number of reissue calls made so far.
    pub fn refresh_count(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn refresh_token(&self, request: &Request) -> RefreshResult {
        let seen = self.generation.load(Ordering::SeqCst);
        let mut last = self.last_refresh.lock().await;

        // Another caller refreshed while we waited.
        if self.generation.load(Ordering::SeqCst) != seen {
            if let Some(result) = last.clone() {
                tracing::debug!("Reusing refresh result from a concurrent request");
                return result;
            }
        }

        // The request went out with a token that has since been replaced.
        let sent = request.header("Authorization").and_then(strip_bearer);
        let creds = self.cache.credentials();
        if creds.has_token() {
            if let Some(current) = creds.access_token {
                if sent.as_deref().is_some_and(|s| s != current) {
                    tracing::debug!("Request carried a stale token; replaying with the current one");
                    return RefreshResult::Success(current);
                }
            }
        }

        let result = match self.api.reissue_token().await {
            Ok(token) => {
                tracing::info!("Access token reissued");
                self.cache.save_token(&token);
                RefreshResult::Success(token)
            }
            Err(e) => {
                tracing::warn!("Token reissue failed: {}", e);
                RefreshResult::Failure
            }
        };

        *last = Some(result.clone());
        self.generation.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn create_request_with_token(request: &Request, token: &str) -> Request {
        request
            .clone()
            .with_header("Authorization", bearer_header(token))
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(&self, response: &Response) -> Option<Request> {
        let count = response_count(response);
        if count >= self.max_attempts {
            tracing::warn!(
                "Giving up on authentication after {} attempts (limit {})",
                count,
                self.max_attempts
            );
            return None;
        }

        if !self.cache.credentials().has_token() {
            tracing::warn!("No access token cached; cannot reissue");
            return None;
        }

        let Some(request) = response.request.as_ref() else {
            tracing::warn!("Failed response has no request to replay");
            return None;
        };

        match self.refresh_token(request).await {
            RefreshResult::Success(token) => Some(Self::create_request_with_token(request, &token)),
            RefreshResult::Failure => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{InMemoryPreferences, MockHttpClient, MockResponse};
    use crate::storage::PersistQueue;
    use crate::auth::AuthStore;
    use crate::traits::{Headers, HttpError, PreferencesProvider};
    use bytes::Bytes;
    use std::time::Duration;

    const REISSUE_URL: &str = "https://api.myssue.test/auth/reissue";
    const NEWS_URL: &str = "https://api.myssue.test/news";

    fn setup(token: Option<&str>) -> (Arc<TokenAuthenticator>, Arc<SessionCache>, MockHttpClient) {
        let prefs: Arc<dyn PreferencesProvider> = Arc::new(InMemoryPreferences::new());
        let store = AuthStore::new(prefs.clone());
        let cache = Arc::new(SessionCache::new(&store, PersistQueue::spawn(prefs)));
        if let Some(token) = token {
            cache.save_token(token);
        }
        let http = MockHttpClient::new();
        let api = AuthApi::new("https://api.myssue.test", Arc::new(http.clone()));
        let authenticator = Arc::new(TokenAuthenticator::new(cache.clone(), api));
        (authenticator, cache, http)
    }

    fn reissued(token: &str) -> MockResponse {
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        MockResponse::Success(Response::with_headers(200, headers, Bytes::new()))
    }

    fn unauthorized(token: &str) -> Response {
        let request = Request::get(NEWS_URL).with_header("Authorization", bearer_header(token));
        Response::new(401, Bytes::new()).with_request(request)
    }

    #[test]
    fn test_response_count() {
        let first = Response::new(401, Bytes::new());
        assert_eq!(response_count(&first), 1);

        let second = Response::new(401, Bytes::new()).with_prior_response(first);
        let third = Response::new(401, Bytes::new()).with_prior_response(second);
        assert_eq!(response_count(&third), 3);
    }

    #[tokio::test]
    async fn test_refresh_replaces_authorization_header() {
        let (auth, cache, http) = setup(Some("old"));
        http.set_response(REISSUE_URL, reissued("abc123"));

        let replay = auth.authenticate(&unauthorized("old")).await.unwrap();
        assert_eq!(replay.header("Authorization"), Some("Bearer abc123"));
        assert_eq!(replay.url, NEWS_URL);
        assert_eq!(cache.access_token().as_deref(), Some("abc123"));
        assert_eq!(auth.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_deep_chain_aborts_without_network() {
        let (auth, _, http) = setup(Some("old"));
        http.set_response(REISSUE_URL, reissued("new"));

        let mut response = Response::new(401, Bytes::new());
        for _ in 0..3 {
            response = unauthorized("old").with_prior_response(response);
        }

        assert!(auth.authenticate(&response).await.is_none());
        assert!(http.get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_blank_token_aborts_without_network() {
        for token in [None, Some(""), Some("   ")] {
            let (auth, _, http) = setup(token);
            http.set_response(REISSUE_URL, reissued("new"));

            assert!(auth.authenticate(&unauthorized("old")).await.is_none());
            assert!(http.get_requests().is_empty());
        }
    }

    #[tokio::test]
    async fn test_reissue_rejected_aborts() {
        let (auth, cache, http) = setup(Some("old"));
        http.set_response(
            REISSUE_URL,
            MockResponse::Success(Response::new(401, Bytes::new())),
        );

        assert!(auth.authenticate(&unauthorized("old")).await.is_none());
        assert_eq!(cache.access_token().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_reissue_without_token_aborts() {
        let (auth, _, http) = setup(Some("old"));
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), "Bearer ".to_string());
        http.set_response(
            REISSUE_URL,
            MockResponse::Success(Response::with_headers(200, headers, Bytes::new())),
        );

        assert!(auth.authenticate(&unauthorized("old")).await.is_none());
    }

    #[tokio::test]
    async fn test_reissue_network_error_aborts() {
        let (auth, _, http) = setup(Some("old"));
        http.set_response(
            REISSUE_URL,
            MockResponse::Error(HttpError::ConnectionFailed("offline".to_string())),
        );

        assert!(auth.authenticate(&unauthorized("old")).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_failures_share_one_reissue() {
        let (auth, _, http) = setup(Some("old"));
        http.set_response(REISSUE_URL, reissued("fresh"));
        http.set_delay(Duration::from_millis(50));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let auth = auth.clone();
                tokio::spawn(async move { auth.authenticate(&unauthorized("old")).await })
            })
            .collect();

        for handle in handles {
            let replay = handle.await.unwrap().unwrap();
            assert_eq!(replay.header("Authorization"), Some("Bearer fresh"));
        }
        assert_eq!(http.request_count(REISSUE_URL), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failures_abort_together() {
        let (auth, _, http) = setup(Some("old"));
        http.set_response(
            REISSUE_URL,
            MockResponse::Success(Response::new(500, Bytes::new())),
        );
        http.set_delay(Duration::from_millis(50));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let auth = auth.clone();
                tokio::spawn(async move { auth.authenticate(&unauthorized("old")).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_none());
        }
        assert_eq!(http.request_count(REISSUE_URL), 1);
    }

    #[tokio::test]
    async fn test_stale_token_replays_without_reissue() {
        let (auth, _, http) = setup(Some("current"));

        let replay = auth.authenticate(&unauthorized("expired")).await.unwrap();
        assert_eq!(replay.header("Authorization"), Some("Bearer current"));
        assert!(http.get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_response_without_request_aborts() {
        let (auth, _, http) = setup(Some("old"));
        http.set_response(REISSUE_URL, reissued("new"));

        assert!(auth
            .authenticate(&Response::new(401, Bytes::new()))
            .await
            .is_none());
        assert!(http.get_requests().is_empty());
    }
}

//! Session assembly.
//!
//! A [`Session`] owns one instance of every shared component and hands out
//! references to them. Nothing in the crate is global; construct one session
//! per process and pass it (or its parts) to whatever needs them.
//!
//! Two HTTP stacks share the cookie jar:
//! - the plain client used by [`AuthApi`] for registration and reissue,
//! - the [`AuthenticatedClient`] used for everything else, which adds the
//!   access token and runs the [`TokenAuthenticator`] on `401`.

use std::sync::Arc;
use tokio::task::JoinHandle;

use super::config::ClientConfig;
use crate::adapters::{FilePreferences, ReqwestHttpClient};
use crate::auth::api::join_url;
use crate::auth::{
    AuthApi, AuthStore, DeviceRegistration, RegistrationOutcome, SessionCache, TokenAuthenticator,
};
use crate::error::{MyssueError, MyssueResult, ResultExt};
use crate::network::{AuthInterceptor, AuthenticatedClient, PreferencesCookieJar};
use crate::storage::PersistQueue;
use crate::traits::{Headers, HttpClient, PreferencesProvider, Response};

/// Every shared component of a running client.
pub struct Session {
    config: ClientConfig,
    store: AuthStore,
    cache: Arc<SessionCache>,
    queue: PersistQueue,
    cookie_jar: Option<Arc<PreferencesCookieJar>>,
    api: AuthApi,
    authenticator: Arc<TokenAuthenticator>,
    registration: Arc<DeviceRegistration>,
    client: AuthenticatedClient,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("credentials", &self.cache.credentials())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open the preferences file under the configured data directory and
    /// build a session backed by reqwest.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(config: ClientConfig) -> MyssueResult<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| {
                MyssueError::Configuration(format!(
                    "cannot create data directory {}: {}",
                    config.data_dir.display(),
                    e
                ))
            })?;
        let prefs = FilePreferences::open(config.preferences_path());
        tracing::info!("Using preferences at {}", prefs.path().display());
        Self::with_preferences(config, Arc::new(prefs))
    }

    /// Build a reqwest-backed session over any preferences backend.
    pub fn with_preferences(
        config: ClientConfig,
        prefs: Arc<dyn PreferencesProvider>,
    ) -> MyssueResult<Self> {
        let queue = PersistQueue::spawn(prefs.clone());
        let jar = Arc::new(PreferencesCookieJar::restore(
            &prefs.snapshot(),
            queue.clone(),
        ));
        let http = ReqwestHttpClient::with_cookie_jar(&config, jar.clone())
            .context("build http client")?;
        Ok(Self::assemble(config, prefs, queue, Arc::new(http), Some(jar)))
    }

    /// Build a session over an arbitrary HTTP client, without a cookie jar.
    pub fn from_parts(
        config: ClientConfig,
        prefs: Arc<dyn PreferencesProvider>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let queue = PersistQueue::spawn(prefs.clone());
        Self::assemble(config, prefs, queue, http, None)
    }

    fn assemble(
        config: ClientConfig,
        prefs: Arc<dyn PreferencesProvider>,
        queue: PersistQueue,
        http: Arc<dyn HttpClient>,
        cookie_jar: Option<Arc<PreferencesCookieJar>>,
    ) -> Self {
        let store = AuthStore::new(prefs);
        let cache = Arc::new(SessionCache::new(&store, queue.clone()));
        let api = AuthApi::new(config.base_url.clone(), http.clone());
        let authenticator = Arc::new(
            TokenAuthenticator::new(cache.clone(), api.clone())
                .with_max_attempts(config.max_auth_attempts),
        );
        let registration = Arc::new(DeviceRegistration::new(cache.clone(), api.clone()));
        let client = AuthenticatedClient::new(http)
            .with_interceptor(Arc::new(AuthInterceptor::new(cache.clone())))
            .with_authenticator(authenticator.clone());

        Self {
            config,
            store,
            cache,
            queue,
            cookie_jar,
            api,
            authenticator,
            registration,
            client,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &AuthStore {
        &self.store
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    pub fn cookie_jar(&self) -> Option<&Arc<PreferencesCookieJar>> {
        self.cookie_jar.as_ref()
    }

    pub fn api(&self) -> &AuthApi {
        &self.api
    }

    pub fn authenticator(&self) -> &Arc<TokenAuthenticator> {
        &self.authenticator
    }

    pub fn registration(&self) -> &Arc<DeviceRegistration> {
        &self.registration
    }

    /// Client for backend calls that need the access token.
    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    /// Run device registration now unless the device is already registered.
    pub async fn register_if_needed(&self, push_token: Option<&str>) -> RegistrationOutcome {
        self.registration.register_if_needed(push_token).await
    }

    /// Start registration in the background if this is a first launch or an
    /// earlier registration never completed.
    pub fn spawn_registration(
        &self,
        push_token: Option<String>,
    ) -> JoinHandle<Option<RegistrationOutcome>> {
        self.registration
            .clone()
            .spawn_on_first_launch(&self.store, push_token)
    }

    /// Fetch a new access token regardless of the current one.
    pub async fn reissue(&self) -> MyssueResult<String> {
        let token = self.api.reissue_token().await.context("reissue")?;
        self.cache.save_token(&token);
        tracing::info!("Access token reissued on request");
        Ok(token)
    }

    /// Authenticated GET of a path relative to the base URL.
    pub async fn get(&self, path: &str) -> MyssueResult<Response> {
        let url = join_url(&self.config.base_url, path);
        self.client
            .get(&url, &Headers::new())
            .await
            .context(&format!("GET {}", url))
    }

    /// Wait for every queued credential and cookie write to reach storage.
    pub async fn shutdown(&self) {
        self.queue.flush().await;
        tracing::debug!("Session state flushed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{InMemoryPreferences, MockHttpClient, MockResponse};
    use bytes::Bytes;

    const BASE: &str = "https://api.myssue.test";

    fn session() -> (Session, MockHttpClient) {
        let http = MockHttpClient::new();
        let session = Session::from_parts(
            ClientConfig::new().with_base_url(BASE),
            Arc::new(InMemoryPreferences::new()),
            Arc::new(http.clone()),
        );
        (session, http)
    }

    fn with_token(status: u16, token: &str) -> MockResponse {
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        MockResponse::Success(Response::with_headers(status, headers, Bytes::new()))
    }

    #[tokio::test]
    async fn test_get_attaches_token() {
        let (session, http) = session();
        session.cache().save_token("abc");
        http.set_response(
            "https://api.myssue.test/news",
            MockResponse::Success(Response::new(200, Bytes::from("[]"))),
        );

        let response = session.get("/news").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(
            http.get_requests()[0].header("Authorization"),
            Some("Bearer abc")
        );
    }

    #[tokio::test]
    async fn test_expired_token_is_reissued_and_replayed() {
        let (session, http) = session();
        session.cache().save_token("old");
        let news = "https://api.myssue.test/news";
        http.push_response(
            news,
            MockResponse::Success(Response::new(401, Bytes::new())),
        );
        http.set_response(
            news,
            MockResponse::Success(Response::new(200, Bytes::from("[]"))),
        );
        http.set_response("https://api.myssue.test/auth/reissue", with_token(200, "new"));

        let response = session.get("news").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(session.cache().access_token().as_deref(), Some("new"));

        let retried = http
            .get_requests()
            .into_iter()
            .filter(|r| r.url == news)
            .last()
            .unwrap();
        assert_eq!(retried.header("Authorization"), Some("Bearer new"));

        session.shutdown().await;
        assert_eq!(
            session.store().current(crate::auth::ACCESS_TOKEN).as_deref(),
            Some("new")
        );
    }

    #[tokio::test]
    async fn test_forced_reissue() {
        let (session, http) = session();
        http.set_response("https://api.myssue.test/auth/reissue", with_token(200, "forced"));

        assert_eq!(session.reissue().await.unwrap(), "forced");
        assert_eq!(session.cache().access_token().as_deref(), Some("forced"));
    }

    #[tokio::test]
    async fn test_forced_reissue_failure_has_context() {
        let (session, http) = session();
        http.set_response(
            "https://api.myssue.test/auth/reissue",
            MockResponse::Success(Response::new(401, Bytes::new())),
        );

        let err = session.reissue().await.unwrap_err();
        assert!(err.to_string().starts_with("reissue: "));
        assert_eq!(err.category(), crate::error::ErrorCategory::Auth);
    }

    #[tokio::test]
    async fn test_connect_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("myssue");
        let session = Session::connect(
            ClientConfig::new()
                .with_base_url(BASE)
                .with_data_dir(&data_dir),
        )
        .unwrap();

        assert!(data_dir.is_dir());
        assert!(session.cookie_jar().is_some());
        assert_eq!(session.cache().credentials(), crate::auth::Credentials::default());
    }
}

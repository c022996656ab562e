//! Authenticated HTTP client for the Umbrella REST API.
//!
//! [`ApiClient`] owns a `reqwest::Client`, the API base URL and a
//! [`TokenProvider`]. Each request obtains a valid bearer token first
//! (acquiring one lazily on first use or after expiry), attaches it, and
//! decodes the JSON body. Non-success responses are returned as
//! [`Error::Api`] with the body preserved. Nothing is retried.

use crate::auth::{AccessToken, TokenProvider};
use crate::config::{Credentials, UmbrellaConfig};
use crate::query::QueryParams;
use crate::{Error, Result};
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = concat!("umbrella-rs/", env!("CARGO_PKG_VERSION"));

// Connection pool settings

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// HTTP client configuration.
///
/// Derived from [`UmbrellaConfig`]; kept separate so the transport settings
/// can be tuned without touching endpoints or credentials.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// TCP + TLS handshake timeout
    pub connect_timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Whether to verify TLS certificates
    pub tls_verify: bool,

    /// `User-Agent` header value
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::from(&UmbrellaConfig::default())
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Build the underlying `reqwest::Client`.
    pub fn build_http_client(&self) -> Result<Client> {
        let mut builder = ClientBuilder::new()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host);

        if !self.tls_verify {
            warn!("TLS verification disabled for Umbrella client");
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|err| Error::Config(format!("Failed to build HTTP client: {err}")))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&UmbrellaConfig> for ClientConfig {
    fn from(config: &UmbrellaConfig) -> Self {
        Self {
            timeout: config.timeout(),
            connect_timeout: config.connect_timeout(),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            tls_verify: config.tls_verify,
            user_agent: config
                .user_agent
                .clone()
                .unwrap_or_else(|| USER_AGENT.to_string()),
        }
    }
}

/// Authenticated client for an Umbrella API family.
///
/// Clones share the token cache. The cache sits behind an async mutex which
/// is held for the token check and an eventual refresh only, never across a
/// resource request.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    auth: Arc<Mutex<TokenProvider>>,
}

impl ApiClient {
    /// Create a client. No network traffic happens until the first request.
    pub fn new(credentials: Credentials, config: &UmbrellaConfig) -> Result<Self> {
        Self::with_http_config(credentials, config, &ClientConfig::from(config))
    }

    /// Create a client with explicit transport settings.
    pub fn with_http_config(
        credentials: Credentials,
        config: &UmbrellaConfig,
        http_config: &ClientConfig,
    ) -> Result<Self> {
        config.check()?;
        let base_url = config.parse_base_url()?;
        let token_url = config.parse_token_url()?;
        let http = http_config.build_http_client()?;

        debug!(base_url = %base_url, "Created Umbrella API client");

        Ok(Self {
            auth: Arc::new(Mutex::new(TokenProvider::new(
                http.clone(),
                token_url,
                credentials,
            ))),
            http,
            base_url,
        })
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Seed the token cache with a token obtained elsewhere.
    pub async fn set_token(&self, token: AccessToken) {
        self.auth.lock().await.set_token(token);
    }

    /// Drop the cached token; the next request re-authenticates.
    pub async fn invalidate_token(&self) {
        self.auth.lock().await.invalidate();
    }

    /// Drop the cached token if it is still `rejected`.
    async fn invalidate_rejected(&self, rejected: &str) {
        if !self.auth.lock().await.invalidate_if(rejected) {
            debug!("Cached token already replaced after 401");
        }
    }

    /// Return a valid bearer token, acquiring one if needed.
    pub async fn bearer_token(&self) -> Result<String> {
        self.auth.lock().await.bearer_token().await
    }

    /// Sends an authenticated GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &QueryParams) -> Result<T> {
        self.request::<T, ()>(Method::GET, path, query, None).await
    }

    /// Sends an authenticated POST request with a JSON body.
    pub async fn post<B, T>(&self, path: &str, body: &B, query: &QueryParams) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, query, Some(body)).await
    }

    /// Sends an authenticated PATCH request with a JSON body.
    pub async fn patch<B, T>(&self, path: &str, body: &B, query: &QueryParams) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PATCH, path, query, Some(body)).await
    }

    /// Sends an authenticated PUT request with a JSON body.
    pub async fn put<B, T>(&self, path: &str, body: &B, query: &QueryParams) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, path, query, Some(body)).await
    }

    /// Sends an authenticated DELETE request, optionally with a JSON body.
    pub async fn delete<B, T>(&self, path: &str, body: Option<&B>, query: &QueryParams) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::DELETE, path, query, body).await
    }

    /// Sends an arbitrary authenticated request and decodes the JSON reply.
    ///
    /// `path` is relative to the base URL; a leading `/` is accepted.
    /// An empty success body decodes as JSON `null`.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &QueryParams,
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.build_url(path)?;
        let token = self.bearer_token().await?;

        debug!(method = %method, path = %path, params = ?query.pairs(), "Sending Umbrella request");

        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(&token)
            .header("Accept", "application/json");
        if !query.is_empty() {
            request = request.query(query.pairs());
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                warn!(method = %method, path = %path, "Umbrella rejected the access token");
                self.invalidate_rejected(&token).await;
            } else {
                debug!(method = %method, path = %path, %status, "Umbrella request failed");
            }
            return Err(Error::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let raw = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(raw).map_err(|err| {
            Error::Parse(format!("Failed to parse response for `{path}`: {err}"))
        })
    }

    /// Resolve `path` below the base URL.
    ///
    /// The bearer token must only ever reach the configured API, so absolute
    /// URLs and `..` segments leaving the base path are rejected.
    fn build_url(&self, path: &str) -> Result<Url> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid path `{path}`: {err}")))?;

        if url.origin() != self.base_url.origin() || !url.path().starts_with(self.base_url.path())
        {
            return Err(Error::InvalidEndpoint(format!(
                "Path `{path}` resolves outside {}",
                self.base_url
            )));
        }

        Ok(url)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::{json, Value};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_token(server: &MockServer, token: &str, expect: u64) {
        Mock::given(method("POST"))
            .and(path("/auth/v2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": token,
                "token_type": "bearer",
                "expires_in": 3600
            })))
            .expect(expect)
            .mount(server)
            .await;
    }

    fn test_client(server: &MockServer) -> ApiClient {
        let config = UmbrellaConfig::new()
            .with_base_url(format!("{}/policies/v2", server.uri()))
            .with_token_url(format!("{}/auth/v2/token", server.uri()));
        ApiClient::new(Credentials::new("abc", "xyz"), &config).unwrap()
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(90));
        assert_eq!(config.pool_max_idle_per_host, 10);
        assert!(config.user_agent.starts_with("umbrella-rs/"));
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_pool_idle_timeout(Duration::from_secs(120))
            .with_pool_max_idle(20);

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(120));
        assert_eq!(config.pool_max_idle_per_host, 20);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = UmbrellaConfig::new().with_token_url("nope");
        let err = ApiClient::new(Credentials::new("a", "b"), &config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn construction_is_lazy() {
        let server = MockServer::start().await;
        mount_token(&server, "tok1", 0).await;
        let _client = test_client(&server);
    }

    #[tokio::test]
    async fn get_attaches_bearer_token_and_query() {
        let server = MockServer::start().await;
        mount_token(&server, "tok1", 1).await;
        Mock::given(method("GET"))
            .and(path("/policies/v2/destinationlists"))
            .and(header("authorization", "Bearer tok1"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let value: Value = client
            .get("/destinationlists", &QueryParams::new().with("page", 2))
            .await
            .unwrap();
        assert_eq!(value, json!({"data": []}));
    }

    #[tokio::test]
    async fn patch_sends_json_body() {
        let server = MockServer::start().await;
        mount_token(&server, "tok1", 1).await;
        Mock::given(method("PATCH"))
            .and(path("/policies/v2/destinationlists/7"))
            .and(body_json(json!({"name": "renamed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 7}})))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let value: Value = client
            .patch(
                "destinationlists/7",
                &json!({"name": "renamed"}),
                &QueryParams::new(),
            )
            .await
            .unwrap();
        assert_eq!(value["data"]["id"], 7);
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let server = MockServer::start().await;
        mount_token(&server, "tok1", 1).await;
        Mock::given(method("DELETE"))
            .and(path("/policies/v2/destinationlists/7"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let value: Value = client
            .delete::<(), _>("destinationlists/7", None, &QueryParams::new())
            .await
            .unwrap();
        assert!(value.is_null());
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        mount_token(&server, "tok1", 1).await;
        Mock::given(method("GET"))
            .and(path("/policies/v2/destinationlists"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client
            .get::<Value>("destinationlists", &QueryParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn unauthorized_response_drops_cached_token() {
        let server = MockServer::start().await;
        mount_token(&server, "tok1", 2).await;
        Mock::given(method("GET"))
            .and(path("/policies/v2/destinationlists"))
            .respond_with(ResponseTemplate::new(401).set_body_string("revoked"))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server);
        for _ in 0..2 {
            let err = client
                .get::<Value>("destinationlists", &QueryParams::new())
                .await
                .unwrap_err();
            assert_eq!(err.status(), Some(401));
        }
    }

    #[tokio::test]
    async fn seeded_token_skips_exchange() {
        let server = MockServer::start().await;
        mount_token(&server, "unused", 0).await;
        Mock::given(method("GET"))
            .and(path("/policies/v2/destinationlists"))
            .and(header("authorization", "Bearer seeded"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        client
            .set_token(AccessToken::new("seeded", 3600, Utc::now()))
            .await;
        let value: Value = client
            .get("destinationlists", &QueryParams::new())
            .await
            .unwrap();
        assert_eq!(value, json!([]));
    }

    #[tokio::test]
    async fn paths_cannot_leave_the_api() {
        let server = MockServer::start().await;
        mount_token(&server, "tok1", 0).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server);
        for path in [
            "https://other.example/x".to_string(),
            format!("{}/auth/v2/token", server.uri()),
            "../../auth/v2/token".to_string(),
            "../v1/destinationlists".to_string(),
        ] {
            let err = client
                .get::<Value>(&path, &QueryParams::new())
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::InvalidEndpoint(_)),
                "`{path}` should be rejected, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn rejected_token_does_not_evict_replacement() {
        let server = MockServer::start().await;
        mount_token(&server, "unused", 0).await;

        let client = test_client(&server);
        // Another caller refreshed before the 401 for "old" was handled.
        client
            .set_token(AccessToken::new("new", 3600, Utc::now()))
            .await;
        client.invalidate_rejected("old").await;
        assert_eq!(client.bearer_token().await.unwrap(), "new");

        client.invalidate_rejected("new").await;
        assert!(client.auth.lock().await.token().is_none());
    }

    #[test]
    fn nested_paths_stay_under_base() {
        let config = UmbrellaConfig::default();
        let client = ApiClient::new(Credentials::new("a", "b"), &config).unwrap();
        assert_eq!(
            client.build_url("/destinationlists/7/destinations").unwrap().as_str(),
            "https://api.umbrella.com/policies/v2/destinationlists/7/destinations"
        );
    }

    #[tokio::test]
    async fn unreachable_api_host_is_connectivity_error() {
        let server = MockServer::start().await;
        mount_token(&server, "tok1", 1).await;

        let config = UmbrellaConfig::new()
            .with_base_url("http://127.0.0.1:1/policies/v2")
            .with_token_url(format!("{}/auth/v2/token", server.uri()));
        let client = ApiClient::new(Credentials::new("abc", "xyz"), &config).unwrap();

        let err = client
            .get::<Value>("destinationlists", &QueryParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn clones_share_token_cache() {
        let server = MockServer::start().await;
        mount_token(&server, "tok1", 1).await;

        let client = test_client(&server);
        let other = client.clone();
        assert_eq!(client.bearer_token().await.unwrap(), "tok1");
        assert_eq!(other.bearer_token().await.unwrap(), "tok1");
    }

    #[tokio::test]
    async fn expired_seed_is_replaced() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh", 1).await;

        let client = test_client(&server);
        client
            .set_token(AccessToken::new(
                "stale",
                3600,
                Utc::now() - ChronoDuration::hours(3),
            ))
            .await;
        assert_eq!(client.bearer_token().await.unwrap(), "fresh");
    }
}

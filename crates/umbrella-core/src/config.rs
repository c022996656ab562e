//! Configuration structures for Umbrella clients.
//!
//! [`UmbrellaConfig`] carries the endpoints and HTTP settings, [`Credentials`]
//! carries the API key pair. They are kept apart so the configuration can be
//! serialized freely while the secret never is.

use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Base URL of the Umbrella Policies v2 API.
pub const DEFAULT_BASE_URL: &str = "https://api.umbrella.com/policies/v2";

/// OAuth2 token endpoint of the Umbrella API.
pub const DEFAULT_TOKEN_URL: &str = "https://api.umbrella.com/auth/v2/token";

/// Environment variable holding the API client ID.
pub const CLIENT_ID_ENV: &str = "UMBRELLA_CLIENT_ID";

/// Environment variable holding the API client secret.
pub const CLIENT_SECRET_ENV: &str = "UMBRELLA_CLIENT_SECRET";

/// Configuration for an Umbrella client instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UmbrellaConfig {
    /// Base URL that resource paths are appended to
    #[validate(url)]
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth2 token endpoint
    #[validate(url)]
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds
    #[validate(range(min = 1, max = 60))]
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional override for the `User-Agent` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    5
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_tls_verify() -> bool {
    true
}

impl UmbrellaConfig {
    /// Create a configuration pointing at the public Umbrella endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API base URL (e.g. a mock server in tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the OAuth2 token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set connect timeout in seconds.
    #[must_use]
    pub const fn with_connect_timeout(mut self, seconds: u64) -> Self {
        self.connect_timeout_secs = seconds;
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the connect timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending fields.
    pub fn check(&self) -> Result<(), Error> {
        self.validate().map_err(Error::from)
    }

    /// Parse the base URL.
    ///
    /// A trailing slash is enforced so that [`Url::join`] appends resource
    /// paths instead of replacing the last segment (`/policies/v2`).
    pub fn parse_base_url(&self) -> Result<Url, Error> {
        let mut raw = self.base_url.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| Error::Config(format!("Invalid base URL: {e}")))
    }

    /// Parse the token endpoint URL.
    pub fn parse_token_url(&self) -> Result<Url, Error> {
        Url::parse(&self.token_url).map_err(|e| Error::Config(format!("Invalid token URL: {e}")))
    }
}

impl Default for UmbrellaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_url: default_token_url(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            tls_verify: default_tls_verify(),
            user_agent: None,
        }
    }
}

/// API key pair used for the client-credentials grant.
///
/// The secret is wrapped in [`SecretString`] so it never shows up in `Debug`
/// output or logs.
#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: SecretString,
}

impl Credentials {
    /// Create credentials from a client ID and secret.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    /// Read credentials from `UMBRELLA_CLIENT_ID` and `UMBRELLA_CLIENT_SECRET`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when either variable is unset or empty.
    pub fn from_env() -> Result<Self, Error> {
        let client_id = read_env(CLIENT_ID_ENV)?;
        let client_secret = read_env(CLIENT_SECRET_ENV)?;
        Ok(Self::new(client_id, client_secret))
    }

    /// The client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The client secret, exposed for the token request only.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

fn read_env(name: &str) -> Result<String, Error> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::Config(format!("{name} is not set"))),
    }
}

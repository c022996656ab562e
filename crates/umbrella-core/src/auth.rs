//! OAuth2 client-credentials authentication for the Umbrella API.
//!
//! The token endpoint is called with HTTP Basic auth (client ID and secret)
//! and a `grant_type=client_credentials` form body. The resulting bearer
//! token is cached in [`TokenProvider`] together with its expiry and is
//! replaced wholesale on every refresh.

use crate::config::Credentials;
use crate::{Error, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use url::Url;

/// Seconds subtracted from `expires_in` so a token is refreshed before the
/// server starts rejecting it.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// Upper bound applied to a server-supplied `expires_in` (one year).
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 365 * 24 * 60 * 60;

/// Form body sent to the token endpoint.
#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
}

/// Subset of the token endpoint response that the client needs.
/// Extra fields such as `scope` are ignored.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// The bearer token.
    pub access_token: String,
    /// Token type, `bearer` for Umbrella.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// A bearer token and the instant it stops being usable.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
    refresh_at: DateTime<Utc>,
}

impl AccessToken {
    /// Build a token acquired at `acquired_at` that lives for `expires_in` seconds.
    #[must_use]
    pub fn new(value: impl Into<String>, expires_in: i64, acquired_at: DateTime<Utc>) -> Self {
        let lifetime = expires_in.clamp(0, MAX_TOKEN_LIFETIME_SECS);
        let usable = (lifetime - EXPIRY_BUFFER_SECS).max(0);
        Self {
            value: value.into(),
            expires_at: offset(acquired_at, lifetime),
            refresh_at: offset(acquired_at, usable),
        }
    }

    /// Build a token from a token endpoint response received now.
    #[must_use]
    pub fn from_response(response: TokenResponse) -> Self {
        Self::new(response.access_token, response.expires_in, Utc::now())
    }

    /// The raw bearer token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// When the server will stop accepting the token.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token should be replaced at `now`, safety buffer included.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_at
    }

    /// Whether the token should be replaced right now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// `at + secs`, saturating at the latest representable instant.
fn offset(at: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    ChronoDuration::try_seconds(secs)
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Acquires and caches access tokens.
///
/// Invariants:
/// - `token` is `None` until the first successful refresh or after
///   [`TokenProvider::invalidate`].
/// - A cached token is only handed out while it is not expired.
pub struct TokenProvider {
    http: Client,
    token_url: Url,
    credentials: Credentials,
    token: Option<AccessToken>,
}

impl TokenProvider {
    /// Create a provider. No request is made until a token is needed.
    #[must_use]
    pub fn new(http: Client, token_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            token_url,
            credentials,
            token: None,
        }
    }

    /// The credentials this provider authenticates with.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the cached token if it is still valid.
    #[must_use]
    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref().filter(|token| !token.is_expired())
    }

    /// Replace the cached token.
    pub fn set_token(&mut self, token: AccessToken) {
        self.token = Some(token);
    }

    /// Drop the cached token so the next request re-authenticates.
    pub fn invalidate(&mut self) {
        self.token = None;
    }

    /// Drop the cached token only if it is still `value`.
    ///
    /// A request rejected with a token that has since been replaced must not
    /// throw away the replacement. Returns whether the cache was cleared.
    pub fn invalidate_if(&mut self, value: &str) -> bool {
        if self.token.as_ref().is_some_and(|token| token.as_str() == value) {
            self.token = None;
            true
        } else {
            false
        }
    }

    /// Returns a usable bearer token, exchanging credentials when the cache
    /// is empty or stale.
    pub async fn bearer_token(&mut self) -> Result<String> {
        if let Some(token) = self.token() {
            return Ok(token.as_str().to_owned());
        }
        self.refresh_token().await
    }

    /// Exchanges the credentials for a new token and caches it.
    ///
    /// The body is read before the status is checked so the server's
    /// explanation ends up in the error.
    pub async fn refresh_token(&mut self) -> Result<String> {
        debug!(url = %self.token_url, client_id = %self.credentials.client_id(), "Requesting Umbrella access token");

        let response = self
            .http
            .post(self.token_url.clone())
            .basic_auth(
                self.credentials.client_id(),
                Some(self.credentials.client_secret()),
            )
            .header("Accept", "application/json")
            .form(&TokenRequest {
                grant_type: "client_credentials",
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(%status, "Umbrella token request rejected");
            return Err(Error::Authentication(format!(
                "token request failed ({status}): {body}"
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|err| {
            Error::Authentication(format!("invalid token response: {err}"))
        })?;

        if parsed.access_token.is_empty() {
            return Err(Error::Authentication(
                "token response contained an empty access_token".to_string(),
            ));
        }

        let token = AccessToken::from_response(parsed);
        info!(expires_at = %token.expires_at(), "Acquired Umbrella access token");

        let value = token.as_str().to_owned();
        self.token = Some(token);
        Ok(value)
    }
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("token_url", &self.token_url.as_str())
            .field("credentials", &self.credentials)
            .field("token", &self.token)
            .finish()
    }
}

//! Asynchronous Policies v2 client implementation.

use crate::models::{
    CreateDestinationListRequest, DestinationAccess, NewDestination, UpdateDestinationListRequest,
};
use crate::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use umbrella_core::client::ClientConfig;
use umbrella_core::config::{Credentials, UmbrellaConfig};
use umbrella_core::{ApiClient, Error, QueryParams};
use url::Url;
use validator::Validate;

/// Records requested per page when walking a list endpoint.
pub const PAGE_SIZE: usize = 100;

/// Maximum entries sent in one add/remove destinations call.
pub const BATCH_SIZE: usize = 100;

const DESTINATION_LISTS: &str = "destinationlists";

/// Builder for [`PoliciesClient`].
#[derive(Debug, Clone)]
pub struct PoliciesClientBuilder {
    credentials: Credentials,
    config: UmbrellaConfig,
    http_config: Option<ClientConfig>,
}

impl PoliciesClientBuilder {
    /// Create a builder for the given API key pair.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::from_credentials(Credentials::new(client_id, client_secret))
    }

    /// Create a builder from existing credentials.
    #[must_use]
    pub fn from_credentials(credentials: Credentials) -> Self {
        Self {
            credentials,
            config: UmbrellaConfig::default(),
            http_config: None,
        }
    }

    /// Replace the whole endpoint configuration.
    #[must_use]
    pub fn with_config(mut self, config: UmbrellaConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the Policies API base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.config = self.config.with_base_url(url);
        self
    }

    /// Override the OAuth2 token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.config = self.config.with_token_url(url);
        self
    }

    /// Set the request timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.config = self.config.with_timeout(seconds);
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = Some(config);
        self
    }

    /// Build the client. No request is sent yet.
    pub fn build(self) -> Result<PoliciesClient> {
        let http_config = self
            .http_config
            .unwrap_or_else(|| ClientConfig::from(&self.config));
        let api = ApiClient::with_http_config(self.credentials, &self.config, &http_config)?;
        Ok(PoliciesClient { api })
    }
}

/// Client for the Umbrella Policies v2 API.
///
/// Every method returns the API's JSON unchanged (records are
/// [`serde_json::Value`]s). Clones share one token cache.
#[derive(Debug, Clone)]
pub struct PoliciesClient {
    api: ApiClient,
}

impl PoliciesClient {
    /// Client against the public Umbrella endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        PoliciesClientBuilder::new(client_id, client_secret).build()
    }

    /// Client using `UMBRELLA_CLIENT_ID` / `UMBRELLA_CLIENT_SECRET`.
    pub fn from_env() -> Result<Self> {
        PoliciesClientBuilder::from_credentials(Credentials::from_env()?).build()
    }

    /// Start a builder.
    pub fn builder(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> PoliciesClientBuilder {
        PoliciesClientBuilder::new(client_id, client_secret)
    }

    /// Wrap an existing authenticated client.
    #[must_use]
    pub fn from_api_client(api: ApiClient) -> Self {
        Self { api }
    }

    /// The underlying authenticated client, for endpoints without a wrapper.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.api.base_url()
    }

    /// List every destination list, following pages.
    pub async fn destination_lists(&self, query: &QueryParams) -> Result<Vec<Value>> {
        self.get_all(DESTINATION_LISTS, query).await
    }

    /// Fetch one destination list.
    pub async fn destination_list(&self, list_id: i64, query: &QueryParams) -> Result<Value> {
        let path = format!("{DESTINATION_LISTS}/{list_id}");
        let response: Value = self.api.get(&path, query).await?;
        take_field(response, "data", &path)
    }

    /// Create a destination list. Returns the full response body.
    pub async fn create_destination_list(
        &self,
        name: &str,
        access: DestinationAccess,
        is_global: bool,
        query: &QueryParams,
    ) -> Result<Value> {
        let request = CreateDestinationListRequest {
            name: name.to_string(),
            access,
            is_global,
        };
        request
            .validate()
            .map_err(|err| Error::InvalidRequest(format!("destination list: {err}")))?;

        info!(name, %access, is_global, "Creating destination list");
        self.api.post(DESTINATION_LISTS, &request, query).await
    }

    /// Rename a destination list. Returns the updated list.
    pub async fn update_destination_list(&self, list_id: i64, name: &str) -> Result<Value> {
        let request = UpdateDestinationListRequest {
            name: name.to_string(),
        };
        request
            .validate()
            .map_err(|err| Error::InvalidRequest(format!("destination list: {err}")))?;

        let path = format!("{DESTINATION_LISTS}/{list_id}");
        let response: Value = self.api.patch(&path, &request, &QueryParams::new()).await?;
        take_field(response, "data", &path)
    }

    /// Delete a destination list. Returns the API's `status` object.
    pub async fn delete_destination_list(&self, list_id: i64) -> Result<Value> {
        let path = format!("{DESTINATION_LISTS}/{list_id}");
        info!(list_id, "Deleting destination list");
        let response: Value = self
            .api
            .delete::<(), _>(&path, None, &QueryParams::new())
            .await?;
        take_field(response, "status", &path)
    }

    /// List every destination in a list, following pages.
    pub async fn destinations(&self, list_id: i64, query: &QueryParams) -> Result<Vec<Value>> {
        let path = format!("{DESTINATION_LISTS}/{list_id}/destinations");
        self.get_all(&path, query).await
    }

    /// Add destinations to a list in batches of [`BATCH_SIZE`].
    ///
    /// Returns the `data` of the last batch response, or `None` when
    /// `destinations` is empty and nothing was sent.
    pub async fn add_destinations<S>(&self, list_id: i64, destinations: &[S]) -> Result<Option<Value>>
    where
        S: AsRef<str>,
    {
        let entries: Vec<NewDestination> = destinations
            .iter()
            .map(|entry| NewDestination::new(entry.as_ref()))
            .collect();
        self.add_destination_entries(list_id, &entries).await
    }

    /// Like [`PoliciesClient::add_destinations`] but with comments.
    pub async fn add_destination_entries(
        &self,
        list_id: i64,
        entries: &[NewDestination],
    ) -> Result<Option<Value>> {
        let path = format!("{DESTINATION_LISTS}/{list_id}/destinations");
        info!(list_id, count = entries.len(), "Adding destinations");

        let mut last = None;
        for batch in entries.chunks(BATCH_SIZE) {
            debug!(list_id, size = batch.len(), "Sending destination batch");
            let response: Value = self.api.post(&path, batch, &QueryParams::new()).await?;
            last = Some(response);
        }

        last.map(|response| take_field(response, "data", &path))
            .transpose()
    }

    /// Remove destinations by ID in batches of [`BATCH_SIZE`].
    ///
    /// IDs are sent exactly as given. Returns the `data` of the last batch
    /// response, or `None` when `destination_ids` is empty.
    pub async fn delete_destinations<I>(
        &self,
        list_id: i64,
        destination_ids: &[I],
    ) -> Result<Option<Value>>
    where
        I: Serialize,
    {
        let path = format!("{DESTINATION_LISTS}/{list_id}/destinations/remove");
        info!(list_id, count = destination_ids.len(), "Removing destinations");

        let mut last = None;
        for batch in destination_ids.chunks(BATCH_SIZE) {
            debug!(list_id, size = batch.len(), "Sending removal batch");
            let response: Value = self
                .api
                .delete(&path, Some(batch), &QueryParams::new())
                .await?;
            last = Some(response);
        }

        last.map(|response| take_field(response, "data", &path))
            .transpose()
    }

    /// Walk `page=1,2,..` with `limit=PAGE_SIZE` until a short page.
    ///
    /// A bare JSON array is an unpaged listing and is returned as is.
    async fn get_all(&self, path: &str, query: &QueryParams) -> Result<Vec<Value>> {
        let mut params = query.clone();
        let mut records = Vec::new();
        let mut page = 1usize;

        loop {
            params.set("page", page);
            params.set("limit", PAGE_SIZE);

            let response: Value = self.api.get(path, &params).await?;
            let batch = match response {
                Value::Array(items) => {
                    records.extend(items);
                    break;
                }
                Value::Object(mut body) => match body.remove("data") {
                    Some(Value::Array(items)) => items,
                    None | Some(Value::Null) => Vec::new(),
                    Some(other) => {
                        return Err(Error::Parse(format!(
                            "expected `data` array from `{path}`, got {other}"
                        )))
                    }
                },
                Value::Null => Vec::new(),
                other => {
                    return Err(Error::Parse(format!(
                        "unexpected listing body from `{path}`: {other}"
                    )))
                }
            };

            let count = batch.len();
            records.extend(batch);
            debug!(path, page, count, "Fetched page");

            if count < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(records)
    }
}

fn take_field(response: Value, key: &str, path: &str) -> Result<Value> {
    match response {
        Value::Object(mut body) => body
            .remove(key)
            .ok_or_else(|| Error::Parse(format!("response from `{path}` has no `{key}` field"))),
        other => Err(Error::Parse(format!(
            "expected object from `{path}`, got {other}"
        ))),
    }
}

//! Shared helpers for Policies API integration tests.

#![allow(dead_code)]

use serde_json::json;
use umbrella_policies::PoliciesClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/auth/v2/token";
pub const LISTS_PATH: &str = "/policies/v2/destinationlists";

/// Client pointed at the mock server, authenticating as `abc` / `xyz`.
pub fn client(server: &MockServer) -> PoliciesClient {
    PoliciesClient::builder("abc", "xyz")
        .with_base_url(format!("{}/policies/v2", server.uri()))
        .with_token_url(format!("{}{TOKEN_PATH}", server.uri()))
        .build()
        .expect("client should build against mock server")
}

/// Mount a token endpoint that hands out `token` and expects `calls` hits.
pub async fn mount_token(server: &MockServer, token: &str, expires_in: i64, calls: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": expires_in
        })))
        .expect(calls)
        .mount(server)
        .await;
}

/// `count` destination records with sequential IDs starting at `first_id`.
pub fn destinations(first_id: u64, count: u64) -> Vec<serde_json::Value> {
    (first_id..first_id + count)
        .map(|id| {
            json!({
                "id": id.to_string(),
                "destination": format!("host{id}.example.test"),
                "type": "domain"
            })
        })
        .collect()
}

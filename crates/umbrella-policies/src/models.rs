//! Policies v2 models.
//!
//! Request payloads are typed and serialized in the API's camelCase schema.
//! Responses are handed back as [`serde_json::Value`]; the read models below
//! can be decoded from those values when a typed view is wanted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use umbrella_core::Error;
use validator::Validate;

/// Whether a destination list allows or blocks its destinations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DestinationAccess {
    /// Traffic to the destinations is allowed.
    Allow,
    /// Traffic to the destinations is blocked.
    Block,
}

impl DestinationAccess {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for DestinationAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationAccess {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "block" => Ok(Self::Block),
            other => Err(Error::InvalidRequest(format!(
                "unknown destination list access `{other}`"
            ))),
        }
    }
}

/// Request payload for creating a destination list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDestinationListRequest {
    /// List name.
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// Allow or block.
    pub access: DestinationAccess,
    /// Whether this is the organization's global list.
    pub is_global: bool,
}

/// Request payload for renaming a destination list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct UpdateDestinationListRequest {
    /// New list name.
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

/// A destination to add to a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDestination {
    /// Domain, URL or IP address.
    pub destination: String,
    /// Optional free-form comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl NewDestination {
    /// Destination without a comment.
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            comment: None,
        }
    }
}

/// Counters attached to a destination list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DestinationListMeta {
    /// Total destinations.
    #[serde(default)]
    pub destination_count: u64,
    /// Domain destinations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_count: Option<u64>,
    /// URL destinations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_count: Option<u64>,
    /// IPv4 destinations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_count: Option<u64>,
}

/// A destination list as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DestinationList {
    /// List ID.
    pub id: i64,
    /// Owning organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<i64>,
    /// Allow or block.
    pub access: DestinationAccess,
    /// Whether this is the global list.
    #[serde(default)]
    pub is_global: bool,
    /// List name.
    pub name: String,
    /// Creation time, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Last modification time, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<i64>,
    /// Whether the list is pending deletion.
    #[serde(default)]
    pub marked_for_deletion: bool,
    /// Destination counters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<DestinationListMeta>,
}

/// A single entry of a destination list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Entry ID, needed to remove the entry again.
    pub id: serde_json::Value,
    /// Domain, URL or IP address.
    pub destination: String,
    /// `domain`, `url` or `ipv4`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Free-form comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Creation time as reported by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

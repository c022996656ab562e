//! Policies v2 client for Cisco Umbrella.
//!
//! Provides an asynchronous client for destination lists and their
//! destinations, authenticated with OAuth2 client credentials.
//!
//! ```no_run
//! # async fn run() -> umbrella_policies::Result<()> {
//! use umbrella_policies::{PoliciesClient, QueryParams};
//!
//! let client = PoliciesClient::new("client-id", "client-secret")?;
//! let lists = client.destination_lists(&QueryParams::new()).await?;
//! println!("{} destination lists", lists.len());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{PoliciesClient, PoliciesClientBuilder, BATCH_SIZE, PAGE_SIZE};
pub use models::{
    CreateDestinationListRequest, Destination, DestinationAccess, DestinationList,
    DestinationListMeta, NewDestination, UpdateDestinationListRequest,
};
pub use umbrella_core::{Error, QueryParams};

/// Convenient result alias that reuses the shared Umbrella error type.
pub type Result<T> = umbrella_core::Result<T>;

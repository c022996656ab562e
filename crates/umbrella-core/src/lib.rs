//! # umbrella-core
//!
//! Shared plumbing for Cisco Umbrella API clients.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy for token exchange, API and transport failures
//! - [`config`] - Endpoint configuration and API credentials
//! - [`auth`] - OAuth2 client-credentials token acquisition and caching
//! - [`client`] - Authenticated HTTP client and transport settings
//! - [`query`] - Query parameter builder

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod query;

// Re-export commonly used types
pub use auth::{AccessToken, TokenProvider};
pub use client::{ApiClient, ClientConfig};
pub use config::{Credentials, UmbrellaConfig};
pub use error::{Error, Result};
pub use query::QueryParams;

//! Platform API transport
//!
//! This module provides the plumbing every API call goes through: the
//! operation table, request/response types, the buffered HTTP client and
//! the client that runs the hook chain around each call.
//!
//! # Module Structure
//!
//! - [`auth`] - Access token discovery and redaction
//! - [`client`] - Main platform client, runs hooks around every call
//! - [`error`] - Typed API errors surfaced to resource logic
//! - [`http`] - Buffered HTTP transport and log sanitizing
//! - [`operations`] - Known operation descriptors and request parameters
//!
//! # Example
//!
//! ```ignore
//! use seqsync::platform::{auth::Credentials, client::PlatformClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let credentials = Credentials::from_env()?;
//!     let client =
//!         PlatformClient::new("https://api.cloud.seqera.io", credentials, Default::default())?;
//!     let body = serde_json::json!({"computeEnv": {}});
//!     let created = client.create_compute_env("42", &body).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod operations;

pub use client::PlatformClient;
pub use error::ApiError;
pub use http::{ApiRequest, ApiResponse};
pub use operations::{OperationDescriptor, RequestParams};

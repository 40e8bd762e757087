//! GCP API interaction module
//!
//! This module resolves credentials and project identity, authenticates,
//! and reads Cloud Run services.
//!
//! # Module Structure
//!
//! - [`auth`] - Credential/project resolution and authenticated sessions
//! - [`client`] - Cloud Run client with lazy authentication
//! - [`error`] - Error taxonomy shared by the whole module
//! - [`http`] - HTTP utilities for REST API calls
//! - [`service`] - Cloud Run service document
//!
//! # Example
//!
//! ```ignore
//! use cloud_run_image::config::{ClientOptions, Environment};
//! use cloud_run_image::gcp::{auth, client::CloudRunClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let identity = auth::resolve("us-central1", &ClientOptions::default(), &Environment::from_process())?;
//!     let client = CloudRunClient::from_identity(identity)?;
//!     let image = client.get_service_image("hello").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod service;

pub use error::{Error, Result};

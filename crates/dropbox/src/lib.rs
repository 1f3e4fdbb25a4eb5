//! Dropbox API v2 content client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.
//! [`DropboxClient`] implements the transfer crate's `StorageBackend`, and
//! [`DropboxConnector`] builds one client per access token.

mod client;
mod config;
mod error;

pub use client::{DropboxClient, DropboxConnector};
pub use config::DropboxConfig;
pub use error::{Error, classify_response};

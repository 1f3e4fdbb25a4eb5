//! Storage backend seam.
//!
//! The engine only depends on these semantics; the HTTP mapping lives in
//! the backend implementation. Using a trait keeps the retry logic testable
//! with scripted mocks.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use dropstep_protocol::{CommitInfo, FileMetadata, UploadSessionCursor};

/// Boxed future returned by backend calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Failure of a single backend call, classified for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Transport-level failure (timeout, reset, unreachable).
    #[error("network error: {0}")]
    Network(String),

    /// The server asked the client to wait before retrying.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The session cursor offset was wrong; the server states the right one.
    #[error("incorrect offset, server expects {correct_offset}")]
    IncorrectOffset { correct_offset: u64 },

    /// Any other rejection (quota, permission, conflict, malformed request).
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Result of a download: the remote file's metadata and its content.
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub metadata: FileMetadata,
    pub data: Vec<u8>,
}

/// Abstract storage backend.
pub trait StorageBackend: Send + Sync {
    /// Uploads a whole file in one request.
    fn upload_whole<'a>(
        &'a self,
        commit: &'a CommitInfo,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<FileMetadata, BackendError>>;

    /// Opens an upload session with its first bytes; returns the session id.
    fn session_start(&self, data: Vec<u8>) -> BoxFuture<'_, Result<String, BackendError>>;

    /// Appends bytes at `cursor.offset` to an open session.
    fn session_append<'a>(
        &'a self,
        cursor: &'a UploadSessionCursor,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), BackendError>>;

    /// Sends the final bytes and commits the session to `commit.path`.
    fn session_finish<'a>(
        &'a self,
        cursor: &'a UploadSessionCursor,
        commit: &'a CommitInfo,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<FileMetadata, BackendError>>;

    /// Downloads the file at `path`.
    fn download<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Downloaded, BackendError>>;
}

/// Builds a backend bound to one access token.
///
/// Credentials arrive per row, so the step layer asks the factory for a
/// fresh backend for every transfer.
pub trait BackendFactory: Send + Sync {
    fn connect(&self, access_token: &str) -> Result<Box<dyn StorageBackend>, BackendError>;
}

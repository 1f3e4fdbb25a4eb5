//! Resumable file transfer against a cloud storage backend.
//!
//! Small files go up in a single request. Larger files use a three-phase
//! upload session (start / append / finish) driven by an explicit state
//! machine ([`session`]) that tracks the byte offset the server has
//! accepted, retries transient failures within a bounded attempt budget,
//! and resynchronises when the server reports a different offset.

mod backend;
mod chunked;
mod config;
mod engine;
mod progress;
mod selector;
mod session;
mod simple;
#[cfg(test)]
mod testing;
mod transfer;
mod validation;

use std::time::Duration;

pub use backend::{BackendError, BackendFactory, BoxFuture, Downloaded, StorageBackend};
pub use chunked::{ChunkReader, calculate_content_hash, content_hash_bytes, verify_metadata};
pub use config::TransferConfig;
pub use engine::ChunkedUploader;
pub use progress::{ProgressCallback, ProgressReporter, SpeedCalculator, TransferProgress};
pub use selector::{TransferStrategy, select_strategy};
pub use session::{Action, Event, UploadSession, UploadState};
pub use simple::{download_to_file, upload_whole_file};
pub use transfer::FileTransfer;
pub use validation::validate_remote_path;

/// Default chunk size: 8 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 8 << 20;

/// Default number of failed protocol iterations tolerated per transfer.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    LocalIo(#[from] std::io::Error),

    #[error("network error: {0}")]
    TransientNetwork(String),

    #[error("incorrect offset {expected}, server expects {correct}")]
    OffsetMismatch { expected: u64, correct: u64 },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("backend error: {0}")]
    FatalBackend(String),

    #[error("too many attempts ({attempts}), last error: {last}")]
    AttemptsExhausted {
        attempts: u32,
        last: Box<TransferError>,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("integrity mismatch: {0}")]
    IntegrityMismatch(String),

    #[error("cancelled")]
    Cancelled,
}

impl TransferError {
    /// Whether the error may go away on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork(_) | Self::OffsetMismatch { .. } | Self::RateLimited { .. }
        )
    }
}

/// Single-request paths do not retry, so every backend error is terminal
/// there; the variant still records what kind of failure it was.
impl From<BackendError> for TransferError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Network(msg) => Self::TransientNetwork(msg),
            BackendError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            BackendError::IncorrectOffset { correct_offset } => Self::FatalBackend(format!(
                "unexpected offset correction to {correct_offset} outside an upload session"
            )),
            BackendError::Rejected(msg) => Self::FatalBackend(msg),
        }
    }
}

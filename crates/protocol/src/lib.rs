//! Dropbox API v2 wire types used by the transfer steps.
//!
//! Only the content endpoints needed for whole-file upload, upload sessions
//! and download are modelled. Request arguments travel as JSON in the
//! `Dropbox-API-Arg` header (see [`header`]); error bodies are decoded
//! through [`envelope::ApiError`].

pub mod constants;
pub mod envelope;
pub mod header;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use envelope::{ApiError, LookupError, RateLimitError, UploadSessionFinishError};
pub use header::to_header_json;
pub use messages::{
    DownloadArg, UploadSessionAppendArg, UploadSessionFinishArg, UploadSessionStartArg,
    UploadSessionStartResult,
};
pub use types::{CommitInfo, FileMetadata, UploadSessionCursor, WriteMode};

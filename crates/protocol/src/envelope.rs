use serde::{Deserialize, Serialize};

/// Error body returned with HTTP 409 (endpoint-specific) and 429 responses.
///
/// `E` is the endpoint's error union. Use `serde_json::Value` when only the
/// summary matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError<E> {
    #[serde(default)]
    pub error_summary: String,
    pub error: E,
}

/// Reasons an upload session cursor may be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum LookupError {
    NotFound,
    /// The cursor offset does not match what the server has received.
    IncorrectOffset { correct_offset: u64 },
    Closed,
    NotClosed,
    TooLarge,
    ConcurrentSessionInvalidOffset,
    ConcurrentSessionInvalidDataSize,
    PayloadTooLarge,
    #[serde(other)]
    Other,
}

impl LookupError {
    /// Offset the server expects next, if this is an offset mismatch.
    pub fn correct_offset(&self) -> Option<u64> {
        match self {
            Self::IncorrectOffset { correct_offset } => Some(*correct_offset),
            _ => None,
        }
    }
}

/// Error union of `upload_session/finish`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum UploadSessionFinishError {
    LookupFailed { lookup_failed: LookupError },
    TooManySharedFolderTargets,
    TooManyWriteOperations,
    ConcurrentSessionDataNotAllowed,
    ConcurrentSessionNotClosed,
    ConcurrentSessionMissingData,
    PayloadTooLarge,
    ContentHashMismatch,
    #[serde(other)]
    Other,
}

impl UploadSessionFinishError {
    /// Offset the server expects next, if the cursor lookup failed on it.
    pub fn correct_offset(&self) -> Option<u64> {
        match self {
            Self::LookupFailed { lookup_failed } => lookup_failed.correct_offset(),
            _ => None,
        }
    }
}

/// Why a request was throttled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum RateLimitReason {
    TooManyRequests,
    TooManyWriteOperations,
    #[serde(other)]
    Other,
}

/// Error union of HTTP 429 responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitError {
    pub reason: RateLimitReason,
    /// Seconds to wait before retrying.
    #[serde(default = "default_retry_after")]
    pub retry_after: u64,
}

fn default_retry_after() -> u64 {
    1
}

use std::time::Duration;

use dropstep_protocol::constants::DEFAULT_RETRY_AFTER;
use dropstep_protocol::{ApiError, LookupError, RateLimitError, UploadSessionFinishError};
use dropstep_transfer::BackendError;

/// Errors from building a Dropbox client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid access token")]
    InvalidToken,
}

impl From<Error> for BackendError {
    fn from(err: Error) -> Self {
        BackendError::Rejected(err.to_string())
    }
}

/// Endpoint a response came from; decides how a 409 body is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Upload,
    SessionStart,
    SessionAppend,
    SessionFinish,
    Download,
}

/// Maps a non-success response to a [`BackendError`].
///
/// `append` and `finish` conflicts carrying a correct offset become
/// `IncorrectOffset`; 429 and 503 become `RateLimited` with the wait taken
/// from `Retry-After`, then the body, then a one second default. Everything
/// else is a rejection.
pub fn classify_response(
    endpoint: &str,
    status: u16,
    retry_after: Option<&str>,
    body: &str,
) -> BackendError {
    let op = match endpoint {
        e if e.ends_with("/upload_session/start") => Operation::SessionStart,
        e if e.ends_with("/upload_session/append_v2") => Operation::SessionAppend,
        e if e.ends_with("/upload_session/finish") => Operation::SessionFinish,
        e if e.ends_with("/download") => Operation::Download,
        _ => Operation::Upload,
    };
    classify(op, status, retry_after, body)
}

pub(crate) fn classify(
    op: Operation,
    status: u16,
    retry_after: Option<&str>,
    body: &str,
) -> BackendError {
    match status {
        409 => {
            if let Some(correct_offset) = conflict_offset(op, body) {
                return BackendError::IncorrectOffset { correct_offset };
            }
            BackendError::Rejected(describe(status, body))
        }
        429 | 503 => BackendError::RateLimited {
            retry_after: retry_after_hint(retry_after, body),
        },
        _ => BackendError::Rejected(describe(status, body)),
    }
}

/// Maps a transport failure.
pub(crate) fn transport(err: &reqwest::Error) -> BackendError {
    if err.is_builder() {
        BackendError::Rejected(format!("invalid request: {err}"))
    } else {
        BackendError::Network(err.to_string())
    }
}

fn conflict_offset(op: Operation, body: &str) -> Option<u64> {
    match op {
        Operation::SessionAppend => serde_json::from_str::<ApiError<LookupError>>(body)
            .ok()
            .and_then(|e| e.error.correct_offset()),
        Operation::SessionFinish => {
            serde_json::from_str::<ApiError<UploadSessionFinishError>>(body)
                .ok()
                .and_then(|e| e.error.correct_offset())
        }
        Operation::Upload | Operation::SessionStart | Operation::Download => None,
    }
}

fn retry_after_hint(header: Option<&str>, body: &str) -> Duration {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .or_else(|| {
            serde_json::from_str::<ApiError<RateLimitError>>(body)
                .ok()
                .map(|e| e.error.retry_after)
        })
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Error summary of a JSON body, or the trimmed body itself.
fn describe(status: u16, body: &str) -> String {
    let summary = serde_json::from_str::<ApiError<serde_json::Value>>(body)
        .map(|e| e.error_summary)
        .unwrap_or_else(|_| body.trim().to_string());
    if summary.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {summary}")
    }
}

use serde::{Deserialize, Serialize};

use crate::types::{CommitInfo, UploadSessionCursor};

// ---------------------------------------------------------------------------
// Upload session
// ---------------------------------------------------------------------------

/// Argument of `upload_session/start`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadSessionStartArg {
    #[serde(default)]
    pub close: bool,
}

/// Result of `upload_session/start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSessionStartResult {
    pub session_id: String,
}

/// Argument of `upload_session/append_v2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSessionAppendArg {
    pub cursor: UploadSessionCursor,
    #[serde(default)]
    pub close: bool,
}

/// Argument of `upload_session/finish`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSessionFinishArg {
    pub cursor: UploadSessionCursor,
    pub commit: CommitInfo,
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// Argument of `files/download`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadArg {
    pub path: String,
}

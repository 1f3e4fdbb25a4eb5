use std::time::Duration;

/// Base URL of the Dropbox content API (upload and download endpoints).
pub const CONTENT_BASE_URL: &str = "https://content.dropboxapi.com/2";

/// Header carrying the JSON-encoded endpoint argument.
pub const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// Header carrying the JSON-encoded result of a content-download endpoint.
pub const API_RESULT_HEADER: &str = "Dropbox-API-Result";

/// Wait applied when a rate-limited response carries no usable hint.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Endpoint paths, relative to [`CONTENT_BASE_URL`].
pub mod endpoint {
    pub const UPLOAD: &str = "/files/upload";
    pub const UPLOAD_SESSION_START: &str = "/files/upload_session/start";
    pub const UPLOAD_SESSION_APPEND: &str = "/files/upload_session/append_v2";
    pub const UPLOAD_SESSION_FINISH: &str = "/files/upload_session/finish";
    pub const DOWNLOAD: &str = "/files/download";
}

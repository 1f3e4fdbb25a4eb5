use dropstep_protocol::constants::CONTENT_BASE_URL;
use serde::{Deserialize, Serialize};

/// HTTP settings for the Dropbox client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropboxConfig {
    /// Base URL of the content API.
    pub content_url: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DropboxConfig {
    fn default() -> Self {
        Self {
            content_url: CONTENT_BASE_URL.to_string(),
            timeout_secs: 300,
            user_agent: concat!("dropstep/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

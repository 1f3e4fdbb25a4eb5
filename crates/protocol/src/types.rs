use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the server resolves a conflict with an existing file at the target path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum WriteMode {
    /// Never overwrite; the commit fails if the path is taken.
    #[default]
    Add,
    /// Always overwrite.
    Overwrite,
    /// Overwrite only if the existing file has the given revision.
    Update { update: String },
}

/// Where and how an uploaded file is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub path: String,
    #[serde(default)]
    pub mode: WriteMode,
    #[serde(default)]
    pub autorename: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "client_modified"
    )]
    pub client_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub strict_conflict: bool,
}

impl CommitInfo {
    /// Commit to `path` with conflict policy `add` and the given local
    /// modification time.
    pub fn add(path: impl Into<String>, client_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            path: path.into(),
            mode: WriteMode::Add,
            autorename: false,
            client_modified,
            mute: false,
            strict_conflict: false,
        }
    }
}

/// Position inside an upload session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSessionCursor {
    pub session_id: String,
    pub offset: u64,
}

/// Metadata of a committed or downloaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_lower: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_display: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "client_modified"
    )]
    pub client_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_modified: Option<DateTime<Utc>>,
    pub rev: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl FileMetadata {
    /// Display path if known, falling back to the file name.
    pub fn display_path(&self) -> &str {
        self.path_display.as_deref().unwrap_or(&self.name)
    }
}

/// Dropbox timestamps are second-precision UTC with a literal `Z`.
///
/// Anything finer is rejected by the API, so sub-second parts are dropped
/// on the way out.
mod client_modified {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

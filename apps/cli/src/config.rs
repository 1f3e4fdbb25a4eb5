//! Step configuration file.
//!
//! A single TOML file carries the field mapping and routing at the top
//! level, a `[transfer]` table with engine tunables and a `[dropbox]`
//! table with HTTP settings:
//!
//! ```toml
//! access_token_field = "token"
//! source_files_field = "local_path"
//! target_files_field = "dropbox_path"
//! failed_step = "errors"
//!
//! [transfer]
//! chunk_size = 4194304
//! concurrency = 4
//!
//! [dropbox]
//! timeout_secs = 120
//! ```

use std::path::Path;

use anyhow::Context;
use dropstep_dropbox::DropboxConfig;
use dropstep_step::StepConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub step: StepConfig,

    #[serde(default)]
    pub dropbox: DropboxConfig,
}

impl CliConfig {
    /// Reads and validates the configuration at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    fn parse(content: &str) -> anyhow::Result<Self> {
        let config: CliConfig = toml::from_str(content)?;
        config.step.validate()?;
        if config.dropbox.timeout_secs == 0 {
            anyhow::bail!("dropbox.timeout_secs must be greater than zero");
        }
        Ok(config)
    }
}

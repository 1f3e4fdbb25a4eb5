use dropstep_transfer::TransferConfig;
use serde::{Deserialize, Serialize};

use crate::error::StepError;

/// Field mapping and routing of one transfer step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Row field holding the access token.
    pub access_token_field: String,
    /// Row field holding the source path (local for upload, remote for download).
    pub source_files_field: String,
    /// Row field holding the target path.
    pub target_files_field: String,
    /// Target stream for rows whose transfer succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_step: Option<String>,
    /// Target stream for rows whose transfer failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    #[serde(default)]
    pub transfer: TransferSettings,
}

/// Transfer tunables plus row concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    #[serde(flatten)]
    pub engine: TransferConfig,
    /// Rows transferred at the same time.
    pub concurrency: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            engine: TransferConfig::default(),
            concurrency: 1,
        }
    }
}

impl StepConfig {
    pub fn new(
        access_token_field: impl Into<String>,
        source_files_field: impl Into<String>,
        target_files_field: impl Into<String>,
    ) -> Self {
        Self {
            access_token_field: access_token_field.into(),
            source_files_field: source_files_field.into(),
            target_files_field: target_files_field.into(),
            successful_step: None,
            failed_step: None,
            transfer: TransferSettings::default(),
        }
    }

    /// Whether rows are routed to named target streams instead of the main output.
    pub fn chooses_target_steps(&self) -> bool {
        self.successful_step.is_some() || self.failed_step.is_some()
    }

    /// Checks the mapping and tunables before any row is read.
    pub fn validate(&self) -> Result<(), StepError> {
        for (name, value) in [
            ("access_token_field", &self.access_token_field),
            ("source_files_field", &self.source_files_field),
            ("target_files_field", &self.target_files_field),
        ] {
            if value.trim().is_empty() {
                return Err(StepError::Configuration(format!("{name} is not set")));
            }
        }

        for (name, value) in [
            ("successful_step", &self.successful_step),
            ("failed_step", &self.failed_step),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(StepError::Configuration(format!("{name} is empty")));
            }
        }

        self.transfer
            .engine
            .validate()
            .map_err(|e| StepError::Configuration(e.to_string()))?;
        if self.transfer.concurrency == 0 {
            return Err(StepError::Configuration(
                "concurrency must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

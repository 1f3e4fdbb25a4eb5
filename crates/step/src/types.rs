//! Data types for the transfer step.

use dropstep_protocol::FileMetadata;
use dropstep_transfer::TransferProgress;
use serde::{Deserialize, Serialize};

use crate::error::StepError;

/// One pipeline record: named fields with JSON values.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Which way the step moves files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Local source, remote target.
    Upload,
    /// Remote source, local target.
    Download,
}

/// Output stream a row is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The step's main output (no target steps configured).
    Main,
    /// A named target step.
    Target(String),
    /// Target steps are configured but none for this outcome.
    Discard,
}

/// What happened to one row.
#[derive(Debug, Clone)]
pub struct RowOutcome {
    /// Position of the row in the input.
    pub index: usize,
    pub row: Row,
    pub route: Route,
    /// Metadata of the transferred file on success.
    pub metadata: Option<FileMetadata>,
    /// Failure reason.
    pub error: Option<String>,
}

impl RowOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of running the step over a batch of rows.
#[derive(Debug, Default)]
pub struct StepReport {
    /// Outcomes in input order. Rows never started are absent.
    pub outcomes: Vec<RowOutcome>,
    /// Step-level error that stopped processing.
    pub stopped: Option<StepError>,
}

impl StepReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// True when the step ran to the end and every row succeeded.
    pub fn is_clean(&self) -> bool {
        self.stopped.is_none() && self.failed() == 0
    }
}

/// Progress event emitted while the step runs.
#[derive(Debug, Clone)]
pub enum StepEvent {
    /// A row's transfer is starting.
    RowStarted { index: usize, source: String },
    /// Byte progress of a row's transfer.
    Progress {
        index: usize,
        progress: TransferProgress,
    },
    /// A row finished and was routed.
    RowFinished {
        index: usize,
        route: Route,
        error: Option<String>,
    },
}

//! Step error types.

use dropstep_transfer::{BackendError, TransferError};

/// Errors produced while running a transfer step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("field '{0}' not found in input rows")]
    UnknownField(String),

    #[error("field '{field}' is empty")]
    EmptyValue { field: String },

    #[error("field '{field}' is not a string")]
    NotAString { field: String },

    #[error("source file does not exist: {0}")]
    SourceNotFound(String),

    #[error("source is not a regular file: {0}")]
    SourceNotAFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("cancelled")]
    Cancelled,
}

impl StepError {
    /// Whether the error stops the whole step rather than failing one row.
    pub fn stops_step(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::UnknownField(_)
                | Self::SourceNotFound(_)
                | Self::SourceNotAFile(_)
                | Self::Cancelled
                | Self::Transfer(TransferError::Cancelled)
        )
    }
}

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ATTEMPTS, TransferError};

/// Tunables for one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes per session call; also sets the single-request threshold
    /// (files up to twice this size go up in one request).
    pub chunk_size: u64,
    /// Failed protocol iterations tolerated before giving up.
    pub max_attempts: u32,
    /// Compare the committed file's content hash with the local file.
    pub verify_content_hash: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            verify_content_hash: true,
        }
    }
}

impl TransferConfig {
    /// Rejects values that would make the engine loop or never try.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.chunk_size == 0 {
            return Err(TransferError::Configuration(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(TransferError::Configuration(
                "max_attempts must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

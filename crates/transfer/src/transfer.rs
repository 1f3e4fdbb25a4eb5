use std::path::Path;

use chrono::{DateTime, Utc};
use dropstep_protocol::{CommitInfo, FileMetadata};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::StorageBackend;
use crate::chunked::verify_metadata;
use crate::config::TransferConfig;
use crate::engine::ChunkedUploader;
use crate::progress::{ProgressCallback, ProgressReporter};
use crate::selector::{TransferStrategy, select_strategy};
use crate::simple::{download_to_file, upload_whole_file};
use crate::validation::validate_remote_path;
use crate::TransferError;

/// Entry point for moving one file to or from a backend.
///
/// Validates the remote path, picks the upload strategy, runs it, and
/// checks the result against the local file.
pub struct FileTransfer<'a> {
    backend: &'a dyn StorageBackend,
    config: TransferConfig,
    cancel: CancellationToken,
    on_progress: Option<ProgressCallback>,
}

impl<'a> FileTransfer<'a> {
    pub fn new(backend: &'a dyn StorageBackend, config: TransferConfig) -> Self {
        Self {
            backend,
            config,
            cancel: CancellationToken::new(),
            on_progress: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Uploads `local` to `remote` with conflict policy `add`.
    pub async fn upload(&self, local: &Path, remote: &str) -> Result<FileMetadata, TransferError> {
        self.config.validate()?;
        validate_remote_path(remote)?;
        self.check_cancelled()?;

        let meta = tokio::fs::metadata(local).await?;
        if !meta.is_file() {
            return Err(TransferError::LocalIo(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", local.display()),
            )));
        }
        let file_size = meta.len();
        let client_modified = meta.modified().ok().map(DateTime::<Utc>::from);
        let commit = CommitInfo::add(remote, client_modified);

        let strategy = select_strategy(file_size, self.config.chunk_size);
        debug!(
            local = %local.display(),
            remote = %remote,
            file_size,
            ?strategy,
            "selected upload strategy"
        );

        let reporter = ProgressReporter::new(remote, file_size, self.on_progress.clone());
        let metadata = match strategy {
            TransferStrategy::Simple => {
                let metadata = upload_whole_file(self.backend, local, &commit).await?;
                reporter.report(file_size);
                metadata
            }
            TransferStrategy::Chunked => {
                ChunkedUploader::new(self.backend, &self.config, self.cancel.clone())
                    .with_progress(&reporter)
                    .upload(local, &commit)
                    .await?
            }
        };

        verify_metadata(&metadata, local, self.config.verify_content_hash).await?;
        info!(remote = %metadata.display_path(), size = metadata.size, "upload verified");
        Ok(metadata)
    }

    /// Downloads `remote` into `local`.
    pub async fn download(&self, remote: &str, local: &Path) -> Result<FileMetadata, TransferError> {
        validate_remote_path(remote)?;
        self.check_cancelled()?;

        let metadata =
            download_to_file(self.backend, remote, local, self.config.verify_content_hash).await?;
        if let Some(cb) = &self.on_progress {
            cb(crate::TransferProgress {
                path: remote.to_string(),
                transferred: metadata.size,
                total: metadata.size,
            });
        }
        Ok(metadata)
    }

    fn check_cancelled(&self) -> Result<(), TransferError> {
        if self.cancel.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            Ok(())
        }
    }
}

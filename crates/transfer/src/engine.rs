//! Driver for the upload session state machine.

use std::path::Path;

use dropstep_protocol::{CommitInfo, FileMetadata, UploadSessionCursor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, BoxFuture, StorageBackend};
use crate::chunked::ChunkReader;
use crate::config::TransferConfig;
use crate::progress::ProgressReporter;
use crate::session::{Action, Event, UploadSession};
use crate::TransferError;

/// Uploads one file through a start / append / finish session.
///
/// Performs the I/O that [`UploadSession`] asks for and feeds the outcome
/// back. The source file is opened lazily at the start of every protocol
/// iteration and closed before each retry.
pub struct ChunkedUploader<'a> {
    backend: &'a dyn StorageBackend,
    config: &'a TransferConfig,
    cancel: CancellationToken,
    progress: Option<&'a ProgressReporter>,
}

impl<'a> ChunkedUploader<'a> {
    pub fn new(
        backend: &'a dyn StorageBackend,
        config: &'a TransferConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            config,
            cancel,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: &'a ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Uploads `local` and commits it as described by `commit`.
    ///
    /// Returns the metadata of the committed file. The file must be at
    /// least one chunk long.
    pub async fn upload(
        &self,
        local: &Path,
        commit: &CommitInfo,
    ) -> Result<FileMetadata, TransferError> {
        let file_size = tokio::fs::metadata(local).await?.len();
        let mut session =
            UploadSession::new(file_size, self.config.chunk_size, self.config.max_attempts);
        let mut reader: Option<ChunkReader> = None;
        let mut committed: Option<FileMetadata> = None;
        let mut reported = 0u64;
        let mut event = Event::Begin;

        info!(
            path = %commit.path,
            file_size,
            chunk_size = self.config.chunk_size,
            "starting chunked upload"
        );

        loop {
            let (next, action) = session.transition(event);
            session = next;

            if session.uploaded_offset() != reported {
                reported = session.uploaded_offset();
                if let Some(progress) = self.progress {
                    progress.report(reported);
                }
            }

            event = match action {
                Action::Start { offset, len } => {
                    self.check_cancelled()?;
                    match read_at(&mut reader, local, offset, len).await {
                        Err(e) => Event::ReadFailed(e),
                        Ok(data) => match self.call(self.backend.session_start(data)).await? {
                            Ok(session_id) => {
                                debug!(session_id = %session_id, len, "upload session started");
                                Event::Started { session_id }
                            }
                            Err(e) => Event::Failed(e),
                        },
                    }
                }
                Action::Append {
                    session_id,
                    offset,
                    len,
                } => {
                    self.check_cancelled()?;
                    let cursor = UploadSessionCursor { session_id, offset };
                    match read_at(&mut reader, local, offset, len).await {
                        Err(e) => Event::ReadFailed(e),
                        Ok(data) => {
                            match self.call(self.backend.session_append(&cursor, data)).await? {
                                Ok(()) => Event::Appended,
                                Err(e) => Event::Failed(e),
                            }
                        }
                    }
                }
                Action::Finish {
                    session_id,
                    offset,
                    len,
                } => {
                    self.check_cancelled()?;
                    let cursor = UploadSessionCursor { session_id, offset };
                    match read_at(&mut reader, local, offset, len).await {
                        Err(e) => Event::ReadFailed(e),
                        Ok(data) => match self
                            .call(self.backend.session_finish(&cursor, commit, data))
                            .await?
                        {
                            Ok(metadata) => {
                                committed = Some(metadata);
                                Event::Committed
                            }
                            Err(e) => Event::Failed(e),
                        },
                    }
                }
                Action::Retry { backoff } => {
                    reader = None;
                    warn!(
                        path = %commit.path,
                        attempt = session.attempt(),
                        max_attempts = self.config.max_attempts,
                        resume_offset = session.uploaded_offset(),
                        backoff_ms = backoff.map(|d| d.as_millis() as u64),
                        "upload iteration failed, retrying"
                    );
                    if let Some(wait) = backoff {
                        tokio::select! {
                            _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                            _ = tokio::time::sleep(wait) => {}
                        }
                    }
                    Event::Begin
                }
                Action::Complete => {
                    info!(path = %commit.path, file_size, "chunked upload committed");
                    return committed.ok_or_else(|| {
                        TransferError::FatalBackend("commit returned no metadata".into())
                    });
                }
                Action::Abort(err) => {
                    warn!(path = %commit.path, error = %err, "chunked upload failed");
                    return Err(err);
                }
            };
        }
    }

    /// Awaits a backend call unless the transfer is cancelled first.
    async fn call<T>(
        &self,
        fut: BoxFuture<'_, Result<T, BackendError>>,
    ) -> Result<Result<T, BackendError>, TransferError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransferError::Cancelled),
            result = fut => Ok(result),
        }
    }

    fn check_cancelled(&self) -> Result<(), TransferError> {
        if self.cancel.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Reads through `reader`, opening `path` first if no reader is open.
async fn read_at(
    reader: &mut Option<ChunkReader>,
    path: &Path,
    offset: u64,
    len: u64,
) -> Result<Vec<u8>, std::io::Error> {
    if reader.is_none() {
        *reader = Some(ChunkReader::open(path).await?);
    }
    match reader.as_mut() {
        Some(r) => r.read_chunk(offset, len).await,
        None => Err(std::io::Error::other("source reader not open")),
    }
}

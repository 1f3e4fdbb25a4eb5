//! Single-request transfers. No retries here: any failure ends the transfer.

use std::path::Path;

use dropstep_protocol::{CommitInfo, FileMetadata};
use tracing::{debug, info};

use crate::backend::StorageBackend;
use crate::chunked::verify_metadata;
use crate::TransferError;

/// Reads `local` fully and uploads it in one request.
pub async fn upload_whole_file(
    backend: &dyn StorageBackend,
    local: &Path,
    commit: &CommitInfo,
) -> Result<FileMetadata, TransferError> {
    let data = tokio::fs::read(local).await?;
    debug!(path = %commit.path, bytes = data.len(), "uploading in one request");

    let metadata = backend.upload_whole(commit, data).await?;
    info!(path = %metadata.display_path(), size = metadata.size, "upload committed");
    Ok(metadata)
}

/// Downloads `remote` into `local`, creating missing parent directories.
///
/// The written file is checked against the returned metadata before the
/// metadata is handed back.
pub async fn download_to_file(
    backend: &dyn StorageBackend,
    remote: &str,
    local: &Path,
    check_hash: bool,
) -> Result<FileMetadata, TransferError> {
    let downloaded = backend.download(remote).await?;

    if let Some(parent) = local.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(local, &downloaded.data).await?;

    verify_metadata(&downloaded.metadata, local, check_hash).await?;
    info!(
        remote = %remote,
        local = %local.display(),
        size = downloaded.metadata.size,
        "download complete"
    );
    Ok(downloaded.metadata)
}

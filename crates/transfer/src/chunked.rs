use std::io::Read;
use std::path::{Path, PathBuf};

use dropstep_protocol::FileMetadata;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;

/// Block size used by the Dropbox content hash: 4 MiB.
const CONTENT_HASH_BLOCK: usize = 4 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Content hash
// ---------------------------------------------------------------------------

/// Computes the Dropbox content hash of `data`.
///
/// SHA-256 of each 4 MiB block, concatenated, then SHA-256 of the
/// concatenation, hex-encoded.
pub fn content_hash_bytes(data: &[u8]) -> String {
    let mut overall = Sha256::new();
    for block in data.chunks(CONTENT_HASH_BLOCK) {
        overall.update(Sha256::digest(block));
    }
    hex::encode(overall.finalize())
}

/// Computes the Dropbox content hash of a file on disk.
pub fn calculate_content_hash(path: &Path) -> Result<String, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut overall = Sha256::new();
    let mut block = vec![0u8; CONTENT_HASH_BLOCK];
    loop {
        let n = read_full(&mut file, &mut block)?;
        if n == 0 {
            break;
        }
        overall.update(Sha256::digest(&block[..n]));
        if n < block.len() {
            break;
        }
    }
    Ok(hex::encode(overall.finalize()))
}

/// Fills `buf` unless EOF comes first; returns the bytes read.
fn read_full(file: &mut std::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Checks remote metadata against the local file at `local`.
///
/// The size must match. The content hash is compared only when the backend
/// reported one and `check_hash` is set.
pub async fn verify_metadata(
    metadata: &FileMetadata,
    local: &Path,
    check_hash: bool,
) -> Result<(), TransferError> {
    let local_size = tokio::fs::metadata(local).await?.len();
    if metadata.size != local_size {
        return Err(TransferError::IntegrityMismatch(format!(
            "{}: remote size {} differs from local size {local_size}",
            metadata.display_path(),
            metadata.size
        )));
    }

    let Some(remote_hash) = metadata.content_hash.as_deref() else {
        return Ok(());
    };
    if !check_hash {
        return Ok(());
    }

    let path = local.to_path_buf();
    let local_hash = tokio::task::spawn_blocking(move || calculate_content_hash(&path))
        .await
        .map_err(|e| TransferError::LocalIo(std::io::Error::other(e)))??;

    if !local_hash.eq_ignore_ascii_case(remote_hash) {
        return Err(TransferError::IntegrityMismatch(format!(
            "{}: content hash {remote_hash} differs from local {local_hash}",
            metadata.display_path()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Positioned reads of a source file.
///
/// Every read seeks first, so a reader can follow offset corrections in
/// either direction. One reader serves one protocol iteration; the engine
/// drops it before a retry and opens a fresh one.
pub struct ChunkReader {
    file: tokio::fs::File,
    path: PathBuf,
    file_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    pub async fn open(path: &Path) -> Result<Self, std::io::Error> {
        let file = tokio::fs::File::open(path).await?;
        let file_size = file.metadata().await?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            file_size,
        })
    }

    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// Fails with `UnexpectedEof` if the file is shorter than requested,
    /// e.g. when it shrank after the transfer began.
    pub async fn read_chunk(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, std::io::Error> {
        let len = usize::try_from(len).map_err(std::io::Error::other)?;
        self.file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Total file size in bytes, as seen when the reader was opened.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

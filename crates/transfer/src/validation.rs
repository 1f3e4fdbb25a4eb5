use crate::TransferError;

/// Validates a remote file path.
///
/// Rejects:
/// - Empty paths
/// - Relative paths (must start with `/`)
/// - A trailing `/` (including the bare root)
/// - Empty, `.` or `..` segments
/// - Control characters
pub fn validate_remote_path(path: &str) -> Result<(), TransferError> {
    if path.is_empty() {
        return Err(TransferError::InvalidPath("empty path".into()));
    }

    let Some(rest) = path.strip_prefix('/') else {
        return Err(TransferError::InvalidPath(format!(
            "remote path must start with '/': {path}"
        )));
    };

    if rest.is_empty() || rest.ends_with('/') {
        return Err(TransferError::InvalidPath(format!(
            "remote path must name a file: {path}"
        )));
    }

    if path.chars().any(char::is_control) {
        return Err(TransferError::InvalidPath(format!(
            "control character in remote path: {path:?}"
        )));
    }

    for segment in rest.split('/') {
        match segment {
            "" => {
                return Err(TransferError::InvalidPath(format!(
                    "empty segment in remote path: {path}"
                )));
            }
            "." | ".." => {
                return Err(TransferError::InvalidPath(format!(
                    "relative segment '{segment}' not allowed: {path}"
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

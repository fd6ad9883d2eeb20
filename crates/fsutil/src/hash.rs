use crate::error::{FsutilError, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Read frame size for streaming hash computation. Chosen so we never hold
/// more than this much of a file in memory at once, regardless of file size.
const STREAM_CHUNK_BYTES: usize = 64 * 1024;

/// SHA-256 of the project root's absolute path string, hex-encoded. This is
/// the project's index identity.
#[must_use]
pub fn hash_project_path(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hex(&hasher.finalize())
}

/// SHA-256 of a file's current byte content, hex-encoded.
///
/// Streams the file in bounded frames rather than reading it whole, and
/// treats line-ending bytes as significant (no normalization) so the hash is
/// stable across platforms for the same on-disk bytes.
pub async fn hash_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| FsutilError::ReadError(format!("{}: {e}", path.display())))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; STREAM_CHUNK_BYTES];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| FsutilError::ReadError(format!("{}: {e}", path.display())))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex(&hasher.finalize()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

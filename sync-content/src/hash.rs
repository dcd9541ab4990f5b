//! SHA-256 content digests.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::ContentError;

const READ_CHUNK: usize = 64 * 1024;

/// Hex-encoded SHA-256 of the file at `path`. Blocking.
pub fn hash_file(path: &Path) -> Result<String, ContentError> {
    let mut file = std::fs::File::open(path).map_err(|e| ContentError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf).map_err(|e| ContentError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

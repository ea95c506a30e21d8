//! SHA-256 verification of downloaded artifacts.

use edgeplan::backend::ChecksumVerifier;
use edgeplan::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// Canonical form of a hex digest: dashes removed, trimmed, lowercase.
#[must_use]
pub fn normalize_hex(hex: &str) -> String {
    hex.replace('-', "").trim().to_ascii_lowercase()
}

/// Lowercase hex SHA-256 of a file, streamed.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| Error::io(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Verifier;

impl ChecksumVerifier for Sha256Verifier {
    fn verify_sha256(&self, file_path: &Path, expected_hex: &str) -> Result<()> {
        if !file_path.is_file() {
            return Err(Error::integrity(format!(
                "Artifact file '{}' does not exist.",
                file_path.display()
            )));
        }

        let expected = normalize_hex(expected_hex);
        let actual = sha256_file(file_path)?;
        if actual != expected {
            return Err(Error::integrity(format!(
                "Checksum verification failed for '{}'. Expected '{expected}', actual '{actual}'.",
                file_path.display()
            )));
        }
        log::debug!("Checksum ok for {}", file_path.display());
        Ok(())
    }
}

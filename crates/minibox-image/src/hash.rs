//! SHA-256 content verification.
//!
//! Layer blobs are addressed by digest and re-hashed before they are
//! unpacked.

use std::fmt;
use std::path::Path;

use minibox_common::error::{MiniboxError, Result};
use sha2::{Digest as _, Sha256};

const ALGORITHM: &str = "sha256";

/// A `sha256:<hex>` content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    hex: String,
}

impl Digest {
    /// Parses a digest string of the form `sha256:<64 hex chars>`.
    ///
    /// # Errors
    ///
    /// Returns an error for any other algorithm or a malformed hex part.
    pub fn parse(digest: &str) -> Result<Self> {
        let invalid = || MiniboxError::Config {
            message: format!("invalid digest: {digest:?}"),
        };
        let (algorithm, hex) = digest.split_once(':').ok_or_else(invalid)?;
        if algorithm != ALGORITHM
            || hex.len() != 64
            || !hex.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(invalid());
        }
        Ok(Self {
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Returns the hex-encoded hash.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ALGORITHM}:{}", self.hex)
    }
}

/// Computes the SHA-256 digest of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<Digest> {
    tracing::debug!(path = %path.display(), "computing SHA-256 hash");
    let mut file = std::fs::File::open(path).map_err(|e| MiniboxError::io(path, e))?;
    let mut hasher = Sha256::new();
    let _ = std::io::copy(&mut file, &mut hasher).map_err(|e| MiniboxError::io(path, e))?;
    Ok(Digest {
        hex: format!("{:x}", hasher.finalize()),
    })
}

/// Validates that a file matches the expected digest.
///
/// # Errors
///
/// Returns [`MiniboxError::HashMismatch`] if the digests differ.
pub fn validate_hash(path: &Path, expected: &Digest) -> Result<()> {
    let actual = hash_file(path)?;
    if &actual != expected {
        return Err(MiniboxError::HashMismatch {
            resource: path.display().to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn hash_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, "hello").unwrap();
        assert_eq!(hash_file(&path).unwrap().hex(), HELLO);
    }

    #[test]
    fn validate_detects_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, "tampered").unwrap();
        let expected = Digest::parse(&format!("sha256:{HELLO}")).unwrap();
        let err = validate_hash(&path, &expected).unwrap_err();
        assert!(matches!(err, MiniboxError::HashMismatch { .. }));
    }

    #[test]
    fn parse_rejects_other_algorithms() {
        assert!(Digest::parse(&format!("md5:{HELLO}")).is_err());
        assert!(Digest::parse("sha256:abc").is_err());
        assert!(Digest::parse(HELLO).is_err());
    }

    #[test]
    fn parse_normalizes_case() {
        let d = Digest::parse(&format!("sha256:{}", HELLO.to_uppercase())).unwrap();
        assert_eq!(d.to_string(), format!("sha256:{HELLO}"));
    }
}

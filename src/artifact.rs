// src/artifact.rs

//! Content-addressed deployment artifacts.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

/// SHA-256 of an artifact's bytes, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash a byte slice.
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Accept a previously rendered hash, e.g. read back from a tag.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        let valid = value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit());
        valid.then_some(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for display.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A deployment package loaded from disk.
#[derive(Clone)]
pub struct Artifact {
    path: PathBuf,
    bytes: Vec<u8>,
    hash: ContentHash,
}

impl Artifact {
    /// Read the artifact and compute its content hash.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::artifact_not_found(path));
            }
            Err(e) => return Err(AppError::Io(e)),
        };
        let hash = ContentHash::of(&bytes);
        log::debug!(
            "Loaded artifact {} ({} bytes, sha256 {})",
            path.display(),
            bytes.len(),
            hash.short()
        );
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            hash,
        })
    }

    /// Build an artifact from bytes already in memory.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        let hash = ContentHash::of(&bytes);
        Self {
            path: path.into(),
            bytes,
            hash,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .field("hash", &self.hash)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            ContentHash::of(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_tracks_bytes() {
        let a = ContentHash::of(b"package v1");
        assert_eq!(a, ContentHash::of(b"package v1"));
        assert_ne!(a, ContentHash::of(b"package v2"));
    }

    #[test]
    fn test_parse() {
        let hash = ContentHash::of(b"zip");
        assert_eq!(ContentHash::parse(hash.as_str()), Some(hash.clone()));
        assert_eq!(
            ContentHash::parse(&hash.as_str().to_uppercase()),
            Some(hash)
        );
        assert!(ContentHash::parse("abc").is_none());
        assert!(ContentHash::parse(&"z".repeat(64)).is_none());
    }

    #[tokio::test]
    async fn test_load_missing_is_artifact_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = Artifact::load(tmp.path().join("missing.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ArtifactNotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_rehash_after_change() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("upload-function.zip");

        std::fs::write(&path, b"first build").unwrap();
        let first = Artifact::load(&path).await.unwrap();
        let again = Artifact::load(&path).await.unwrap();
        assert_eq!(first.hash(), again.hash());

        std::fs::write(&path, b"second build").unwrap();
        let second = Artifact::load(&path).await.unwrap();
        assert_ne!(first.hash(), second.hash());
        assert_eq!(second.len(), 12);
    }
}

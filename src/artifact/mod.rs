//! Turning a local backup file into the bytes that get uploaded

pub mod compress;
pub mod encryption;

use std::path::Path;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

pub use compress::{gunzip, gzip, is_archive, ARCHIVE_SUFFIXES};
pub use encryption::{
    validate_password_strength, EncryptionConfig, EncryptionMethod, Encryptor, PasswordEncryptor,
};

/// Gzip level used for artifacts before upload
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Weak or missing encryption password: {0}")]
    WeakPassword(String),
}

/// An artifact ready for upload
#[derive(Debug, Clone)]
pub struct PreparedArtifact {
    /// Remote file name, including `.gz` / `.enc` suffixes
    pub name: String,
    pub data: Bytes,
    pub compressed: bool,
    pub encrypted: bool,
    /// SHA-256 of `data`, hex encoded
    pub checksum: String,
}

impl PreparedArtifact {
    /// Content encoding to advertise to object stores, if any
    pub fn content_encoding(&self) -> Option<&'static str> {
        (self.compressed && !self.encrypted).then_some("gzip")
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Upload name for a file given the transforms applied to it
pub fn upload_name(file_name: &str, compressed: bool, encrypted: bool) -> String {
    let mut name = file_name.to_string();
    if compressed {
        name.push_str(".gz");
    }
    if encrypted {
        name.push_str(".enc");
    }
    name
}

/// Compress (unless already an archive) and encrypt a backup file.
///
/// The source file is left untouched.
pub async fn prepare_artifact(path: &Path, encryptor: &Encryptor) -> Result<PreparedArtifact, ArtifactError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ArtifactError::Io(format!("Invalid backup path: {}", path.display())))?
        .to_string();

    let raw = tokio::fs::read(path)
        .await
        .map_err(|e| ArtifactError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

    let compressed = !is_archive(path);
    let encryptor = encryptor.clone();

    // Compression and key derivation are CPU bound
    let (data, encrypted) = tokio::task::spawn_blocking(move || -> Result<_, ArtifactError> {
        let data = if compressed {
            gzip(&raw, DEFAULT_COMPRESSION_LEVEL)?
        } else {
            raw
        };
        let encrypted = encryptor.is_enabled();
        Ok((encryptor.encrypt(&data)?, encrypted))
    })
    .await
    .map_err(|e| ArtifactError::Io(format!("Artifact preparation task failed: {}", e)))??;

    if compressed {
        debug!(file = %file_name, "Compressed backup artifact");
    } else {
        debug!(file = %file_name, "File is already an archive, skipping compression");
    }

    let checksum = sha256_hex(&data);
    let name = upload_name(&file_name, compressed, encrypted);
    info!(
        artifact = %name,
        size_bytes = data.len(),
        checksum = %checksum,
        encrypted,
        "Prepared backup artifact"
    );

    Ok(PreparedArtifact {
        name,
        data: Bytes::from(data),
        compressed,
        encrypted,
        checksum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_name() {
        assert_eq!(upload_name("db.sql", true, false), "db.sql.gz");
        assert_eq!(upload_name("db.sql", true, true), "db.sql.gz.enc");
        assert_eq!(upload_name("db.tar.gz", false, true), "db.tar.gz.enc");
        assert_eq!(upload_name("db.tar", false, false), "db.tar");
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_prepare_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main_blackbox_01_02_2025.sql");
        tokio::fs::write(&path, b"SELECT 1;").await.unwrap();

        let artifact = prepare_artifact(&path, &Encryptor::None).await.unwrap();
        assert_eq!(artifact.name, "main_blackbox_01_02_2025.sql.gz");
        assert!(artifact.compressed);
        assert!(!artifact.encrypted);
        assert_eq!(artifact.content_encoding(), Some("gzip"));
        assert_eq!(gunzip(&artifact.data).unwrap(), b"SELECT 1;");
        assert_eq!(artifact.checksum, sha256_hex(&artifact.data));
    }

    #[tokio::test]
    async fn test_prepare_encrypted_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files_blackbox_01_02_2025.tar.gz");
        tokio::fs::write(&path, b"archive bytes").await.unwrap();

        let encryptor = Encryptor::Password(PasswordEncryptor::new("CorrectHorse42Battery").unwrap());
        let artifact = prepare_artifact(&path, &encryptor).await.unwrap();

        assert_eq!(artifact.name, "files_blackbox_01_02_2025.tar.gz.enc");
        assert!(!artifact.compressed);
        assert_eq!(artifact.content_encoding(), None);
        assert_eq!(encryptor.decrypt(&artifact.data).unwrap(), b"archive bytes");
    }
}

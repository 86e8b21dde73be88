//! Storage backends and the rotation driver that prunes them.
//!
//! Every backend implements [`StorageBackend`]. A [`StorageHandler`] pairs a
//! backend with the rotation policy and encryption configured for it.

pub mod dropbox;
pub mod family;
pub mod google_drive;
pub mod local;
pub mod memory;
pub mod rotate;
#[cfg(feature = "s3")]
pub mod s3;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::{Encryptor, PreparedArtifact};
use crate::rotation::RotationPolicy;

pub use dropbox::{DropboxConfig, DropboxStorage};
pub use family::BackupFamily;
pub use google_drive::{clean_upload_directory, GoogleDriveConfig, GoogleDriveStorage};
pub use local::{LocalConfig, LocalStorage};
pub use memory::{MemoryConfig, MemoryStorage};
pub use rotate::{rotate, rotate_at, RotationReport};
#[cfg(feature = "s3")]
pub use s3::{S3Config, S3Storage};

/// Errors raised by storage backends
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to list artifacts: {0}")]
    List(String),

    #[error("Failed to upload artifact: {0}")]
    Upload(String),

    #[error("Failed to delete artifact: {0}")]
    Delete(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored backup as reported by a backend listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArtifact {
    /// Backend specific identifier used for deletion
    pub id: String,
    /// File name used to filter the backup family
    pub name: String,
    pub modified: DateTime<Utc>,
}

impl RemoteArtifact {
    pub fn new(id: impl Into<String>, name: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            modified,
        }
    }
}

/// Capability interface implemented by every storage backend
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Handler id used in reports and logs
    fn name(&self) -> &str;

    /// Every stored object, following pagination to the end
    async fn list_artifacts(&self) -> Result<Vec<RemoteArtifact>, StorageError>;

    async fn delete_artifact(&self, id: &str) -> Result<(), StorageError>;

    async fn upload(&self, name: &str, artifact: &PreparedArtifact) -> Result<(), StorageError>;
}

/// Storage handler kinds accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    S3,
    Dropbox,
    GoogleDrive,
    Local,
    Memory,
}

impl StorageKind {
    pub const ALL: [StorageKind; 5] = [
        Self::S3,
        Self::Dropbox,
        Self::GoogleDrive,
        Self::Local,
        Self::Memory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Dropbox => "dropbox",
            Self::GoogleDrive => "google_drive",
            Self::Local => "local",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown storage kind: {}", s))
    }
}

/// A configured storage backend with its rotation and encryption settings
#[derive(Clone)]
pub struct StorageHandler {
    pub id: String,
    pub kind: StorageKind,
    pub backend: Arc<dyn StorageBackend>,
    pub policy: RotationPolicy,
    pub encryptor: Encryptor,
}

impl StorageHandler {
    pub fn new(
        id: impl Into<String>,
        kind: StorageKind,
        backend: Arc<dyn StorageBackend>,
        policy: RotationPolicy,
        encryptor: Encryptor,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            backend,
            policy,
            encryptor,
        }
    }
}

impl fmt::Debug for StorageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageHandler")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("policy", &self.policy)
            .field("encryptor", &self.encryptor)
            .finish()
    }
}

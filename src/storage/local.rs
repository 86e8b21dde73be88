// Local directory storage

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{RemoteArtifact, StorageBackend, StorageError};
use crate::artifact::PreparedArtifact;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory the artifacts are written to
    pub path: PathBuf,
}

/// Stores artifacts as plain files in a directory
pub struct LocalStorage {
    name: String,
    directory: PathBuf,
}

impl LocalStorage {
    pub fn new(name: impl Into<String>, config: &LocalConfig) -> Self {
        Self {
            name: name.into(),
            directory: config.path.clone(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn ensure_directory_exists(&self) -> Result<(), StorageError> {
        if !self.directory.exists() {
            fs::create_dir_all(&self.directory).await.map_err(|e| {
                StorageError::Upload(format!("Failed to create backup directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve an artifact id to a path, refusing anything outside the directory
    fn artifact_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        let name = Path::new(id);
        match name.file_name() {
            Some(file_name) if file_name == name.as_os_str() => Ok(self.directory.join(file_name)),
            _ => Err(StorageError::NotFound(id.to_string())),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_artifacts(&self) -> Result<Vec<RemoteArtifact>, StorageError> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.directory)
            .await
            .map_err(|e| StorageError::List(format!("Failed to read backup directory: {}", e)))?;

        let mut artifacts = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::List(format!("Failed to read directory entry: {}", e)))?
        {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let modified: DateTime<Utc> = metadata.modified()?.into();
            artifacts.push(RemoteArtifact::new(name.clone(), name, modified));
        }

        Ok(artifacts)
    }

    async fn delete_artifact(&self, id: &str) -> Result<(), StorageError> {
        let path = self.artifact_path(id)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| StorageError::Delete(format!("Failed to delete {}: {}", path.display(), e)))
    }

    async fn upload(&self, name: &str, artifact: &PreparedArtifact) -> Result<(), StorageError> {
        self.ensure_directory_exists().await?;
        let path = self.artifact_path(name)?;

        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| StorageError::Upload(format!("Failed to create {}: {}", path.display(), e)))?;
        file.write_all(&artifact.data)
            .await
            .map_err(|e| StorageError::Upload(format!("Failed to write {}: {}", path.display(), e)))?;
        file.flush().await?;

        Ok(())
    }
}

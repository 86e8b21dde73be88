// Gzipped tar archive of a local directory

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use super::{BackupOutcome, Database, DatabaseError, DatabaseKind};

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFolderConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub compression_level: Option<u32>,
}

pub struct LocalFolder {
    id: String,
    path: PathBuf,
    compression_level: u32,
}

impl LocalFolder {
    /// Fails when `compression_level` is outside 0..=9
    pub fn new(id: impl Into<String>, config: LocalFolderConfig) -> Result<Self, DatabaseError> {
        let compression_level = config.compression_level.unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        if compression_level > 9 {
            return Err(DatabaseError::Config(format!(
                "Invalid compression level. Must be an integer between 0 and 9, got {}.",
                compression_level
            )));
        }

        Ok(Self {
            id: id.into(),
            path: config.path,
            compression_level,
        })
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }
}

/// Write every regular file under `root` into a tar.gz at `target`, with
/// paths relative to `root`. Returns the number of files archived.
pub fn archive_directory(root: &Path, target: &Path, level: u32) -> Result<usize, DatabaseError> {
    let file = File::create(target)
        .map_err(|e| DatabaseError::Archive(format!("Failed to create {}: {}", target.display(), e)))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::new(level)));

    let mut count = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| DatabaseError::Archive(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| DatabaseError::Archive(e.to_string()))?;
        builder
            .append_path_with_name(entry.path(), relative)
            .map_err(|e| DatabaseError::Archive(format!("{}: {}", entry.path().display(), e)))?;
        count += 1;
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| DatabaseError::Archive(format!("Failed to finish archive: {}", e)))?;

    Ok(count)
}

#[async_trait]
impl Database for LocalFolder {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::LocalFolder
    }

    fn backup_extension(&self) -> &str {
        ".tar.gz"
    }

    async fn backup(&self, path: &Path) -> Result<BackupOutcome, DatabaseError> {
        if !self.path.is_dir() {
            return Ok(BackupOutcome::failed(format!(
                "{} is not a directory",
                self.path.display()
            )));
        }

        let root = self.path.clone();
        let target = path.to_path_buf();
        let level = self.compression_level;

        let archived = tokio::task::spawn_blocking(move || archive_directory(&root, &target, level))
            .await
            .map_err(|e| DatabaseError::Archive(e.to_string()))?;

        Ok(match archived {
            Ok(count) => {
                debug!(database_id = %self.id, files = count, "Archived local folder");
                BackupOutcome::succeeded(format!("Archived {} files from {}", count, self.path.display()))
            }
            Err(e) => BackupOutcome::failed(e.to_string()),
        })
    }
}

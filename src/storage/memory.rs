use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::{RemoteArtifact, StorageBackend, StorageError};
use crate::artifact::PreparedArtifact;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    modified: DateTime<Utc>,
}

/// `storage.memory.<id>` takes no settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {}

/// In-process storage for dry runs and tests
#[derive(Clone)]
pub struct MemoryStorage {
    name: String,
    objects: Arc<DashMap<String, StoredObject>>,
}

impl MemoryStorage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Arc::new(DashMap::new()),
        }
    }

    /// Store an object with an explicit modification time
    pub fn insert(&self, name: impl Into<String>, modified: DateTime<Utc>, data: impl Into<Bytes>) {
        self.objects.insert(
            name.into(),
            StoredObject {
                data: data.into(),
                modified,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.objects.get(name).map(|object| object.data.clone())
    }

    /// Stored names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_artifacts(&self) -> Result<Vec<RemoteArtifact>, StorageError> {
        Ok(self
            .objects
            .iter()
            .map(|entry| RemoteArtifact::new(entry.key().clone(), entry.key().clone(), entry.modified))
            .collect())
    }

    async fn delete_artifact(&self, id: &str) -> Result<(), StorageError> {
        self.objects
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn upload(&self, name: &str, artifact: &PreparedArtifact) -> Result<(), StorageError> {
        self.insert(name, Utc::now(), artifact.data.clone());
        Ok(())
    }
}

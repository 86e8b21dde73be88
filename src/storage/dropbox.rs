//! Dropbox storage over the v2 HTTP API.
//!
//! Small artifacts go through a single `files/upload` call; anything above
//! [`CHUNK_SIZE`] uses an upload session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{RemoteArtifact, StorageBackend, StorageError};
use crate::artifact::PreparedArtifact;

pub const API_URL: &str = "https://api.dropboxapi.com/2";
pub const CONTENT_URL: &str = "https://content.dropboxapi.com/2";

/// Largest payload sent in one request
pub const CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// `storage.dropbox.<id>` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropboxConfig {
    pub access_token: String,
    #[serde(default)]
    pub upload_directory: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListFolderPage {
    pub entries: Vec<FolderEntry>,
    pub cursor: String,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub(crate) enum FolderEntry {
    File {
        name: String,
        path_lower: String,
        server_modified: DateTime<Utc>,
    },
    Folder {},
    Deleted {},
}

impl FolderEntry {
    fn into_artifact(self) -> Option<RemoteArtifact> {
        match self {
            Self::File {
                name,
                path_lower,
                server_modified,
            } => Some(RemoteArtifact::new(path_lower, name, server_modified)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadSession {
    session_id: String,
}

/// Normalise the configured directory to `/`-terminated form
fn upload_base(directory: Option<&str>) -> String {
    let trimmed = directory.unwrap_or("").trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

pub struct DropboxStorage {
    name: String,
    client: Client,
    access_token: String,
    upload_base: String,
    api_url: String,
    content_url: String,
}

impl DropboxStorage {
    pub fn new(name: impl Into<String>, config: &DropboxConfig) -> Self {
        Self::with_urls(name, config, API_URL, CONTENT_URL)
    }

    /// Point the backend at different API hosts
    pub fn with_urls(
        name: impl Into<String>,
        config: &DropboxConfig,
        api_url: &str,
        content_url: &str,
    ) -> Self {
        Self {
            name: name.into(),
            client: Client::new(),
            access_token: config.access_token.clone(),
            upload_base: upload_base(config.upload_directory.as_deref()),
            api_url: api_url.trim_end_matches('/').to_string(),
            content_url: content_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn upload_base(&self) -> &str {
        &self.upload_base
    }

    /// Listing path; the API wants `""` for the root folder
    fn list_path(&self) -> &str {
        if self.upload_base == "/" {
            ""
        } else {
            self.upload_base.trim_end_matches('/')
        }
    }

    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<T, reqwest::Error> {
        self.client
            .post(format!("{}/{}", self.api_url, endpoint))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn content(
        &self,
        endpoint: &str,
        arg: serde_json::Value,
        data: Vec<u8>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .post(format!("{}/{}", self.content_url, endpoint))
            .bearer_auth(&self.access_token)
            .header("Dropbox-API-Arg", arg.to_string())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?
            .error_for_status()
    }

    async fn upload_in_session(&self, path: &str, data: &[u8]) -> Result<(), reqwest::Error> {
        let mut chunks = data.chunks(CHUNK_SIZE);
        let first = chunks.next().unwrap_or_default();

        let session: UploadSession = self
            .content("files/upload_session/start", json!({ "close": false }), first.to_vec())
            .await?
            .json()
            .await?;
        let mut offset = first.len();

        let rest: Vec<&[u8]> = chunks.collect();
        let last_index = rest.len().saturating_sub(1);

        for (index, chunk) in rest.iter().enumerate() {
            let cursor = json!({ "session_id": session.session_id, "offset": offset });
            if index == last_index {
                let arg = json!({
                    "cursor": cursor,
                    "commit": { "path": path, "mode": "overwrite" },
                });
                self.content("files/upload_session/finish", arg, chunk.to_vec()).await?;
            } else {
                self.content("files/upload_session/append_v2", json!({ "cursor": cursor }), chunk.to_vec())
                    .await?;
            }
            offset += chunk.len();
        }

        debug!(path, offset, "Finished Dropbox upload session");
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for DropboxStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_artifacts(&self) -> Result<Vec<RemoteArtifact>, StorageError> {
        let mut page: ListFolderPage = self
            .rpc("files/list_folder", json!({ "path": self.list_path() }))
            .await
            .map_err(|e| StorageError::List(e.to_string()))?;

        let mut artifacts = Vec::new();
        loop {
            let has_more = page.has_more;
            let cursor = std::mem::take(&mut page.cursor);
            artifacts.extend(page.entries.into_iter().filter_map(FolderEntry::into_artifact));

            if !has_more {
                break;
            }
            page = self
                .rpc("files/list_folder/continue", json!({ "cursor": cursor }))
                .await
                .map_err(|e| StorageError::List(e.to_string()))?;
        }

        Ok(artifacts)
    }

    async fn delete_artifact(&self, id: &str) -> Result<(), StorageError> {
        self.rpc::<serde_json::Value>("files/delete_v2", json!({ "path": id }))
            .await
            .map_err(|e| StorageError::Delete(format!("{}: {}", id, e)))?;
        Ok(())
    }

    async fn upload(&self, name: &str, artifact: &PreparedArtifact) -> Result<(), StorageError> {
        let path = format!("{}{}", self.upload_base, name);

        let result = if artifact.len() <= CHUNK_SIZE {
            self.content(
                "files/upload",
                json!({ "path": path, "mode": "overwrite" }),
                artifact.data.to_vec(),
            )
            .await
            .map(|_| ())
        } else {
            self.upload_in_session(&path, &artifact.data).await
        };

        result.map_err(|e| StorageError::Upload(format!("{}: {}", path, e)))
    }
}

//! Google Drive storage over the Drive v3 REST API.
//!
//! Authentication uses a long lived OAuth refresh token; the access token is
//! fetched lazily and cached for the life of the backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use super::{RemoteArtifact, StorageBackend, StorageError};
use crate::artifact::PreparedArtifact;

pub const OAUTH_URL: &str = "https://oauth2.googleapis.com/token";
pub const API_URL: &str = "https://www.googleapis.com/drive/v3";
pub const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Resumable upload chunk size, a multiple of 256 KiB as the API requires
pub const CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// `storage.google_drive.<id>` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleDriveConfig {
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub upload_directory: Option<String>,
}

/// Strip leading, trailing and duplicate slashes: `/Hello//World///` becomes
/// `Hello/World`.
pub fn clean_upload_directory(upload_directory: &str) -> String {
    upload_directory
        .split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
}

/// Every live file in a folder. Backup families are filtered by the caller,
/// so custom filename formats are listed too.
fn listing_query(folder_id: &str) -> String {
    format!("'{}' in parents and trashed=false", quote(folder_id))
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

/// Escape a value for use inside a single-quoted Drive query string
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub struct GoogleDriveStorage {
    name: String,
    client: Client,
    config: GoogleDriveConfig,
    upload_base: String,
    access_token: Mutex<Option<String>>,
    oauth_url: String,
    api_url: String,
    upload_url: String,
}

impl GoogleDriveStorage {
    pub fn new(name: impl Into<String>, config: &GoogleDriveConfig) -> Result<Self, StorageError> {
        Self::with_urls(name, config, OAUTH_URL, API_URL, UPLOAD_URL)
    }

    /// Point the backend at different API hosts
    pub fn with_urls(
        name: impl Into<String>,
        config: &GoogleDriveConfig,
        oauth_url: &str,
        api_url: &str,
        upload_url: &str,
    ) -> Result<Self, StorageError> {
        // 308 is "resume incomplete" for uploads, never a redirect
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            name: name.into(),
            client,
            upload_base: clean_upload_directory(config.upload_directory.as_deref().unwrap_or("")),
            config: config.clone(),
            access_token: Mutex::new(None),
            oauth_url: oauth_url.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            upload_url: upload_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn upload_base(&self) -> &str {
        &self.upload_base
    }

    async fn token(&self) -> Result<String, StorageError> {
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let response: TokenResponse = self
            .client
            .post(&self.oauth_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| StorageError::Auth(e.to_string()))?
            .json()
            .await?;

        *cached = Some(response.access_token.clone());
        Ok(response.access_token)
    }

    async fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<FileList, StorageError> {
        let token = self.token().await?;
        let mut params = vec![
            ("q", query.to_string()),
            ("spaces", "drive".to_string()),
            ("fields", "nextPageToken, files(id, name, modifiedTime)".to_string()),
            ("orderBy", "modifiedTime desc".to_string()),
        ];
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token.to_string()));
        }

        Ok(self
            .client
            .get(format!("{}/files", self.api_url))
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn find_child_folder(&self, name: &str, parent_id: &str) -> Result<Option<String>, StorageError> {
        let query = format!(
            "name='{}' and mimeType='{}' and trashed=false and '{}' in parents",
            quote(name),
            FOLDER_MIME_TYPE,
            quote(parent_id)
        );
        let list = self.list_page(&query, None).await?;
        Ok(list.files.into_iter().next().map(|file| file.id))
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String, StorageError> {
        let token = self.token().await?;
        let created: CreatedFile = self
            .client
            .post(format!("{}/files", self.api_url))
            .bearer_auth(token)
            .query(&[("fields", "id")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent_id],
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(folder = name, id = %created.id, "Created Google Drive folder");
        Ok(created.id)
    }

    /// Id of the upload directory, creating missing folders on the way
    async fn ensure_folder(&self) -> Result<String, StorageError> {
        let mut parent_id = "root".to_string();
        if self.upload_base.is_empty() {
            return Ok(parent_id);
        }

        for name in self.upload_base.split('/') {
            parent_id = match self.find_child_folder(name, &parent_id).await? {
                Some(id) => id,
                None => self.create_folder(name, &parent_id).await?,
            };
        }
        Ok(parent_id)
    }

    async fn start_resumable_upload(&self, name: &str, folder_id: &str, size: usize) -> Result<String, StorageError> {
        let token = self.token().await?;
        let response = self
            .client
            .post(format!("{}/files", self.upload_url))
            .bearer_auth(token)
            .query(&[("uploadType", "resumable"), ("fields", "id")])
            .header("X-Upload-Content-Type", "application/octet-stream")
            .header("X-Upload-Content-Length", size.to_string())
            .json(&json!({ "name": name, "parents": [folder_id] }))
            .send()
            .await?
            .error_for_status()?;

        response
            .headers()
            .get(header::LOCATION)
            .and_then(|location| location.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| StorageError::Upload("Resumable upload returned no session URL".to_string()))
    }
}

#[async_trait]
impl StorageBackend for GoogleDriveStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_artifacts(&self) -> Result<Vec<RemoteArtifact>, StorageError> {
        let folder_id = self.ensure_folder().await?;
        let query = listing_query(&folder_id);

        let mut artifacts = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_page(&query, page_token.as_deref()).await?;
            artifacts.extend(page.files.into_iter().filter_map(|file| {
                file.modified_time
                    .map(|modified| RemoteArtifact::new(file.id, file.name, modified))
            }));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(artifacts)
    }

    async fn delete_artifact(&self, id: &str) -> Result<(), StorageError> {
        let token = self.token().await?;
        self.client
            .delete(format!("{}/files/{}", self.api_url, id))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| StorageError::Delete(format!("{}: {}", id, e)))?;
        Ok(())
    }

    async fn upload(&self, name: &str, artifact: &PreparedArtifact) -> Result<(), StorageError> {
        let folder_id = self.ensure_folder().await?;
        let total = artifact.len();
        let session_url = self.start_resumable_upload(name, &folder_id, total).await?;

        let mut offset = 0;
        loop {
            let end = (offset + CHUNK_SIZE).min(total);
            let mut request = self
                .client
                .put(&session_url)
                .body(artifact.data.slice(offset..end));
            if total > 0 {
                request = request.header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", offset, end - 1, total),
                );
            }

            let response = request.send().await?;
            match response.status() {
                // 308 Resume Incomplete: the chunk was stored, send the next one
                StatusCode::PERMANENT_REDIRECT if end < total => offset = end,
                status if status.is_success() => break,
                status => {
                    return Err(StorageError::Upload(format!(
                        "Google Drive upload of {} failed with status {}",
                        name, status
                    )))
                }
            }
        }

        debug!(artifact = name, size_bytes = total, "Uploaded to Google Drive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_upload_directory() {
        assert_eq!(clean_upload_directory("/Hello//World///"), "Hello/World");
        assert_eq!(clean_upload_directory("backups"), "backups");
        assert_eq!(clean_upload_directory("//"), "");
        assert_eq!(clean_upload_directory(""), "");
    }

    #[test]
    fn test_listing_query_does_not_filter_names() {
        assert_eq!(listing_query("abc123"), "'abc123' in parents and trashed=false");
        assert!(!listing_query("root").contains("name"));
    }

    #[test]
    fn test_client_builds_and_directory_is_cleaned() {
        let storage = GoogleDriveStorage::new(
            "drive",
            &GoogleDriveConfig {
                refresh_token: "refresh".to_string(),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                upload_directory: Some("/backups//db/".to_string()),
            },
        )
        .unwrap();
        assert_eq!(storage.name(), "drive");
        assert_eq!(storage.upload_base(), "backups/db");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("it's"), "it\\'s");
    }

    #[test]
    fn test_file_list_page() {
        let page: FileList = serde_json::from_str(
            r#"{
                "nextPageToken": "page-2",
                "files": [
                    {"id": "1", "name": "main_blackbox_01_02_2025.sql.gz",
                     "modifiedTime": "2025-02-01T04:00:00.000Z"},
                    {"id": "2", "name": "notes_blackbox.txt"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(page.next_page_token.as_deref(), Some("page-2"));
        assert_eq!(page.files.len(), 2);
        assert!(page.files[0].modified_time.is_some());
        assert!(page.files[1].modified_time.is_none());

        let last: FileList = serde_json::from_str(r#"{"files": []}"#).unwrap();
        assert!(last.next_page_token.is_none());
    }
}

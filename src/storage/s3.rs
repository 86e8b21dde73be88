// S3-compatible object storage (AWS S3, Backblaze B2, MinIO, ...)

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RemoteArtifact, StorageBackend, StorageError};
use crate::artifact::PreparedArtifact;
use crate::config::ConfigError;

fn default_region() -> String {
    "us-east-1".to_string()
}

/// `storage.s3.<id>` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    /// Host name without scheme, e.g. `s3.eu-west-1.amazonaws.com`
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

impl S3Config {
    /// Explicit credentials, which must be given together or not at all
    pub fn credentials(&self) -> Result<Option<(String, String)>, ConfigError> {
        match (&self.aws_access_key_id, &self.aws_secret_access_key) {
            (Some(key_id), Some(secret)) => Ok(Some((key_id.clone(), secret.clone()))),
            (None, None) => Ok(None),
            _ => Err(ConfigError::Invalid(
                "You must configure either both or none of the S3 credential params".to_string(),
            )),
        }
    }

    pub fn endpoint_url(&self) -> String {
        format!("https://{}", self.endpoint)
    }
}

pub struct S3Storage {
    name: String,
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Build the client. Without explicit credentials the default AWS chain
    /// (environment, `~/.aws`) is used.
    pub async fn new(name: impl Into<String>, config: &S3Config) -> Result<Self, ConfigError> {
        let credentials = config.credentials()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(config.endpoint_url());

        if let Some((key_id, secret)) = credentials {
            loader = loader.credentials_provider(Credentials::new(key_id, secret, None, None, "blackbox"));
        }

        let aws_config = loader.load().await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        Ok(Self {
            name: name.into(),
            client: Client::from_conf(s3_config_builder.build()),
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_artifacts(&self) -> Result<Vec<RemoteArtifact>, StorageError> {
        let mut artifacts = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StorageError::List(format!("Failed to list objects: {}", e)))?;

            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                let modified = object
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()));
                match modified {
                    Some(modified) => artifacts.push(RemoteArtifact::new(key, key, modified)),
                    None => debug!(key, "Skipping object without modification time"),
                }
            }

            continuation_token = response.next_continuation_token().map(str::to_string);
            if response.is_truncated() != Some(true) || continuation_token.is_none() {
                break;
            }
        }

        Ok(artifacts)
    }

    async fn delete_artifact(&self, id: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| StorageError::Delete(format!("Failed to delete {}: {}", id, e)))?;
        Ok(())
    }

    async fn upload(&self, name: &str, artifact: &PreparedArtifact) -> Result<(), StorageError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(ByteStream::from(artifact.data.to_vec()));

        if let Some(encoding) = artifact.content_encoding() {
            request = request.content_encoding(encoding);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::Upload(format!("Failed to upload {}: {}", name, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: Option<&str>, secret: Option<&str>) -> S3Config {
        S3Config {
            bucket: "backups".to_string(),
            endpoint: "s3.eu-central-003.backblazeb2.com".to_string(),
            region: default_region(),
            aws_access_key_id: key.map(str::to_string),
            aws_secret_access_key: secret.map(str::to_string),
            force_path_style: false,
        }
    }

    #[test]
    fn test_credentials_must_be_paired() {
        assert!(config(Some("id"), Some("secret")).credentials().unwrap().is_some());
        assert!(config(None, None).credentials().unwrap().is_none());
        assert!(config(Some("id"), None).credentials().is_err());
        assert!(config(None, Some("secret")).credentials().is_err());
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            config(None, None).endpoint_url(),
            "https://s3.eu-central-003.backblazeb2.com"
        );
    }

    #[test]
    fn test_config_from_yaml() {
        let config: S3Config = serde_yaml::from_str("bucket: b\nendpoint: s3.amazonaws.com").unwrap();
        assert_eq!(config.region, "us-east-1");
        assert!(!config.force_path_style);
    }
}

// Rotation driver: list, order, decide, delete

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use super::family::BackupFamily;
use super::{RemoteArtifact, StorageBackend};
use crate::rotation::{Decision, RotationPolicy};

/// What a rotation pass did on one backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RotationReport {
    pub storage_id: String,
    pub examined: usize,
    pub retained: Vec<String>,
    pub deleted: Vec<String>,
    /// Set when the pass was abandoned part way
    pub error: Option<String>,
}

impl RotationReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Rotate one backup family on a backend using the current time
pub async fn rotate(
    backend: &dyn StorageBackend,
    family: &BackupFamily,
    policy: &RotationPolicy,
) -> RotationReport {
    rotate_at(backend, family, policy, Utc::now()).await
}

/// Rotate one backup family on a backend.
///
/// Listing or deletion failures are logged and end the pass; they are
/// reported but never propagated.
#[instrument(skip_all, fields(storage_id = %backend.name(), database_id = %family.database_id()))]
pub async fn rotate_at(
    backend: &dyn StorageBackend,
    family: &BackupFamily,
    policy: &RotationPolicy,
    now: DateTime<Utc>,
) -> RotationReport {
    let mut report = RotationReport {
        storage_id: backend.name().to_string(),
        ..Default::default()
    };

    let listed = match backend.list_artifacts().await {
        Ok(listed) => listed,
        Err(e) => {
            error!(error = %e, "Failed to list backups, skipping rotation");
            report.error = Some(e.to_string());
            return report;
        }
    };

    let mut artifacts: Vec<RemoteArtifact> = listed
        .into_iter()
        .filter(|artifact| family.matches(&artifact.name))
        .collect();
    artifacts.sort_by(|a, b| b.modified.cmp(&a.modified));

    let mut pass = policy.start_pass(now);

    for artifact in artifacts {
        report.examined += 1;

        let decision = match pass.decide(artifact.modified) {
            Ok(decision) => decision,
            Err(e) => {
                error!(error = %e, artifact = %artifact.name, "Rotation aborted");
                report.error = Some(e.to_string());
                break;
            }
        };

        match decision {
            Decision::Retain(reason) => {
                debug!(artifact = %artifact.name, modified = %artifact.modified, %reason, "Retaining backup");
                report.retained.push(artifact.name);
            }
            Decision::Delete(reason) => {
                if let Err(e) = backend.delete_artifact(&artifact.id).await {
                    error!(error = %e, artifact = %artifact.name, "Failed to delete backup, abandoning rotation");
                    report.error = Some(e.to_string());
                    break;
                }
                info!(artifact = %artifact.name, modified = %artifact.modified, %reason, "Deleted backup");
                report.deleted.push(artifact.name);
            }
        }
    }

    info!(
        examined = report.examined,
        retained = report.retained.len(),
        deleted = report.deleted.len(),
        "Rotation finished"
    );

    report
}

//! The backup run: dump every database, ship the dump to its storage
//! handlers, rotate old backups and notify.

use std::path::Path;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::artifact::prepare_artifact;
use crate::config::{validate_date_format, Config, ConfigError};
use crate::cooldown::{Cooldown, CooldownState};
use crate::databases::BackupOutcome;
use crate::notifiers::Notifier;
use crate::report::DatabaseReport;
use crate::storage::family::render_filename;
use crate::storage::{rotate, BackupFamily, StorageHandler};
use crate::workflow::{Registry, Workflow};
use crate::{BlackboxError, Result};

/// Settings that shape a run beyond the handlers themselves
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub filename_format: String,
    pub date_format: String,
    pub cooldown: Option<Cooldown>,
    pub cooldown_state: CooldownState,
}

impl RunOptions {
    /// Options from the configuration; cooldown state lives beside `config_path`
    pub fn from_config(config: &Config, config_path: &Path) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            filename_format: config.filename_format.clone(),
            date_format: config.date_format.clone(),
            cooldown: config.cooldown()?,
            cooldown_state: CooldownState::beside_config(config_path),
        })
    }
}

/// Build the handlers from `config` and run. Returns whether every database
/// was backed up and uploaded everywhere it should be.
#[instrument(skip_all, fields(config = %config_path.display()))]
pub async fn run(config: &Config, config_path: &Path) -> Result<bool> {
    if config.databases.is_empty() || config.storage.is_empty() {
        return Err(missing_handlers());
    }

    let options = RunOptions::from_config(config, config_path)?;
    let registry = Registry::from_config(config).await?;
    execute(registry, &options).await
}

/// Run an already built registry
#[instrument(skip_all)]
pub async fn execute(mut registry: Registry, options: &RunOptions) -> Result<bool> {
    if registry.database_count() == 0 || registry.storage().is_empty() {
        return Err(missing_handlers());
    }

    validate_date_format(&options.date_format)?;
    let workflows = registry.workflows()?;
    let backup_dir = tempfile::tempdir()?;
    info!(path = %backup_dir.path().display(), "Backing up to folder");

    let date = Local::now().format(&options.date_format).to_string();
    let mut success = true;

    for workflow in &workflows {
        let report = run_workflow(&registry, workflow, backup_dir.path(), &date, options).await;
        if !report.success {
            success = false;
        }

        let notifiers = registry.notifiers_mut();
        for &position in &workflow.notifiers {
            notifiers[position].report_mut().add_database(report.clone());
        }
    }

    send_notifications(registry.notifiers(), options, Utc::now()).await;

    if success {
        info!(databases = workflows.len(), "Backup run succeeded");
    } else {
        warn!(databases = workflows.len(), "Backup run finished with failures");
    }
    Ok(success)
}

fn missing_handlers() -> BlackboxError {
    ConfigError::Invalid("You have to define at least one database and storage".to_string()).into()
}

#[instrument(skip_all, fields(database_id = %workflow.database.id()))]
async fn run_workflow(
    registry: &Registry,
    workflow: &Workflow,
    backup_dir: &Path,
    date: &str,
    options: &RunOptions,
) -> DatabaseReport {
    let database = &workflow.database;
    let stem = render_filename(&options.filename_format, database.id(), date);
    let backup_path = backup_dir.join(format!("{}{}", stem, database.backup_extension()));

    let outcome = match database.backup(&backup_path).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Backup could not be started");
            BackupOutcome::failed(e.to_string())
        }
    };

    let mut report = DatabaseReport::new(database.id(), outcome.success, outcome.output);
    if !report.success {
        error!("Backup failed, skipping storage");
        return report;
    }
    info!(path = %backup_path.display(), "Backup created");

    let family = match BackupFamily::new(database.id(), &options.filename_format, &options.date_format) {
        Ok(family) => Some(family),
        Err(e) => {
            warn!(error = %e, "Cannot build backup family pattern, rotation disabled");
            None
        }
    };

    for &position in &workflow.storage {
        let handler = &registry.storage()[position];

        match upload(handler, &backup_path).await {
            Ok(name) => {
                info!(storage_id = %handler.id, artifact = %name, "Upload complete");
                report.report_storage(&handler.id, true, "");
            }
            Err(e) => {
                error!(storage_id = %handler.id, error = %e, "Upload failed");
                let line = output_line(&report.output, &format!("{}: {}", handler.id, e));
                report.report_storage(&handler.id, false, &line);
            }
        }

        // Rotation problems are logged by the driver and never fail the run
        if let Some(family) = &family {
            let rotation = rotate(handler.backend.as_ref(), family, &handler.policy).await;
            debug!(
                storage_id = %handler.id,
                examined = rotation.examined,
                deleted = rotation.deleted.len(),
                complete = rotation.is_complete(),
                "Rotation finished"
            );
        }
    }

    report
}

async fn upload(handler: &StorageHandler, path: &Path) -> Result<String> {
    let artifact = prepare_artifact(path, &handler.encryptor).await?;
    handler.backend.upload(&artifact.name, &artifact).await?;
    Ok(artifact.name)
}

fn output_line(existing: &str, message: &str) -> String {
    if existing.is_empty() || existing.ends_with('\n') {
        format!("{}\n", message)
    } else {
        format!("\n{}\n", message)
    }
}

/// Notify every notifier with a non-empty report. Failed runs always
/// notify; successful ones respect the cooldown.
#[instrument(skip_all)]
async fn send_notifications(notifiers: &[Box<dyn Notifier>], options: &RunOptions, now: DateTime<Utc>) {
    let on_cooldown = match &options.cooldown {
        Some(cooldown) => !options.cooldown_state.should_notify(cooldown, now).await,
        None => false,
    };
    let mut sent_success = false;

    for notifier in notifiers {
        let report = notifier.report();
        if report.is_empty() {
            debug!(notifier_id = %notifier.id(), "No databases to report");
            continue;
        }

        let success = report.success();
        if success && on_cooldown {
            info!(notifier_id = %notifier.id(), "Notifier on cooldown, skipping");
            continue;
        }

        match notifier.notify().await {
            Ok(()) => {
                info!(notifier_id = %notifier.id(), kind = %notifier.kind(), success, "Notification sent");
                sent_success |= success;
            }
            Err(e) => error!(notifier_id = %notifier.id(), error = %e, "Notification failed"),
        }
    }

    if options.cooldown.is_some() && sent_success {
        if let Err(e) = options.cooldown_state.record(now).await {
            warn!(error = %e, "Failed to record notification time");
        }
    }
}

//! Database backup producers.
//!
//! Each producer writes one backup file per run. Dump tools are spawned
//! directly (no shell) and credentials go through their environment
//! variables rather than the command line.

pub mod local_folder;
pub mod mongodb;
pub mod mysql;
pub mod postgres;
pub mod redis;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

pub use local_folder::{LocalFolder, LocalFolderConfig};
pub use mongodb::{MongoDb, MongoDbConfig};
pub use mysql::{MySql, MySqlConfig};
pub use postgres::{Postgres, PostgresConfig};
pub use redis::{Redis, RedisConfig};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to run {program}: {message}")]
    Command { program: String, message: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Invalid database configuration: {0}")]
    Config(String),
}

/// Result of one backup attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupOutcome {
    pub success: bool,
    /// Combined stdout and stderr of the dump tool, trimmed
    pub output: String,
}

impl BackupOutcome {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// A database that can be backed up to a local file
#[async_trait]
pub trait Database: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> DatabaseKind;

    /// Extension of the produced file, including the leading dot
    fn backup_extension(&self) -> &str;

    async fn backup(&self, path: &Path) -> Result<BackupOutcome, DatabaseError>;
}

/// Database handler kinds accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseKind {
    Postgres,
    Mysql,
    Mariadb,
    Mongodb,
    Redis,
    LocalFolder,
}

impl DatabaseKind {
    pub const ALL: [DatabaseKind; 6] = [
        Self::Postgres,
        Self::Mysql,
        Self::Mariadb,
        Self::Mongodb,
        Self::Redis,
        Self::LocalFolder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mariadb => "mariadb",
            Self::Mongodb => "mongodb",
            Self::Redis => "redis",
            Self::LocalFolder => "local_folder",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown database kind: {}", s))
    }
}

/// An external dump command ready to be spawned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl DumpCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run to completion, capturing output. A non-zero exit is a failed
    /// outcome, not an error; failing to spawn is an error.
    #[instrument(skip_all, fields(program = %self.program))]
    pub async fn run(&self) -> Result<BackupOutcome, DatabaseError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DatabaseError::Command {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let text = text.trim().to_string();

        debug!(status = %output.status, output = %text, "Dump command finished");

        Ok(BackupOutcome {
            success: output.status.success(),
            output: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_kind_names() {
        for kind in DatabaseKind::ALL {
            assert_eq!(kind.as_str().parse::<DatabaseKind>().unwrap(), kind);
        }
        assert!("sqlite".parse::<DatabaseKind>().is_err());
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let result = DumpCommand::new("blackbox-definitely-not-installed").run().await;
        assert!(matches!(result, Err(DatabaseError::Command { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_output_is_captured() {
        let outcome = DumpCommand::new("echo").arg("dumped").run().await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output, "dumped");

        let outcome = DumpCommand::new("false").run().await.unwrap();
        assert!(!outcome.success);
    }
}

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{BackupOutcome, Database, DatabaseError, DatabaseKind, DumpCommand};

fn default_port() -> u16 {
    5432
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub username: String,
    pub password: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Backs up every database of a Postgres cluster with `pg_dumpall`
pub struct Postgres {
    id: String,
    config: PostgresConfig,
}

impl Postgres {
    pub fn new(id: impl Into<String>, config: PostgresConfig) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }

    pub fn command(&self, path: &Path) -> DumpCommand {
        DumpCommand::new("pg_dumpall")
            .arg(format!("--file={}", path.display()))
            .env("PGUSER", &self.config.username)
            .env("PGPASSWORD", &self.config.password)
            .env("PGHOST", &self.config.host)
            .env("PGPORT", self.config.port.to_string())
    }
}

#[async_trait]
impl Database for Postgres {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Postgres
    }

    fn backup_extension(&self) -> &str {
        ".sql"
    }

    async fn backup(&self, path: &Path) -> Result<BackupOutcome, DatabaseError> {
        self.command(path).run().await
    }
}

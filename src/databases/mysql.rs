use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{BackupOutcome, Database, DatabaseError, DatabaseKind, DumpCommand};

fn default_port() -> u16 {
    3306
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MySqlConfig {
    pub username: String,
    pub password: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// `mysqldump --all-databases`, shared by the MySQL and MariaDB kinds
pub struct MySql {
    id: String,
    kind: DatabaseKind,
    config: MySqlConfig,
}

impl MySql {
    pub fn mysql(id: impl Into<String>, config: MySqlConfig) -> Self {
        Self {
            id: id.into(),
            kind: DatabaseKind::Mysql,
            config,
        }
    }

    pub fn mariadb(id: impl Into<String>, config: MySqlConfig) -> Self {
        Self {
            id: id.into(),
            kind: DatabaseKind::Mariadb,
            config,
        }
    }

    pub fn command(&self, path: &Path) -> DumpCommand {
        DumpCommand::new("mysqldump")
            .arg(format!("--host={}", self.config.host))
            .arg(format!("--port={}", self.config.port))
            .arg(format!("--user={}", self.config.username))
            .arg("--all-databases")
            .arg(format!("--result-file={}", path.display()))
            .env("MYSQL_PWD", &self.config.password)
    }
}

#[async_trait]
impl Database for MySql {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> DatabaseKind {
        self.kind
    }

    fn backup_extension(&self) -> &str {
        ".sql"
    }

    async fn backup(&self, path: &Path) -> Result<BackupOutcome, DatabaseError> {
        self.command(path).run().await
    }
}

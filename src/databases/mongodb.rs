use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{BackupOutcome, Database, DatabaseError, DatabaseKind, DumpCommand};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoDbConfig {
    pub connection_string: String,
}

/// `mongodump` into a gzipped archive. Restore with
/// `mongorestore --gzip --archive=<file>`.
pub struct MongoDb {
    id: String,
    config: MongoDbConfig,
}

impl MongoDb {
    pub fn new(id: impl Into<String>, config: MongoDbConfig) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }

    pub fn command(&self, path: &Path) -> DumpCommand {
        DumpCommand::new("mongodump")
            .arg(format!("--uri={}", self.config.connection_string))
            .arg("--gzip")
            .arg("--forceTableScan")
            .arg(format!("--archive={}", path.display()))
    }
}

#[async_trait]
impl Database for MongoDb {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Mongodb
    }

    fn backup_extension(&self) -> &str {
        ".archive"
    }

    async fn backup(&self, path: &Path) -> Result<BackupOutcome, DatabaseError> {
        self.command(path).run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mongodump_command() {
        let db = MongoDb::new(
            "events",
            MongoDbConfig {
                connection_string: "mongodb://mongo:27017".to_string(),
            },
        );
        let command = db.command(Path::new("/tmp/events.archive"));
        assert_eq!(
            command.args,
            vec![
                "--uri=mongodb://mongo:27017",
                "--gzip",
                "--forceTableScan",
                "--archive=/tmp/events.archive",
            ]
        );
        assert_eq!(db.backup_extension(), ".archive");
    }
}

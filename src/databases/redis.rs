use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{BackupOutcome, Database, DatabaseError, DatabaseKind, DumpCommand};

fn default_port() -> u16 {
    6379
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub password: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Snapshot via `redis-cli --rdb`
pub struct Redis {
    id: String,
    config: RedisConfig,
}

impl Redis {
    pub fn new(id: impl Into<String>, config: RedisConfig) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }

    pub fn command(&self, path: &Path) -> DumpCommand {
        DumpCommand::new("redis-cli")
            .arg("-h")
            .arg(&self.config.host)
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg("--rdb")
            .arg(path.display().to_string())
            .env("REDISCLI_AUTH", &self.config.password)
    }
}

#[async_trait]
impl Database for Redis {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Redis
    }

    fn backup_extension(&self) -> &str {
        ".rdb"
    }

    async fn backup(&self, path: &Path) -> Result<BackupOutcome, DatabaseError> {
        self.command(path).run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_cli_command() {
        let config: RedisConfig = serde_yaml::from_str("host: cache\npassword: pw").unwrap();
        let command = Redis::new("cache", config).command(Path::new("/tmp/cache.rdb"));
        assert_eq!(command.args, vec!["-h", "cache", "-p", "6379", "--rdb", "/tmp/cache.rdb"]);
        assert_eq!(command.env, vec![("REDISCLI_AUTH".to_string(), "pw".to_string())]);
    }
}

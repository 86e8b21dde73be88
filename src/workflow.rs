//! Handler registry and per-database routing.
//!
//! Every configured handler is indexed under `all`, under its own id and
//! under its kind name. A database's `storage_providers` / `notifiers` list
//! is resolved against that index; without a list the database uses every
//! handler of the section.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::artifact::{EncryptionConfig, Encryptor};
use crate::config::{Config, ConfigError};
use crate::databases::{Database, LocalFolder, MongoDb, MySql, Postgres, Redis};
use crate::notifiers::{Discord, JsonWebhook, Notifier, Slack, Telegram};
use crate::rotation::RotationPolicy;
#[cfg(feature = "s3")]
use crate::storage::S3Storage;
use crate::storage::{
    DropboxStorage, GoogleDriveStorage, LocalStorage, MemoryStorage, StorageBackend, StorageHandler,
    StorageKind,
};

const ALL: &str = "all";

/// Lookup from routing key to handler positions
#[derive(Debug, Clone, Default)]
pub struct HandlerIndex {
    section: &'static str,
    keys: HashMap<String, BTreeSet<usize>>,
}

impl HandlerIndex {
    pub fn new(section: &'static str) -> Self {
        Self {
            section,
            keys: HashMap::new(),
        }
    }

    /// Index the handler at `position` under `all`, its kind and its id.
    /// An id may itself be a comma separated list of aliases.
    pub fn register(&mut self, position: usize, id: &str, kind: &str) {
        let aliases = id
            .split(',')
            .map(|alias| alias.trim().to_lowercase())
            .filter(|alias| !alias.is_empty());

        for key in [ALL.to_string(), kind.to_lowercase()].into_iter().chain(aliases) {
            self.keys.entry(key).or_default().insert(position);
        }
    }

    pub fn all(&self) -> BTreeSet<usize> {
        self.keys.get(ALL).cloned().unwrap_or_default()
    }

    /// Positions for a comma separated list of ids or kinds. A trailing comma
    /// is ignored; `None` or an empty list selects everything.
    pub fn resolve(&self, wanted: Option<&str>) -> Result<BTreeSet<usize>, ConfigError> {
        let wanted = match wanted.map(|w| w.trim().trim_end_matches(',')) {
            Some(w) if !w.trim().is_empty() => w,
            _ => return Ok(self.all()),
        };

        let mut positions = BTreeSet::new();
        for key in wanted.split(',').map(|key| key.trim().to_lowercase()) {
            let found = self.keys.get(&key).ok_or_else(|| ConfigError::UnknownHandler {
                section: self.section.to_string(),
                id: key.clone(),
            })?;
            positions.extend(found.iter().copied());
        }
        Ok(positions)
    }
}

struct DatabaseSlot {
    database: Arc<dyn Database>,
    storage_providers: Option<String>,
    notifiers: Option<String>,
}

/// One database with the storage handlers and notifiers it reports to.
/// Positions index into [`Registry::storage`] and [`Registry::notifiers`].
#[derive(Clone)]
pub struct Workflow {
    pub database: Arc<dyn Database>,
    pub storage: Vec<usize>,
    pub notifiers: Vec<usize>,
}

/// Every configured handler, built once per run
pub struct Registry {
    databases: Vec<DatabaseSlot>,
    storage: Vec<StorageHandler>,
    notifiers: Vec<Box<dyn Notifier>>,
    storage_index: HandlerIndex,
    notifier_index: HandlerIndex,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            databases: Vec::new(),
            storage: Vec::new(),
            notifiers: Vec::new(),
            storage_index: HandlerIndex::new("storage"),
            notifier_index: HandlerIndex::new("notifier"),
        }
    }

    pub fn add_database(
        &mut self,
        database: Arc<dyn Database>,
        storage_providers: Option<String>,
        notifiers: Option<String>,
    ) {
        debug!(database_id = %database.id(), kind = %database.kind(), "Registered database");
        self.databases.push(DatabaseSlot {
            database,
            storage_providers,
            notifiers,
        });
    }

    pub fn add_storage(&mut self, handler: StorageHandler) {
        debug!(storage_id = %handler.id, kind = %handler.kind, "Registered storage");
        self.storage_index
            .register(self.storage.len(), &handler.id, handler.kind.as_str());
        self.storage.push(handler);
    }

    pub fn add_notifier(&mut self, notifier: Box<dyn Notifier>) {
        debug!(notifier_id = %notifier.id(), kind = %notifier.kind(), "Registered notifier");
        self.notifier_index
            .register(self.notifiers.len(), notifier.id(), notifier.kind().as_str());
        self.notifiers.push(notifier);
    }

    pub fn database_count(&self) -> usize {
        self.databases.len()
    }

    pub fn storage(&self) -> &[StorageHandler] {
        &self.storage
    }

    pub fn notifiers(&self) -> &[Box<dyn Notifier>] {
        &self.notifiers
    }

    pub fn notifiers_mut(&mut self) -> &mut [Box<dyn Notifier>] {
        &mut self.notifiers
    }

    /// Resolve routing for every database. Unknown ids are configuration errors.
    pub fn workflows(&self) -> Result<Vec<Workflow>, ConfigError> {
        self.databases
            .iter()
            .map(|slot| {
                Ok(Workflow {
                    database: Arc::clone(&slot.database),
                    storage: self
                        .storage_index
                        .resolve(slot.storage_providers.as_deref())?
                        .into_iter()
                        .collect(),
                    notifiers: self
                        .notifier_index
                        .resolve(slot.notifiers.as_deref())?
                        .into_iter()
                        .collect(),
                })
            })
            .collect()
    }

    /// Build every handler named in the configuration
    pub async fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        registry.add_databases(config)?;
        registry.add_storage_handlers(config).await?;
        registry.add_notifiers(config);
        Ok(registry)
    }

    fn add_databases(&mut self, config: &Config) -> Result<(), ConfigError> {
        let section = &config.databases;

        for (id, entry) in &section.postgres {
            let database = Postgres::new(id, entry.settings.clone());
            self.add_database(Arc::new(database), entry.storage_providers.clone(), entry.notifiers.clone());
        }
        for (id, entry) in &section.mysql {
            let database = MySql::mysql(id, entry.settings.clone());
            self.add_database(Arc::new(database), entry.storage_providers.clone(), entry.notifiers.clone());
        }
        for (id, entry) in &section.mariadb {
            let database = MySql::mariadb(id, entry.settings.clone());
            self.add_database(Arc::new(database), entry.storage_providers.clone(), entry.notifiers.clone());
        }
        for (id, entry) in &section.mongodb {
            let database = MongoDb::new(id, entry.settings.clone());
            self.add_database(Arc::new(database), entry.storage_providers.clone(), entry.notifiers.clone());
        }
        for (id, entry) in &section.redis {
            let database = Redis::new(id, entry.settings.clone());
            self.add_database(Arc::new(database), entry.storage_providers.clone(), entry.notifiers.clone());
        }
        for (id, entry) in &section.local_folder {
            let database = LocalFolder::new(id, entry.settings.clone())
                .map_err(|e| ConfigError::Invalid(format!("{}: {}", id, e)))?;
            self.add_database(Arc::new(database), entry.storage_providers.clone(), entry.notifiers.clone());
        }
        Ok(())
    }

    async fn add_storage_handlers(&mut self, config: &Config) -> Result<(), ConfigError> {
        let section = &config.storage;

        #[cfg(feature = "s3")]
        for (id, entry) in &section.s3 {
            let backend = S3Storage::new(id, &entry.settings).await?;
            self.add_storage(storage_handler(
                config,
                id,
                StorageKind::S3,
                Arc::new(backend),
                &entry.rotation_strategies,
                entry.encryption.as_ref(),
            )?);
        }
        #[cfg(not(feature = "s3"))]
        if !section.s3.is_empty() {
            return Err(ConfigError::Invalid(
                "S3 storage is configured but this build has no S3 support".to_string(),
            ));
        }

        for (id, entry) in &section.dropbox {
            self.add_storage(storage_handler(
                config,
                id,
                StorageKind::Dropbox,
                Arc::new(DropboxStorage::new(id, &entry.settings)),
                &entry.rotation_strategies,
                entry.encryption.as_ref(),
            )?);
        }
        for (id, entry) in &section.google_drive {
            self.add_storage(storage_handler(
                config,
                id,
                StorageKind::GoogleDrive,
                Arc::new(
                    GoogleDriveStorage::new(id, &entry.settings)
                        .map_err(|e| ConfigError::Invalid(format!("{}: {}", id, e)))?,
                ),
                &entry.rotation_strategies,
                entry.encryption.as_ref(),
            )?);
        }
        for (id, entry) in &section.local {
            self.add_storage(storage_handler(
                config,
                id,
                StorageKind::Local,
                Arc::new(LocalStorage::new(id, &entry.settings)),
                &entry.rotation_strategies,
                entry.encryption.as_ref(),
            )?);
        }
        for (id, entry) in &section.memory {
            self.add_storage(storage_handler(
                config,
                id,
                StorageKind::Memory,
                Arc::new(MemoryStorage::new(id)),
                &entry.rotation_strategies,
                entry.encryption.as_ref(),
            )?);
        }
        Ok(())
    }

    fn add_notifiers(&mut self, config: &Config) {
        let section = &config.notifiers;

        for (id, settings) in &section.discord {
            self.add_notifier(Box::new(Discord::new(id, settings.clone())));
        }
        for (id, settings) in &section.slack {
            self.add_notifier(Box::new(Slack::new(id, settings.clone())));
        }
        for (id, settings) in &section.telegram {
            self.add_notifier(Box::new(Telegram::new(id, settings.clone())));
        }
        for (id, settings) in &section.json {
            self.add_notifier(Box::new(JsonWebhook::new(id, settings.clone())));
        }
    }
}

/// Attach rotation and encryption to a backend. Storage level encryption
/// replaces the global section.
fn storage_handler(
    config: &Config,
    id: &str,
    kind: StorageKind,
    backend: Arc<dyn StorageBackend>,
    rotation_strategies: &[String],
    encryption: Option<&EncryptionConfig>,
) -> Result<StorageHandler, ConfigError> {
    let policy = RotationPolicy::new(rotation_strategies, config.retention_days)?;
    let encryptor = Encryptor::from_config(encryption.unwrap_or(&config.encryption))?;
    Ok(StorageHandler::new(id, kind, backend, policy, encryptor))
}

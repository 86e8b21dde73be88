// Run reports handed to notifiers

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageReport {
    pub storage_id: String,
    pub success: bool,
}

/// Outcome of backing up one database and shipping it to its storages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseReport {
    pub database_id: String,
    pub success: bool,
    pub output: String,
    pub storages: Vec<StorageReport>,
}

impl DatabaseReport {
    pub fn new(database_id: impl Into<String>, success: bool, output: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            success,
            output: output.into(),
            storages: Vec::new(),
        }
    }

    /// Record a storage outcome. One failed storage fails the whole database.
    pub fn report_storage(&mut self, storage_id: impl Into<String>, success: bool, output: &str) {
        self.output.push_str(output);
        if !success {
            self.success = false;
        }
        self.storages.push(StorageReport {
            storage_id: storage_id.into(),
            success,
        });
    }
}

/// Everything one notifier is told about a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub databases: Vec<DatabaseReport>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_database(&mut self, report: DatabaseReport) {
        self.databases.push(report);
    }

    /// `true` when every database succeeded (vacuously for an empty report)
    pub fn success(&self) -> bool {
        self.databases.iter().all(|db| db.success)
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    pub fn failed(&self) -> impl Iterator<Item = &DatabaseReport> {
        self.databases.iter().filter(|db| !db.success)
    }
}

//! # Blackbox
//!
//! Backs up databases and folders to cloud storage, rotates old backups and
//! reports the outcome to chat services.
//!
//! ## Overview
//!
//! A run is driven by `blackbox.yaml`. Each configured database is dumped
//! into a temporary directory, compressed and optionally encrypted, then
//! uploaded to every storage handler routed to it. After each upload the
//! storage handler prunes that database's older backups according to its
//! rotation strategies. Notifiers receive a report per run.
//!
//! ## Rotation
//!
//! A rotation strategy is a cron expression with an optional sixth field, the
//! number of matching backups to keep:
//!
//! ```rust
//! use blackbox::rotation::{matches_cron, RetainLimit, RotationStrategy};
//! use chrono::{TimeZone, Utc};
//!
//! // Keep the last three backups taken on a Sunday
//! let strategy = RotationStrategy::parse("* * * * 0 3");
//! assert_eq!(strategy.key(), "* * * * 0");
//! assert_eq!(strategy.limit(), RetainLimit::Limited(3));
//!
//! let sunday = Utc.with_ymd_and_hms(2025, 3, 2, 4, 0, 0).unwrap();
//! assert!(matches_cron(strategy.key(), &sunday).unwrap());
//! ```
//!
//! ## Modules
//!
//! - [`rotation`]: cron matching, retention tracking and the keep-or-delete decision
//! - [`storage`]: storage backends and the rotation driver
//! - [`databases`]: backup producers
//! - [`artifact`]: compression and encryption of backup files
//! - [`notifiers`]: run reports for chat services and webhooks
//! - [`config`], [`workflow`], [`runner`]: configuration, routing and the run itself

#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for blackbox operations
pub type Result<T> = std::result::Result<T, BlackboxError>;

/// Main error type for blackbox operations
#[derive(Error, Debug)]
pub enum BlackboxError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Malformed rotation strategy or out-of-order artifact
    #[error("Rotation error: {0}")]
    Rotation(#[from] rotation::RotationError),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    /// Database backup failure
    #[error("Database error: {0}")]
    Database(#[from] databases::DatabaseError),

    /// Compression or encryption failure
    #[error("Artifact error: {0}")]
    Artifact(#[from] artifact::ArtifactError),

    /// Notification delivery failure
    #[error("Notifier error: {0}")]
    Notifier(#[from] notifiers::NotifierError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Join error from blocking tasks
    #[error("Async join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Compression, encryption and checksums for backup files
pub mod artifact;

/// `blackbox.yaml` parsing and templating
pub mod config;

/// Notification cooldown
pub mod cooldown;

/// Database backup producers
pub mod databases;

/// Notifiers
pub mod notifiers;

/// Run reports
pub mod report;

/// Backup rotation
pub mod rotation;

/// The backup pipeline
pub mod runner;

/// Storage backends
pub mod storage;

/// Handler registry and routing
pub mod workflow;

pub use config::Config;
pub use runner::run;

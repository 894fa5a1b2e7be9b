//! Storage module for persisting harvest data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Entities, sources and their version history
//! - Contact facts per document version
//! - Filesystem inventory locations, directories and file versions
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteStorage;
pub use traits::{InventoryGateway, PersistenceGateway, StorageError, StorageResult};

use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Durable fetch state of one (entity, URL) pair
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub id: i64,
    pub entity_id: i64,
    pub url: String,
    pub last_fetched_at: Option<String>,
    pub last_status: Option<u16>,
    /// Fingerprint of the latest stored version
    pub last_fingerprint: Option<String>,
    pub last_error: Option<String>,
    pub fetch_count: u32,
    pub failure_count: u32,
}

/// Content handed to [`PersistenceGateway::insert_document_version`]
#[derive(Debug, Clone, Copy)]
pub struct NewDocumentVersion<'a> {
    pub fingerprint: &'a str,
    pub kind: &'a str,
    pub title: Option<&'a str>,
    pub content: &'a str,
    /// Serialized JSON metadata
    pub metadata: &'a str,
}

/// Outcome of a version insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInsert {
    /// False when a version with the same fingerprint already existed
    pub created: bool,
    pub version_id: i64,
}

/// Outcome counters stored on a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub entity: String,
    pub status: RunStatus,
    pub counters: RunCounters,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One scanned directory below a storage location
#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    pub id: i64,
    pub location_id: i64,
    /// Path relative to the location root, "" for the root itself
    pub rel_path: String,
    pub parent_id: Option<i64>,
    pub last_scanned_at: Option<String>,
}

/// A stored file version
#[derive(Debug, Clone)]
pub struct FileVersionRecord {
    pub id: i64,
    pub directory_id: i64,
    pub name: String,
    pub version_num: u32,
    pub is_current: bool,
    pub is_deleted: bool,
    pub checksum: String,
    pub size_bytes: u64,
    pub mtime: Option<String>,
}

/// Scan facts for a file about to be stored
#[derive(Debug, Clone)]
pub struct NewFileVersion {
    pub name: String,
    pub checksum: String,
    pub size_bytes: u64,
    pub mtime: Option<DateTime<Utc>>,
    pub extension: Option<String>,
    pub mime_type: Option<String>,
    /// pdf, html, images or other
    pub category: String,
}

/// Row counts printed by the `stats` command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSummary {
    pub runs: u64,
    pub entities: u64,
    pub sources: u64,
    pub failed_sources: u64,
    pub versions: u64,
    pub contacts: u64,
    pub file_versions: u64,
    pub current_files: u64,
    pub deleted_files: u64,
}

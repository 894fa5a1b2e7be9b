//! Storage traits and error types
//!
//! This module defines the gateway interfaces the reconcilers talk to and
//! the associated error types. Implementations enforce the uniqueness
//! constraints the reconcilers treat as authoritative.

use crate::extract::ContactFact;
use crate::storage::{
    DirectoryRecord, FileVersionRecord, NewDocumentVersion, NewFileVersion, RunCounters,
    RunRecord, RunStatus, SourceRecord, VersionInsert,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Source not found: {0}")]
    SourceNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("File version not found: {0}")]
    FileVersionNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl StorageError {
    /// True when the backend rejected a write on a uniqueness rule
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Gateway used by the web reconciler and the crawl coordinator
///
/// Every call is idempotent or safely retryable. `sources(entity_id, url)`
/// and `document_versions(source_id, fingerprint)` are unique; a second
/// insert of the same fingerprint reports `created = false` instead of
/// adding a row.
pub trait PersistenceGateway: Send {
    // ===== Run Management =====

    /// Creates a new crawl run in the running state
    fn create_run(&mut self, config_hash: &str, entity: &str) -> StorageResult<i64>;

    /// Stores the final status, finish time and outcome counters of a run
    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    // ===== Entities and Sources =====

    /// Returns the id of the named entity, creating it on first use
    fn ensure_entity(&mut self, name: &str) -> StorageResult<i64>;

    /// Looks up the source record of one (entity, URL) pair
    fn find_source(&self, entity_id: i64, url: &str) -> StorageResult<Option<SourceRecord>>;

    /// Returns the source id of one (entity, URL) pair, creating it if needed
    fn upsert_source(&mut self, entity_id: i64, url: &str) -> StorageResult<i64>;

    /// Refreshes transport metadata after a fetch whose content did not change
    fn update_source_meta(
        &mut self,
        source_id: i64,
        status: Option<u16>,
        fetched_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Moves the source's latest-content pointer and refreshes transport metadata
    fn update_source_fingerprint(
        &mut self,
        source_id: i64,
        fingerprint: &str,
        fetched_at: DateTime<Utc>,
        status: Option<u16>,
    ) -> StorageResult<()>;

    /// Records a failed fetch without touching the content pointer
    fn record_fetch_failure(
        &mut self,
        source_id: i64,
        status: Option<u16>,
        error: &str,
        fetched_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    // ===== Document Versions =====

    /// Inserts a version unless one with the same fingerprint already exists
    fn insert_document_version(
        &mut self,
        source_id: i64,
        version: &NewDocumentVersion<'_>,
    ) -> StorageResult<VersionInsert>;

    /// Stores a version, its contacts and the source's content pointer atomically
    ///
    /// When the fingerprint is already stored for the source no row or
    /// contact is added; only the pointer and transport metadata move.
    fn store_document_version(
        &mut self,
        source_id: i64,
        version: &NewDocumentVersion<'_>,
        contacts: &[ContactFact],
        fetched_at: DateTime<Utc>,
        status: Option<u16>,
    ) -> StorageResult<VersionInsert>;

    /// Attaches contact facts to a version; duplicates are ignored
    fn insert_contacts(&mut self, version_id: i64, facts: &[ContactFact]) -> StorageResult<usize>;

    /// Number of stored versions of one source
    fn count_versions(&self, source_id: i64) -> StorageResult<u64>;
}

/// Gateway used by the filesystem inventory scanner
///
/// At most one row per (directory, name) is current at any time and version
/// numbers strictly increase per name.
pub trait InventoryGateway: Send {
    /// Returns the id of the storage location rooted at `root`
    fn ensure_location(&mut self, root: &str) -> StorageResult<i64>;

    /// Returns the id of one directory below a location
    fn ensure_directory(
        &mut self,
        location_id: i64,
        rel_path: &str,
        parent_id: Option<i64>,
    ) -> StorageResult<i64>;

    /// All directories recorded for a location
    fn list_directories(&self, location_id: i64) -> StorageResult<Vec<DirectoryRecord>>;

    /// The current, non-deleted file versions of one directory
    fn current_file_versions(&self, directory_id: i64) -> StorageResult<Vec<FileVersionRecord>>;

    /// Highest version number ever stored for a name, deleted rows included
    fn latest_version_num(&self, directory_id: i64, name: &str) -> StorageResult<Option<u32>>;

    /// Inserts a current version with an explicit version number
    fn insert_file_version(
        &mut self,
        directory_id: i64,
        file: &NewFileVersion,
        version_num: u32,
    ) -> StorageResult<i64>;

    /// Refreshes scan metadata of an unchanged current version
    fn touch_file_version(
        &mut self,
        id: i64,
        size_bytes: u64,
        mtime: Option<DateTime<Utc>>,
    ) -> StorageResult<()>;

    /// Demotes the current version and inserts its successor atomically
    fn supersede_file_version(&mut self, current_id: i64, file: &NewFileVersion)
        -> StorageResult<i64>;

    /// Flags a version as deleted; the row itself is kept
    fn mark_file_deleted(&mut self, id: i64) -> StorageResult<()>;

    /// Stamps the directory's last scan time
    fn mark_directory_scanned(&mut self, directory_id: i64) -> StorageResult<()>;
}

//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of both gateways.

use crate::extract::ContactFact;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{InventoryGateway, PersistenceGateway, StorageError, StorageResult};
use crate::storage::{
    DirectoryRecord, FileVersionRecord, NewDocumentVersion, NewFileVersion, RunCounters,
    RunRecord, RunStatus, SourceRecord, StatsSummary, VersionInsert,
};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Gets the most recent run
    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("{} ORDER BY id DESC LIMIT 1", RUN_SELECT),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    /// Row counts across the whole database
    pub fn stats(&self) -> StorageResult<StatsSummary> {
        Ok(StatsSummary {
            runs: self.count("SELECT COUNT(*) FROM runs")?,
            entities: self.count("SELECT COUNT(*) FROM entities")?,
            sources: self.count("SELECT COUNT(*) FROM sources")?,
            failed_sources: self.count(
                "SELECT COUNT(*) FROM sources WHERE last_error IS NOT NULL
                 OR (last_status IS NOT NULL AND (last_status < 200 OR last_status >= 300))",
            )?,
            versions: self.count("SELECT COUNT(*) FROM document_versions")?,
            contacts: self.count("SELECT COUNT(*) FROM contacts")?,
            file_versions: self.count("SELECT COUNT(*) FROM file_versions")?,
            current_files: self.count("SELECT COUNT(*) FROM file_versions WHERE is_current = 1")?,
            deleted_files: self.count("SELECT COUNT(*) FROM file_versions WHERE is_deleted = 1")?,
        })
    }

    /// All versions of one file name, oldest first
    pub fn file_history(&self, directory_id: i64, name: &str) -> StorageResult<Vec<FileVersionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE directory_id = ?1 AND name = ?2 ORDER BY version_num ASC",
            FILE_SELECT
        ))?;
        let rows = stmt
            .query_map(params![directory_id, name], file_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Contacts of the latest version of every source of an entity
    pub fn entity_contacts(&self, entity: &str) -> StorageResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT contact_kind, value FROM contact_view WHERE entity = ?1
             ORDER BY source_url, contact_kind, normalized",
        )?;
        let rows = stmt
            .query_map(params![entity], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

const RUN_SELECT: &str = "SELECT id, started_at, finished_at, config_hash, entity, status,
    created_count, updated_count, unchanged_count, failed_count, skipped_count FROM runs";

const SOURCE_SELECT: &str = "SELECT id, entity_id, url, last_fetched_at, last_status,
    last_fingerprint, last_error, fetch_count, failure_count FROM sources";

const FILE_SELECT: &str = "SELECT id, directory_id, name, version_num, is_current, is_deleted,
    checksum, size_bytes, mtime FROM file_versions";

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        entity: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
        counters: RunCounters {
            created: row.get::<_, i64>(6)? as u64,
            updated: row.get::<_, i64>(7)? as u64,
            unchanged: row.get::<_, i64>(8)? as u64,
            failed: row.get::<_, i64>(9)? as u64,
            skipped: row.get::<_, i64>(10)? as u64,
        },
    })
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<SourceRecord> {
    Ok(SourceRecord {
        id: row.get(0)?,
        entity_id: row.get(1)?,
        url: row.get(2)?,
        last_fetched_at: row.get(3)?,
        last_status: row.get(4)?,
        last_fingerprint: row.get(5)?,
        last_error: row.get(6)?,
        fetch_count: row.get(7)?,
        failure_count: row.get(8)?,
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileVersionRecord> {
    Ok(FileVersionRecord {
        id: row.get(0)?,
        directory_id: row.get(1)?,
        name: row.get(2)?,
        version_num: row.get(3)?,
        is_current: row.get(4)?,
        is_deleted: row.get(5)?,
        checksum: row.get(6)?,
        size_bytes: row.get::<_, i64>(7)? as u64,
        mtime: row.get(8)?,
    })
}

/// Maps uniqueness and check failures to [`StorageError::ConstraintViolation`]
fn constraint_aware(err: rusqlite::Error) -> StorageError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StorageError::ConstraintViolation(err.to_string()),
        _ => StorageError::Sqlite(err),
    }
}

fn contact_columns(fact: &ContactFact) -> (Option<&str>, Option<&str>) {
    match fact {
        ContactFact::Person { role, email, .. } => (role.as_deref(), email.as_deref()),
        ContactFact::Email { address } => (None, Some(address.as_str())),
        ContactFact::Phone { .. } => (None, None),
    }
}

fn set_source_fingerprint(
    conn: &Connection,
    source_id: i64,
    fingerprint: &str,
    fetched_at: DateTime<Utc>,
    status: Option<u16>,
) -> StorageResult<()> {
    let changed = conn.execute(
        "UPDATE sources SET last_fingerprint = ?1, last_status = ?2, last_fetched_at = ?3,
             last_error = NULL, fetch_count = fetch_count + 1
         WHERE id = ?4",
        params![fingerprint, status, fetched_at.to_rfc3339(), source_id],
    )?;
    if changed == 0 {
        return Err(StorageError::SourceNotFound(source_id));
    }
    Ok(())
}

fn insert_version_row(
    conn: &Connection,
    source_id: i64,
    version: &NewDocumentVersion<'_>,
) -> StorageResult<VersionInsert> {
    let now = Utc::now().to_rfc3339();
    let inserted = conn
        .execute(
            "INSERT INTO document_versions
                 (source_id, fingerprint, kind, title, content, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(source_id, fingerprint) DO NOTHING",
            params![
                source_id,
                version.fingerprint,
                version.kind,
                version.title,
                version.content,
                version.metadata,
                now
            ],
        )
        .map_err(constraint_aware)?;

    if inserted == 1 {
        return Ok(VersionInsert {
            created: true,
            version_id: conn.last_insert_rowid(),
        });
    }

    let version_id = conn.query_row(
        "SELECT id FROM document_versions WHERE source_id = ?1 AND fingerprint = ?2",
        params![source_id, version.fingerprint],
        |row| row.get(0),
    )?;
    Ok(VersionInsert {
        created: false,
        version_id,
    })
}

fn insert_contact_rows(
    conn: &Connection,
    version_id: i64,
    facts: &[ContactFact],
) -> StorageResult<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO contacts (version_id, kind, value, normalized, role, email)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(version_id, kind, normalized) DO NOTHING",
    )?;
    let mut inserted = 0;
    for fact in facts {
        let (role, email) = contact_columns(fact);
        inserted += stmt
            .execute(params![
                version_id,
                fact.kind(),
                fact.display_value(),
                fact.normalized_value(),
                role,
                email
            ])
            .map_err(constraint_aware)?;
    }
    Ok(inserted)
}

impl PersistenceGateway for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, entity: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, entity, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, entity, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET finished_at = ?1, status = ?2, created_count = ?3, updated_count = ?4,
                 unchanged_count = ?5, failed_count = ?6, skipped_count = ?7
             WHERE id = ?8",
            params![
                now,
                status.to_db_string(),
                counters.created as i64,
                counters.updated as i64,
                counters.unchanged as i64,
                counters.failed as i64,
                counters.skipped as i64,
                run_id
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("{} WHERE id = ?1", RUN_SELECT),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    // ===== Entities and Sources =====

    fn ensure_entity(&mut self, name: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO entities (name, created_at) VALUES (?1, ?2)
             ON CONFLICT(name) DO NOTHING",
            params![name, now],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM entities WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn find_source(&self, entity_id: i64, url: &str) -> StorageResult<Option<SourceRecord>> {
        let source = self
            .conn
            .query_row(
                &format!("{} WHERE entity_id = ?1 AND url = ?2", SOURCE_SELECT),
                params![entity_id, url],
                source_from_row,
            )
            .optional()?;
        Ok(source)
    }

    fn upsert_source(&mut self, entity_id: i64, url: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO sources (entity_id, url, first_seen_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(entity_id, url) DO NOTHING",
                params![entity_id, url, now],
            )
            .map_err(constraint_aware)?;
        let id = self.conn.query_row(
            "SELECT id FROM sources WHERE entity_id = ?1 AND url = ?2",
            params![entity_id, url],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn update_source_meta(
        &mut self,
        source_id: i64,
        status: Option<u16>,
        fetched_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE sources SET last_status = ?1, last_fetched_at = ?2, last_error = NULL,
                 fetch_count = fetch_count + 1
             WHERE id = ?3",
            params![status, fetched_at.to_rfc3339(), source_id],
        )?;
        if changed == 0 {
            return Err(StorageError::SourceNotFound(source_id));
        }
        Ok(())
    }

    fn update_source_fingerprint(
        &mut self,
        source_id: i64,
        fingerprint: &str,
        fetched_at: DateTime<Utc>,
        status: Option<u16>,
    ) -> StorageResult<()> {
        set_source_fingerprint(&self.conn, source_id, fingerprint, fetched_at, status)
    }

    fn record_fetch_failure(
        &mut self,
        source_id: i64,
        status: Option<u16>,
        error: &str,
        fetched_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE sources SET last_status = ?1, last_error = ?2, last_fetched_at = ?3,
                 fetch_count = fetch_count + 1, failure_count = failure_count + 1
             WHERE id = ?4",
            params![status, error, fetched_at.to_rfc3339(), source_id],
        )?;
        if changed == 0 {
            return Err(StorageError::SourceNotFound(source_id));
        }
        Ok(())
    }

    // ===== Document Versions =====

    fn insert_document_version(
        &mut self,
        source_id: i64,
        version: &NewDocumentVersion<'_>,
    ) -> StorageResult<VersionInsert> {
        insert_version_row(&self.conn, source_id, version)
    }

    fn store_document_version(
        &mut self,
        source_id: i64,
        version: &NewDocumentVersion<'_>,
        contacts: &[ContactFact],
        fetched_at: DateTime<Utc>,
        status: Option<u16>,
    ) -> StorageResult<VersionInsert> {
        let tx = self.conn.transaction()?;
        let stored = insert_version_row(&tx, source_id, version)?;
        if stored.created && !contacts.is_empty() {
            insert_contact_rows(&tx, stored.version_id, contacts)?;
        }
        set_source_fingerprint(&tx, source_id, version.fingerprint, fetched_at, status)?;
        tx.commit()?;
        Ok(stored)
    }

    fn insert_contacts(&mut self, version_id: i64, facts: &[ContactFact]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let inserted = insert_contact_rows(&tx, version_id, facts)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn count_versions(&self, source_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM document_versions WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl InventoryGateway for SqliteStorage {
    fn ensure_location(&mut self, root: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO storage_locations (root_path, created_at) VALUES (?1, ?2)
             ON CONFLICT(root_path) DO NOTHING",
            params![root, now],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM storage_locations WHERE root_path = ?1",
            params![root],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn ensure_directory(
        &mut self,
        location_id: i64,
        rel_path: &str,
        parent_id: Option<i64>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO directories (location_id, rel_path, parent_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(location_id, rel_path) DO NOTHING",
            params![location_id, rel_path, parent_id],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM directories WHERE location_id = ?1 AND rel_path = ?2",
            params![location_id, rel_path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn list_directories(&self, location_id: i64) -> StorageResult<Vec<DirectoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, location_id, rel_path, parent_id, last_scanned_at
             FROM directories WHERE location_id = ?1 ORDER BY rel_path",
        )?;
        let rows = stmt
            .query_map(params![location_id], |row| {
                Ok(DirectoryRecord {
                    id: row.get(0)?,
                    location_id: row.get(1)?,
                    rel_path: row.get(2)?,
                    parent_id: row.get(3)?,
                    last_scanned_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn current_file_versions(&self, directory_id: i64) -> StorageResult<Vec<FileVersionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE directory_id = ?1 AND is_current = 1 AND is_deleted = 0 ORDER BY name",
            FILE_SELECT
        ))?;
        let rows = stmt
            .query_map(params![directory_id], file_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn latest_version_num(&self, directory_id: i64, name: &str) -> StorageResult<Option<u32>> {
        let latest: Option<u32> = self.conn.query_row(
            "SELECT MAX(version_num) FROM file_versions WHERE directory_id = ?1 AND name = ?2",
            params![directory_id, name],
            |row| row.get(0),
        )?;
        Ok(latest)
    }

    fn insert_file_version(
        &mut self,
        directory_id: i64,
        file: &NewFileVersion,
        version_num: u32,
    ) -> StorageResult<i64> {
        insert_file_row(&self.conn, directory_id, file, version_num)
    }

    fn touch_file_version(
        &mut self,
        id: i64,
        size_bytes: u64,
        mtime: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE file_versions SET size_bytes = ?1, mtime = ?2, last_seen_at = ?3 WHERE id = ?4",
            params![size_bytes as i64, mtime.map(|t| t.to_rfc3339()), now, id],
        )?;
        if changed == 0 {
            return Err(StorageError::FileVersionNotFound(id));
        }
        Ok(())
    }

    fn supersede_file_version(
        &mut self,
        current_id: i64,
        file: &NewFileVersion,
    ) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;

        let (directory_id, version_num): (i64, u32) = tx
            .query_row(
                "SELECT directory_id, version_num FROM file_versions
                 WHERE id = ?1 AND is_current = 1",
                params![current_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or(StorageError::FileVersionNotFound(current_id))?;

        tx.execute(
            "UPDATE file_versions SET is_current = 0 WHERE id = ?1",
            params![current_id],
        )?;
        let id = insert_file_row(&tx, directory_id, file, version_num + 1)?;

        tx.commit()?;
        Ok(id)
    }

    fn mark_file_deleted(&mut self, id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE file_versions SET is_current = 0, is_deleted = 1, deleted_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        if changed == 0 {
            return Err(StorageError::FileVersionNotFound(id));
        }
        Ok(())
    }

    fn mark_directory_scanned(&mut self, directory_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE directories SET last_scanned_at = ?1 WHERE id = ?2",
            params![now, directory_id],
        )?;
        Ok(())
    }
}

fn insert_file_row(
    conn: &Connection,
    directory_id: i64,
    file: &NewFileVersion,
    version_num: u32,
) -> StorageResult<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO file_versions
             (directory_id, name, version_num, is_current, is_deleted, checksum, size_bytes,
              mtime, extension, mime_type, category, first_seen_at, last_seen_at)
         VALUES (?1, ?2, ?3, 1, 0, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            directory_id,
            file.name,
            version_num,
            file.checksum,
            file.size_bytes as i64,
            file.mtime.map(|t| t.to_rfc3339()),
            file.extension,
            file.mime_type,
            file.category,
            now
        ],
    )
    .map_err(constraint_aware)?;
    Ok(conn.last_insert_rowid())
}

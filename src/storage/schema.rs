//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Listed-Harvest
//! database, including the read-only contact export view.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    entity TEXT NOT NULL,
    status TEXT NOT NULL,
    created_count INTEGER NOT NULL DEFAULT 0,
    updated_count INTEGER NOT NULL DEFAULT 0,
    unchanged_count INTEGER NOT NULL DEFAULT 0,
    failed_count INTEGER NOT NULL DEFAULT 0,
    skipped_count INTEGER NOT NULL DEFAULT 0
);

-- Listed companies being harvested
CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- Latest fetch state of one (entity, URL) pair
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id INTEGER NOT NULL REFERENCES entities(id),
    url TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    last_fetched_at TEXT,
    last_status INTEGER,
    last_fingerprint TEXT,
    last_error TEXT,
    fetch_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE(entity_id, url)
);

CREATE INDEX IF NOT EXISTS idx_sources_entity ON sources(entity_id);

-- Immutable content snapshots, one per distinct fingerprint
CREATE TABLE IF NOT EXISTS document_versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    fingerprint TEXT NOT NULL,
    kind TEXT NOT NULL,
    title TEXT,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(source_id, fingerprint)
);

CREATE INDEX IF NOT EXISTS idx_document_versions_source ON document_versions(source_id);

-- Contact facts found in one version
CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version_id INTEGER NOT NULL REFERENCES document_versions(id),
    kind TEXT NOT NULL CHECK (kind IN ('person', 'email', 'phone')),
    value TEXT NOT NULL,
    normalized TEXT NOT NULL,
    role TEXT,
    email TEXT,
    UNIQUE(version_id, kind, normalized)
);

CREATE INDEX IF NOT EXISTS idx_contacts_version ON contacts(version_id);

-- Filesystem roots scanned by the inventory
CREATE TABLE IF NOT EXISTS storage_locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    root_path TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS directories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    location_id INTEGER NOT NULL REFERENCES storage_locations(id),
    rel_path TEXT NOT NULL,
    parent_id INTEGER REFERENCES directories(id),
    last_scanned_at TEXT,
    UNIQUE(location_id, rel_path)
);

-- Versioned files; deleted files keep their rows
CREATE TABLE IF NOT EXISTS file_versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    directory_id INTEGER NOT NULL REFERENCES directories(id),
    name TEXT NOT NULL,
    version_num INTEGER NOT NULL CHECK (version_num >= 1),
    is_current INTEGER NOT NULL DEFAULT 1,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    checksum TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    mtime TEXT,
    extension TEXT,
    mime_type TEXT,
    category TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    deleted_at TEXT,
    UNIQUE(directory_id, name, version_num)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_file_versions_current
    ON file_versions(directory_id, name) WHERE is_current = 1;

-- Flattened contacts of the latest version of every source
CREATE VIEW IF NOT EXISTS contact_view AS
SELECT
    e.name AS entity,
    s.url AS source_url,
    dv.id AS version_id,
    dv.kind AS document_kind,
    dv.title AS document_title,
    dv.created_at AS captured_at,
    c.kind AS contact_kind,
    c.value AS value,
    c.normalized AS normalized,
    c.role AS role,
    c.email AS email
FROM contacts c
JOIN document_versions dv ON dv.id = c.version_id
JOIN sources s ON s.id = dv.source_id
JOIN entities e ON e.id = s.entity_id
WHERE dv.fingerprint = s.last_fingerprint;
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

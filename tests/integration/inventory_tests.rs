//! Inventory scans of a temporary data root backed by an on-disk database

use listed_harvest::ingest::InventoryScanner;
use listed_harvest::storage::{InventoryGateway, SqliteStorage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn scan(db: &Path, root: &Path) -> listed_harvest::ingest::ScanReport {
    let storage = SqliteStorage::new(db).unwrap();
    InventoryScanner::new(storage).scan(root).unwrap()
}

#[test]
fn test_rescan_versions_changes_across_sessions() {
    let data = TempDir::new().unwrap();
    let db_dir = TempDir::new().unwrap();
    let db = db_dir.path().join("inventory.db");
    let root = data.path();

    write(root, "pdf/annual-2024.pdf", b"%PDF-1.5 annual report draft");
    write(root, "html/index.html", b"<html><body>Investors</body></html>");
    write(root, "images/logo.png", b"\x89PNG fake");
    write(root, "notes.txt", b"harvest notes");

    let first = scan(&db, root);
    assert_eq!(first.directories, 4);
    assert_eq!(first.files_seen, 4);
    assert_eq!(first.new_files, 4);

    write(root, "pdf/annual-2024.pdf", b"%PDF-1.5 annual report final");
    fs::remove_file(root.join("images/logo.png")).unwrap();

    let second = scan(&db, root);
    assert_eq!(second.files_seen, 3);
    assert_eq!(second.new_files, 0);
    assert_eq!(second.changed, 1);
    assert_eq!(second.unchanged, 2);
    assert_eq!(second.deleted, 1);

    let mut storage = SqliteStorage::new(&db).unwrap();
    let location = storage
        .ensure_location(&root.canonicalize().unwrap().to_string_lossy())
        .unwrap();
    let directories = storage.list_directories(location).unwrap();
    let rel_paths: Vec<&str> = directories.iter().map(|d| d.rel_path.as_str()).collect();
    assert_eq!(rel_paths, vec!["", "html", "images", "pdf"]);

    let pdf_dir = directories.iter().find(|d| d.rel_path == "pdf").unwrap();
    assert!(pdf_dir.last_scanned_at.is_some());
    let history = storage.file_history(pdf_dir.id, "annual-2024.pdf").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].version_num, 1);
    assert!(!history[0].is_current);
    assert_eq!(history[1].version_num, 2);
    assert!(history[1].is_current);
    assert_ne!(history[0].checksum, history[1].checksum);

    let stats = storage.stats().unwrap();
    assert_eq!(stats.file_versions, 5);
    assert_eq!(stats.current_files, 3);
    assert_eq!(stats.deleted_files, 1);
}

#[test]
fn test_unchanged_tree_adds_no_versions() {
    let data = TempDir::new().unwrap();
    let db_dir = TempDir::new().unwrap();
    let db = db_dir.path().join("inventory.db");
    write(data.path(), "pdf/q1.pdf", b"%PDF-1.5 q1");
    write(data.path(), "pdf/q2.pdf", b"%PDF-1.5 q2");

    scan(&db, data.path());
    let again = scan(&db, data.path());
    assert_eq!(again.unchanged, 2);
    assert_eq!(again.changed + again.new_files + again.deleted, 0);

    let storage = SqliteStorage::new(&db).unwrap();
    assert_eq!(storage.stats().unwrap().file_versions, 2);
}

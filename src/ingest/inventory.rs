//! Filesystem inventory scanner
//!
//! Walks a data root, checksums every file and reconciles the result with
//! the stored file versions: unchanged files only get their scan metadata
//! refreshed, changed files get a new current version, and files missing
//! from the scan are flagged as deleted.

use crate::extract::mime_for_extension;
use crate::storage::{FileVersionRecord, InventoryGateway, NewFileVersion};
use crate::Result;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

const CATEGORIES: &[&str] = &["pdf", "html", "images", "other"];
const DEFAULT_MIME: &str = "application/octet-stream";

/// Counts of one inventory scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub directories: u64,
    pub files_seen: u64,
    pub new_files: u64,
    pub changed: u64,
    pub unchanged: u64,
    pub deleted: u64,
}

/// Reconciles a directory tree against stored file versions
pub struct InventoryScanner<G> {
    gateway: G,
}

impl<G: InventoryGateway> InventoryScanner<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn into_inner(self) -> G {
        self.gateway
    }

    /// Scans `root` recursively and reconciles every directory under it
    pub fn scan(&mut self, root: &Path) -> Result<ScanReport> {
        let root = root.canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", root.display()),
            )
            .into());
        }

        info!("Scanning inventory root {}", root.display());
        let location = self.gateway.ensure_location(&root.to_string_lossy())?;

        let mut report = ScanReport::default();
        let mut visited = HashSet::new();
        let mut pending: Vec<(PathBuf, Option<i64>)> = vec![(root.clone(), None)];

        while let Some((dir, parent)) = pending.pop() {
            let dir_id = self.gateway.ensure_directory(location, &rel_path(&root, &dir), parent)?;
            visited.insert(dir_id);

            let subdirs = self.scan_directory(&root, &dir, dir_id, &mut report)?;
            pending.extend(subdirs.into_iter().rev().map(|sub| (sub, Some(dir_id))));
        }

        // Directories that disappeared take their files with them
        for directory in self.gateway.list_directories(location)? {
            if visited.contains(&directory.id) {
                continue;
            }
            for file in self.gateway.current_file_versions(directory.id)? {
                debug!("Deleted: {}/{}", directory.rel_path, file.name);
                self.gateway.mark_file_deleted(file.id)?;
                report.deleted += 1;
            }
        }

        info!(
            "Inventory complete: {} files in {} directories ({} new, {} changed, {} unchanged, {} deleted)",
            report.files_seen,
            report.directories,
            report.new_files,
            report.changed,
            report.unchanged,
            report.deleted
        );
        Ok(report)
    }

    /// Reconciles the files of one directory and returns its subdirectories
    fn scan_directory(
        &mut self,
        root: &Path,
        dir: &Path,
        dir_id: i64,
        report: &mut ScanReport,
    ) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());

        let current: HashMap<String, FileVersionRecord> = self
            .gateway
            .current_file_versions(dir_id)?
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();

        let mut present = HashSet::new();
        let mut subdirs = Vec::new();

        for entry in entries {
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                subdirs.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let scanned = describe_file(root, &path, &name)?;
            report.files_seen += 1;

            match current.get(&name) {
                Some(existing) if existing.checksum == scanned.checksum => {
                    self.gateway
                        .touch_file_version(existing.id, scanned.size_bytes, scanned.mtime)?;
                    report.unchanged += 1;
                }
                Some(existing) => {
                    self.gateway.supersede_file_version(existing.id, &scanned)?;
                    debug!("Changed: {} (was v{})", path.display(), existing.version_num);
                    report.changed += 1;
                }
                None => {
                    let next = self
                        .gateway
                        .latest_version_num(dir_id, &name)?
                        .unwrap_or(0)
                        + 1;
                    self.gateway.insert_file_version(dir_id, &scanned, next)?;
                    debug!("New: {} (v{})", path.display(), next);
                    report.new_files += 1;
                }
            }
            present.insert(name);
        }

        for (name, record) in &current {
            if !present.contains(name) {
                debug!("Deleted: {}/{}", dir.display(), name);
                self.gateway.mark_file_deleted(record.id)?;
                report.deleted += 1;
            }
        }

        self.gateway.mark_directory_scanned(dir_id)?;
        report.directories += 1;
        Ok(subdirs)
    }
}

/// Path of `dir` below `root` with `/` separators, "" for the root
fn rel_path(root: &Path, dir: &Path) -> String {
    dir.strip_prefix(root)
        .map(|rel| {
            rel.components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

/// Category from the first path component below the root
fn category_for(root: &Path, path: &Path) -> String {
    let first = path
        .strip_prefix(root)
        .ok()
        .and_then(|rel| {
            let mut components = rel.components();
            let first = components.next()?;
            // A file directly under the root has no category folder
            components.next()?;
            Some(first.as_os_str().to_string_lossy().into_owned())
        });

    match first {
        Some(dir) if CATEGORIES.contains(&dir.as_str()) => dir,
        _ => "other".to_string(),
    }
}

fn describe_file(root: &Path, path: &Path, name: &str) -> io::Result<NewFileVersion> {
    let metadata = fs::metadata(path)?;
    let extension = Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());
    let mime_type = extension
        .as_deref()
        .and_then(mime_for_extension)
        .unwrap_or(DEFAULT_MIME)
        .to_string();

    Ok(NewFileVersion {
        name: name.to_string(),
        checksum: file_checksum(path)?,
        size_bytes: metadata.len(),
        mtime: metadata.modified().ok().map(DateTime::<Utc>::from),
        extension,
        mime_type: Some(mime_type),
        category: category_for(root, path),
    })
}

fn file_checksum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use tempfile::TempDir;

    fn directory_id(storage: &SqliteStorage, rel: &str) -> i64 {
        let location = 1;
        storage
            .list_directories(location)
            .unwrap()
            .into_iter()
            .find(|d| d.rel_path == rel)
            .unwrap()
            .id
    }

    #[test]
    fn test_category_for() {
        let root = Path::new("/data");
        assert_eq!(category_for(root, Path::new("/data/pdf/a.pdf")), "pdf");
        assert_eq!(category_for(root, Path::new("/data/images/x/b.png")), "images");
        assert_eq!(category_for(root, Path::new("/data/misc/c.txt")), "other");
        assert_eq!(category_for(root, Path::new("/data/pdf")), "other");
    }

    #[test]
    fn test_rel_path() {
        let root = Path::new("/data");
        assert_eq!(rel_path(root, Path::new("/data")), "");
        assert_eq!(rel_path(root, Path::new("/data/pdf/2024")), "pdf/2024");
    }

    #[test]
    fn test_unchanged_changed_and_deleted() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("pdf")).unwrap();
        fs::write(tmp.path().join("pdf/annual.pdf"), b"%PDF-1.4 first").unwrap();
        fs::write(tmp.path().join("pdf/interim.pdf"), b"%PDF-1.4 interim").unwrap();
        fs::write(tmp.path().join("pdf/old.pdf"), b"%PDF-1.4 old").unwrap();

        let mut scanner = InventoryScanner::new(SqliteStorage::new_in_memory().unwrap());
        let first = scanner.scan(tmp.path()).unwrap();
        assert_eq!(first.new_files, 3);
        assert_eq!(first.directories, 2);

        fs::write(tmp.path().join("pdf/interim.pdf"), b"%PDF-1.4 interim v2").unwrap();
        fs::remove_file(tmp.path().join("pdf/old.pdf")).unwrap();

        let second = scanner.scan(tmp.path()).unwrap();
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.changed, 1);
        assert_eq!(second.deleted, 1);
        assert_eq!(second.new_files, 0);

        let storage = scanner.into_inner();
        let dir = directory_id(&storage, "pdf");

        let annual = storage.file_history(dir, "annual.pdf").unwrap();
        assert_eq!(annual.len(), 1);
        assert_eq!(annual[0].version_num, 1);
        assert!(annual[0].is_current);

        let interim = storage.file_history(dir, "interim.pdf").unwrap();
        assert_eq!(interim.len(), 2);
        assert!(!interim[0].is_current);
        assert_eq!(interim[1].version_num, 2);
        assert!(interim[1].is_current);

        let old = storage.file_history(dir, "old.pdf").unwrap();
        assert_eq!(old.len(), 1);
        assert!(old[0].is_deleted);
        assert!(!old[0].is_current);
    }

    #[test]
    fn test_reappearing_file_gets_next_version() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.html");
        fs::write(&path, b"<html>one</html>").unwrap();

        let mut scanner = InventoryScanner::new(SqliteStorage::new_in_memory().unwrap());
        scanner.scan(tmp.path()).unwrap();
        fs::remove_file(&path).unwrap();
        scanner.scan(tmp.path()).unwrap();
        fs::write(&path, b"<html>one</html>").unwrap();
        let third = scanner.scan(tmp.path()).unwrap();
        assert_eq!(third.new_files, 1);

        let storage = scanner.into_inner();
        let history = storage
            .file_history(directory_id(&storage, ""), "report.html")
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].version_num, 2);
        assert!(history[1].is_current);
    }

    #[test]
    fn test_removed_directory_marks_files_deleted() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("images/logos")).unwrap();
        fs::write(tmp.path().join("images/logos/acme.png"), b"\x89PNG....").unwrap();

        let mut scanner = InventoryScanner::new(SqliteStorage::new_in_memory().unwrap());
        scanner.scan(tmp.path()).unwrap();
        fs::remove_dir_all(tmp.path().join("images/logos")).unwrap();

        let report = scanner.scan(tmp.path()).unwrap();
        assert_eq!(report.deleted, 1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let mut scanner = InventoryScanner::new(SqliteStorage::new_in_memory().unwrap());
        assert!(scanner.scan(Path::new("/nonexistent/inventory/root")).is_err());
    }
}

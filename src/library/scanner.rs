use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::Result;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::database::{LibraryDatabase, Upsert};
use super::tags::{self, AudioFormat};
use super::{bytes_to_path, path_to_bytes};

const MAX_FILE_SIZE: u64 = 1_000_000_000;

/// What a scan did to the library
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub removed: usize,
}

impl ScanReport {
    pub fn total_seen(&self) -> usize {
        self.added + self.updated + self.unchanged + self.failed
    }
}

/// Walks music directories and imports what it finds
#[derive(Clone, Default)]
pub struct LibraryScanner;

impl LibraryScanner {
    pub fn new() -> Self {
        Self
    }

    /// Import every supported file under `paths`, then drop items whose file is gone
    pub fn scan(&self, db: &LibraryDatabase, paths: &[PathBuf]) -> Result<ScanReport> {
        let mut report = ScanReport::default();

        for path in paths {
            if !path.exists() {
                warn!("Music directory does not exist: {}", path.display());
                continue;
            }
            info!("Scanning {}", path.display());
            self.scan_directory(db, path, &mut report)?;
        }

        report.removed = self.prune(db)?;
        info!(
            "Scan finished: {} added, {} updated, {} unchanged, {} failed, {} removed",
            report.added, report.updated, report.unchanged, report.failed, report.removed
        );
        Ok(report)
    }

    fn scan_directory(&self, db: &LibraryDatabase, root: &Path, report: &mut ScanReport) -> Result<()> {
        let walker = WalkDir::new(root).follow_links(true);

        for entry in walker.into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_candidate(entry.path()) {
                continue;
            }
            self.import_file(db, entry.path(), report)?;
        }

        Ok(())
    }

    /// Database errors abort the scan; a bad file is only counted
    fn import_file(&self, db: &LibraryDatabase, path: &Path, report: &mut ScanReport) -> Result<()> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Cannot stat {}: {}", path.display(), e);
                report.failed += 1;
                return Ok(());
            }
        };

        // Skip empty files or files > 1GB
        if metadata.len() == 0 || metadata.len() > MAX_FILE_SIZE {
            debug!("Skipping {} ({} bytes)", path.display(), metadata.len());
            return Ok(());
        }

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let key = path_to_bytes(path);
        if db.item_mtime(&key)? == Some(mtime) {
            report.unchanged += 1;
            return Ok(());
        }

        let fields = match tags::read_fields(path) {
            Ok(fields) => fields,
            Err(e) => {
                warn!("Could not read tags from {}: {}", path.display(), e);
                report.failed += 1;
                return Ok(());
            }
        };

        match db.upsert_item(&key, mtime, &fields)? {
            Upsert::Added(id) => {
                debug!("Added item {}: {}", id, path.display());
                report.added += 1;
            }
            Upsert::Updated(id) => {
                debug!("Updated item {}: {}", id, path.display());
                report.updated += 1;
            }
        }
        Ok(())
    }

    /// Remove items whose file no longer exists. Returns how many went.
    pub fn prune(&self, db: &LibraryDatabase) -> Result<usize> {
        let mut removed = 0;
        for row in db.all_items()? {
            let path = bytes_to_path(&row.path);
            if !path.exists() {
                debug!("Removing missing item {}: {}", row.id, path.display());
                db.remove_item(row.id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn is_candidate(path: &Path) -> bool {
    // Skip hidden files (dotfiles)
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'));

    !hidden && AudioFormat::from_path(path).is_supported()
}

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, warn};

use super::database::{ItemRow, LibraryDatabase};
use super::tags::{self, TagFields};
use super::bytes_to_path;
use crate::fill::{TrackPath, TrackRecord};

/// A library track with its flexible fields.
///
/// Edits are tracked per field: `store` only sends what changed since the
/// last store, `write` only touches tags changed since the last write.
pub struct Item {
    id: i64,
    path: TrackPath,
    file: PathBuf,
    display_path: String,
    fields: TagFields,
    dirty: BTreeSet<String>,
    unwritten: BTreeSet<String>,
    db: LibraryDatabase,
}

impl Item {
    pub fn from_row(row: ItemRow, db: LibraryDatabase) -> Self {
        // Raw bytes straight to an OS path; only playback needs valid UTF-8
        let file = bytes_to_path(&row.path);
        let display_path = file.to_string_lossy().into_owned();
        Self {
            id: row.id,
            path: TrackPath::Bytes(row.path),
            file,
            display_path,
            fields: row.fields,
            dirty: BTreeSet::new(),
            unwritten: BTreeSet::new(),
            db,
        }
    }
}

impl TrackRecord for Item {
    fn path(&self) -> &TrackPath {
        &self.path
    }

    fn get(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(value) => Some(value.as_str()),
            None if field == "path" => Some(self.display_path.as_str()),
            None => None,
        }
    }

    fn set(&mut self, field: &str, value: &str) {
        if self.fields.get(field).map(String::as_str) == Some(value) {
            return;
        }
        self.fields.insert(field.to_string(), value.to_string());
        self.dirty.insert(field.to_string());
        self.unwritten.insert(field.to_string());
    }

    fn store(&mut self) -> Result<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }

        let changed = self
            .fields
            .iter()
            .filter(|(key, _)| self.dirty.contains(key.as_str()));
        self.db.save_fields(self.id, changed)?;

        debug!("Stored {} field(s) for item {}", self.dirty.len(), self.id);
        self.dirty.clear();
        Ok(())
    }

    fn write(&mut self) -> Result<()> {
        if self.unwritten.is_empty() {
            return Ok(());
        }
        if !self.file.exists() {
            warn!("Cannot write tags, file is gone: {}", self.file.display());
            anyhow::bail!("File not found: {}", self.file.display());
        }

        let changed: TagFields = self
            .fields
            .iter()
            .filter(|(key, _)| self.unwritten.contains(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if !tags::write_fields(&self.file, &changed)? {
            debug!("Tags for {} live in the library only", self.file.display());
        }
        self.unwritten.clear();
        Ok(())
    }
}

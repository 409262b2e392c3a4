// Music library - SQLite index of tracks and their flexible fields
// Scanner fills it from disk, queries pick items out, items write tags back

pub mod database;
pub mod item;
pub mod query;
pub mod scanner;
pub mod tags;

pub use database::{ItemRow, LibraryDatabase, Upsert};
pub use item::Item;
pub use query::Query;
pub use scanner::{LibraryScanner, ScanReport};
pub use tags::{AudioFormat, TagFields};

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::fill::{Library, TrackRecord};

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Invalid query term '{term}': {reason}")]
    InvalidQuery { term: String, reason: String },

    #[error("ID3 tag error: {0}")]
    Id3(#[from] id3::Error),

    #[error("MP4 tag error: {0}")]
    Mp4(#[from] mp4ameta::Error),
}

/// Raw bytes of a path, the form it is stored in
#[cfg(unix)]
pub fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
pub fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
pub fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
pub fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

pub struct MusicLibrary {
    db: LibraryDatabase,
}

impl MusicLibrary {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            db: LibraryDatabase::open(path)?,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            db: LibraryDatabase::open_in_memory()?,
        })
    }

    pub fn database(&self) -> &LibraryDatabase {
        &self.db
    }

    /// Items matching every term, ordered by path
    pub fn query<S: AsRef<str>>(&self, terms: &[S]) -> Result<Vec<Item>> {
        let query = Query::parse(terms)?;
        let rows = self.db.all_items()?;
        let total = rows.len();

        let items: Vec<Item> = rows
            .into_iter()
            .map(|row| Item::from_row(row, self.db.clone()))
            .filter(|item| query.matches(|field| item.get(field)))
            .collect();

        debug!("Query kept {} of {} item(s)", items.len(), total);
        Ok(items)
    }

    pub fn len(&self) -> Result<usize> {
        self.db.count()
    }
}

impl Library for MusicLibrary {
    type Record = Item;

    fn items(&self, query: &[String]) -> Result<Vec<Item>> {
        self.query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(library: &MusicLibrary, path: &str, pairs: &[(&str, &str)]) {
        let fields: TagFields = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        library.database().upsert_item(path.as_bytes(), 0, &fields).unwrap();
    }

    #[test]
    fn query_filters_and_orders_by_path() {
        let library = MusicLibrary::in_memory().unwrap();
        add(&library, "/music/b.mp3", &[("artist", "Nina Simone"), ("mood", "sad")]);
        add(&library, "/music/a.mp3", &[("artist", "Nina Simone")]);
        add(&library, "/music/c.mp3", &[("artist", "Sun Ra")]);

        let items = library.query(&["nina"]).unwrap();
        let paths: Vec<_> = items.iter().map(|i| i.get("path").unwrap_or_default().to_string()).collect();
        assert_eq!(paths, vec!["/music/a.mp3", "/music/b.mp3"]);

        let untagged = library.query(&["nina", "mood::^$"]).unwrap();
        assert_eq!(untagged.len(), 1);
    }

    #[test]
    fn path_is_searchable() {
        let library = MusicLibrary::in_memory().unwrap();
        add(&library, "/music/Live/x.mp3", &[]);
        add(&library, "/music/Studio/y.mp3", &[]);
        assert_eq!(library.query(&["path:live"]).unwrap().len(), 1);
        assert_eq!(library.query(&["studio"]).unwrap().len(), 1);
    }

    #[test]
    fn library_trait_uses_the_query() {
        let library = MusicLibrary::in_memory().unwrap();
        add(&library, "/music/a.mp3", &[("genre", "Jazz")]);
        let items = Library::items(&library, &["genre:rock".to_string()]).unwrap();
        assert!(items.is_empty());
        assert_eq!(library.len().unwrap(), 1);
    }

    #[test]
    fn bad_query_is_an_error() {
        let library = MusicLibrary::in_memory().unwrap();
        assert!(library.query(&["title::["]).is_err());
    }

    #[test]
    fn path_bytes_round_trip() {
        let path = Path::new("/music/café.mp3");
        assert_eq!(bytes_to_path(&path_to_bytes(path)), path);
    }
}

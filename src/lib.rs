// tagpipe - fill in missing tags on your music library, one prompt at a time
// The fill loop only knows traits; the library module is the SQLite-backed implementation

pub mod config;   // settings and preferences
pub mod fill;     // interactive fillmissing session
pub mod library;  // item store, queries, tag I/O, scanning

pub use config::Config;
pub use fill::{fill_missing, FillError, Library, RunStatus, TrackRecord};
pub use library::{Item, LibraryScanner, MusicLibrary};

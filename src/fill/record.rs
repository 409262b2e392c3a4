// What the fill loop needs from a library record - nothing more
// The library owns the records; the session only reads, sets and saves fields

use std::path::PathBuf;

use anyhow::Result;

use super::FillError;

/// Where a record's media file lives.
///
/// Libraries that keep paths as raw bytes (the way they sit in the database)
/// hand them over as `Bytes`; they are decoded as UTF-8 right before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackPath {
    Native(PathBuf),
    Bytes(Vec<u8>),
}

impl TrackPath {
    pub fn to_path_buf(&self) -> Result<PathBuf, FillError> {
        match self {
            TrackPath::Native(path) => Ok(path.clone()),
            TrackPath::Bytes(bytes) => std::str::from_utf8(bytes)
                .map(PathBuf::from)
                .map_err(|e| FillError::PlaybackLaunch(format!("path is not valid UTF-8: {e}"))),
        }
    }
}

impl From<PathBuf> for TrackPath {
    fn from(path: PathBuf) -> Self {
        TrackPath::Native(path)
    }
}

impl From<Vec<u8>> for TrackPath {
    fn from(bytes: Vec<u8>) -> Self {
        TrackPath::Bytes(bytes)
    }
}

pub trait TrackRecord {
    fn path(&self) -> &TrackPath;

    fn get(&self, field: &str) -> Option<&str>;

    fn set(&mut self, field: &str, value: &str);

    /// Persist changed fields to the library
    fn store(&mut self) -> Result<()>;

    /// Write fields out to the media file itself
    fn write(&mut self) -> Result<()>;

    fn get_or<'a>(&'a self, field: &str, default: &'a str) -> &'a str {
        self.get(field).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_paths_decode_as_utf8() {
        let path = TrackPath::from(b"/music/caf\xc3\xa9.mp3".to_vec());
        assert_eq!(path.to_path_buf().unwrap(), PathBuf::from("/music/café.mp3"));
    }

    #[test]
    fn native_paths_pass_through() {
        let path = TrackPath::from(PathBuf::from("/music/song.mp3"));
        assert_eq!(path.to_path_buf().unwrap(), PathBuf::from("/music/song.mp3"));
    }

    #[test]
    fn invalid_utf8_is_a_launch_error() {
        let path = TrackPath::from(vec![0x2f, 0xff, 0xfe]);
        assert!(matches!(path.to_path_buf(), Err(FillError::PlaybackLaunch(_))));
    }
}

// File tag I/O - turns id3 / mp4 atoms into plain field maps and back
// MP3 goes through id3, M4A/MP4 through mp4ameta, everything else is read-only (filename title)

use std::collections::BTreeMap;
use std::path::Path;

use id3::TagLike;
use mp4ameta::{Data, DataIdent, FreeformIdent};
use tracing::debug;

use super::LibraryError;

pub type TagFields = BTreeMap<String, String>;

const ITUNES_MEAN: &str = "com.apple.iTunes";

/// Well-known fields and the ID3v2.4 text frames they live in.
/// Anything not listed here goes into a TXXX frame named after the field.
const ID3_FRAMES: &[(&str, &str)] = &[
    ("title", "TIT2"),
    ("artist", "TPE1"),
    ("album", "TALB"),
    ("albumartist", "TPE2"),
    ("genre", "TCON"),
    ("composer", "TCOM"),
    ("lyricist", "TEXT"),
    ("grouping", "TIT1"),
    ("year", "TDRC"),
    ("track", "TRCK"),
    ("disc", "TPOS"),
    ("bpm", "TBPM"),
    ("mood", "TMOO"),
    ("language", "TLAN"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Flac,
    Ogg,
    Mp4,
    Wav,
    Unknown,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp3" => AudioFormat::Mp3,
            "flac" => AudioFormat::Flac,
            "ogg" | "oga" => AudioFormat::Ogg,
            "mp4" | "m4a" | "aac" => AudioFormat::Mp4,
            "wav" => AudioFormat::Wav,
            _ => AudioFormat::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(AudioFormat::from_extension)
            .unwrap_or(AudioFormat::Unknown)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, AudioFormat::Unknown)
    }

    /// Formats we can write tags back into
    pub fn is_writable(&self) -> bool {
        matches!(self, AudioFormat::Mp3 | AudioFormat::Mp4)
    }
}

/// Read every tag we understand from `path` into a field map
pub fn read_fields(path: &Path) -> Result<TagFields, LibraryError> {
    let mut fields = match AudioFormat::from_path(path) {
        AudioFormat::Mp3 => read_id3(path)?,
        AudioFormat::Mp4 => read_mp4(path)?,
        _ => TagFields::new(),
    };

    // Untagged files still need something to show
    if !fields.contains_key("title") {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            fields.insert("title".to_string(), stem.to_string());
        }
    }

    Ok(fields)
}

/// Write `fields` into the file's tags. Returns false when the format has no tag writer.
pub fn write_fields(path: &Path, fields: &TagFields) -> Result<bool, LibraryError> {
    let format = AudioFormat::from_path(path);
    if !format.is_writable() {
        debug!("No tag writer for {:?}, skipping {}", format, path.display());
        return Ok(false);
    }

    if format == AudioFormat::Mp3 {
        write_id3(path, fields)?;
    } else {
        write_mp4(path, fields)?;
    }
    Ok(true)
}

fn id3_frame_for(field: &str) -> Option<&'static str> {
    ID3_FRAMES
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, frame)| *frame)
}

fn read_id3_tag(path: &Path) -> Result<id3::Tag, LibraryError> {
    match id3::Tag::read_from_path(path) {
        Ok(tag) => Ok(tag),
        Err(id3::Error { kind: id3::ErrorKind::NoTag, .. }) => Ok(id3::Tag::new()),
        Err(e) => Err(e.into()),
    }
}

fn read_id3(path: &Path) -> Result<TagFields, LibraryError> {
    let tag = read_id3_tag(path)?;
    let mut fields = TagFields::new();

    for (name, frame_id) in ID3_FRAMES {
        if let Some(text) = tag.get(frame_id).and_then(|frame| frame.content().text()) {
            if !text.is_empty() {
                fields.insert(name.to_string(), text.to_string());
            }
        }
    }

    for extended in tag.extended_texts() {
        let key = extended.description.to_lowercase();
        if !key.is_empty() && !extended.value.is_empty() {
            fields.entry(key).or_insert_with(|| extended.value.clone());
        }
    }

    Ok(fields)
}

fn write_id3(path: &Path, fields: &TagFields) -> Result<(), LibraryError> {
    let mut tag = read_id3_tag(path)?;

    for (field, value) in fields.iter().filter(|(_, v)| !v.is_empty()) {
        match id3_frame_for(field) {
            Some(frame_id) => tag.set_text(frame_id, value.clone()),
            None => {
                // Field names are lowercase; the frame already on disk may not be
                let existing: Vec<String> = tag
                    .extended_texts()
                    .filter(|t| t.description.eq_ignore_ascii_case(field))
                    .map(|t| t.description.clone())
                    .collect();
                for description in &existing {
                    tag.remove_extended_text(Some(description.as_str()), None);
                }
                tag.add_frame(id3::frame::ExtendedText {
                    description: existing.into_iter().next().unwrap_or_else(|| field.clone()),
                    value: value.clone(),
                });
            }
        }
    }

    tag.write_to_path(path, id3::Version::Id3v24)?;
    Ok(())
}

fn read_mp4(path: &Path) -> Result<TagFields, LibraryError> {
    let tag = mp4ameta::Tag::read_from_path(path)?;
    let mut fields = TagFields::new();

    let mut put = |name: &str, value: Option<String>| {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            fields.insert(name.to_string(), value);
        }
    };

    put("title", tag.title().map(str::to_string));
    put("artist", tag.artist().map(str::to_string));
    put("album", tag.album().map(str::to_string));
    put("albumartist", tag.album_artist().map(str::to_string));
    put("genre", tag.genre().map(str::to_string));
    put("composer", tag.composer().map(str::to_string));
    put("grouping", tag.grouping().map(str::to_string));
    put("year", tag.year().map(str::to_string));
    put("track", tag.track_number().map(|n| n.to_string()));
    put("disc", tag.disc_number().map(|n| n.to_string()));
    put("bpm", tag.bpm().map(|n| n.to_string()));

    for (ident, data) in tag.data() {
        if let DataIdent::Freeform { mean, name } = ident {
            if mean == ITUNES_MEAN {
                if let Some(value) = data.string() {
                    put(&name.to_lowercase(), Some(value.to_string()));
                }
            }
        }
    }

    Ok(fields)
}

fn write_mp4(path: &Path, fields: &TagFields) -> Result<(), LibraryError> {
    let mut tag = mp4ameta::Tag::read_from_path(path)?;

    for (field, value) in fields.iter().filter(|(_, v)| !v.is_empty()) {
        let value = value.clone();
        match field.as_str() {
            "title" => tag.set_title(value),
            "artist" => tag.set_artist(value),
            "album" => tag.set_album(value),
            "albumartist" => tag.set_album_artist(value),
            "genre" => tag.set_genre(value),
            "composer" => tag.set_composer(value),
            "grouping" => tag.set_grouping(value),
            "year" => tag.set_year(value),
            // numeric atoms only take numbers; anything else stays freeform text
            "track" => match value.parse::<u16>() {
                Ok(number) => tag.set_track_number(number),
                Err(_) => set_freeform(&mut tag, field, value),
            },
            "disc" => match value.parse::<u16>() {
                Ok(number) => tag.set_disc_number(number),
                Err(_) => set_freeform(&mut tag, field, value),
            },
            "bpm" => match value.parse::<u16>() {
                Ok(number) => tag.set_bpm(number),
                Err(_) => set_freeform(&mut tag, field, value),
            },
            _ => set_freeform(&mut tag, field, value),
        }
    }

    tag.write_to_path(path)?;
    Ok(())
}

fn set_freeform(tag: &mut mp4ameta::Tag, field: &str, value: String) {
    let existing: Vec<DataIdent> = tag
        .data()
        .filter_map(|(ident, _)| match ident {
            DataIdent::Freeform { mean, name } if mean == ITUNES_MEAN && name.eq_ignore_ascii_case(field) => {
                Some(ident.clone())
            }
            _ => None,
        })
        .collect();

    let name = match existing.first() {
        Some(DataIdent::Freeform { name, .. }) => name.clone(),
        _ => field.to_uppercase(),
    };
    for ident in &existing {
        tag.remove_data_of(ident);
    }
    tag.set_data(FreeformIdent::new(ITUNES_MEAN, &name), Data::Utf8(value));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(AudioFormat::from_path(Path::new("/a/b.MP3")), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_path(Path::new("/a/b.m4a")), AudioFormat::Mp4);
        assert_eq!(AudioFormat::from_path(Path::new("/a/b.oga")), AudioFormat::Ogg);
        assert_eq!(AudioFormat::from_path(Path::new("/a/b.txt")), AudioFormat::Unknown);
        assert_eq!(AudioFormat::from_path(Path::new("/a/b")), AudioFormat::Unknown);
        assert!(AudioFormat::Mp3.is_writable());
        assert!(!AudioFormat::Flac.is_writable());
        assert!(AudioFormat::Flac.is_supported());
    }

    #[test]
    fn well_known_fields_map_to_frames() {
        assert_eq!(id3_frame_for("mood"), Some("TMOO"));
        assert_eq!(id3_frame_for("language"), Some("TLAN"));
        assert_eq!(id3_frame_for("context"), None);
    }

    #[test]
    fn id3_fields_round_trip_through_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, b"not really audio").unwrap();

        let mut fields = TagFields::new();
        fields.insert("title".into(), "Song".into());
        fields.insert("mood".into(), "chill".into());
        fields.insert("context".into(), "driving".into());
        assert!(write_fields(&path, &fields).unwrap());

        let read = read_fields(&path).unwrap();
        assert_eq!(read.get("title").map(String::as_str), Some("Song"));
        assert_eq!(read.get("mood").map(String::as_str), Some("chill"));
        assert_eq!(read.get("context").map(String::as_str), Some("driving"));
    }

    #[test]
    fn rewriting_a_custom_field_replaces_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, b"not really audio").unwrap();

        let mut fields = TagFields::new();
        fields.insert("context".into(), "work".into());
        write_fields(&path, &fields).unwrap();
        fields.insert("context".into(), "gym".into());
        write_fields(&path, &fields).unwrap();

        let tag = id3::Tag::read_from_path(&path).unwrap();
        let contexts: Vec<_> = tag.extended_texts().filter(|t| t.description == "context").collect();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].value, "gym");
    }

    #[test]
    fn custom_field_keeps_the_case_already_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, b"not really audio").unwrap();

        let mut tag = id3::Tag::new();
        tag.add_frame(id3::frame::ExtendedText {
            description: "Context".to_string(),
            value: "work".to_string(),
        });
        tag.write_to_path(&path, id3::Version::Id3v24).unwrap();

        let mut fields = read_fields(&path).unwrap();
        assert_eq!(fields.get("context").map(String::as_str), Some("work"));
        fields.insert("context".into(), "gym".into());
        write_fields(&path, &fields).unwrap();

        let tag = id3::Tag::read_from_path(&path).unwrap();
        let texts: Vec<_> = tag
            .extended_texts()
            .map(|t| (t.description.clone(), t.value.clone()))
            .collect();
        assert_eq!(texts, vec![("Context".to_string(), "gym".to_string())]);
    }

    #[test]
    fn untagged_files_get_their_stem_as_title() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Some Song.flac");
        fs::write(&path, b"fLaC").unwrap();

        let fields = read_fields(&path).unwrap();
        assert_eq!(fields.get("title").map(String::as_str), Some("Some Song"));
    }

    #[test]
    fn unwritable_formats_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.wav");
        fs::write(&path, b"RIFF").unwrap();

        let mut fields = TagFields::new();
        fields.insert("mood".into(), "calm".into());
        assert!(!write_fields(&path, &fields).unwrap());
        assert_eq!(fs::read(&path).unwrap(), b"RIFF");
    }
}

// Interactive field filler - the heart of tagpipe
// Walks every matched track, asks for each field, saves what you type

pub mod command;   // p / s / b / values
pub mod console;   // terminal line I/O
pub mod error;     // FillError taxonomy
pub mod fields;    // field list + cursor
pub mod playback;  // system-player launcher
pub mod record;    // what a track record has to offer

pub use command::Command;
pub use console::{Console, InputEvent, TerminalConsole};
pub use error::FillError;
pub use fields::{FieldCursor, FieldList};
pub use playback::{Launcher, OpenCommand, Platform, PlaybackController, PlaybackProcess, SystemLauncher};
pub use record::{TrackPath, TrackRecord};

use tracing::{debug, info};

pub const USAGE_EXAMPLE: &str = "Example: tagpipe fillmissing 'query' -f 'language mood context'";
pub const COMMAND_HELP: &str = "Commands: 'p' = play | 's' = skip track | 'b' = back | Ctrl+C = quit";

/// Anything that can answer a query with records to fill
pub trait Library {
    type Record: TrackRecord;

    fn items(&self, query: &[String]) -> anyhow::Result<Vec<Self::Record>>;
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every track was visited
    Completed,
    /// End of input at a prompt
    Exited,
    /// Ctrl+C at a prompt
    Interrupted,
    /// Nothing to do - no `-f` fields given
    MissingFields,
    /// Nothing to do - the query matched nothing
    NoMatches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackOutcome {
    Finished,
    Skipped,
}

/// The `fillmissing` command: validate fields, query, then run the session
pub fn fill_missing<L, C, P>(
    library: &L,
    raw_fields: &str,
    query: &[String],
    console: &mut C,
    player: PlaybackController<P>,
) -> Result<RunStatus, anyhow::Error>
where
    L: Library,
    C: Console,
    P: Launcher,
{
    let fields = match FieldList::parse(raw_fields) {
        Ok(fields) => fields,
        Err(e) => {
            console.print_line(&e.to_string());
            console.print_line(USAGE_EXAMPLE);
            return Ok(RunStatus::MissingFields);
        }
    };

    let mut records = library.items(query)?;
    info!("Query {:?} matched {} track(s)", query, records.len());

    let mut session = FillSession::new(console, &fields, player);
    Ok(session.run(&mut records)?)
}

pub struct FillSession<'a, C: Console, P: Launcher> {
    console: &'a mut C,
    fields: &'a FieldList,
    player: PlaybackController<P>,
}

impl<'a, C: Console, P: Launcher> FillSession<'a, C, P> {
    pub fn new(console: &'a mut C, fields: &'a FieldList, player: PlaybackController<P>) -> Self {
        Self { console, fields, player }
    }

    /// Prompt through every record. End-of-input and Ctrl+C end the run
    /// cleanly; a storage failure ends it with an error. Playback is stopped
    /// on every way out.
    pub fn run<R: TrackRecord>(&mut self, records: &mut [R]) -> Result<RunStatus, FillError> {
        if records.is_empty() {
            self.console.print_line(&FillError::NoMatches.to_string());
            return Ok(RunStatus::NoMatches);
        }

        let total = records.len();
        self.console.print_line(&format!("Found {} track(s) matching query.", total));
        self.console.print_line(COMMAND_HELP);
        self.console.print_line("");

        match self.fill_all(records) {
            Ok(()) => {
                self.player.stop();
                self.console.print_line("Done!");
                Ok(RunStatus::Completed)
            }
            Err(FillError::InputExhausted) => {
                self.console.print_line("\n\nExiting.");
                self.player.stop();
                Ok(RunStatus::Exited)
            }
            Err(FillError::UserCancelled) => {
                self.console.print_line("\n\nInterrupted by user.");
                self.player.stop();
                Ok(RunStatus::Interrupted)
            }
            Err(e) => {
                self.player.stop();
                Err(e)
            }
        }
    }

    fn fill_all<R: TrackRecord>(&mut self, records: &mut [R]) -> Result<(), FillError> {
        let total = records.len();
        for (idx, record) in records.iter_mut().enumerate() {
            self.console.print_line(&format!("--- Track {} of {} ---", idx + 1, total));
            self.console.print_line(&summary(record));
            self.console.print_line("");

            let outcome = self.fill_track(record)?;
            debug!("Track {} of {}: {:?}", idx + 1, total, outcome);

            self.console.print_line("");
        }
        Ok(())
    }

    fn fill_track<R: TrackRecord>(&mut self, record: &mut R) -> Result<TrackOutcome, FillError> {
        let fields = self.fields;
        let mut cursor = FieldCursor::new();

        while let Some(field) = cursor.current(fields) {
            let current_value = record.get_or(field, "");
            let prompt = if current_value.is_empty() {
                format!("  {}: ", field)
            } else {
                format!("  {} [{}]: ", field, current_value)
            };

            let input = self.console.read_line(&prompt)?;

            match Command::parse(&input) {
                Command::Play => self.play(record),
                Command::Skip => {
                    self.console.print_line("    → Skipping track");
                    return Ok(TrackOutcome::Skipped);
                }
                Command::Back => {
                    if cursor.retreat() {
                        self.console.print_line("    ← Going back");
                    } else {
                        self.console.print_line("    ✗ Already at first field");
                    }
                }
                Command::Value(value) => {
                    save_field(record, field, &value)?;
                    self.console.print_line(&format!("    → Updated {}", field));
                    cursor.advance();
                }
                Command::Keep => cursor.advance(),
            }
        }

        Ok(TrackOutcome::Finished)
    }

    /// Launch failures are reported here and go no further
    fn play<R: TrackRecord>(&mut self, record: &R) {
        match self.player.play(record.path()) {
            Ok(()) => self.console.print_line("    ♪ Playing..."),
            Err(e) => self.console.print_line(&format!("    ✗ Could not play track: {}", e)),
        }
    }
}

fn save_field<R: TrackRecord>(record: &mut R, field: &str, value: &str) -> Result<(), FillError> {
    record.set(field, value);
    record
        .store()
        .and_then(|()| record.write())
        .map_err(|source| FillError::Storage { field: field.to_string(), source })?;
    info!("Set {} = {:?}", field, value);
    Ok(())
}

/// `artist - album - title`, with placeholders for anything missing
pub fn summary<R: TrackRecord>(record: &R) -> String {
    let title = non_empty_or(record.get("title"), "Unknown Title");
    let artist = non_empty_or(record.get("artist"), "Unknown Artist");
    let album = non_empty_or(record.get("album"), "Unknown Album");
    format!("{} - {} - {}", artist, album, title)
}

fn non_empty_or<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => fallback,
    }
}

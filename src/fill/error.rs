use thiserror::Error;

/// Everything that can go wrong while filling fields.
///
/// Only `PlaybackLaunch` is recovered where it happens. `InputExhausted` and
/// `UserCancelled` travel up to `FillSession::run`, which turns them into a
/// clean exit.
#[derive(Debug, Error)]
pub enum FillError {
    #[error("Error: Please specify fields with -f option")]
    MissingFields,

    #[error("No items match the query.")]
    NoMatches,

    #[error("{0}")]
    PlaybackLaunch(String),

    #[error("end of input")]
    InputExhausted,

    #[error("interrupted by user")]
    UserCancelled,

    #[error("failed to save {field}: {source}")]
    Storage {
        field: String,
        #[source]
        source: anyhow::Error,
    },
}

use thiserror::Error;

/// Errors that can occur during music operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MusicError {
    #[error("Requested channel is not known")]
    UnknownChannel,

    #[error("Not currently connected to this voice channel")]
    NotConnected,

    #[error("Queue is empty")]
    QueueEmpty,

    #[error("Queue index {index} is out of range (queue has {len} items)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Not a number: {0}")]
    NotANumber(String),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Unknown subcommand")]
    UnknownSubcommand,

    #[error("Conflicting flags: {0} and {1}")]
    ConflictingFlags(&'static str, &'static str),

    #[error("No such playlist: {0}")]
    PlaylistNotFound(String),

    #[error("Malformed playlist {name}: {reason}")]
    PlaylistMalformed { name: String, reason: String },

    #[error("Could not resolve media: {0}")]
    Resolution(String),

    #[error("Playback failed: {0}")]
    Playback(String),
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

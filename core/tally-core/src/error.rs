//! Error types for tally-core operations.
//!
//! Per-item problems (a deleted channel, an untracked disconnect, a corrupt
//! store file) degrade and continue instead of surfacing here; only
//! request-level mistakes and real I/O failures become errors.

use std::path::PathBuf;

use crate::types::GuildId;

/// All errors that can occur in tally-core operations.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    /// The guild named in a report request is not known to the directory.
    /// This indicates a request-level mistake, not a data-accounting gap.
    #[error("Guild not found: {0}")]
    GuildNotFound(GuildId),

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to persist {path}: {details}")]
    PersistFailed { path: PathBuf, details: String },
}

/// Convenience type alias for Results using TallyError.
pub type Result<T> = std::result::Result<T, TallyError>;

// Conversion for string error compatibility at IPC edges
impl From<TallyError> for String {
    fn from(err: TallyError) -> String {
        err.to_string()
    }
}

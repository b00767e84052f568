// ⚠️ Error types for the import & reconciliation engine
//
// Entry- and field-level problems never surface here: they are absorbed
// by the extraction layer and reported through the diagnostics sink.
// Only storage, I/O and lookup failures propagate to the caller.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("character not found: {name}-{realm}")]
    CharacterNotFound { realm: String, name: String },

    #[error("addon data file not found under {0}")]
    AddonFileNotFound(PathBuf),

    #[error("failed to persist export: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type Result<T> = std::result::Result<T, RosterError>;

// File: src/errors.rs
//! Error types shared by every pass of the engine.

use std::path::PathBuf;

/// Result type used across the crate, defaulting to [`LexError`].
pub type Result<T, E = LexError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    /// A lexicon key did not normalize to 1..=3 non-empty tokens.
    #[error("lexicon key must have 1 to {max} non-empty tokens, got {got:?}")]
    InvalidKey { got: Vec<String>, max: usize },

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persisted blob is missing or unreadable.
    #[error("could not access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted blob failed to (de)serialize.
    #[error(transparent)]
    Bincode(#[from] bincode::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl LexError {
    /// Wraps an I/O failure with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

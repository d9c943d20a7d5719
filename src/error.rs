//! Error type shared by the scheme core and the inference pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while encoding, encrypting, exchanging
/// or classifying. All variants are fatal for a run.
#[derive(Error, Debug)]
pub enum Error {
    /// A plaintext input (dataset, label file) could not be read.
    #[error("[IO error] {path}: {source}")]
    Io {
        /// The offending path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// An artifact was present but could not be deserialized, or it
    /// belongs to different encryption parameters.
    #[error("[Decode error] {0}")]
    Decode(String),

    /// An artifact could not be persisted.
    #[error("[Storage error] {0}")]
    Storage(String),

    /// An artifact was requested but never stored.
    #[error("[Not found] {0}")]
    NotFound(String),

    /// Invalid instance tier, or data that disagrees with the configured sizes.
    #[error("[Config error] {0}")]
    Config(String),

    /// A caller handed in an argument the operation is undefined for.
    #[error("[Invalid argument] {0}")]
    Argument(String),

    /// A decrypted vector is shorter than the score width.
    #[error("[Length error] expected at least {expected} values, got {actual}")]
    Length {
        /// Required number of values.
        expected: usize,
        /// Number of values that were available.
        actual: usize,
    },

    /// A dataset record could not be parsed and the loader runs in strict mode.
    #[error("[Malformed record] {path}:{line}: {reason}")]
    Malformed {
        /// Dataset path.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What was wrong with the record.
        reason: String,
    },

    /// The run was cancelled between two batch items.
    #[error("[Aborted] stopped before batch item {0}")]
    Aborted(usize),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

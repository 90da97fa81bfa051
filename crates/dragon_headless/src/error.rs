//! Error type for the headless tools.

use std::path::PathBuf;

use dragon_core::error::GameError;
use dragon_core::session::StoreError;
use thiserror::Error;

/// Failures outside the simulation itself: files, formats, arguments.
#[derive(Error, Debug)]
pub enum HeadlessError {
    /// File could not be read or written.
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON output could not be produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The simulator refused something.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Progress storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Rayon could not build a thread pool.
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(String),
}

impl HeadlessError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for the headless tools.
pub type Result<T> = std::result::Result<T, HeadlessError>;

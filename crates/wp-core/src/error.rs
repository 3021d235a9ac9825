//! Unified error type for webpify.
//!
//! Every per-job failure is carried inside that job's result as an [`Error`];
//! start-up failures use the [`Error::Config`] variant and never reach a pool.

use std::path::{Path, PathBuf};

/// Unified error type covering all failure modes in webpify.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input path could not be made absolute.
    #[error("Path error [{}]: {message}", path.display())]
    Path {
        /// The offending path, as submitted.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The external encoder returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An output larger than its input could not be removed.
    #[error("Cleanup error [{}]: {source}", path.display())]
    Cleanup {
        /// The output file that should have been deleted.
        path: PathBuf,
        /// The underlying I/O error from the delete.
        source: std::io::Error,
    },

    /// The directory walk failed.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Configuration is missing or invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// The pool no longer accepts jobs because `wait` was called.
    #[error("worker pool is closed")]
    PoolClosed,

    /// The pool was cancelled before the job could be handed to a worker.
    #[error("worker pool was cancelled")]
    Cancelled,
}

impl Error {
    /// Convenience constructor for [`Error::Path`].
    pub fn path(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Error::Path {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Cleanup`].
    pub fn cleanup(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Cleanup {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

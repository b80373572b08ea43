//! Error types for siteforge.
//!
//! Library crates use [`SiteforgeError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::BuildPhase;

/// Top-level error type for all siteforge operations.
///
/// Every stage either produces a valid transformed stream or propagates the
/// first failure upward; nothing is swallowed, there are no retries.
#[derive(Debug, thiserror::Error)]
pub enum SiteforgeError {
    /// Descriptor loading or validation error. Raised at startup, before
    /// any filesystem mutation.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A per-item transform rejected its input. Names the failing phase and
    /// the item so the terminal message identifies both.
    #[error("{phase} failed for '{item}': {message}")]
    Transform {
        phase: BuildPhase,
        item: String,
        message: String,
    },

    /// Pipeline-level validation error (missing entrypoint, dropped item,
    /// malformed generated artifact).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SiteforgeError>;

impl SiteforgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a transform error naming the failing phase and item.
    pub fn transform(
        phase: BuildPhase,
        item: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Transform {
            phase,
            item: item.into(),
            message: msg.into(),
        }
    }
}

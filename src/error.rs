//! Unified error handling for the covisit library.
//!
//! All fallible public operations return [`Result`], with [`CovisitError`]
//! carrying enough context to report the failure without access to the
//! original inputs.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while building indices or running allocations.
#[derive(Debug, Error)]
pub enum CovisitError {
    /// The circle definition file could not be read.
    #[error("failed to read circle file {path}")]
    CircleIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line of the circle definition file did not parse as `x;y;radius`.
    #[error("malformed circle definition at line {line}: {content:?}")]
    CircleParse { line: usize, content: String },

    /// The requested allocation method exists in the parameter surface but has
    /// no implementation.
    #[error("allocation method {method:?} is not supported")]
    UnsupportedMethod { method: String },

    /// The statistics model holds no visited regions, so there is nothing to
    /// allocate over.
    #[error("statistics model is empty; no regions were ever visited")]
    EmptyModel,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CovisitError>;

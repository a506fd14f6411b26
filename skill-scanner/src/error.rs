//! Error types for skill scanning.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for scanner operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors produced while scanning a skill source file.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The source is not syntactically valid.
    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        /// One-based line of the offending token.
        line: usize,
        /// One-based column of the offending token.
        column: usize,
        /// Parser message.
        message: String,
    },

    /// The skill entry file could not be read.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl From<syn::Error> for ScanError {
    fn from(err: syn::Error) -> Self {
        let start = err.span().start();
        Self::Parse {
            line: start.line,
            column: start.column + 1,
            message: err.to_string(),
        }
    }
}

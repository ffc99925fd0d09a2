//! Error types for plagcheck
//!
//! All fallible operations return `Result<T, Error>`.
//! Only `SyntaxError` is recoverable inside the pipeline: the canonicalizer
//! degrades to raw-text comparison instead of aborting the batch.

use std::path::PathBuf;

use crate::parser::ast::Span;

/// plagcheck error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source text is not valid Python
    #[error("Syntax error at {span}: {message}")]
    SyntaxError { span: Span, message: String },

    /// The Python grammar could not be loaded or produced no tree
    #[error("Parser error: {0}")]
    ParserError(String),

    /// A referenced file (pair list or source) could not be read
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing to the output sink failed
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Returns true for malformed source input, the one non-fatal error
    pub fn is_syntax_error(&self) -> bool {
        matches!(self, Error::SyntaxError { .. })
    }
}

/// Result type alias for plagcheck operations
pub type Result<T> = std::result::Result<T, Error>;

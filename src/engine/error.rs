//! Error types for the evaluation engine

use std::path::PathBuf;
use thiserror::Error;

use crate::scss::ParseError;

/// Errors that fail a render pass
#[derive(Error, Debug)]
pub enum EngineError {
    /// The source handed to `render` is not valid SCSS
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// An imported file is not valid SCSS
    #[error("Parse error in imported file {file:?}: {source}")]
    ImportParse {
        file: PathBuf,
        #[source]
        source: ParseError,
    },

    /// The importer could not resolve an `@import`/`@use` target
    #[error("Failed to resolve import \"{url}\": {source}")]
    Import {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// A resolved import could not be read
    #[error("Failed to read imported file {file:?}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Import depth limit of {limit} exceeded while importing {file:?}")]
    ImportDepth { limit: usize, file: PathBuf },

    #[error("Undefined variable: ${name}")]
    UndefinedVariable { name: String },

    /// A built-in or host function rejected its arguments
    #[error("Error in function {name}(): {message}")]
    Function { name: String, message: String },

    /// Invalid operation or expression
    #[error("{message}")]
    Evaluation { message: String },

    /// Raised by an `@error` rule in the stylesheet
    #[error("@error: {0}")]
    User(String),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

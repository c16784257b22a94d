//! Error types for variable extraction

use thiserror::Error;

use super::rewriter::RewriteError;
use crate::engine::EngineError;
use crate::scss::ParseError;

/// Failure of an extraction, by stage
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The entry source is not valid SCSS
    #[error("Failed to parse stylesheet: {0}")]
    Parse(#[from] ParseError),

    #[error("Failed to rewrite declarations: {0}")]
    Rewrite(#[from] RewriteError),

    /// Evaluation failed, including imports the resolver could not satisfy
    #[error("Failed to render stylesheet: {0}")]
    Render(#[from] EngineError),
}

/// Result type alias for extraction
pub type ExtractResult<T> = Result<T, ExtractError>;

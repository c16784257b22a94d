//! SCSS syntax support
//!
//! Provides the pieces the extractor needs to manipulate stylesheet source:
//! - a `logos` based tokenizer and a lossless parser into `{type, value}` trees
//! - a printer turning trees back into source
//! - simple tree queries

pub mod constants;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod printer;
pub mod query;
pub mod tree_printer;

pub use node::{Node, NodeValue, Span};
pub use parser::{ParseError, ParseResult, ScssParser};
pub use printer::stringify;

//! Sass Variable Extract Library
//!
//! Extracts the resolved values of SCSS variables so other build steps can use
//! them. Variable declarations are rewritten to report their values through an
//! export hook, the stylesheet is evaluated, and the values the hook receives
//! are converted into plain data together with the list of imported files.

pub mod engine;
pub mod extract;
pub mod logging;
pub mod scss;
#[cfg(test)]
pub mod test_utils;

pub use extract::{extract, Extraction, ExtractError, ExtractOptions, Extractor, FsResolver, PlainValue, Resolve};

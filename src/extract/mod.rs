//! Variable extraction pipeline
//!
//! Parses a stylesheet, wraps every variable declaration's value in a call to
//! an export hook, renders the result with an [`Engine`](crate::engine::Engine)
//! and converts the values the hook receives into [`PlainValue`]s.

pub mod cleaner;
pub mod convert;
pub mod error;
pub mod extractor;
pub mod fs_resolver;
pub mod importer;
pub mod plain;
pub mod rewriter;

pub use cleaner::clean;
pub use convert::convert;
pub use error::{ExtractError, ExtractResult};
pub use extractor::{extract, Extraction, ExtractOptions, Extractor, VariableRecord};
pub use fs_resolver::FsResolver;
pub use importer::{url_to_request, Resolve, ResolverImporter};
pub use plain::PlainValue;
pub use rewriter::{DeclarationRewriter, RewriteError};

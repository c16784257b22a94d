//! Stylesheet evaluation engine
//!
//! The extractor only talks to an engine through the [`Engine`] trait: render a
//! source string, asking an [`Importer`] to resolve imports and dispatching calls
//! to host functions held in a [`FunctionRegistry`]. [`Evaluator`] is the
//! bundled implementation; it evaluates just enough SCSS to resolve variables.

pub mod color;
pub mod error;
pub mod evaluator;
pub mod value;

mod builtins;
mod module;

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

pub use color::Color;
pub use error::{EngineError, EngineResult};
pub use evaluator::{Evaluator, EvaluatorOptions};
pub use value::{ListSeparator, SassValue};

/// The file an import was requested from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOrigin {
    /// The source string passed to `render`, which has no path of its own
    Stdin,
    /// A file previously returned by the importer
    File(PathBuf),
}

/// Resolves `@import`/`@use` targets to files on disk
#[async_trait]
pub trait Importer: Send {
    async fn import(&mut self, url: &str, origin: &ImportOrigin) -> anyhow::Result<PathBuf>;
}

/// A host function callable from the stylesheet.
///
/// Errors are reported as messages and turned into [`EngineError::Function`].
pub type HostFunction<'a> = Box<dyn FnMut(&[SassValue]) -> Result<SassValue, String> + Send + 'a>;

/// Host functions available to one render pass, keyed by name.
///
/// Sass treats `-` and `_` in function names as the same character, so lookups do too.
#[derive(Default)]
pub struct FunctionRegistry<'a> {
    functions: HashMap<String, HostFunction<'a>>,
}

impl<'a> FunctionRegistry<'a> {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register a function, replacing any previous one with the same name
    pub fn register<F>(&mut self, name: &str, function: F)
    where
        F: FnMut(&[SassValue]) -> Result<SassValue, String> + Send + 'a,
    {
        self.functions.insert(normalize_name(name), Box::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&normalize_name(name))
    }

    /// Call a registered function; `None` when nothing is registered under `name`
    pub fn call(&mut self, name: &str, args: &[SassValue]) -> Option<Result<SassValue, String>> {
        self.functions
            .get_mut(&normalize_name(name))
            .map(|function| function(args))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Evaluates stylesheet source
#[async_trait]
pub trait Engine: Send + Sync {
    /// Evaluate `source` to completion.
    ///
    /// The importer and the host functions may be called any number of times
    /// before this returns.
    async fn render(
        &self,
        source: &str,
        importer: &mut dyn Importer,
        functions: &mut FunctionRegistry<'_>,
    ) -> EngineResult<()>;
}

/// Sass identifiers treat `-` and `_` as equivalent
pub(crate) fn normalize_name(name: &str) -> String {
    name.replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_dispatch() {
        let mut calls = Vec::new();
        {
            let mut registry = FunctionRegistry::new();
            let log = &mut calls;
            registry.register("export_var", move |args: &[SassValue]| {
                log.push(args.len());
                Ok(args.last().cloned().unwrap_or(SassValue::Null))
            });

            assert!(registry.contains("export-var"));
            assert_eq!(registry.len(), 1);
            let result = registry.call("export_var", &[SassValue::quoted("x"), SassValue::number(1.0)]);
            assert_eq!(result, Some(Ok(SassValue::number(1.0))));
            assert!(registry.call("missing", &[]).is_none());
        }
        assert_eq!(calls, vec![2]);
    }
}

//! Extraction entry point
//!
//! Rewrites the source so every variable declaration reports its value through
//! an export hook, renders it, and collects what the hook saw along with the
//! files that were imported.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info, log_enabled, trace, Level};
use serde::{Deserialize, Serialize};

use super::convert::convert;
use super::error::ExtractResult;
use super::importer::{Resolve, ResolverImporter};
use super::plain::{key_string, PlainValue};
use super::rewriter::DeclarationRewriter;
use crate::engine::{Engine, Evaluator, FunctionRegistry, SassValue};
use crate::scss::constants::DEFAULT_EXPORT_FUNCTION;
use crate::scss::tree_printer::{collect_node_stats, format_tree};
use crate::scss::{stringify, ScssParser};

/// Extraction settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Name of the hook function declarations are wrapped in
    pub export_function: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            export_function: DEFAULT_EXPORT_FUNCTION.to_string(),
        }
    }
}

/// One export hook call. Either side is `None` when the engine value had no
/// plain counterpart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableRecord {
    pub name: Option<PlainValue>,
    pub value: Option<PlainValue>,
}

/// Result of a successful extraction
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    /// In evaluation order; a variable assigned twice appears twice
    pub variables: Vec<VariableRecord>,
    /// Resolved import paths in resolution order, duplicates included
    pub dependencies: Vec<PathBuf>,
}

impl Extraction {
    /// Last value recorded for a variable name
    pub fn get(&self, name: &str) -> Option<&PlainValue> {
        self.variables
            .iter()
            .rev()
            .find(|record| record.name.as_ref().and_then(PlainValue::as_str) == Some(name))
            .and_then(|record| record.value.as_ref())
    }

    /// Variables keyed by name, later assignments overwriting earlier ones
    pub fn to_map(&self) -> IndexMap<String, Option<PlainValue>> {
        let mut map = IndexMap::new();
        for record in &self.variables {
            map.insert(key_string(record.name.as_ref()), record.value.clone());
        }
        map
    }
}

/// Extracts variables using an [`Engine`]
#[derive(Debug, Clone)]
pub struct Extractor<E = Evaluator> {
    engine: E,
    options: ExtractOptions,
    parser: ScssParser,
}

impl Extractor<Evaluator> {
    /// Extractor using the bundled evaluator
    pub fn new() -> Self {
        Self::with_engine(Evaluator::new())
    }
}

impl Default for Extractor<Evaluator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Engine> Extractor<E> {
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine,
            options: ExtractOptions::default(),
            parser: ScssParser::new(),
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Extract the variables of `source`, whose file is `entry`.
    ///
    /// Imports are resolved through `resolver`, starting from the directory
    /// of `entry`. Any parse, rewrite or render failure aborts the whole
    /// extraction.
    pub async fn extract<R>(&self, entry: impl AsRef<Path>, resolver: &R, source: &str) -> ExtractResult<Extraction>
    where
        R: Resolve + ?Sized,
    {
        let entry = entry.as_ref();

        let mut tree = self.parser.parse(source)?;
        DeclarationRewriter::new(self.options.export_function.as_str()).rewrite(&mut tree)?;
        let rewritten = stringify(&tree);
        if log_enabled!(Level::Trace) {
            trace!("Node counts for {:?}: {:?}", entry, collect_node_stats(&tree));
            trace!("Rewritten tree:\n{}", format_tree(&tree));
            trace!("Rewritten source:\n{}", rewritten);
        }

        let mut importer = ResolverImporter::new(entry, resolver);
        let mut variables = Vec::new();
        {
            let records = &mut variables;
            let mut functions = FunctionRegistry::new();
            functions.register(&self.options.export_function, move |args: &[SassValue]| {
                export_hook(records, args)
            });
            self.engine.render(&rewritten, &mut importer, &mut functions).await?;
        }
        let dependencies = importer.into_dependencies();

        info!(
            "Extracted {} variables and {} dependencies from {:?}",
            variables.len(),
            dependencies.len(),
            entry
        );
        Ok(Extraction {
            variables,
            dependencies,
        })
    }
}

/// Extract with the bundled evaluator and default options
pub async fn extract<R>(entry: impl AsRef<Path>, resolver: &R, source: &str) -> ExtractResult<Extraction>
where
    R: Resolve + ?Sized,
{
    Extractor::new().extract(entry, resolver, source).await
}

/// Body of the export hook: record `(name, value)` and hand the value back
fn export_hook(records: &mut Vec<VariableRecord>, args: &[SassValue]) -> Result<SassValue, String> {
    let value = match args {
        [_, value] => value.clone(),
        // A comma separated value arrives as one argument per element
        [_, elements @ ..] if !elements.is_empty() => SassValue::comma_list(elements.to_vec()),
        _ => return Err(format!("expected a name and a value, got {} arguments", args.len())),
    };

    let record = VariableRecord {
        name: convert(&args[0]),
        value: convert(&value),
    };
    if record.name.is_none() && record.value.is_none() {
        debug!("Dropping export of {} with no plain name or value", args[0]);
    } else {
        records.push(record);
    }

    Ok(value)
}

#[cfg(test)]
#[path = "extractor_tests.rs"]
mod tests;

//! Bridges a host resolver to the engine's importer interface
//!
//! The engine asks for `(url, origin)`; the host resolver answers
//! `(directory, request) -> path`. Every resolved path is recorded as a
//! dependency of the extraction.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use log::debug;
use regex::Regex;

use crate::engine::{ImportOrigin, Importer};

/// Resolves a module request relative to a directory
///
/// Implemented for any `Fn(PathBuf, String) -> impl Future<Output = anyhow::Result<PathBuf>>`
/// whose future owns its data, so async closures can be passed directly.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, dir: &Path, request: &str) -> anyhow::Result<PathBuf>;
}

#[async_trait]
impl<F, Fut> Resolve for F
where
    F: Fn(PathBuf, String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<PathBuf>> + Send + 'static,
{
    async fn resolve(&self, dir: &Path, request: &str) -> anyhow::Result<PathBuf> {
        self(dir.to_path_buf(), request.to_string()).await
    }
}

/// Engine importer backed by a [`Resolve`] implementation
pub struct ResolverImporter<'r, R: ?Sized> {
    base_file: PathBuf,
    resolver: &'r R,
    dependencies: Vec<PathBuf>,
}

impl<'r, R: Resolve + ?Sized> ResolverImporter<'r, R> {
    /// `base_file` is the path of the source being rendered; imports from it
    /// resolve against its directory
    pub fn new(base_file: impl Into<PathBuf>, resolver: &'r R) -> Self {
        Self {
            base_file: base_file.into(),
            resolver,
            dependencies: Vec::new(),
        }
    }

    /// Paths resolved so far, in resolution order
    pub fn dependencies(&self) -> &[PathBuf] {
        &self.dependencies
    }

    pub fn into_dependencies(self) -> Vec<PathBuf> {
        self.dependencies
    }
}

#[async_trait]
impl<R: Resolve + ?Sized> Importer for ResolverImporter<'_, R> {
    async fn import(&mut self, url: &str, origin: &ImportOrigin) -> anyhow::Result<PathBuf> {
        let previous = match origin {
            ImportOrigin::Stdin => self.base_file.as_path(),
            ImportOrigin::File(path) => path.as_path(),
        };
        let dir = previous.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        let request = url_to_request(url);

        // Resolver errors go back to the engine as they are
        let file = self.resolver.resolve(&dir, &request).await?;

        debug!("Resolved import {} from {:?} to {:?}", url, dir, file);
        self.dependencies.push(file.clone());
        Ok(file)
    }
}

/// Turn a stylesheet import URL into a module request.
///
/// - `~pkg/file` refers to a package: `pkg/file`
/// - absolute paths (`/x`, `C:\x`) and explicit relative paths (`./x`, `../x`)
///   stay as they are
/// - anything else is relative to the importing file: `./x`
pub fn url_to_request(url: &str) -> String {
    static WINDOWS_ABSOLUTE: OnceLock<Regex> = OnceLock::new();
    static MODULE_PREFIX: OnceLock<Regex> = OnceLock::new();

    if url.is_empty() {
        return String::new();
    }

    let windows_absolute = WINDOWS_ABSOLUTE
        .get_or_init(|| Regex::new(r"^[a-zA-Z]:\\").expect("Failed to compile windows path regex"));
    let request = if windows_absolute.is_match(url)
        || url.starts_with('/')
        || url.starts_with("./")
        || url.starts_with("../")
    {
        url.to_string()
    } else {
        format!("./{}", url)
    };

    // Everything up to a `~` before any query string is a module prefix
    let module_prefix = MODULE_PREFIX
        .get_or_init(|| Regex::new(r"^[^?]*~").expect("Failed to compile module prefix regex"));
    module_prefix.replace(&request, "").into_owned()
}

//! Test utilities shared across the codebase

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;

/// Write a stylesheet fixture below `dir`, creating parent directories.
/// Returns the full path of the written file.
pub fn write_stylesheet(dir: &Path, relative: &str, content: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create fixture directory");
    }
    fs::write(&path, content).expect("Failed to write fixture");
    path
}

/// Resolver for sources that must not import anything
pub async fn no_imports(_dir: PathBuf, request: String) -> anyhow::Result<PathBuf> {
    Err(anyhow!("unexpected import of {}", request))
}

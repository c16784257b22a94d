//! Filesystem resolver following Sass lookup rules

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use async_trait::async_trait;
use log::trace;

use super::importer::Resolve;

/// Extensions tried when a request has none
const EXTENSIONS: &[&str] = &["scss", "css"];

/// Resolves requests to existing files.
///
/// For a request `dir/name` the candidates are, in order: `dir/_name.scss`,
/// `dir/name.scss`, `dir/_name.css`, `dir/name.css`, then `dir/name/_index.scss`
/// and `dir/name/index.scss`. Requests that already carry an extension only try
/// the partial and plain forms. Package requests (not starting with `.` or `/`)
/// are looked up relative to the importing directory first, then under each load path.
#[derive(Debug, Clone, Default)]
pub struct FsResolver {
    load_paths: Vec<PathBuf>,
}

impl FsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add directories searched for package requests such as `bootstrap/scss/variables`
    pub fn with_load_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.load_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn load_paths(&self) -> &[PathBuf] {
        &self.load_paths
    }

    /// Every path tried for `request`, in lookup order
    pub fn candidates(&self, dir: &Path, request: &str) -> Vec<PathBuf> {
        let is_relative = request.starts_with("./") || request.starts_with("../");
        let is_absolute = Path::new(request).is_absolute();

        let mut roots = vec![dir.join(request)];
        if !is_relative && !is_absolute {
            roots.extend(self.load_paths.iter().map(|load_path| load_path.join(request)));
        }

        roots
            .iter()
            // Drops the `.` segments that `./name` requests leave behind
            .map(|root| root.components().collect::<PathBuf>())
            .flat_map(|root| file_candidates(&root))
            .collect()
    }
}

fn file_candidates(base: &Path) -> Vec<PathBuf> {
    let Some(name) = base.file_name().and_then(|name| name.to_str()) else {
        return vec![base.to_path_buf()];
    };

    let has_extension = base
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| EXTENSIONS.contains(&extension) || extension == "sass");
    if has_extension {
        return vec![base.with_file_name(format!("_{}", name)), base.to_path_buf()];
    }

    let mut candidates = Vec::new();
    for extension in EXTENSIONS {
        candidates.push(base.with_file_name(format!("_{}.{}", name, extension)));
        candidates.push(base.with_file_name(format!("{}.{}", name, extension)));
    }
    candidates.push(base.join("_index.scss"));
    candidates.push(base.join("index.scss"));
    candidates
}

#[async_trait]
impl Resolve for FsResolver {
    async fn resolve(&self, dir: &Path, request: &str) -> anyhow::Result<PathBuf> {
        let candidates = self.candidates(dir, request);
        for candidate in &candidates {
            trace!("Trying {:?}", candidate);
            let is_file = tokio::fs::metadata(candidate)
                .await
                .is_ok_and(|metadata| metadata.is_file());
            if is_file {
                return Ok(candidate.clone());
            }
        }
        Err(anyhow!(
            "Can't find stylesheet \"{}\" from {:?} (tried {} paths)",
            request,
            dir,
            candidates.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_candidate_order() {
        let root = Path::new("/styles");
        let resolver = FsResolver::new().with_load_paths(["/vendor"]);
        assert_eq!(
            resolver.candidates(root, "theme"),
            vec![
                root.join("_theme.scss"),
                root.join("theme.scss"),
                root.join("_theme.css"),
                root.join("theme.css"),
                root.join("theme").join("_index.scss"),
                root.join("theme").join("index.scss"),
                PathBuf::from("/vendor/_theme.scss"),
                PathBuf::from("/vendor/theme.scss"),
                PathBuf::from("/vendor/_theme.css"),
                PathBuf::from("/vendor/theme.css"),
                PathBuf::from("/vendor/theme/_index.scss"),
                PathBuf::from("/vendor/theme/index.scss"),
            ]
        );
        assert_eq!(
            resolver.candidates(root, "theme.scss"),
            vec![
                root.join("_theme.scss"),
                root.join("theme.scss"),
                PathBuf::from("/vendor/_theme.scss"),
                PathBuf::from("/vendor/theme.scss"),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolves_partials_and_index_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("_vars.scss"), "$a: 1;").unwrap();
        fs::create_dir(dir.path().join("theme")).unwrap();
        fs::write(dir.path().join("theme").join("_index.scss"), "$b: 2;").unwrap();
        fs::write(dir.path().join("plain.css"), "a {}").unwrap();

        let resolver = FsResolver::new();
        let vars = resolver.resolve(dir.path(), "./vars").await.unwrap();
        assert_eq!(vars, dir.path().join("_vars.scss"));
        let theme = resolver.resolve(dir.path(), "./theme").await.unwrap();
        assert_eq!(theme, dir.path().join("theme").join("_index.scss"));
        let plain = resolver.resolve(dir.path(), "./plain.css").await.unwrap();
        assert_eq!(plain, dir.path().join("plain.css"));
    }

    #[tokio::test]
    async fn test_package_requests_use_load_paths() {
        let project = TempDir::new().unwrap();
        let modules = TempDir::new().unwrap();
        fs::create_dir_all(modules.path().join("kit")).unwrap();
        fs::write(modules.path().join("kit").join("_colors.scss"), "$c: red;").unwrap();

        let resolver = FsResolver::new().with_load_paths([modules.path()]);
        let found = resolver.resolve(project.path(), "kit/colors").await.unwrap();
        assert_eq!(found, modules.path().join("kit").join("_colors.scss"));

        // Relative requests never fall back to load paths
        assert!(resolver.resolve(project.path(), "./kit/colors").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let error = FsResolver::new()
            .resolve(dir.path(), "./nothing")
            .await
            .unwrap_err();
        assert!(error.to_string().contains("nothing"));
    }
}

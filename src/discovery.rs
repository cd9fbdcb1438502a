//! Stylesheet discovery.
//!
//! Walks the workspace root and keeps the files matching the include
//! pattern, minus the configured exclusions. Partial files (basename starts
//! with `_`) are only returned for membership checks.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::Settings;
use crate::host::{Host, OutputLevel, Report};

/// Default discovery pattern; skips partials.
pub const DEFAULT_PATTERN: &str = "**/[^_]*.s[a|c]ss";

/// Pattern used to decide whether a saved file belongs to the project.
pub const MEMBERSHIP_PATTERN: &str = "**/*.s[a|c]ss";

/// File names used to test whether an exclusion covers a whole directory.
const PRUNE_SAMPLES: [&str; 2] = ["live-sass-sample.scss", "live-sass-sample/nested.scss"];

/// What a discovery run is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileQuery {
    /// Files to compile: default pattern (or `include_items`), no partials.
    Compilable,
    /// Every stylesheet in the project, partials included. `include_items`
    /// does not apply.
    Membership,
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Error whilst searching {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Discovery task failed: {0}")]
    Task(String),
}

/// Is `path` a Sass/SCSS file? Partials only count when `allow_partial`.
pub fn is_stylesheet(path: &Path, allow_partial: bool) -> bool {
    let has_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("scss") || ext.eq_ignore_ascii_case("sass"));

    has_extension && (allow_partial || !is_partial(path))
}

/// A partial is a file whose basename starts with `_`.
pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('_'))
}

/// Resolves the set of stylesheets under a root.
#[derive(Debug, Clone)]
pub struct FileSetResolver {
    root: PathBuf,
    exclude_list: Vec<String>,
    include_items: Vec<String>,
}

impl FileSetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude_list: Vec::new(),
            include_items: Vec::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.discovery_root())
            .exclude(settings.exclude_list.clone())
            .include_items(settings.include_items.clone().unwrap_or_default())
    }

    pub fn exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude_list = patterns;
        self
    }

    pub fn include_items(mut self, items: Vec<String>) -> Self {
        self.include_items = items;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exclude_list(&self) -> &[String] {
        &self.exclude_list
    }

    /// The include pattern in effect for `query`.
    ///
    /// Several include items are shown as one brace alternation.
    pub fn include_pattern(&self, query: FileQuery) -> String {
        match self.include_globs(query).as_slice() {
            [single] => single.clone(),
            many => format!("{{{}}}", many.join(",")),
        }
    }

    fn include_globs(&self, query: FileQuery) -> Vec<String> {
        match query {
            FileQuery::Compilable if !self.include_items.is_empty() => self.include_items.clone(),
            FileQuery::Compilable => vec![DEFAULT_PATTERN.to_string()],
            FileQuery::Membership => vec![MEMBERSHIP_PATTERN.to_string()],
        }
    }

    /// Walk the root synchronously.
    pub fn scan(&self, query: FileQuery) -> Result<Vec<PathBuf>, DiscoveryError> {
        let include = build_set(&self.include_globs(query))?;
        let exclude = build_set(&self.exclude_list)?;
        let allow_partial = query == FileQuery::Membership;

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                // Dot directories are not searched, like `**` in most globbers.
                let hidden = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with('.'));
                !hidden && !self.is_pruned(entry.path(), &exclude)
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| DiscoveryError::Walk {
                root: self.root.clone(),
                source,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(relative) = relative_glob_path(&self.root, entry.path()) else {
                continue;
            };

            if include.is_match(&relative)
                && !exclude.is_match(&relative)
                && is_stylesheet(entry.path(), allow_partial)
            {
                files.push(entry.into_path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Walk the root on the blocking pool. Failures are reported to the host
    /// and yield an empty set.
    pub async fn resolve(&self, query: FileQuery, host: &dyn Host) -> Vec<PathBuf> {
        let resolver = self.clone();
        let result = tokio::task::spawn_blocking(move || resolver.scan(query))
            .await
            .unwrap_or_else(|e| Err(DiscoveryError::Task(e.to_string())));

        match result {
            Ok(files) => {
                crate::debug_event!(
                    "discovery",
                    "resolved",
                    "{} files for {}",
                    files.len(),
                    self.include_pattern(query)
                );
                files
            }
            Err(e) => {
                tracing::error!("[discovery] {e}");
                host.show_report(
                    Report::new(OutputLevel::Error, "Error whilst searching for files")
                        .line(e.to_string()),
                );
                Vec::new()
            }
        }
    }

    /// Whether the path is one of the discovered files for `query`.
    pub async fn contains(&self, path: &Path, query: FileQuery, host: &dyn Host) -> bool {
        self.resolve(query, host)
            .await
            .iter()
            .any(|candidate| candidate == path)
    }

    fn is_pruned(&self, dir: &Path, exclude: &GlobSet) -> bool {
        if exclude.is_empty() {
            return false;
        }
        let Some(relative) = relative_glob_path(&self.root, dir) else {
            return false;
        };
        PRUNE_SAMPLES
            .iter()
            .all(|sample| exclude.is_match(format!("{relative}/{sample}")))
    }
}

/// Path relative to `root` with `/` separators, as globs expect.
fn relative_glob_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(parts.join("/"))
}

fn build_set(patterns: &[String]) -> Result<GlobSet, DiscoveryError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(compile_glob(pattern)?);
    }
    builder.build().map_err(|source| DiscoveryError::InvalidPattern {
        pattern: patterns.join(","),
        source,
    })
}

fn compile_glob(pattern: &str) -> Result<Glob, DiscoveryError> {
    // Patterns are matched against root-relative paths.
    let trimmed = pattern.trim_start_matches("./").trim_start_matches('/');
    GlobBuilder::new(trimmed)
        .literal_separator(true)
        .build()
        .map_err(|source| DiscoveryError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "a { b: c; }").unwrap();
        path
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "a.scss");
        touch(root, "styles/main.sass");
        touch(root, "styles/_vars.scss");
        touch(root, "node_modules/pkg/lib.scss");
        touch(root, ".hidden/skip.scss");
        touch(root, "styles/readme.md");
        temp
    }

    #[test]
    fn test_default_pattern_skips_partials_and_excludes() {
        let temp = project();
        let root = temp.path();
        let resolver =
            FileSetResolver::new(root).exclude(vec!["**/node_modules/**".to_string()]);

        let files = resolver.scan(FileQuery::Compilable).unwrap();
        assert_eq!(
            files,
            vec![root.join("a.scss"), root.join("styles/main.sass")]
        );
    }

    #[test]
    fn test_membership_includes_partials() {
        let temp = project();
        let root = temp.path();
        let resolver =
            FileSetResolver::new(root).exclude(vec!["/**/node_modules/**".to_string()]);

        let files = resolver.scan(FileQuery::Membership).unwrap();
        assert!(files.contains(&root.join("styles/_vars.scss")));
        assert!(!files.contains(&root.join("node_modules/pkg/lib.scss")));
        assert!(!files.contains(&root.join(".hidden/skip.scss")));
    }

    #[test]
    fn test_include_items_override_pattern() {
        let temp = project();
        let root = temp.path();
        let resolver = FileSetResolver::new(root).include_items(vec!["styles/*.sass".to_string()]);

        assert_eq!(resolver.include_pattern(FileQuery::Compilable), "styles/*.sass");
        assert_eq!(
            resolver.scan(FileQuery::Compilable).unwrap(),
            vec![root.join("styles/main.sass")]
        );

        // Membership checks ignore include items.
        assert_eq!(
            resolver.include_pattern(FileQuery::Membership),
            MEMBERSHIP_PATTERN
        );
    }

    #[test]
    fn test_multiple_include_items_join_into_alternation() {
        let resolver = FileSetResolver::new("/proj")
            .include_items(vec!["a/*.scss".to_string(), "b/**/*.scss".to_string()]);
        assert_eq!(
            resolver.include_pattern(FileQuery::Compilable),
            "{a/*.scss,b/**/*.scss}"
        );
    }

    #[test]
    fn test_include_items_never_yield_partials_for_compilation() {
        let temp = project();
        let root = temp.path();
        let resolver = FileSetResolver::new(root).include_items(vec!["styles/*".to_string()]);

        let files = resolver.scan(FileQuery::Compilable).unwrap();
        assert_eq!(files, vec![root.join("styles/main.sass")]);
    }

    #[tokio::test]
    async fn test_invalid_pattern_reports_and_returns_empty() {
        let temp = project();
        let host = MemoryHost::new();
        let resolver = FileSetResolver::new(temp.path()).exclude(vec!["a/[".to_string()]);

        let files = resolver.resolve(FileQuery::Compilable, &host).await;
        assert!(files.is_empty());
        assert_eq!(host.reports_titled("Error whilst searching for files").len(), 1);
    }

    #[test]
    fn test_stylesheet_predicates() {
        assert!(is_stylesheet(Path::new("/p/a.scss"), false));
        assert!(is_stylesheet(Path::new("/p/a.SASS"), false));
        assert!(!is_stylesheet(Path::new("/p/_a.scss"), false));
        assert!(is_stylesheet(Path::new("/p/_a.scss"), true));
        assert!(!is_stylesheet(Path::new("/p/a.css"), true));
        assert!(is_partial(Path::new("/p/_a.scss")));
        assert!(!is_partial(Path::new("/_p/a.scss")));
    }
}

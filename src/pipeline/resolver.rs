//! Import resolution for `~package/...` and `/root-relative` imports.
//!
//! The compile engine asks an [`ImportResolver`] before falling back to the
//! compiler's own lookup, so alternate strategies can be swapped in.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::config::Settings;

/// Directory searched for `~` imports inside each workspace folder.
pub const PACKAGE_DIR: &str = "node_modules";

/// Maps an import specifier to a file path.
pub trait ImportResolver: Send + Sync + Debug {
    /// `None` leaves the import to the compiler.
    fn resolve(&self, specifier: &str) -> Option<PathBuf>;
}

/// A folder the resolver searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFolder {
    pub path: PathBuf,
    /// Resolve `/`-prefixed imports from this folder.
    pub root_is_workspace: bool,
}

/// Resolves against the package directory and roots of the workspace folders.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceImportResolver {
    folders: Vec<WorkspaceFolder>,
}

impl WorkspaceImportResolver {
    pub fn new(folders: Vec<WorkspaceFolder>) -> Self {
        Self { folders }
    }

    /// Workspace root first, then the extra configured folders.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut folders = Vec::new();
        if let Some(root) = &settings.workspace_root {
            folders.push(WorkspaceFolder {
                path: root.clone(),
                root_is_workspace: settings.root_is_workspace,
            });
        }
        folders.extend(settings.workspace_folders.iter().map(|folder| {
            WorkspaceFolder {
                path: folder.path.clone(),
                root_is_workspace: folder.root_is_workspace,
            }
        }));
        Self::new(folders)
    }

    pub fn folders(&self) -> &[WorkspaceFolder] {
        &self.folders
    }

    fn resolve_package(&self, parts: &[&str]) -> Option<PathBuf> {
        let (last, dirs) = parts.split_last()?;

        self.folders.iter().find_map(|folder| {
            let mut dir = folder.path.join(PACKAGE_DIR);
            dir.extend(dirs);
            dir.is_dir().then(|| dir.join(last))
        })
    }

    fn resolve_rooted(&self, relative: &str) -> Option<PathBuf> {
        self.folders
            .iter()
            .filter(|folder| folder.root_is_workspace)
            .find_map(|folder| {
                let candidate = folder.path.join(relative);
                let parent_exists = candidate.parent().is_some_and(Path::is_dir);
                parent_exists.then_some(candidate)
            })
    }
}

impl ImportResolver for WorkspaceImportResolver {
    fn resolve(&self, specifier: &str) -> Option<PathBuf> {
        let normalized = specifier.replace('\\', "/");

        if let Some(rest) = normalized.strip_prefix('~') {
            if !rest.contains('/') {
                return None;
            }
            let parts: Vec<&str> = rest.split('/').filter(|p| !p.is_empty()).collect();
            let resolved = self.resolve_package(&parts);
            if let Some(path) = &resolved {
                crate::debug_event!(
                    "resolver",
                    "package import",
                    "{specifier} -> {}",
                    path.display()
                );
            }
            return resolved;
        }

        if let Some(rest) = normalized.strip_prefix('/') {
            return self.resolve_rooted(rest);
        }

        None
    }
}

/// Resolver that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

impl ImportResolver for NoopResolver {
    fn resolve(&self, _specifier: &str) -> Option<PathBuf> {
        None
    }
}

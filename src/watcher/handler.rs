//! Handler trait and action types for the unified watcher.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::WatchError;
use crate::config::Settings;

/// Actions returned by handlers for the UnifiedWatcher to execute.
#[derive(Debug, Clone)]
pub enum WatchAction {
    /// A stylesheet was saved.
    CompileSaved { path: PathBuf },

    /// The settings file changed and loaded cleanly.
    ReloadSettings(Box<Settings>),

    /// No action needed (e.g., settings unchanged).
    None,
}

/// Trait for handlers that process file change events.
///
/// Handlers declare which paths they care about and return actions
/// for the UnifiedWatcher to execute.
#[async_trait]
pub trait WatchHandler: Send + Sync {
    /// Handler name for logging.
    fn name(&self) -> &str;

    /// Check if this handler should process events for the given path.
    fn matches(&self, path: &Path) -> bool;

    /// Paths to watch. Directories are watched recursively, files through
    /// their parent directory.
    fn tracked_paths(&self) -> Vec<PathBuf>;

    /// Handle a file modification event (called after debouncing).
    async fn on_modify(&self, path: &Path) -> Result<WatchAction, WatchError>;

    /// Handle a file deletion event (called immediately, no debouncing).
    async fn on_delete(&self, _path: &Path) -> Result<WatchAction, WatchError> {
        Ok(WatchAction::None)
    }
}

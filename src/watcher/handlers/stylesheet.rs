//! Handler for stylesheet saves.
//!
//! Matches every `.scss`/`.sass` file under the workspace root, partials
//! included. Whether a save is compiled, and how, is the controller's call.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::discovery;
use crate::watcher::{WatchAction, WatchError, WatchHandler};

pub struct StylesheetHandler {
    root: PathBuf,
}

impl StylesheetHandler {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl WatchHandler for StylesheetHandler {
    fn name(&self) -> &str {
        "stylesheet"
    }

    fn matches(&self, path: &Path) -> bool {
        path.starts_with(&self.root) && discovery::is_stylesheet(path, true)
    }

    fn tracked_paths(&self) -> Vec<PathBuf> {
        vec![self.root.clone()]
    }

    async fn on_modify(&self, path: &Path) -> Result<WatchAction, WatchError> {
        Ok(WatchAction::CompileSaved {
            path: path.to_path_buf(),
        })
    }
}

//! Handler for configuration file changes.
//!
//! Watches settings.toml and hands a freshly loaded snapshot to the
//! controller whenever its content changes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::Settings;
use crate::watcher::{WatchAction, WatchError, WatchHandler};

pub struct ConfigFileHandler {
    /// Path to settings.toml.
    settings_path: PathBuf,
    /// Last loaded settings for diffing.
    last_settings: RwLock<Settings>,
}

impl ConfigFileHandler {
    pub fn new(settings_path: PathBuf) -> Result<Self, WatchError> {
        let settings = load(&settings_path)?;

        Ok(Self {
            settings_path,
            last_settings: RwLock::new(settings),
        })
    }

    /// The new settings if they differ from the last loaded ones.
    async fn reload(&self) -> Result<Option<Settings>, WatchError> {
        let settings = load(&self.settings_path)?;

        let mut last = self.last_settings.write().await;
        if *last == settings {
            return Ok(None);
        }
        *last = settings.clone();
        Ok(Some(settings))
    }
}

fn load(path: &Path) -> Result<Settings, WatchError> {
    Settings::load_from(path).map_err(|e| WatchError::ConfigError {
        reason: format!("{}: {e}", path.display()),
    })
}

#[async_trait]
impl WatchHandler for ConfigFileHandler {
    fn name(&self) -> &str {
        "config"
    }

    fn matches(&self, path: &Path) -> bool {
        // Only match the exact settings file
        path == self.settings_path
    }

    fn tracked_paths(&self) -> Vec<PathBuf> {
        vec![self.settings_path.clone()]
    }

    async fn on_modify(&self, _path: &Path) -> Result<WatchAction, WatchError> {
        // Small delay to ensure file write is complete
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        match self.reload().await? {
            Some(settings) => Ok(WatchAction::ReloadSettings(Box::new(settings))),
            None => Ok(WatchAction::None),
        }
    }

    async fn on_delete(&self, _path: &Path) -> Result<WatchAction, WatchError> {
        tracing::warn!(
            "[config] settings file {} was deleted, keeping the loaded settings",
            self.settings_path.display()
        );
        Ok(WatchAction::None)
    }
}

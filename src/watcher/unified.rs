//! Unified file watcher that routes events to pluggable handlers.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};

use crate::controller::{SaveOutcome, WatchController};

use super::debouncer::Debouncer;
use super::error::WatchError;
use super::handler::{WatchAction, WatchHandler};

/// Unified file watcher with pluggable handlers.
///
/// Provides a single `notify::RecommendedWatcher` that routes file events
/// to appropriate handlers based on path matching, and hands the resulting
/// actions to the [`WatchController`].
pub struct UnifiedWatcher {
    /// Registered handlers.
    handlers: Vec<Box<dyn WatchHandler>>,
    /// Shared debouncer for all file events.
    debouncer: Debouncer,
    /// Channel for receiving file events.
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    /// The underlying file watcher.
    watcher: notify::RecommendedWatcher,
    /// Controller that executes the actions.
    controller: Arc<WatchController>,
}

impl UnifiedWatcher {
    /// Create a builder for configuring the watcher.
    pub fn builder() -> UnifiedWatcherBuilder {
        UnifiedWatcherBuilder::new()
    }

    /// Start watching for file changes.
    ///
    /// This is the main event loop that:
    /// 1. Receives file events from notify
    /// 2. Debounces modification events
    /// 3. Routes events to matching handlers
    /// 4. Executes returned actions on the controller
    pub async fn watch(mut self) -> Result<(), WatchError> {
        let tracked: Vec<PathBuf> = self
            .handlers
            .iter()
            .flat_map(|handler| handler.tracked_paths())
            .collect();

        let (recursive, single) = watch_targets(&tracked);
        for dir in &recursive {
            self.watch_path(dir, RecursiveMode::Recursive)
                .map_err(|reason| WatchError::PathWatchFailed {
                    path: dir.clone(),
                    reason,
                })?;
        }
        for dir in &single {
            if let Err(reason) = self.watch_path(dir, RecursiveMode::NonRecursive) {
                // Continue - the stylesheet roots are still watched
                tracing::warn!("[watcher] failed to watch {}: {reason}", dir.display());
            }
        }

        crate::log_event!(
            "watcher",
            "started",
            "{} recursive, {} single directories",
            recursive.len(),
            single.len()
        );

        loop {
            // Periodic check for debounced events
            let timeout = sleep(Duration::from_millis(100));
            tokio::pin!(timeout);

            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(Ok(event)) => self.handle_event(event).await,
                        Some(Err(e)) => tracing::error!("[watcher] file watch error: {e}"),
                        None => {
                            crate::log_event!("watcher", "event channel closed");
                            return Ok(());
                        }
                    }
                }

                _ = &mut timeout => {
                    let ready = self.debouncer.take_ready();
                    for path in ready {
                        self.process_modification(&path).await;
                    }
                }
            }
        }
    }

    fn watch_path(&mut self, path: &Path, mode: RecursiveMode) -> Result<(), String> {
        self.watcher.watch(path, mode).map_err(|e| e.to_string())?;
        crate::debug_event!("watcher", "watching", "{}", path.display());
        Ok(())
    }

    /// Handle an incoming file event.
    async fn handle_event(&mut self, event: Event) {
        for path in event.paths {
            let matched = self.handlers.iter().any(|h| h.matches(&path));
            if !matched {
                continue;
            }

            match event.kind {
                // Editors that save through a rename produce creates
                EventKind::Modify(_) | EventKind::Create(_) => {
                    self.debouncer.record(path);
                }
                EventKind::Remove(_) => {
                    self.debouncer.remove(&path);
                    self.process_deletion(&path).await;
                }
                _ => {}
            }
        }
    }

    /// Process a debounced file modification.
    async fn process_modification(&self, path: &Path) {
        // Check if file still exists (handles rename-as-modify on macOS)
        if !path.exists() {
            self.process_deletion(path).await;
            return;
        }

        for handler in &self.handlers {
            if !handler.matches(path) {
                continue;
            }

            crate::debug_event!(handler.name(), "modified", "{}", path.display());

            match handler.on_modify(path).await {
                Ok(action) => self.execute_action(action, handler.name()).await,
                Err(e) => tracing::error!("[{}] handler error: {e}", handler.name()),
            }
        }
    }

    /// Process a file deletion.
    async fn process_deletion(&self, path: &Path) {
        for handler in &self.handlers {
            if !handler.matches(path) {
                continue;
            }

            crate::debug_event!(handler.name(), "deleted", "{}", path.display());

            match handler.on_delete(path).await {
                Ok(action) => self.execute_action(action, handler.name()).await,
                Err(e) => tracing::error!("[{}] handler error: {e}", handler.name()),
            }
        }
    }

    /// Execute an action returned by a handler.
    async fn execute_action(&self, action: WatchAction, handler_name: &str) {
        match action {
            WatchAction::CompileSaved { path } => {
                match self.controller.compile_on_save(&path).await {
                    SaveOutcome::Ignored(reason) => {
                        crate::debug_event!(handler_name, "ignored", "{reason:?}");
                    }
                    SaveOutcome::Compiled(report) | SaveOutcome::CompiledAll(report) => {
                        crate::log_event!(
                            handler_name,
                            "compiled",
                            "{} of {} units succeeded",
                            report.succeeded(),
                            report.attempted()
                        );
                    }
                }
            }

            WatchAction::ReloadSettings(settings) => {
                self.controller.reload_settings(*settings);
            }

            WatchAction::None => {
                crate::debug_event!(handler_name, "no action needed");
            }
        }
    }
}

/// Split tracked paths into directories watched recursively and parents
/// of single files. Paths already covered by a recursive directory are
/// dropped.
fn watch_targets(tracked: &[PathBuf]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut recursive: Vec<PathBuf> = tracked.iter().filter(|p| p.is_dir()).cloned().collect();
    recursive.sort();
    recursive.dedup();

    let covered = |path: &Path| recursive.iter().any(|dir| path.starts_with(dir));

    let mut single = HashSet::new();
    for path in tracked.iter().filter(|p| !p.is_dir()) {
        if let Some(parent) = path.parent() {
            if !covered(parent) {
                single.insert(parent.to_path_buf());
            }
        }
    }

    let mut single: Vec<PathBuf> = single.into_iter().collect();
    single.sort();
    (recursive, single)
}

/// Builder for constructing a UnifiedWatcher.
pub struct UnifiedWatcherBuilder {
    handlers: Vec<Box<dyn WatchHandler>>,
    controller: Option<Arc<WatchController>>,
    debounce_ms: u64,
}

impl UnifiedWatcherBuilder {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            controller: None,
            debounce_ms: 300,
        }
    }

    /// Add a handler.
    pub fn handler(mut self, handler: impl WatchHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Set the controller actions are executed on.
    pub fn controller(mut self, controller: Arc<WatchController>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Set the debounce duration in milliseconds.
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn build(self) -> Result<UnifiedWatcher, WatchError> {
        let controller = self.controller.ok_or_else(|| WatchError::InitFailed {
            reason: "Controller is required".to_string(),
        })?;

        // Create channel for events
        let (tx, rx) = mpsc::channel(100);

        // Create the notify watcher
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        Ok(UnifiedWatcher {
            handlers: self.handlers,
            debouncer: Debouncer::new(self.debounce_ms),
            event_rx: rx,
            watcher,
            controller,
        })
    }
}

impl Default for UnifiedWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_watch_targets_skip_covered_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("proj");
        let outside = temp.path().join("elsewhere");
        fs::create_dir_all(root.join(".livesass")).unwrap();
        fs::create_dir_all(&outside).unwrap();

        let tracked = vec![
            root.clone(),
            root.join(".livesass/settings.toml"),
            outside.join("settings.toml"),
        ];
        let (recursive, single) = watch_targets(&tracked);

        assert_eq!(recursive, vec![root]);
        assert_eq!(single, vec![outside]);
    }

    #[tokio::test]
    async fn test_build_requires_controller() {
        assert!(matches!(
            UnifiedWatcher::builder().build(),
            Err(WatchError::InitFailed { .. })
        ));
    }
}

//! The watch-state machine and trigger orchestration.
//!
//! [`WatchController`] decides what to compile for each trigger (compile
//! all, compile the active file, a file was saved), runs every
//! (file, format) unit of a trigger concurrently and reports the outcome
//! through the [`Host`].
//!
//! # Triggers
//!
//! ```text
//! start_watching ──> compile_all ──┐
//! compile_current(path) ───────────┼──> units in a JoinSet ──> status ──> revert
//! compile_on_save(path) ───────────┘
//! ```

mod error_log;
mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinSet;

pub use error_log::{ERROR_LOG_FILE, ErrorLog, LogEvent};
pub use status::WatchState;

use crate::config::Settings;
use crate::discovery::{self, FileQuery, FileSetResolver};
use crate::host::{Host, Notice, OutputLevel, Report, Status};
use crate::pipeline::{Pipeline, UnitOutcome, WorkspaceImportResolver};
use status::StatusReverter;

/// Why compile-current refused to run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("No active file")]
    NoActiveFile,

    #[error("Can't process partial Sass")]
    Partial,

    #[error("Not a Sass file")]
    NotStylesheet,
}

/// Why a save was not compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotWatching,
    NotStylesheet,
    /// Excluded by the discovery settings.
    NotInProject,
}

#[derive(Debug)]
pub enum SaveOutcome {
    Ignored(IgnoreReason),
    /// The saved file alone, across all formats.
    Compiled(BatchReport),
    /// A partial was saved and the whole project was recompiled.
    CompiledAll(BatchReport),
}

/// Outcome of every unit a trigger started.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Settled units, ordered by source then format.
    pub outcomes: Vec<UnitOutcome>,
    /// Units that panicked instead of settling.
    pub unhandled: Vec<String>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len() + self.unhandled.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Orchestrates compilation for one workspace.
pub struct WatchController {
    settings: RwLock<Arc<Settings>>,
    pipeline: RwLock<Pipeline>,
    host: Arc<dyn Host>,
    state: Arc<Mutex<WatchState>>,
    reverter: StatusReverter,
    error_log: ErrorLog,
}

impl WatchController {
    pub fn builder(settings: Settings) -> WatchControllerBuilder {
        WatchControllerBuilder::new(settings)
    }

    pub fn state(&self) -> WatchState {
        *self.state.lock()
    }

    pub fn is_watching(&self) -> bool {
        self.state().is_watching()
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings.read())
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    /// Swap in new settings. Triggers already running keep their snapshot.
    pub fn reload_settings(&self, settings: Settings) {
        let resolver = Arc::new(WorkspaceImportResolver::from_settings(&settings));
        {
            let mut pipeline = self.pipeline.write();
            *pipeline = pipeline.with_resolver(resolver);
        }
        *self.settings.write() = Arc::new(settings);
        crate::log_event!("controller", "settings reloaded");
    }

    /// NotWatching -> Watching, then compile everything.
    pub async fn start_watching(&self) -> Option<BatchReport> {
        {
            let mut state = self.state.lock();
            if state.is_watching() {
                drop(state);
                self.host.notify(Notice::Inform("Already watching...".to_string()));
                return None;
            }
            *state = WatchState::Watching;
        }
        crate::log_event!("controller", "watching");
        Some(self.compile_all().await)
    }

    /// Watching -> NotWatching.
    pub fn stop_watching(&self) -> bool {
        {
            let mut state = self.state.lock();
            if !state.is_watching() {
                drop(state);
                self.host.notify(Notice::Inform("Not watching...".to_string()));
                return false;
            }
            *state = WatchState::NotWatching;
        }
        crate::log_event!("controller", "stopped watching");
        self.reverter.revert_now();
        true
    }

    /// Compile every discovered file in every format.
    pub async fn compile_all(&self) -> BatchReport {
        let settings = self.settings();
        self.host.show_status(Status::Working("Compiling...".to_string()));

        let report = self.compile_project(&settings).await;
        if !report.unhandled.is_empty() {
            let files = self.project_files(&settings).await;
            self.log_unhandled(
                "Unhandled error while compiling all files",
                &report.unhandled,
                json!({ "files": paths_json(&files) }),
            );
        }

        self.finish(&report, &settings);
        report
    }

    /// Compile the file open in the editor, if it can be compiled on its own.
    pub async fn compile_current(&self, active: Option<&Path>) -> Result<BatchReport, Rejection> {
        let settings = self.settings();

        let Some(path) = active else {
            self.reject(
                Rejection::NoActiveFile,
                "No file open",
                "No file is open, ensure a file is open in the editor window",
                &settings,
            );
            self.host.show_report(
                Report::new(OutputLevel::Information, "No active file")
                    .line("There isn't an active editor window to process"),
            );
            return Err(Rejection::NoActiveFile);
        };

        if !discovery::is_stylesheet(path, false) {
            if discovery::is_stylesheet(path, true) {
                self.reject(
                    Rejection::Partial,
                    "Can't process partial Sass",
                    "The file is a partial Sass file, these aren't processed singly",
                    &settings,
                );
                return Err(Rejection::Partial);
            }
            self.reject(
                Rejection::NotStylesheet,
                "Not a Sass file",
                "The file isn't a Sass file",
                &settings,
            );
            return Err(Rejection::NotStylesheet);
        }

        self.host
            .show_status(Status::Working("Processing single file...".to_string()));
        self.host.show_report(
            Report::new(OutputLevel::Information, "Processing the current file")
                .line(format!("Path: {}", path.display())),
        );

        let report = self.run_units(vec![path.to_path_buf()], &settings).await;
        if !report.unhandled.is_empty() {
            self.log_unhandled(
                "Unhandled error while compiling the active file",
                &report.unhandled,
                json!({ "file": path.display().to_string() }),
            );
        }

        self.finish(&report, &settings);
        Ok(report)
    }

    /// React to a saved file while watching.
    pub async fn compile_on_save(&self, path: &Path) -> SaveOutcome {
        if !self.is_watching() {
            return SaveOutcome::Ignored(IgnoreReason::NotWatching);
        }
        if !discovery::is_stylesheet(path, true) {
            return SaveOutcome::Ignored(IgnoreReason::NotStylesheet);
        }

        let settings = self.settings();
        let files = FileSetResolver::from_settings(&settings);
        if !files
            .contains(path, FileQuery::Membership, self.host.as_ref())
            .await
        {
            crate::debug_event!("controller", "not in project", "{}", path.display());
            return SaveOutcome::Ignored(IgnoreReason::NotInProject);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.host
            .show_report(Report::new(OutputLevel::Information, "Change detected...").line(name));

        let partial = discovery::is_partial(path);
        let report = if partial {
            self.compile_project(&settings).await
        } else {
            self.run_units(vec![path.to_path_buf()], &settings).await
        };

        if !report.unhandled.is_empty() {
            let all_files = self.project_files(&settings).await;
            self.log_unhandled(
                "Unhandled error while compiling the saved changes",
                &report.unhandled,
                json!({
                    "triggering_file": path.display().to_string(),
                    "all_files": paths_json(&all_files),
                }),
            );
        }

        self.finish(&report, &settings);
        if partial {
            SaveOutcome::CompiledAll(report)
        } else {
            SaveOutcome::Compiled(report)
        }
    }

    /// Files compile-all would compile, without compiling them.
    pub async fn project_files(&self, settings: &Settings) -> Vec<PathBuf> {
        FileSetResolver::from_settings(settings)
            .resolve(FileQuery::Compilable, self.host.as_ref())
            .await
    }

    async fn compile_project(&self, settings: &Arc<Settings>) -> BatchReport {
        let files = self.project_files(settings).await;
        self.host.show_report(
            Report::new(OutputLevel::Information, "Compiling Sass/Scss Files: ")
                .with_body(files.iter().map(|f| f.display().to_string())),
        );
        crate::log_event!("controller", "compile-all", "{} files", files.len());
        self.run_units(files, settings).await
    }

    /// Run every (file, format) unit concurrently and wait for all of them.
    async fn run_units(&self, files: Vec<PathBuf>, settings: &Arc<Settings>) -> BatchReport {
        let pipeline = self.pipeline.read().clone();
        let mut units = JoinSet::new();

        for file in &files {
            for (index, format) in settings.formats.iter().enumerate() {
                let pipeline = pipeline.clone();
                let host = Arc::clone(&self.host);
                let settings = Arc::clone(settings);
                let file = file.clone();
                let format = format.clone();

                units.spawn(async move {
                    pipeline
                        .run_unit(&file, index, &format, &settings, host.as_ref())
                        .await
                });
            }
        }

        let mut report = BatchReport::default();
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => report.unhandled.push(e.to_string()),
            }
        }
        report.outcomes.sort_by(|a, b| {
            a.source
                .cmp(&b.source)
                .then(a.format_index.cmp(&b.format_index))
        });

        crate::debug_event!(
            "controller",
            "batch settled",
            "{} of {} units succeeded",
            report.succeeded(),
            report.attempted()
        );
        report
    }

    /// Show the batch result, then revert to the watch state.
    fn finish(&self, report: &BatchReport, settings: &Settings) {
        if report.attempted() == 0 {
            self.reverter.revert_now();
        } else if report.is_success() {
            self.host.show_status(Status::Success);
            self.reverter.revert_now();
        } else {
            self.host.show_status(Status::Error);
            self.reverter
                .revert_after(Duration::from_millis(settings.status_revert_ms));
        }
    }

    fn reject(&self, rejection: Rejection, text: &str, tooltip: &str, settings: &Settings) {
        crate::debug_event!("controller", "compile-current rejected", "{rejection}");
        self.host.show_status(Status::Message {
            text: text.to_string(),
            tooltip: tooltip.to_string(),
            level: OutputLevel::Warning,
        });
        self.reverter
            .revert_after(Duration::from_millis(settings.status_revert_ms));
    }

    fn log_unhandled(&self, message: &str, errors: &[String], context: serde_json::Value) {
        let full = format!("{message}. Error message: {}", errors.join("; "));
        tracing::error!("[controller] {full}");

        let mut context = context;
        if let Some(object) = context.as_object_mut() {
            object.insert("error".to_string(), json!(errors));
        }
        if let Err(e) = self.error_log.append(&LogEvent::new(&full, context)) {
            tracing::warn!(
                "[controller] could not write {}: {e}",
                self.error_log.path().display()
            );
        }

        self.host.notify(Notice::Alert(full));
    }
}

fn paths_json(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

/// Builder for [`WatchController`].
pub struct WatchControllerBuilder {
    settings: Settings,
    host: Option<Arc<dyn Host>>,
    pipeline: Option<Pipeline>,
    error_log: Option<PathBuf>,
}

impl WatchControllerBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            host: None,
            pipeline: None,
            error_log: None,
        }
    }

    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    /// Use these engines instead of grass and lightningcss. The import
    /// resolver is still derived from the settings.
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Set where unhandled errors are logged.
    pub fn error_log(mut self, path: PathBuf) -> Self {
        self.error_log = Some(path);
        self
    }

    pub fn build(self) -> Result<WatchController, ControllerError> {
        let host = self.host.ok_or(ControllerError::MissingHost)?;

        let resolver = Arc::new(WorkspaceImportResolver::from_settings(&self.settings));
        let pipeline = match self.pipeline {
            Some(pipeline) => pipeline.with_resolver(resolver),
            None => Pipeline::with_defaults(resolver),
        };

        let error_log = ErrorLog::new(
            self.error_log
                .unwrap_or_else(|| self.settings.state_dir().join(ERROR_LOG_FILE)),
        );

        let state = WatchState::from_flag(self.settings.watch_on_launch);
        let state = Arc::new(Mutex::new(state));
        host.show_status(state.lock().status());

        Ok(WatchController {
            settings: RwLock::new(Arc::new(self.settings)),
            pipeline: RwLock::new(pipeline),
            reverter: StatusReverter::new(Arc::clone(&host), Arc::clone(&state)),
            host,
            state,
            error_log,
        })
    }
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("A host is required")]
    MissingHost,
}

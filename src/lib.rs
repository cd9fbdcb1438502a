#[macro_use]
pub mod logging;

pub mod cli;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod discovery;
pub mod host;
pub mod pipeline;
pub mod watcher;

pub use config::{FormatConfig, Settings};
pub use controller::{BatchReport, Rejection, SaveOutcome, WatchController, WatchState};
pub use diagnostics::{Diagnostic, Severity};
pub use discovery::{FileQuery, FileSetResolver};
pub use host::{ConsoleHost, Host, MemoryHost, Notice, OutputLevel, Report, Status};
pub use pipeline::{Pipeline, UnitOutcome, UnitStatus};
pub use watcher::{UnifiedWatcher, WatchError};

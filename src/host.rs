//! The narrow interface the pipeline uses to talk to its host.
//!
//! The controller never prints. It hands reports (the output window), status
//! changes (the status indicator) and notices (popups) to a [`Host`]. The CLI
//! plugs in [`ConsoleHost`]; tests use [`MemoryHost`] to observe what would
//! have been shown.

use std::fmt;
use std::io::Write;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

const RULE: &str = "--------------------";

/// Verbosity of a report, lowest first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OutputLevel {
    Trace,
    Debug,
    #[default]
    Information,
    Warning,
    Error,
    Critical,
}

/// One entry of the output window: an optional headline and body lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub level: OutputLevel,
    pub headline: Option<String>,
    pub body: Vec<String>,
}

impl Report {
    pub fn new(level: OutputLevel, headline: impl Into<String>) -> Self {
        Self {
            level,
            headline: Some(headline.into()),
            body: Vec::new(),
        }
    }

    pub fn with_body<I, S>(mut self, body: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body.extend(body.into_iter().map(Into::into));
        self
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.body.push(line.into());
        self
    }
}

/// State of the status indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Watching,
    NotWatching,
    Working(String),
    Success,
    Error,
    /// A one-off message, e.g. why compile-current refused a file.
    Message {
        text: String,
        tooltip: String,
        level: OutputLevel,
    },
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Watching => write!(f, "Watching..."),
            Status::NotWatching => write!(f, "Watch Sass"),
            Status::Working(text) => write!(f, "{text}"),
            Status::Success => write!(f, "Success"),
            Status::Error => write!(f, "Error"),
            Status::Message { text, .. } => write!(f, "{text}"),
        }
    }
}

/// Popup notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Inform(String),
    Warn(String),
    /// Blocking alert for unhandled errors.
    Alert(String),
}

/// Everything the pipeline needs from its host UI.
pub trait Host: Send + Sync {
    /// Append a report to the output window.
    fn show_report(&self, report: Report);

    /// Update the status indicator.
    fn show_status(&self, status: Status);

    /// Show a popup.
    fn notify(&self, notice: Notice);
}

/// Terminal host: reports go to stderr, the status indicator to a single
/// prefixed line.
pub struct ConsoleHost {
    min_level: OutputLevel,
    show_output_window: bool,
    colors: bool,
}

impl ConsoleHost {
    pub fn new(min_level: OutputLevel, show_output_window: bool) -> Self {
        Self {
            min_level,
            show_output_window,
            colors: is_terminal::is_terminal(std::io::stderr()),
        }
    }

    /// Whether a report at `level` is written out.
    pub fn is_visible(&self, level: OutputLevel) -> bool {
        level == OutputLevel::Critical
            || (level >= self.min_level
                && (self.show_output_window || level >= OutputLevel::Warning))
    }

    fn styled_headline(&self, level: OutputLevel, headline: &str) -> String {
        if !self.colors {
            return headline.to_string();
        }
        let styled = console::style(headline);
        match level {
            OutputLevel::Warning => styled.yellow().bold().to_string(),
            OutputLevel::Error | OutputLevel::Critical => styled.red().bold().to_string(),
            OutputLevel::Trace | OutputLevel::Debug => styled.dim().to_string(),
            OutputLevel::Information => styled.cyan().to_string(),
        }
    }
}

impl Host for ConsoleHost {
    fn show_report(&self, report: Report) {
        tracing::trace!(
            "[host] {:?} {} {}",
            report.level,
            report.headline.as_deref().unwrap_or(""),
            report.body.join(" | ")
        );

        if !self.is_visible(report.level) {
            return;
        }

        let stderr = std::io::stderr();
        let mut out = stderr.lock();
        if let Some(headline) = &report.headline {
            let _ = writeln!(out, "{}", self.styled_headline(report.level, headline));
        }
        for line in &report.body {
            let _ = writeln!(out, "{line}");
        }
        let _ = writeln!(out, "{RULE}");
    }

    fn show_status(&self, status: Status) {
        tracing::debug!("[host] status: {status}");
        if let Status::Message { tooltip, .. } = &status {
            eprintln!("[status] {status} ({tooltip})");
        } else {
            eprintln!("[status] {status}");
        }
    }

    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Inform(message) => eprintln!("{message}"),
            Notice::Warn(message) => {
                if self.colors {
                    eprintln!("{}", console::style(message).yellow());
                } else {
                    eprintln!("Warning: {message}");
                }
            }
            Notice::Alert(message) => {
                if self.colors {
                    eprintln!("{}", console::style(message).red().bold());
                } else {
                    eprintln!("Error: {message}");
                }
            }
        }
    }
}

/// Host that records everything it is given.
#[derive(Default)]
pub struct MemoryHost {
    reports: Mutex<Vec<Report>>,
    statuses: Mutex<Vec<Status>>,
    notices: Mutex<Vec<Notice>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.statuses.lock().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn last_status(&self) -> Option<Status> {
        self.statuses.lock().last().cloned()
    }

    /// Reports whose headline equals `headline`.
    pub fn reports_titled(&self, headline: &str) -> Vec<Report> {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.headline.as_deref() == Some(headline))
            .cloned()
            .collect()
    }
}

impl Host for MemoryHost {
    fn show_report(&self, report: Report) {
        self.reports.lock().push(report);
    }

    fn show_status(&self, status: Status) {
        self.statuses.lock().push(status);
    }

    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_visibility_follows_level_and_window_flag() {
        let host = ConsoleHost::new(OutputLevel::Information, true);
        assert!(!host.is_visible(OutputLevel::Debug));
        assert!(host.is_visible(OutputLevel::Information));

        let hidden = ConsoleHost::new(OutputLevel::Information, false);
        assert!(!hidden.is_visible(OutputLevel::Information));
        assert!(hidden.is_visible(OutputLevel::Warning));

        let quiet = ConsoleHost::new(OutputLevel::Critical, true);
        assert!(!quiet.is_visible(OutputLevel::Error));
        assert!(quiet.is_visible(OutputLevel::Critical));
    }

    #[test]
    fn test_memory_host_records() {
        let host = MemoryHost::new();
        host.show_report(Report::new(OutputLevel::Warning, "Warning:").line("x"));
        host.show_status(Status::Watching);
        host.notify(Notice::Inform("hi".into()));

        assert_eq!(host.reports_titled("Warning:").len(), 1);
        assert_eq!(host.last_status(), Some(Status::Watching));
        assert_eq!(host.notices(), vec![Notice::Inform("hi".into())]);
    }
}

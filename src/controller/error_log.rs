//! Log of unhandled errors.
//!
//! Each entry is one JSON line in `.livesass/error-log.jsonl`.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ERROR_LOG_FILE: &str = "error-log.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub created_at: DateTime<Utc>,
    pub message: String,
    pub context: Value,
}

impl LogEvent {
    pub fn new(message: impl Into<String>, context: Value) -> Self {
        Self {
            created_at: Utc::now(),
            message: message.into(),
            context,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, event: &LogEvent) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(event)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }

    /// Every readable entry, oldest first. Malformed lines are skipped.
    pub fn read_all(&self) -> std::io::Result<Vec<LogEvent>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read() {
        let temp = TempDir::new().unwrap();
        let log = ErrorLog::new(temp.path().join(".livesass").join(ERROR_LOG_FILE));

        assert!(log.read_all().unwrap().is_empty());

        log.append(&LogEvent::new("first", json!({"file": "a.scss"})))
            .unwrap();
        log.append(&LogEvent::new("second", json!(null))).unwrap();

        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "first");
        assert_eq!(events[0].context["file"], "a.scss");
        assert!(events[0].created_at <= events[1].created_at);
    }
}

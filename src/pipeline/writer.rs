//! Artifact persistence.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A file to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub content: String,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Result of writing one artifact.
#[derive(Debug)]
pub struct WriteOutcome {
    pub path: PathBuf,
    pub result: Result<(), WriteError>,
}

impl WriteOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Create `dir` and its parents. Succeeds if it already exists.
pub async fn ensure_dir(dir: &Path) -> Result<(), WriteError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| WriteError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })
}

pub async fn write(path: &Path, content: &str) -> Result<(), WriteError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|source| WriteError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Write the CSS and, if present, its map concurrently. One failing does not
/// stop the other.
pub async fn write_outputs(css: &Artifact, map: Option<&Artifact>) -> Vec<WriteOutcome> {
    let css_write = write(&css.path, &css.content);
    let map_write = async {
        match map {
            Some(map) => Some(write(&map.path, &map.content).await),
            None => None,
        }
    };

    let (css_result, map_result) = tokio::join!(css_write, map_write);

    let mut outcomes = vec![WriteOutcome {
        path: css.path.clone(),
        result: css_result,
    }];
    if let (Some(map), Some(result)) = (map, map_result) {
        outcomes.push(WriteOutcome {
            path: map.path.clone(),
            result,
        });
    }
    outcomes
}

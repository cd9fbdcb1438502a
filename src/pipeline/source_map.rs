//! Source map v3 documents.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources_content: Vec<Option<String>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    /// A map that lists its sources but carries no mappings.
    pub fn with_sources(sources: Vec<String>) -> Self {
        Self {
            version: 3,
            file: None,
            source_root: None,
            sources,
            sources_content: Vec::new(),
            names: Vec::new(),
            mappings: String::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Rewrite `sources` relative to the directory of the CSS file.
    ///
    /// Entries may be absolute paths or `file://` URLs; anything else is left
    /// as it is.
    pub fn relativize_sources(&mut self, css_path: &Path) {
        let Some(css_dir) = css_path.parent() else {
            return;
        };

        for source in &mut self.sources {
            let path = match source.strip_prefix("file://") {
                Some(rest) => PathBuf::from(rest),
                None => PathBuf::from(&*source),
            };
            if path.is_absolute() {
                *source = to_slash(&relative_path(css_dir, &path));
            }
        }
        self.source_root = None;
    }
}

/// Path of `target` as seen from the directory `base`.
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = target.components().collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

//! Output path derivation.
//!
//! Decides where the CSS and map for a (source, format) pair go. Path
//! computation is pure; the directory the plan needs is returned in
//! [`OutputPlan::ensure_dir`] and created by the caller.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::config::FormatConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("A workspace root is required to resolve save path '{setting}'")]
    NoWorkspaceRoot { setting: String },

    #[error("{path} is not inside the workspace root {root}")]
    OutsideWorkspace { path: PathBuf, root: PathBuf },

    #[error("{path} has no file name")]
    NoFileName { path: PathBuf },
}

/// Destination of one (source, format) unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    pub css_path: PathBuf,
    pub map_path: PathBuf,
    /// Directory to create before writing, for relocated outputs.
    pub ensure_dir: Option<PathBuf>,
}

/// Compute the output paths for `source` under `format`.
pub fn plan(
    source: &Path,
    format: &FormatConfig,
    workspace_root: Option<&Path>,
) -> Result<OutputPlan, PlanError> {
    let source_dir = source.parent().unwrap_or(Path::new(""));
    let file_name = source.file_name().ok_or_else(|| PlanError::NoFileName {
        path: source.to_path_buf(),
    })?;

    let relocated = match format.save_path.as_deref() {
        Some(save_path) => Some(save_path_dir(save_path, source_dir, workspace_root)?),
        None => match format.save_path_replace_segments_with.as_deref() {
            Some(replacement) if !format.save_path_segment_keys.is_empty() => {
                let root = workspace_root.ok_or_else(|| PlanError::NoWorkspaceRoot {
                    setting: format!(
                        "[{}] -> {replacement}",
                        format.save_path_segment_keys.join(", ")
                    ),
                })?;
                Some(replace_segments(
                    source_dir,
                    root,
                    &format.save_path_segment_keys,
                    replacement,
                )?)
            }
            _ => None,
        },
    };

    let target_dir = relocated.clone().unwrap_or_else(|| source_dir.to_path_buf());
    let css_path = with_extension_name(&target_dir.join(file_name), &format.extension_name);
    let map_path = map_path_for(&css_path);

    Ok(OutputPlan {
        css_path,
        map_path,
        ensure_dir: relocated,
    })
}

/// `<css>.map`, whether or not a map is written.
pub fn map_path_for(css_path: &Path) -> PathBuf {
    let mut map = css_path.as_os_str().to_owned();
    map.push(".map");
    PathBuf::from(map)
}

fn save_path_dir(
    save_path: &str,
    source_dir: &Path,
    workspace_root: Option<&Path>,
) -> Result<PathBuf, PlanError> {
    if let Some(rest) = save_path.strip_prefix('~') {
        return Ok(normalize(&source_dir.join(trim_separators(rest))));
    }

    let root = workspace_root.ok_or_else(|| PlanError::NoWorkspaceRoot {
        setting: save_path.to_string(),
    })?;
    Ok(normalize(&root.join(trim_separators(save_path))))
}

fn trim_separators(path: &str) -> &str {
    path.trim_start_matches(['/', '\\'])
}

/// Rebuild `source_dir` under `root`, swapping every segment that equals one
/// of `keys` for `replacement`.
fn replace_segments(
    source_dir: &Path,
    root: &Path,
    keys: &[String],
    replacement: &str,
) -> Result<PathBuf, PlanError> {
    let relative = source_dir
        .strip_prefix(root)
        .map_err(|_| PlanError::OutsideWorkspace {
            path: source_dir.to_path_buf(),
            root: root.to_path_buf(),
        })?;

    let mut target = root.to_path_buf();
    for segment in relative.components() {
        let segment = segment.as_os_str();
        if keys.iter().any(|key| segment == key.as_str()) {
            target.push(replacement);
        } else {
            target.push(segment);
        }
    }
    Ok(target)
}

/// Replace everything after the last `.` of the file name.
fn with_extension_name(path: &Path, extension_name: &str) -> PathBuf {
    let extension_name = if extension_name.is_empty() {
        ".css"
    } else {
        extension_name
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match file_name.rfind('.') {
        Some(0) | None => file_name.as_str(),
        Some(dot) => &file_name[..dot],
    };
    path.with_file_name(format!("{stem}{extension_name}"))
}

/// Collapse `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> FormatConfig {
        FormatConfig::default()
    }

    #[test]
    fn test_colocated_output() {
        let plan = plan(Path::new("/proj/a.scss"), &format(), None).unwrap();
        assert_eq!(plan.css_path, PathBuf::from("/proj/a.css"));
        assert_eq!(plan.map_path, PathBuf::from("/proj/a.css.map"));
        assert_eq!(plan.ensure_dir, None);
    }

    #[test]
    fn test_tilde_save_path_is_relative_to_source() {
        let mut format = format();
        format.save_path = Some("~/../css".to_string());

        let plan = plan(Path::new("/proj/styles/a.scss"), &format, None).unwrap();
        assert_eq!(plan.css_path, PathBuf::from("/proj/css/a.css"));
        assert_eq!(plan.ensure_dir, Some(PathBuf::from("/proj/css")));

        format.save_path = Some("~out".to_string());
        let plan = super::plan(Path::new("/proj/styles/a.scss"), &format, None).unwrap();
        assert_eq!(plan.css_path, PathBuf::from("/proj/styles/out/a.css"));
    }

    #[test]
    fn test_save_path_is_relative_to_workspace() {
        let mut format = format();
        format.save_path = Some("/dist/css".to_string());
        format.extension_name = ".min.css".to_string();

        let plan = plan(
            Path::new("/proj/src/deep/theme.sass"),
            &format,
            Some(Path::new("/proj")),
        )
        .unwrap();
        assert_eq!(plan.css_path, PathBuf::from("/proj/dist/css/theme.min.css"));
        assert_eq!(plan.map_path, PathBuf::from("/proj/dist/css/theme.min.css.map"));
    }

    #[test]
    fn test_save_path_without_workspace_is_an_error() {
        let mut format = format();
        format.save_path = Some("dist".to_string());

        let err = plan(Path::new("/proj/a.scss"), &format, None).unwrap_err();
        assert!(matches!(err, PlanError::NoWorkspaceRoot { .. }));
    }

    #[test]
    fn test_segment_replacement_is_exact_match() {
        let mut format = format();
        format.save_path_segment_keys = vec!["scss".to_string(), "sass".to_string()];
        format.save_path_replace_segments_with = Some("css".to_string());

        let plan = plan(
            Path::new("/proj/assets/scss/scss-extra/sass/site.scss"),
            &format,
            Some(Path::new("/proj")),
        )
        .unwrap();
        assert_eq!(
            plan.css_path,
            PathBuf::from("/proj/assets/css/scss-extra/css/site.css")
        );
        assert_eq!(
            plan.ensure_dir,
            Some(PathBuf::from("/proj/assets/css/scss-extra/css"))
        );
    }

    #[test]
    fn test_segment_replacement_needs_workspace() {
        let mut format = format();
        format.save_path_segment_keys = vec!["scss".to_string()];
        format.save_path_replace_segments_with = Some("css".to_string());

        let err = plan(Path::new("/proj/scss/a.scss"), &format, None).unwrap_err();
        assert!(matches!(err, PlanError::NoWorkspaceRoot { .. }));
    }

    #[test]
    fn test_save_path_wins_over_segment_replacement() {
        let mut format = format();
        format.save_path = Some("~".to_string());
        format.save_path_segment_keys = vec!["scss".to_string()];
        format.save_path_replace_segments_with = Some("css".to_string());

        let plan = plan(Path::new("/proj/scss/a.scss"), &format, Some(Path::new("/proj"))).unwrap();
        assert_eq!(plan.css_path, PathBuf::from("/proj/scss/a.css"));
    }

    #[test]
    fn test_replacement_without_keys_is_colocated() {
        let mut format = format();
        format.save_path_replace_segments_with = Some("css".to_string());

        let plan = plan(Path::new("/proj/scss/a.scss"), &format, Some(Path::new("/proj"))).unwrap();
        assert_eq!(plan.css_path, PathBuf::from("/proj/scss/a.css"));
        assert_eq!(plan.ensure_dir, None);
    }

    #[test]
    fn test_only_last_extension_is_replaced() {
        let plan = plan(Path::new("/proj/a.theme.scss"), &format(), None).unwrap();
        assert_eq!(plan.css_path, PathBuf::from("/proj/a.theme.css"));
    }

    #[test]
    fn test_map_path_appends_suffix() {
        assert_eq!(
            map_path_for(Path::new("/x/y.min.css")),
            PathBuf::from("/x/y.min.css.map")
        );
    }
}

//! The per-unit compile pipeline.
//!
//! A unit is one (source file, format) pair. [`Pipeline::run_unit`] plans the
//! output paths, compiles, optionally prefixes, applies whitespace options
//! and writes the artifacts, reporting each failure to the host. Units never
//! fail each other: every failure ends only the unit it happened in.

pub mod compile;
pub mod planner;
pub mod prefix;
pub mod resolver;
pub mod source_map;
pub mod whitespace;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use compile::{
    CompileEngine, CompileError, CompileRequest, CompileResult, CompilerOutput, GrassCompiler,
    StylesheetCompiler,
};
pub use planner::{OutputPlan, PlanError, map_path_for, plan};
pub use prefix::{
    BrowserTargets, LightningPrefixer, PostProcessor, PrefixEngine, PrefixError, PrefixRequest,
    Prefixed,
};
pub use resolver::{ImportResolver, WorkspaceImportResolver};
pub use source_map::SourceMap;
pub use writer::{Artifact, WriteError, WriteOutcome};

use crate::config::{FormatConfig, OutputStyle, Settings};
use crate::host::{Host, OutputLevel, Report};

/// How a unit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    /// Every artifact was written.
    Written,
    PlanFailed,
    CompileFailed,
    PrefixFailed,
    /// Compiled, but at least one artifact could not be written.
    WriteFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub source: PathBuf,
    pub format_index: usize,
    pub css_path: Option<PathBuf>,
    pub status: UnitStatus,
}

impl UnitOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == UnitStatus::Written
    }
}

/// Compile engine and post-processor shared by every unit.
#[derive(Debug, Clone)]
pub struct Pipeline {
    engine: CompileEngine,
    post: PostProcessor,
}

impl Pipeline {
    pub fn new(engine: CompileEngine, post: PostProcessor) -> Self {
        Self { engine, post }
    }

    /// grass for compilation, lightningcss for prefixing.
    pub fn with_defaults(resolver: Arc<dyn ImportResolver>) -> Self {
        Self::new(
            CompileEngine::new(Arc::new(GrassCompiler), resolver),
            PostProcessor::new(Arc::new(LightningPrefixer::new())),
        )
    }

    /// Same engines, different import resolver.
    pub fn with_resolver(&self, resolver: Arc<dyn ImportResolver>) -> Self {
        Self {
            engine: self.engine.with_resolver(resolver),
            post: self.post.clone(),
        }
    }

    pub async fn run_unit(
        &self,
        source: &Path,
        format_index: usize,
        format: &FormatConfig,
        settings: &Settings,
        host: &dyn Host,
    ) -> UnitOutcome {
        let outcome = |css_path: Option<PathBuf>, status| UnitOutcome {
            source: source.to_path_buf(),
            format_index,
            css_path,
            status,
        };

        let plan = match plan(source, format, settings.workspace_root.as_deref()) {
            Ok(plan) => plan,
            Err(e) => {
                host.show_report(Report::new(OutputLevel::Error, "Error:").line(e.to_string()));
                return outcome(None, UnitStatus::PlanFailed);
            }
        };

        if let Some(dir) = &plan.ensure_dir {
            if let Err(e) = writer::ensure_dir(dir).await {
                report_write_error(&e, host);
                return outcome(Some(plan.css_path), UnitStatus::WriteFailed);
            }
        }

        let request = CompileRequest {
            source_path: source.to_path_buf(),
            target_css_path: plan.css_path.clone(),
            target_map_path: plan.map_path.clone(),
            format: format.clone(),
        };

        let (mut css, mut map) = match self.engine.compile_one(&request, host).await {
            CompileResult::Compiled { css, map } => (css, map),
            CompileResult::Failed(diagnostic) => {
                host.show_report(
                    Report::new(OutputLevel::Error, "Compilation Error")
                        .with_body(diagnostic.report_lines()),
                );
                return outcome(Some(plan.css_path), UnitStatus::CompileFailed);
            }
        };

        if let Some(targets) = BrowserTargets::from_setting(&settings.autoprefix) {
            let prefix_request = PrefixRequest {
                css,
                source_map: map,
                save_path: plan.css_path.clone(),
                targets,
                generate_map: format.generate_map,
                minify: format.style == OutputStyle::Compressed,
            };
            match self.post.prefix(prefix_request, host).await {
                Ok(prefixed) => {
                    css = prefixed.css;
                    map = prefixed.map;
                }
                Err(e) => {
                    host.show_report(
                        Report::new(OutputLevel::Error, "Autoprefix error").line(e.to_string()),
                    );
                    return outcome(Some(plan.css_path), UnitStatus::PrefixFailed);
                }
            }
        }

        let mut css = whitespace::apply(&css, format);
        let map_artifact = match (format.generate_map, map) {
            (true, Some(map)) => match map.to_json() {
                Ok(json) => {
                    append_map_comment(&mut css, &plan.css_path, format);
                    Some(Artifact::new(&plan.map_path, json))
                }
                Err(e) => {
                    tracing::warn!("[pipeline] could not serialize source map: {e}");
                    None
                }
            },
            _ => None,
        };

        let css_artifact = Artifact::new(&plan.css_path, css);
        let outcomes = writer::write_outputs(&css_artifact, map_artifact.as_ref()).await;
        report_written(&outcomes, host);

        let status = if outcomes.iter().all(WriteOutcome::is_ok) {
            UnitStatus::Written
        } else {
            UnitStatus::WriteFailed
        };
        outcome(Some(plan.css_path), status)
    }
}

/// `/*# sourceMappingURL=<css name>.map */` on its own line.
fn append_map_comment(css: &mut String, css_path: &Path, format: &FormatConfig) {
    let name = css_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let linefeed = format.linefeed.as_str();
    if !css.is_empty() && !css.ends_with(linefeed) {
        css.push_str(linefeed);
    }
    css.push_str(&format!("/*# sourceMappingURL={name}.map */"));
}

fn report_written(outcomes: &[WriteOutcome], host: &dyn Host) {
    let written: Vec<String> = outcomes
        .iter()
        .filter(|o| o.is_ok())
        .map(|o| o.path.display().to_string())
        .collect();
    if !written.is_empty() {
        host.show_report(Report::new(OutputLevel::Information, "Generated :").with_body(written));
    }

    for outcome in outcomes {
        if let Err(e) = &outcome.result {
            report_write_error(e, host);
        }
    }
}

fn report_write_error(error: &WriteError, host: &dyn Host) {
    tracing::error!("[pipeline] {error}");
    let (path, source) = match error {
        WriteError::CreateDir { path, source } | WriteError::Write { path, source } => {
            (path, source)
        }
    };
    host.show_report(
        Report::new(OutputLevel::Error, "Error:")
            .line(format!("{:?}", source.kind()))
            .line(path.display().to_string())
            .line(error.to_string()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::pipeline::resolver::NoopResolver;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct FixedCompiler;

    impl StylesheetCompiler for FixedCompiler {
        fn compile(
            &self,
            request: &CompileRequest,
            _resolver: &dyn ImportResolver,
        ) -> Result<CompilerOutput, CompileError> {
            Ok(CompilerOutput {
                css: "a {\n  b: c;\n}\n".to_string(),
                source_map: Some(SourceMap::with_sources(vec![
                    request.source_path.to_string_lossy().into_owned(),
                ])),
                warnings: Vec::new(),
                debug: Vec::new(),
            })
        }
    }

    #[derive(Debug)]
    struct RejectingPrefixer;

    impl PrefixEngine for RejectingPrefixer {
        fn process(&self, _request: &PrefixRequest) -> Result<prefix::EngineOutput, PrefixError> {
            Err(PrefixError::Parse("bad css".to_string()))
        }
    }

    fn pipeline(prefixer: impl PrefixEngine + 'static) -> Pipeline {
        Pipeline::new(
            CompileEngine::new(Arc::new(FixedCompiler), Arc::new(NoopResolver)),
            PostProcessor::new(Arc::new(prefixer)),
        )
    }

    #[tokio::test]
    async fn test_unit_writes_css_map_and_comment() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("site.scss");
        fs::write(&source, "").unwrap();

        let host = MemoryHost::new();
        let settings = Settings::default();
        let format = FormatConfig::default();

        let outcome = pipeline(RejectingPrefixer)
            .run_unit(&source, 0, &format, &settings, &host)
            .await;

        assert!(outcome.succeeded());
        let css = fs::read_to_string(temp.path().join("site.css")).unwrap();
        assert_eq!(css, "a {\n  b: c;\n}\n/*# sourceMappingURL=site.css.map */");
        let map = fs::read_to_string(temp.path().join("site.css.map")).unwrap();
        let map = SourceMap::from_json(&map).unwrap();
        assert_eq!(map.sources, vec!["site.scss"]);
        assert_eq!(host.reports_titled("Generated :")[0].body.len(), 2);
    }

    #[tokio::test]
    async fn test_prefix_failure_skips_write() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("site.scss");
        fs::write(&source, "").unwrap();

        let host = MemoryHost::new();
        let settings = Settings {
            autoprefix: crate::config::Autoprefix::Browsers(vec!["> 1%".to_string()]),
            ..Settings::default()
        };

        let outcome = pipeline(RejectingPrefixer)
            .run_unit(&source, 0, &FormatConfig::default(), &settings, &host)
            .await;

        assert_eq!(outcome.status, UnitStatus::PrefixFailed);
        assert!(!temp.path().join("site.css").exists());
        assert_eq!(host.reports_titled("Autoprefix error").len(), 1);
    }

    #[tokio::test]
    async fn test_plan_failure_is_reported() {
        let host = MemoryHost::new();
        let format = FormatConfig {
            save_path: Some("dist".to_string()),
            ..FormatConfig::default()
        };

        let outcome = pipeline(RejectingPrefixer)
            .run_unit(Path::new("/nowhere/a.scss"), 1, &format, &Settings::default(), &host)
            .await;

        assert_eq!(outcome.status, UnitStatus::PlanFailed);
        assert_eq!(outcome.format_index, 1);
        assert_eq!(host.reports_titled("Error:").len(), 1);
    }

    #[tokio::test]
    async fn test_no_map_means_no_comment() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("site.scss");
        fs::write(&source, "").unwrap();

        let host = MemoryHost::new();
        let format = FormatConfig {
            generate_map: false,
            save_path: Some("~out".to_string()),
            ..FormatConfig::default()
        };

        let outcome = pipeline(RejectingPrefixer)
            .run_unit(&source, 0, &format, &Settings::default(), &host)
            .await;

        assert!(outcome.succeeded());
        let css = fs::read_to_string(temp.path().join("out/site.css")).unwrap();
        assert!(!css.contains("sourceMappingURL"));
        assert!(!temp.path().join("out/site.css.map").exists());
    }
}

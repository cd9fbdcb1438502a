//! Vendor-prefix post-processing.
//!
//! [`PostProcessor`] runs a [`PrefixEngine`] over compiled CSS, merges source
//! maps and classifies the engine's warnings for the host. The default
//! engine is [`LightningPrefixer`].
//!
//! Resolving the default browser query reads the project's browserslist
//! configuration, and the result is cached process-wide. Calls using the
//! default query switch that cache off for their duration, so edits to the
//! configuration are picked up; the switch is shared and every user of it
//! goes through one async lock.

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, RwLock};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::MutexGuard;

use crate::config::Autoprefix;
use crate::diagnostics::Severity;
use crate::host::{Host, OutputLevel, Report};
use crate::pipeline::source_map::SourceMap;

#[derive(Error, Debug)]
pub enum PrefixError {
    #[error("Invalid browser query: {0}")]
    Query(String),

    #[error("Failed to parse CSS: {0}")]
    Parse(String),

    #[error("Failed to prefix CSS: {0}")]
    Transform(String),

    #[error("Source map error: {0}")]
    SourceMap(String),

    #[error("Prefix task failed: {0}")]
    Task(String),
}

/// Which browsers to prefix for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserTargets {
    /// The project's browserslist configuration.
    DefaultQuery,
    Explicit(Vec<String>),
}

impl BrowserTargets {
    /// `None` when prefixing is disabled.
    pub fn from_setting(setting: &Autoprefix) -> Option<Self> {
        match setting {
            Autoprefix::Disabled => None,
            Autoprefix::DefaultQuery => Some(BrowserTargets::DefaultQuery),
            Autoprefix::Browsers(list) => Some(BrowserTargets::Explicit(list.clone())),
        }
    }
}

/// Input of one prefixing run.
#[derive(Debug, Clone)]
pub struct PrefixRequest {
    pub css: String,
    pub source_map: Option<SourceMap>,
    /// Where the CSS will be written; used as the file name in messages.
    pub save_path: PathBuf,
    pub targets: BrowserTargets,
    pub generate_map: bool,
    pub minify: bool,
}

/// A warning as the engine reports it. `kind` is the engine's own label;
/// only `"warning"` is treated as a warning, anything else as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineWarning {
    pub kind: String,
    pub text: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl EngineWarning {
    pub fn severity(&self) -> Severity {
        if self.kind == "warning" {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    fn location(&self) -> Option<String> {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(column)) => Some(format!("{file}:{line}:{column}")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub css: String,
    pub source_map: Option<SourceMap>,
    pub warnings: Vec<EngineWarning>,
}

/// A CSS prefixing engine. Called from a blocking thread.
pub trait PrefixEngine: Send + Sync + Debug {
    fn process(&self, request: &PrefixRequest) -> Result<EngineOutput, PrefixError>;
}

/// Prefixed CSS and, when requested, the merged map.
#[derive(Debug, Clone, PartialEq)]
pub struct Prefixed {
    pub css: String,
    pub map: Option<SourceMap>,
}

static CACHE_LOCK: LazyLock<tokio::sync::Mutex<()>> =
    LazyLock::new(|| tokio::sync::Mutex::new(()));
static CACHE_DISABLED: AtomicBool = AtomicBool::new(false);

/// Whether the default-query cache is currently bypassed.
pub fn browserslist_cache_disabled() -> bool {
    CACHE_DISABLED.load(Ordering::SeqCst)
}

/// Waits for other users of the cache switch, then reads it.
pub async fn browserslist_cache_state() -> bool {
    let _lock = CACHE_LOCK.lock().await;
    browserslist_cache_disabled()
}

/// Holds the cache switch off until dropped, then restores what it was.
struct CacheBypass {
    previous: bool,
    _lock: MutexGuard<'static, ()>,
}

impl CacheBypass {
    async fn acquire() -> Self {
        let lock = CACHE_LOCK.lock().await;
        let previous = CACHE_DISABLED.swap(true, Ordering::SeqCst);
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for CacheBypass {
    fn drop(&mut self) {
        CACHE_DISABLED.store(self.previous, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct PostProcessor {
    engine: Arc<dyn PrefixEngine>,
}

impl PostProcessor {
    pub fn new(engine: Arc<dyn PrefixEngine>) -> Self {
        Self { engine }
    }

    /// Prefix `request.css`. Engine warnings go to the host; a hard failure
    /// is returned and nothing should be written for this unit.
    pub async fn prefix(
        &self,
        request: PrefixRequest,
        host: &dyn Host,
    ) -> Result<Prefixed, PrefixError> {
        let _bypass = match request.targets {
            BrowserTargets::DefaultQuery => Some(CacheBypass::acquire().await),
            BrowserTargets::Explicit(_) => None,
        };

        let engine = Arc::clone(&self.engine);
        let generate_map = request.generate_map;
        let save_path = request.save_path.clone();

        let output = tokio::task::spawn_blocking(move || engine.process(&request))
            .await
            .map_err(|e| PrefixError::Task(e.to_string()))??;

        for warning in &output.warnings {
            report_warning(warning, host);
        }

        crate::debug_event!("prefix", "prefixed", "{}", save_path.display());
        Ok(Prefixed {
            css: output.css,
            map: if generate_map { output.source_map } else { None },
        })
    }
}

fn report_warning(warning: &EngineWarning, host: &dyn Host) {
    let (level, headline) = match warning.severity() {
        Severity::Debug => (OutputLevel::Debug, "Autoprefix debug"),
        Severity::Warning => (OutputLevel::Warning, "Autoprefix warning"),
        Severity::Error => (OutputLevel::Error, "Autoprefix error"),
    };

    let mut report = Report::new(level, headline);
    if let Some(location) = warning.location() {
        report = report.line(location);
    }
    host.show_report(report.line(warning.text.clone()));
}

/// [`PrefixEngine`] backed by `lightningcss` with browserslist targets.
///
/// The resolved default query is cached per prefixer. [`PostProcessor`]
/// switches that cache off for every default-query run, so only callers
/// using [`PrefixEngine::process`] directly ever read it back.
#[derive(Debug, Default)]
pub struct LightningPrefixer {
    /// Resolved default query; `None` until first loaded. Always refreshed
    /// while the cache switch is off.
    default_browsers: Mutex<Option<Option<Browsers>>>,
}

impl LightningPrefixer {
    pub fn new() -> Self {
        Self::default()
    }

    fn browsers(&self, targets: &BrowserTargets) -> Result<Option<Browsers>, PrefixError> {
        match targets {
            BrowserTargets::Explicit(queries) => {
                Browsers::from_browserslist(queries.iter().map(String::as_str))
                    .map_err(|e| PrefixError::Query(e.to_string()))
            }
            BrowserTargets::DefaultQuery => {
                if !browserslist_cache_disabled() {
                    if let Some(cached) = *self.default_browsers.lock() {
                        return Ok(cached);
                    }
                }
                let loaded = Browsers::load_browserslist()
                    .map_err(|e| PrefixError::Query(e.to_string()))?;
                *self.default_browsers.lock() = Some(loaded);
                Ok(loaded)
            }
        }
    }
}

fn targets(browsers: Option<Browsers>) -> Targets {
    browsers.map(Targets::from).unwrap_or_default()
}

impl PrefixEngine for LightningPrefixer {
    fn process(&self, request: &PrefixRequest) -> Result<EngineOutput, PrefixError> {
        let browsers = self.browsers(&request.targets)?;
        let filename = request.save_path.to_string_lossy().into_owned();

        let recovered = Arc::new(RwLock::new(Vec::new()));
        let mut stylesheet = StyleSheet::parse(
            &request.css,
            ParserOptions {
                filename: filename.clone(),
                error_recovery: true,
                warnings: Some(Arc::clone(&recovered)),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| PrefixError::Parse(e.to_string()))?;

        stylesheet
            .minify(MinifyOptions {
                targets: targets(browsers),
                ..MinifyOptions::default()
            })
            .map_err(|e| PrefixError::Transform(e.to_string()))?;

        let mut printed_map = request.generate_map.then(|| {
            let mut map = parcel_sourcemap::SourceMap::new("/");
            map.add_source(&filename);
            map
        });

        let printed = stylesheet
            .to_css(PrinterOptions {
                minify: request.minify,
                source_map: printed_map.as_mut(),
                targets: targets(browsers),
                ..PrinterOptions::default()
            })
            .map_err(|e| PrefixError::Transform(e.to_string()))?;

        let source_map = match printed_map {
            Some(map) => Some(merge_maps(map, request.source_map.as_ref())?),
            None => None,
        };

        let warnings = recovered
            .read()
            .map(|list| {
                list.iter()
                    .map(|warning| EngineWarning {
                        kind: "warning".to_string(),
                        text: warning.kind.to_string(),
                        file: warning.loc.as_ref().map(|loc| loc.filename.clone()),
                        line: warning.loc.as_ref().map(|loc| loc.line + 1),
                        column: warning.loc.as_ref().map(|loc| loc.column),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(EngineOutput {
            css: printed.code,
            source_map,
            warnings,
        })
    }
}

/// Map the printer's output back through the compiler's map.
///
/// A compiler map without mappings only names the sources, and is kept as it
/// is rather than collapsing every mapping.
fn merge_maps(
    mut printed: parcel_sourcemap::SourceMap,
    original: Option<&SourceMap>,
) -> Result<SourceMap, PrefixError> {
    let map_error = |e: parcel_sourcemap::SourceMapError| PrefixError::SourceMap(e.to_string());

    match original {
        Some(original) if original.mappings.is_empty() => Ok(original.clone()),
        Some(original) => {
            let json = original
                .to_json()
                .map_err(|e| PrefixError::SourceMap(e.to_string()))?;
            let mut original =
                parcel_sourcemap::SourceMap::from_json("/", &json).map_err(map_error)?;
            printed.extends(&mut original).map_err(map_error)?;
            let merged = printed.to_json(None).map_err(map_error)?;
            SourceMap::from_json(&merged).map_err(|e| PrefixError::SourceMap(e.to_string()))
        }
        None => {
            let json = printed.to_json(None).map_err(map_error)?;
            SourceMap::from_json(&json).map_err(|e| PrefixError::SourceMap(e.to_string()))
        }
    }
}

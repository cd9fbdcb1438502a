//! Stylesheet compilation.
//!
//! [`CompileEngine`] runs a [`StylesheetCompiler`] on the blocking pool and
//! turns its output into a [`CompileResult`]. The default compiler is
//! [`GrassCompiler`].

use std::fmt::Debug;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use codemap::SpanLoc;
use parking_lot::Mutex;
use thiserror::Error;

use crate::config::{FormatConfig, OutputStyle};
use crate::diagnostics::{Diagnostic, SourceLocation, SourceSpan};
use crate::host::{Host, OutputLevel, Report};
use crate::pipeline::resolver::ImportResolver;
use crate::pipeline::source_map::SourceMap;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{message}")]
    Sass { message: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Compile task failed: {0}")]
    Task(String),
}

/// One (source, format) compilation. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileRequest {
    pub source_path: PathBuf,
    pub target_css_path: PathBuf,
    pub target_map_path: PathBuf,
    pub format: FormatConfig,
}

impl CompileRequest {
    pub fn new(
        source_path: impl Into<PathBuf>,
        target_css_path: impl Into<PathBuf>,
        format: FormatConfig,
    ) -> Self {
        let target_css_path = target_css_path.into();
        Self {
            source_path: source_path.into(),
            target_map_path: crate::pipeline::planner::map_path_for(&target_css_path),
            target_css_path,
            format,
        }
    }
}

/// What a compiler hands back on success.
#[derive(Debug, Clone, Default)]
pub struct CompilerOutput {
    pub css: String,
    pub source_map: Option<SourceMap>,
    pub warnings: Vec<Diagnostic>,
    /// Output of `@debug` rules.
    pub debug: Vec<Diagnostic>,
}

/// Either compiled output or the diagnostic explaining why there is none.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileResult {
    Compiled {
        css: String,
        map: Option<SourceMap>,
    },
    Failed(Diagnostic),
}

impl CompileResult {
    pub fn is_compiled(&self) -> bool {
        matches!(self, CompileResult::Compiled { .. })
    }
}

/// A stylesheet compiler.
///
/// Called from a blocking thread. Implementations must consult `resolver`
/// for imports before their own lookup and should return a source map.
pub trait StylesheetCompiler: Send + Sync + Debug {
    fn compile(
        &self,
        request: &CompileRequest,
        resolver: &dyn ImportResolver,
    ) -> Result<CompilerOutput, CompileError>;
}

/// Compiles a request and post-processes the compiler's source map.
#[derive(Debug, Clone)]
pub struct CompileEngine {
    compiler: Arc<dyn StylesheetCompiler>,
    resolver: Arc<dyn ImportResolver>,
}

impl CompileEngine {
    pub fn new(compiler: Arc<dyn StylesheetCompiler>, resolver: Arc<dyn ImportResolver>) -> Self {
        Self { compiler, resolver }
    }

    pub fn with_resolver(&self, resolver: Arc<dyn ImportResolver>) -> Self {
        Self {
            compiler: Arc::clone(&self.compiler),
            resolver,
        }
    }

    pub async fn compile_one(&self, request: &CompileRequest, host: &dyn Host) -> CompileResult {
        let compiler = Arc::clone(&self.compiler);
        let resolver = Arc::clone(&self.resolver);
        let job = request.clone();

        let result = tokio::task::spawn_blocking(move || compiler.compile(&job, resolver.as_ref()))
            .await
            .unwrap_or_else(|e| Err(CompileError::Task(e.to_string())));

        match result {
            Ok(output) => {
                for warning in &output.warnings {
                    host.show_report(
                        Report::new(OutputLevel::Warning, "Warning:")
                            .with_body(warning.report_lines()),
                    );
                }
                for debug in &output.debug {
                    host.show_report(
                        Report::new(OutputLevel::Debug, "Debug info:")
                            .with_body(debug.report_lines()),
                    );
                }

                let map = output.source_map.map(|mut map| {
                    map.relativize_sources(&request.target_css_path);
                    map.file = request
                        .target_css_path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned());
                    map
                });

                crate::debug_event!(
                    "compile",
                    "compiled",
                    "{} -> {}",
                    request.source_path.display(),
                    request.target_css_path.display()
                );
                CompileResult::Compiled {
                    css: output.css,
                    map,
                }
            }
            Err(e) => {
                crate::debug_event!("compile", "failed", "{}: {e}", request.source_path.display());
                CompileResult::Failed(Diagnostic::error(e.to_string()))
            }
        }
    }
}

/// [`StylesheetCompiler`] backed by the `grass` crate.
///
/// grass produces no source maps, so the returned map lists the files read
/// during compilation together with their content and carries no mappings.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrassCompiler;

impl StylesheetCompiler for GrassCompiler {
    fn compile(
        &self,
        request: &CompileRequest,
        resolver: &dyn ImportResolver,
    ) -> Result<CompilerOutput, CompileError> {
        let fs = ResolvingFs::new(resolver);
        let logger = CollectingLogger::default();
        let style = match request.format.style {
            OutputStyle::Expanded => grass::OutputStyle::Expanded,
            OutputStyle::Compressed => grass::OutputStyle::Compressed,
        };
        let options = grass::Options::default()
            .fs(&fs)
            .logger(&logger)
            .style(style);

        let css = grass::from_path(&request.source_path, &options).map_err(|e| {
            CompileError::Sass {
                message: e.to_string(),
            }
        })?;

        Ok(CompilerOutput {
            css,
            source_map: Some(fs.into_source_map()),
            warnings: logger.warnings.into_inner(),
            debug: logger.debug.into_inner(),
        })
    }
}

/// Collects `@warn` and `@debug` output instead of printing it.
#[derive(Debug, Default)]
struct CollectingLogger {
    warnings: Mutex<Vec<Diagnostic>>,
    debug: Mutex<Vec<Diagnostic>>,
}

impl grass::Logger for CollectingLogger {
    fn debug(&self, location: SpanLoc, message: &str) {
        self.debug
            .lock()
            .push(Diagnostic::debug(message).with_span(source_span(&location)));
    }

    fn warn(&self, location: SpanLoc, message: &str) {
        self.warnings
            .lock()
            .push(Diagnostic::warning(message).with_span(source_span(&location)));
    }
}

/// Convert a 0-based codemap location into a 1-based [`SourceSpan`].
fn source_span(location: &SpanLoc) -> SourceSpan {
    let file = &location.file;
    let last = location.end.line.max(location.begin.line);
    let lines: Vec<&str> = (location.begin.line..=last)
        .take_while(|&line| line < file.num_lines())
        .map(|line| file.source_line(line))
        .collect();
    let context = lines.join("\n");

    SourceSpan {
        file: Some(PathBuf::from(file.name())),
        start: SourceLocation::new(location.begin.line + 1, location.begin.column + 1),
        end: SourceLocation::new(location.end.line + 1, location.end.column + 1),
        text: context.clone(),
        context: Some(context),
        url: Some(file.name().to_string()),
    }
}

/// Filesystem view for grass that routes `~` and `/` imports through an
/// [`ImportResolver`] and records every file read.
struct ResolvingFs<'a> {
    resolver: &'a dyn ImportResolver,
    loaded: Mutex<Vec<(PathBuf, String)>>,
}

impl Debug for ResolvingFs<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvingFs")
            .field("resolver", &self.resolver)
            .field("loaded", &self.loaded.lock().len())
            .finish()
    }
}

impl<'a> ResolvingFs<'a> {
    fn new(resolver: &'a dyn ImportResolver) -> Self {
        Self {
            resolver,
            loaded: Mutex::new(Vec::new()),
        }
    }

    /// The path grass asked for, or where the resolver says it lives.
    fn locate(&self, path: &Path) -> PathBuf {
        if let Some(specifier) = package_specifier(path) {
            if let Some(resolved) = self.resolver.resolve(&specifier) {
                return resolved;
            }
        }

        if path.is_absolute() && !path.exists() {
            if let Some(resolved) = self.resolver.resolve(&path.to_string_lossy()) {
                return resolved;
            }
        }

        path.to_path_buf()
    }

    fn into_source_map(self) -> SourceMap {
        let loaded = self.loaded.into_inner();
        let mut map = SourceMap::with_sources(
            loaded
                .iter()
                .map(|(path, _)| path.to_string_lossy().into_owned())
                .collect(),
        );
        map.sources_content = loaded.into_iter().map(|(_, content)| Some(content)).collect();
        map
    }
}

impl grass::Fs for ResolvingFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        self.locate(path).is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        self.locate(path).is_file()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let located = self.locate(path);
        let bytes = std::fs::read(&located)?;

        let mut loaded = self.loaded.lock();
        if !loaded.iter().any(|(seen, _)| seen == &located) {
            loaded.push((located, String::from_utf8_lossy(&bytes).into_owned()));
        }
        Ok(bytes)
    }
}

/// grass joins `~pkg/...` onto the importing file's directory. Recover the
/// specifier from the first component starting with `~` that is not a real
/// directory, so a `~` directory in the project path is left alone.
fn package_specifier(path: &Path) -> Option<String> {
    let mut prefix = PathBuf::new();
    let mut components = path.components();

    while let Some(component) = components.next() {
        prefix.push(component);
        let tilde = matches!(
            component,
            Component::Normal(name) if name.to_string_lossy().starts_with('~')
        );
        if tilde && !prefix.exists() {
            let mut specifier = component.as_os_str().to_string_lossy().into_owned();
            for rest in components {
                specifier.push('/');
                specifier.push_str(&rest.as_os_str().to_string_lossy());
            }
            return Some(specifier);
        }
    }
    None
}

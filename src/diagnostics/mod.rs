//! Compiler and prefixer diagnostics.
//!
//! A [`Diagnostic`] is the typed form of everything the external engines
//! report back: a severity, the message text and, when the engine knows it,
//! the source span the message points at. Rendering a span into the
//! fixed multi-line report lives in [`format`].

pub mod format;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use format::{DEPRECATION_NOTICE, format_span};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Debug,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "debug"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A 1-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A compiler-reported location range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    /// File the span belongs to, when the engine reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub start: SourceLocation,
    pub end: SourceLocation,
    /// The source text covered by the span.
    pub text: String,
    /// Full lines surrounding the span. Preferred over `text` when rendering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SourceSpan {
    pub fn is_multiline(&self) -> bool {
        self.start.line != self.end.line
    }

    /// Source text of the given covered line.
    pub fn line_text(&self, line: usize) -> &str {
        let index = line.saturating_sub(self.start.line);
        self.context
            .as_deref()
            .and_then(|context| context.split('\n').nth(index))
            .or_else(|| self.text.split('\n').nth(index))
            .unwrap_or("")
    }
}

/// A message from the compiler or the prefixer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
    /// Stack text to show when no span is available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span: None,
            stack: None,
            deprecated: false,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(message)
        }
    }

    /// Output of a Sass `@debug` rule.
    pub fn debug(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Debug,
            ..Self::error(message)
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// The message followed by the formatted span report.
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = vec![self.message.clone()];
        lines.extend(format_span(
            self.span.as_ref(),
            self.stack.as_deref(),
            self.deprecated,
        ));
        lines
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.report_lines().join("\n"))
    }
}

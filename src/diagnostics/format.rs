//! Fixed-layout rendering of source spans.
//!
//! The layout mirrors the Sass CLI report so tools that scrape it keep
//! working:
//!
//! ```text
//!   ╷
//! 4 |  color: red
//!   |   ^^^
//!   ╵
//! styles/main.scss:4:5
//! ```

use super::SourceSpan;

/// Appended when the compiler flags the message as a deprecation.
pub const DEPRECATION_NOTICE: &str = "THIS IS DEPRECATED AND WILL BE REMOVED IN SASS 2.0";

const TOP_BORDER: &str = "╷";
const BOTTOM_BORDER: &str = "╵";
const MULTILINE_MARKER: &str = "...^";

/// Render a span (or the stack when there is no span) into report lines.
pub fn format_span(
    span: Option<&SourceSpan>,
    stack: Option<&str>,
    deprecated: bool,
) -> Vec<String> {
    let mut lines = Vec::new();

    match span {
        None => {
            if let Some(stack) = stack {
                lines.push(stack.to_string());
            }
        }
        Some(span) => {
            let pad = gutter(span.start.line);

            lines.push(format!("{pad}{TOP_BORDER}"));

            // Both ends inclusive: the line the span ends on is shown.
            for line in span.start.line..=span.end.line.max(span.start.line) {
                lines.push(format!("{line} |{}", span.line_text(line)));
            }

            lines.push(format!("{pad}|{}", underline(span)));
            lines.push(format!("{pad}{BOTTOM_BORDER}"));

            if let Some(url) = &span.url {
                lines.push(format!("{url}:{}:{}", span.start.line, span.start.column));
            }
        }
    }

    if deprecated {
        lines.push(DEPRECATION_NOTICE.to_string());
    }

    lines
}

/// Blank gutter as wide as the first line number plus one.
fn gutter(line: usize) -> String {
    " ".repeat(line.to_string().len() + 1)
}

fn underline(span: &SourceSpan) -> String {
    if span.is_multiline() {
        let lead = span.end.column.saturating_sub(3);
        format!("{}{MULTILINE_MARKER}", " ".repeat(lead))
    } else {
        let lead = span.start.column.saturating_sub(2);
        let width = span
            .end
            .column
            .saturating_sub(span.start.column)
            .saturating_sub(1)
            .max(1);
        format!("{}{}", " ".repeat(lead), "^".repeat(width))
    }
}

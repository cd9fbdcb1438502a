//! Line ending and indentation options for expanded output.

use crate::config::{FormatConfig, IndentType, OutputStyle};

/// Indentation step of the compiler's expanded output.
const COMPILER_INDENT: usize = 2;

/// Re-indent and re-terminate expanded CSS. Compressed output is returned
/// unchanged.
pub fn apply(css: &str, format: &FormatConfig) -> String {
    if format.style == OutputStyle::Compressed {
        return css.to_string();
    }

    let unit = match format.indent_type {
        IndentType::Space => " ".repeat(format.indent_width),
        IndentType::Tab => "\t".repeat(format.indent_width.max(1)),
    };

    let lines: Vec<String> = css
        .lines()
        .map(|line| {
            let trimmed = line.trim_start_matches(' ');
            let leading = line.len() - trimmed.len();
            let depth = leading / COMPILER_INDENT;
            let rest = leading % COMPILER_INDENT;
            format!("{}{}{trimmed}", unit.repeat(depth), " ".repeat(rest))
        })
        .collect();

    let mut out = lines.join(format.linefeed.as_str());
    if css.ends_with('\n') {
        out.push_str(format.linefeed.as_str());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Linefeed;

    const CSS: &str = "a {\n  color: red;\n}\n@media print {\n  a {\n    color: blue;\n  }\n}";

    #[test]
    fn test_defaults_leave_output_unchanged() {
        assert_eq!(apply(CSS, &FormatConfig::default()), CSS);
    }

    #[test]
    fn test_tabs_and_crlf() {
        let format = FormatConfig {
            linefeed: Linefeed::Crlf,
            indent_type: IndentType::Tab,
            indent_width: 1,
            ..FormatConfig::default()
        };
        assert_eq!(
            apply("a {\n  b {\n    c: d;\n  }\n}\n", &format),
            "a {\r\n\tb {\r\n\t\tc: d;\r\n\t}\r\n}\r\n"
        );
    }

    #[test]
    fn test_wider_spaces() {
        let format = FormatConfig {
            indent_width: 4,
            ..FormatConfig::default()
        };
        assert_eq!(apply("a {\n  b: c;\n}", &format), "a {\n    b: c;\n}");
    }

    #[test]
    fn test_compressed_is_untouched() {
        let format = FormatConfig {
            style: OutputStyle::Compressed,
            linefeed: Linefeed::Crlf,
            ..FormatConfig::default()
        };
        assert_eq!(apply("a{b:c}\n", &format), "a{b:c}\n");
    }
}

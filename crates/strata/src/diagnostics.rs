use ariadne::{Config, Label, Report, ReportKind, Source};
use std::ops::Range;

use crate::node::{Node, NodeError};

/// Byte range of 1-based `line` in `source`, without its line break.
fn line_range(source: &str, line: i32) -> Range<usize> {
    let mut start = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        let end = start + text.len();
        if index as i32 + 1 == line {
            return start..start + text.trim_end_matches(['\r', '\n']).len();
        }
        start = end;
    }
    source.len()..source.len()
}

/// Renders `error` against the script it was reported for, as plain text.
pub fn render_error(filename: &str, script: &str, error: &NodeError) -> String {
    let range = if error.line > 0 {
        line_range(script, error.line)
    } else {
        0..0
    };
    let mut report = Vec::new();
    let written = Report::build(ReportKind::Error, (filename, range.clone()))
        .with_config(Config::default().with_color(false))
        .with_message(&error.message)
        .with_label(Label::new((filename, range)).with_message(format!("{:?}", error.kind)))
        .finish()
        .write((filename, Source::from(script)), &mut report);
    match written {
        Ok(()) => String::from_utf8_lossy(&report).into_owned(),
        // Writing into a Vec only fails on broken spans; fall back to the bare message
        Err(_) => format!("Error: {} (line {})", error.message, error.line),
    }
}

/// Report for the node's current error, if it has one.
pub fn render_node_error(node: &Node) -> Option<String> {
    let error = node.error()?;
    Some(render_error(node.name(), node.script(), error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn line_ranges() {
        let source = "a = 1\r\nbb\nccc";
        assert_eq!(line_range(source, 1), 0..5);
        assert_eq!(line_range(source, 2), 7..9);
        assert_eq!(line_range(source, 3), 10..13);
        assert_eq!(line_range(source, 9), 13..13);
    }

    #[test]
    fn report_mentions_message_and_line() {
        let error = NodeError {
            kind: ErrorKind::RuntimeError,
            message: "RuntimeError: 2.0".to_owned(),
            line: 2,
        };
        let report = render_error("n", "input('x', float)\nraise RuntimeError(str(x))", &error);
        assert!(report.contains("RuntimeError: 2.0"));
        assert!(report.contains("raise RuntimeError(str(x))"));
        assert!(report.contains("RuntimeError"));
    }
}

use thiserror::Error;

/// Failure reported by the script language: a syntax error found while
/// parsing or an exception raised while running.
///
/// `line` is 1-based, or [`EvalError::NO_LINE`] when no source position is
/// known (for example when representing a value).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EvalError {
    pub message: String,
    pub line: i32,
}

impl EvalError {
    pub const NO_LINE: i32 = -1;

    pub fn new(message: impl Into<String>, line: i32) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }

    pub fn without_line(message: impl Into<String>) -> Self {
        Self::new(message, Self::NO_LINE)
    }

    /// Error positioned at the line containing byte `offset` of `source`.
    pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        Self::new(message, line_of(source, offset))
    }
}

/// 1-based line number of the byte `offset` in `source`.
pub fn line_of(source: &str, offset: usize) -> i32 {
    let offset = offset.min(source.len());
    let newlines = source.as_bytes()[..offset]
        .iter()
        .filter(|byte| **byte == b'\n')
        .count();
    newlines as i32 + 1
}

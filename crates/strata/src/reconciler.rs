//! Declaration pre-pass over node scripts.
//!
//! Only top-level `input(name, type[, default])` and `output(name, expr)`
//! calls are recognized; the rest of the script stays opaque and is run
//! verbatim by the execution capability.

use std::ops::Range;
use strata_script::parser::{Expression, Literal, Spanned, Statement, parse_script};
use strata_script::{ValueType, error::line_of, is_identifier};

use crate::datum::{DatumKind, DatumType};
use crate::error::ErrorKind;
use crate::node::NodeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Declaration {
    pub name: String,
    pub kind: DatumKind,
    pub datum_type: DatumType,
    pub default: Option<DefaultArgument>,
    /// 1-based line of the declaring statement
    pub line: i32,
}

impl Declaration {
    /// Text a newly created datum starts with.
    pub fn initial_text(&self) -> String {
        match (&self.default, self.datum_type.value_type()) {
            (Some(default), _) => default.text.clone(),
            (None, Some(value_type)) => value_type.zero_text().to_owned(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DefaultArgument {
    pub text: String,
    /// Bytes of the script to delete when the default is redundant,
    /// including the separating comma
    pub removal: Range<usize>,
}

fn syntax_error(message: impl Into<String>, line: i32) -> NodeError {
    NodeError {
        kind: ErrorKind::SyntaxError,
        message: format!("SyntaxError: {}", message.into()),
        line,
    }
}

/// Checks a datum or node name, returning the reason it is rejected.
/// `subject` names what is being checked (`Datum`, `Node`).
pub(crate) fn validate_name(
    subject: &str,
    name: &str,
    is_reserved: impl Fn(&str) -> bool,
) -> Result<(), String> {
    if is_reserved(name) {
        Err(format!("{subject} name is a reserved keyword"))
    } else if name.starts_with("__") {
        Err(format!("{subject} name cannot begin with '__'"))
    } else if !is_identifier(name) {
        Err(format!("{subject} name is not a valid identifier"))
    } else {
        Ok(())
    }
}

/// Parses `script` and returns its declarations in order, or the error that
/// rejects the whole script.
pub(crate) fn declarations(
    script: &str,
    is_reserved: impl Fn(&str) -> bool,
) -> Result<Vec<Declaration>, NodeError> {
    let statements = parse_script(script).map_err(|error| NodeError {
        kind: ErrorKind::SyntaxError,
        message: error.message,
        line: error.line,
    })?;

    let mut declarations: Vec<Declaration> = Vec::new();
    for statement in &statements {
        let Statement::Expression(expression) = &statement.node else {
            continue;
        };
        let Expression::Call { arguments, .. } = &expression.node else {
            continue;
        };
        let line = line_of(script, statement.span.start);
        let declaration = match expression.node.called_name() {
            Some("input") => input_declaration(script, arguments, line)?,
            Some("output") => output_declaration(arguments, line)?,
            _ => continue,
        };
        validate_name("Datum", &declaration.name, &is_reserved).map_err(|message| NodeError {
            kind: ErrorKind::InvalidName,
            message,
            line,
        })?;
        if declarations
            .iter()
            .any(|existing| existing.name == declaration.name)
        {
            return Err(NodeError {
                kind: ErrorKind::InvalidName,
                message: format!(
                    "Datum '{}' was already defined in this script",
                    declaration.name
                ),
                line,
            });
        }
        declarations.push(declaration);
    }
    Ok(declarations)
}

fn declared_name(function: &str, argument: Option<&Spanned<Expression>>, line: i32) -> Result<String, NodeError> {
    match argument.map(|argument| &argument.node) {
        Some(Expression::Literal(Literal::Text(name))) => Ok((*name).to_owned()),
        _ => Err(syntax_error(
            format!("{function}() name must be a string literal"),
            line,
        )),
    }
}

fn input_declaration(
    script: &str,
    arguments: &[Spanned<Expression>],
    line: i32,
) -> Result<Declaration, NodeError> {
    if !(2..=3).contains(&arguments.len()) {
        return Err(syntax_error(
            "input() takes a name, a type and an optional default",
            line,
        ));
    }
    let name = declared_name("input", arguments.first(), line)?;
    let value_type = match &arguments[1].node {
        Expression::Name(type_name) => ValueType::from_name(type_name)
            .ok_or_else(|| syntax_error(format!("Unknown type '{type_name}'"), line))?,
        _ => return Err(syntax_error("input() type must be a type name", line)),
    };
    let default = arguments.get(2).map(|default| DefaultArgument {
        text: script[default.span.start..default.span.end].to_owned(),
        removal: arguments[1].span.end..default.span.end,
    });
    Ok(Declaration {
        name,
        kind: DatumKind::Input,
        datum_type: value_type.into(),
        default,
        line,
    })
}

fn output_declaration(arguments: &[Spanned<Expression>], line: i32) -> Result<Declaration, NodeError> {
    if arguments.len() != 2 {
        return Err(syntax_error("output() takes a name and a value", line));
    }
    Ok(Declaration {
        name: declared_name("output", arguments.first(), line)?,
        kind: DatumKind::Output,
        datum_type: DatumType::Any,
        default: None,
        line,
    })
}

/// Drops every input default equal to the datum's current text.
/// `text_of` returns the text of the datum a declaration maps to.
pub(crate) fn canonicalize(
    script: &str,
    declarations: &[Declaration],
    text_of: impl Fn(&str) -> Option<String>,
) -> String {
    let mut removals: Vec<Range<usize>> = declarations
        .iter()
        .filter_map(|declaration| {
            let default = declaration.default.as_ref()?;
            let text = text_of(&declaration.name)?;
            (text.trim() == default.text.trim()).then(|| default.removal.clone())
        })
        .collect();
    removals.sort_by_key(|removal| std::cmp::Reverse(removal.start));

    let mut canonical = script.to_owned();
    for removal in removals {
        canonical.replace_range(removal, "");
    }
    canonical
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_script::is_reserved_keyword;

    fn parse(script: &str) -> Result<Vec<Declaration>, NodeError> {
        declarations(script, is_reserved_keyword)
    }

    #[test]
    fn finds_inputs_and_outputs_in_order() {
        let declarations = parse("input('x', float, 1.0)\ny = x * 2\noutput('y', y)").unwrap();
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0].name, "x");
        assert_eq!(declarations[0].kind, DatumKind::Input);
        assert_eq!(declarations[0].datum_type, DatumType::Float);
        assert_eq!(declarations[0].default.as_ref().map(|d| d.text.as_str()), Some("1.0"));
        assert_eq!(declarations[1].name, "y");
        assert_eq!(declarations[1].kind, DatumKind::Output);
        assert_eq!(declarations[1].line, 3);
    }

    #[test]
    fn initial_text_falls_back_to_zero() {
        let declarations = parse("input('x', int)\ninput('s', str, 'a')").unwrap();
        assert_eq!(declarations[0].initial_text(), "0");
        assert_eq!(declarations[1].initial_text(), "'a'");
    }

    #[test]
    fn nested_calls_are_not_declarations() {
        let declarations = parse("y = input('x', float)").unwrap();
        assert!(declarations.is_empty());
    }

    #[test]
    fn syntax_error_rejects_script() {
        let error = parse("input('x', float, 1.0)wargarble").unwrap_err();
        assert_eq!(error.kind, ErrorKind::SyntaxError);
        assert_eq!(error.line, 1);
    }

    #[test]
    fn malformed_declarations_are_syntax_errors() {
        for script in [
            "input(x, float)",
            "input('x')",
            "input('x', vector)",
            "output('x')",
        ] {
            let error = parse(script).unwrap_err();
            assert_eq!(error.kind, ErrorKind::SyntaxError, "{script}");
        }
    }

    #[test]
    fn invalid_names() {
        let error = parse("input('for', float)").unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidName);
        assert_eq!(error.line, 1);
        assert!(error.message.contains("reserved keyword"));

        let error = parse("input('__x', float)").unwrap_err();
        assert!(error.message.contains("cannot begin with '__'"));

        let error = parse("input('a b', float)").unwrap_err();
        assert!(error.message.contains("not a valid identifier"));
    }

    #[test]
    fn duplicate_is_reported_at_second_declaration() {
        let error = parse("input('x', float)\ninput('x', float)").unwrap_err();
        assert_eq!(error.line, 2);
        assert_eq!(error.message, "Datum 'x' was already defined in this script");
    }

    #[test]
    fn canonical_script_drops_matching_defaults() {
        let script = "input('x', float, 1.0)\ninput('y', float, 2.0)";
        let declarations = parse(script).unwrap();
        let canonical = canonicalize(script, &declarations, |name| match name {
            "x" => Some("1.0".to_owned()),
            _ => Some("3.0".to_owned()),
        });
        assert_eq!(canonical, "input('x', float)\ninput('y', float, 2.0)");
    }
}

//! Reference extraction and resolution.
//!
//! A bare `name` in a datum expression refers to a datum of the same node;
//! `node.name` refers to a datum of another node. Script bodies only resolve
//! `node.name`, their bare names are ordinary script variables.

use indexmap::IndexMap;
use strata_script::parser::{Expression, Spanned, Statement, parse_expression, parse_script};
use strata_script::{EvalError, Namespace, Value};

use crate::datum::{DatumId, DatumKind};
use crate::dependency::Vertex;
use crate::graph::Graph;
use crate::node::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reference<'code> {
    Name {
        name: &'code str,
        offset: usize,
    },
    Attribute {
        head: &'code str,
        name: &'code str,
        offset: usize,
    },
}

pub(crate) fn collect<'code>(
    expression: &Spanned<Expression<'code>>,
    references: &mut Vec<Reference<'code>>,
) {
    match &expression.node {
        Expression::Name(name) => references.push(Reference::Name {
            name: *name,
            offset: expression.span.start,
        }),
        Expression::Attribute { object, name } => match object.node {
            Expression::Name(head) => references.push(Reference::Attribute {
                head,
                name: *name,
                offset: object.span.start,
            }),
            _ => collect(object, references),
        },
        other => other.for_each_child(|child| collect(child, references)),
    }
}

fn collect_statements<'code>(statements: &[Spanned<Statement<'code>>]) -> Vec<Reference<'code>> {
    let mut references = Vec::new();
    for statement in statements {
        match &statement.node {
            Statement::Expression(expression)
            | Statement::Assign {
                value: expression, ..
            }
            | Statement::Raise {
                exception: expression,
            } => collect(expression, &mut references),
            Statement::Pass => {}
        }
    }
    references
}

/// A datum made visible to an expression or script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Binding {
    pub datum: DatumId,
    /// Name of the owning node for cross-node references
    pub owner: Option<String>,
    pub name: String,
    /// Where the text refers to it, if it does so explicitly
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Unresolved {
    pub name: String,
    pub offset: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Resolution {
    pub bindings: Vec<Binding>,
    pub unresolved: Vec<Unresolved>,
    /// A script names something that may become a node later
    pub awaits_node: bool,
}

impl Resolution {
    fn bind(&mut self, binding: Binding) {
        let duplicate = self
            .bindings
            .iter()
            .any(|existing| existing.owner == binding.owner && existing.name == binding.name);
        if !duplicate {
            self.bindings.push(binding);
        }
    }

    fn fail(&mut self, name: &str, offset: usize) {
        if !self.unresolved.iter().any(|missing| missing.name == name) {
            self.unresolved.push(Unresolved {
                name: name.to_owned(),
                offset,
            });
        }
    }

    pub fn reads(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.bindings
            .iter()
            .map(|binding| Vertex::Datum(binding.datum))
    }
}

/// Resolves the references of a datum expression owned by `node`.
pub(crate) fn resolve_expression(
    graph: &Graph,
    node: NodeId,
    text: &str,
) -> Result<Resolution, EvalError> {
    let expression = parse_expression(text)?;
    let mut references = Vec::new();
    collect(&expression, &mut references);

    let mut resolution = Resolution::default();
    let Some(owner) = graph.node(node) else {
        return Ok(resolution);
    };
    for reference in references {
        let (head, attribute, offset) = match reference {
            Reference::Name { name, offset } => (name, None, offset),
            Reference::Attribute { head, name, offset } => (head, Some(name), offset),
        };
        if let Some(datum) = owner.datum(head) {
            resolution.bind(Binding {
                datum,
                owner: None,
                name: head.to_owned(),
                offset: Some(offset),
            });
            continue;
        }
        match (attribute, graph.node_by_name(head)) {
            (Some(attribute), Some(other)) => match other.datum(attribute) {
                Some(datum) => resolution.bind(Binding {
                    datum,
                    owner: Some(head.to_owned()),
                    name: attribute.to_owned(),
                    offset: Some(offset),
                }),
                None => resolution.fail(attribute, offset),
            },
            _ if graph.capability.is_builtin(head) => {}
            _ => resolution.fail(head, offset),
        }
    }
    Ok(resolution)
}

/// Resolves what a node's script body reads: the declared inputs and direct
/// datums of the node plus the `other.name` datums of other nodes.
pub(crate) fn resolve_script(graph: &Graph, node: NodeId) -> Result<Resolution, EvalError> {
    let mut resolution = Resolution::default();
    let Some(owner) = graph.node(node) else {
        return Ok(resolution);
    };
    for (name, datum) in owner.datums() {
        // Undeclared script datums wait for pruning and are no longer visible
        let readable = graph.datum(datum).is_some_and(|datum| match datum.kind() {
            DatumKind::Value => true,
            DatumKind::Input => owner.declaration(name).is_some(),
            DatumKind::Output => false,
        });
        if readable {
            resolution.bind(Binding {
                datum,
                owner: None,
                name: name.to_owned(),
                offset: None,
            });
        }
    }

    let statements = parse_script(owner.script())?;
    for reference in collect_statements(&statements) {
        let Reference::Attribute { head, name, offset } = reference else {
            continue;
        };
        if head == owner.name() || owner.datum(head).is_some() {
            continue;
        }
        let Some(other) = graph.node_by_name(head) else {
            // Could be a script variable; only re-resolve when datums appear
            resolution.awaits_node |= !graph.capability.is_builtin(head);
            continue;
        };
        match other.datum(name) {
            Some(datum) => resolution.bind(Binding {
                datum,
                owner: Some(head.to_owned()),
                name: name.to_owned(),
                offset: Some(offset),
            }),
            None => resolution.fail(name, offset),
        }
    }
    Ok(resolution)
}

/// Namespace holding the valid values of `bindings`. Cross-node bindings
/// are grouped into one object per node.
pub(crate) fn namespace(graph: &Graph, bindings: &[Binding]) -> Namespace {
    let mut namespace = Namespace::new();
    let mut objects: IndexMap<&str, Vec<(&str, Value)>> = IndexMap::new();
    for binding in bindings {
        let Some(value) = graph
            .datum(binding.datum)
            .and_then(|datum| datum.valid_value())
        else {
            continue;
        };
        match &binding.owner {
            None => {
                namespace.insert(binding.name.clone(), value.clone());
            }
            Some(owner) => objects
                .entry(owner.as_str())
                .or_default()
                .push((binding.name.as_str(), value.clone())),
        }
    }
    for (owner, fields) in objects {
        namespace.insert(owner.to_owned(), Value::object(fields));
    }
    namespace
}

#[cfg(test)]
mod tests {
    use super::*;

    fn references(text: &str) -> Vec<Reference<'_>> {
        let expression = parse_expression(text).unwrap();
        let mut references = Vec::new();
        collect(&expression, &mut references);
        references
    }

    #[test]
    fn collects_names_and_dotted_heads() {
        assert_eq!(
            references("a.x + float(y)"),
            vec![
                Reference::Attribute {
                    head: "a",
                    name: "x",
                    offset: 0,
                },
                Reference::Name {
                    name: "float",
                    offset: 6,
                },
                Reference::Name {
                    name: "y",
                    offset: 12,
                },
            ]
        );
    }

    #[test]
    fn literals_have_no_references() {
        assert!(references("1.0 * 2").is_empty());
    }

    #[test]
    fn script_statements_are_walked() {
        let statements = parse_script("y = a.x\nraise RuntimeError(b.z)\npass").unwrap();
        let heads: Vec<_> = collect_statements(&statements)
            .into_iter()
            .filter_map(|reference| match reference {
                Reference::Attribute { head, .. } => Some(head),
                Reference::Name { .. } => None,
            })
            .collect();
        assert_eq!(heads, vec!["a", "b"]);
    }
}

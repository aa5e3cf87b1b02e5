//! Incremental re-evaluation.
//!
//! An update recomputes the edges of the dirty vertices, collects every
//! transitive reader and evaluates the affected subgraph once, in
//! dependency order. Datums queued for pruning by successful script runs
//! are removed afterwards; their readers get one follow-up pass.

use indexmap::IndexSet;
use log::{debug, trace};
use strata_script::error::line_of;
use strata_script::{EvalError, Value};

use crate::datum::{DatumId, DatumKind, DatumType};
use crate::dependency::Vertex;
use crate::error::ErrorKind;
use crate::event::GraphEvent;
use crate::graph::Graph;
use crate::node::{NodeError, NodeId};
use crate::references::{self, Resolution, resolve_expression, resolve_script};

const CIRCULAR_DEPENDENCY: &str = "Circular dependency";

fn not_defined(name: &str) -> String {
    format!("Name '{name}' is not defined")
}

fn classify(error: &EvalError) -> ErrorKind {
    if error.message.starts_with("SyntaxError") {
        ErrorKind::SyntaxError
    } else {
        ErrorKind::RuntimeError
    }
}

type Failure = (ErrorKind, String);

impl Graph {
    pub(crate) fn update(&mut self, dirty: impl IntoIterator<Item = Vertex>) {
        let mut dirty: IndexSet<Vertex> = dirty.into_iter().collect();
        let mut pass = 0;
        while !dirty.is_empty() {
            pass += 1;
            dirty.retain(|vertex| self.vertex_exists(*vertex));
            for vertex in &dirty {
                self.recompute_edges(*vertex);
            }
            let affected = self.tracker.invalidate(dirty.iter().copied());
            let order = self
                .tracker
                .evaluation_order(&affected, |vertex| self.vertex_key(vertex));
            debug!(
                "Update pass {pass}: {} dirty, {} affected, {} circular",
                dirty.len(),
                order.order.len(),
                order.circular.len()
            );
            for vertex in order.order {
                let circular = order.circular.contains(&vertex);
                match vertex {
                    Vertex::Datum(datum) => self.evaluate_datum(datum, circular),
                    Vertex::Script(node) => self.run_script(node, circular),
                }
            }
            dirty = self.prune();
        }
    }

    fn vertex_exists(&self, vertex: Vertex) -> bool {
        match vertex {
            Vertex::Datum(datum) => self.datums.is_valid(datum.0),
            Vertex::Script(node) => self.nodes.is_valid(node.0),
        }
    }

    /// Node insertion order, then position within the node.
    fn vertex_key(&self, vertex: Vertex) -> (u64, usize) {
        match vertex {
            Vertex::Datum(datum) => self
                .datum(datum)
                .and_then(|datum| {
                    let node = self.node(datum.node)?;
                    Some((node.order, node.datums.get_index_of(&datum.name)?))
                })
                .unwrap_or((u64::MAX, usize::MAX)),
            Vertex::Script(node) => self
                .node(node)
                .map_or((u64::MAX, usize::MAX), |node| (node.order, node.datums.len())),
        }
    }

    pub(crate) fn recompute_edges(&mut self, vertex: Vertex) {
        let resolution = match vertex {
            Vertex::Datum(datum) => {
                let Some(datum) = self.datum(datum) else {
                    return;
                };
                if datum.kind == DatumKind::Output {
                    let script = Vertex::Script(datum.node);
                    self.tracker.set_reads(vertex, [script], false);
                    return;
                }
                resolve_expression(self, datum.node, &datum.text)
            }
            Vertex::Script(node) => resolve_script(self, node),
        };
        match resolution {
            Ok(resolution) => {
                let reads: Vec<Vertex> = resolution.reads().collect();
                let has_unresolved = !resolution.unresolved.is_empty() || resolution.awaits_node;
                self.tracker.set_reads(vertex, reads, has_unresolved);
            }
            // Text that does not parse reads nothing
            Err(_) => self.tracker.set_reads(vertex, [], false),
        }
    }

    fn evaluate_datum(&mut self, id: DatumId, circular: bool) {
        let Some(datum) = self.datum(id) else {
            return;
        };
        if circular {
            self.fail_datum(id, ErrorKind::CircularDependency, CIRCULAR_DEPENDENCY);
            return;
        }
        // Outputs are written by their script
        if datum.kind == DatumKind::Output {
            return;
        }
        let (node, datum_type, text) = (datum.node, datum.datum_type, datum.text.clone());
        match self.evaluate_text(node, &text, datum_type) {
            Ok(value) => {
                trace!("Datum {id:?} = {value}");
                if self
                    .datums
                    .get_mut(id.0)
                    .is_some_and(|datum| datum.commit(value))
                {
                    self.datum_changed(id);
                }
            }
            Err((kind, message)) => self.fail_datum(id, kind, message),
        }
    }

    fn evaluate_text(&mut self, node: NodeId, text: &str, datum_type: DatumType) -> Result<Value, Failure> {
        let resolution = resolve_expression(self, node, text)
            .map_err(|error| (ErrorKind::SyntaxError, error.message))?;
        if let Some(missing) = resolution.unresolved.first() {
            return Err((ErrorKind::UnresolvedReference, not_defined(&missing.name)));
        }
        if let Some(invalid) = resolution.bindings.iter().find(|binding| {
            self.datum(binding.datum)
                .is_none_or(|datum| !datum.is_valid())
        }) {
            return Err((ErrorKind::UnresolvedReference, not_defined(&invalid.name)));
        }
        let namespace = references::namespace(self, &resolution.bindings);
        let value = self
            .capability
            .evaluate(text, &namespace)
            .map_err(|error| (classify(&error), error.message))?;
        datum_type
            .coerce(value)
            .map_err(|message| (ErrorKind::TypeMismatch, message))
    }

    fn fail_datum(&mut self, id: DatumId, kind: ErrorKind, message: impl Into<String>) {
        let message = message.into();
        let Some(datum) = self.datums.get_mut(id.0) else {
            return;
        };
        trace!("Datum '{}' failed: {message}", datum.name);
        if datum.fail(kind, message) {
            self.datum_changed(id);
        }
    }

    fn fail_outputs(&mut self, outputs: &[(String, i32)], node: NodeId, kind: ErrorKind, message: &str) {
        for (name, _) in outputs {
            if let Some(datum) = self.node(node).and_then(|owner| owner.datum(name)) {
                self.fail_datum(datum, kind, message);
            }
        }
    }

    fn run_script(&mut self, node: NodeId, circular: bool) {
        let Some(owner) = self.node(node) else {
            return;
        };
        let name = owner.name.clone();
        let script = owner.script.clone();
        let first_line = owner.declarations.first().map_or(1, |declaration| declaration.line);
        let outputs: Vec<(String, i32)> = owner
            .declarations
            .iter()
            .filter(|declaration| declaration.kind == DatumKind::Output)
            .map(|declaration| (declaration.name.clone(), declaration.line))
            .collect();

        if circular {
            self.fail_outputs(&outputs, node, ErrorKind::CircularDependency, CIRCULAR_DEPENDENCY);
            self.set_run_error(node, ErrorKind::CircularDependency, CIRCULAR_DEPENDENCY, first_line);
            return;
        }

        let resolution = match resolve_script(self, node) {
            Ok(resolution) => resolution,
            Err(error) => {
                self.fail_outputs(&outputs, node, ErrorKind::SyntaxError, &error.message);
                self.set_run_error(node, ErrorKind::SyntaxError, &error.message, error.line);
                return;
            }
        };

        if let Some((missing, line)) = self.blocking_reference(node, &script, &resolution) {
            let message = not_defined(&missing);
            debug!("Script of node '{name}' not run: {message}");
            self.fail_outputs(&outputs, node, ErrorKind::UnresolvedReference, &message);
            self.set_run_error(node, ErrorKind::UnresolvedReference, &message, line);
            return;
        }

        let namespace = references::namespace(self, &resolution.bindings);
        trace!("Running script of node '{name}'");
        let bindings = match self.capability.execute(&script, namespace) {
            Ok(bindings) => bindings,
            Err(error) => {
                debug!("Script of node '{name}' failed at line {}: {}", error.line, error.message);
                let kind = classify(&error);
                self.fail_outputs(&outputs, node, kind, &error.message);
                self.set_run_error(node, kind, &error.message, error.line);
                return;
            }
        };

        let mut representation_error = None;
        for (output, line) in &outputs {
            let Some(datum) = self.node(node).and_then(|owner| owner.datum(output)) else {
                continue;
            };
            let Some(value) = bindings.get(output) else {
                self.fail_datum(datum, ErrorKind::UnresolvedReference, not_defined(output));
                continue;
            };
            match self.capability.represent_value(value) {
                Ok(text) => self.commit_output(datum, value.clone(), text),
                Err(_) => {
                    let message = format!("Could not evaluate representation of output '{output}'");
                    self.fail_datum(datum, ErrorKind::RepresentationError, message.as_str());
                    representation_error.get_or_insert(NodeError {
                        kind: ErrorKind::RepresentationError,
                        message,
                        line: *line,
                    });
                }
            }
        }
        self.set_node_error(node, |owner| owner.run_error = representation_error);

        // The script ran: undeclared datums can go now
        if let Some(owner) = self.nodes.get_mut(node.0) {
            self.pending_prune.append(&mut owner.stale);
        }
    }

    /// The first input or cross-node datum keeping the script from running,
    /// with the line to report it at.
    fn blocking_reference(
        &self,
        node: NodeId,
        script: &str,
        resolution: &Resolution,
    ) -> Option<(String, i32)> {
        let owner = self.node(node)?;
        for binding in &resolution.bindings {
            if self.datum(binding.datum).is_some_and(|datum| datum.is_valid()) {
                continue;
            }
            match (&binding.owner, binding.offset) {
                (Some(_), Some(offset)) => return Some((binding.name.clone(), line_of(script, offset))),
                _ => {
                    // Only declared inputs are required; other datums are just left out
                    let declaration = owner
                        .declaration(&binding.name)
                        .filter(|declaration| declaration.kind == DatumKind::Input);
                    if let Some(declaration) = declaration {
                        return Some((binding.name.clone(), declaration.line));
                    }
                }
            }
        }
        resolution
            .unresolved
            .first()
            .map(|missing| (missing.name.clone(), line_of(script, missing.offset)))
    }

    fn commit_output(&mut self, id: DatumId, value: Value, text: String) {
        let Some(datum) = self.datums.get_mut(id.0) else {
            return;
        };
        let text_changed = datum.text != text;
        datum.text = text;
        if datum.commit(value) || text_changed {
            self.datum_changed(id);
        }
    }

    fn set_run_error(&mut self, node: NodeId, kind: ErrorKind, message: &str, line: i32) {
        let error = NodeError {
            kind,
            message: message.to_owned(),
            line,
        };
        self.set_node_error(node, |owner| owner.run_error = Some(error));
    }

    /// Removes the datums queued by successful script runs and returns the
    /// vertices that read them.
    fn prune(&mut self) -> IndexSet<Vertex> {
        let pending = std::mem::take(&mut self.pending_prune);
        let mut dirty = IndexSet::new();
        for id in pending {
            let Some(datum) = self.datums.free(id.0) else {
                continue;
            };
            if let Some(owner) = self.nodes.get_mut(datum.node.0) {
                owner.datums.shift_remove(&datum.name);
            }
            debug!("Pruned datum '{}'", datum.name);
            for reader in self.tracker.remove_vertex(Vertex::Datum(id)) {
                // The owning script already ran without this datum
                if reader == Vertex::Script(datum.node) {
                    self.recompute_edges(reader);
                } else {
                    dirty.insert(reader);
                }
            }
            self.emit(GraphEvent::DatumRemoved {
                datum: id,
                node: datum.node,
                name: datum.name,
            });
        }
        dirty
    }
}

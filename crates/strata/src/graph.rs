use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use strata_script::{Interpreter, ValueType};

use crate::arena::Arena;
use crate::capability::ExecutionCapability;
use crate::datum::{Datum, DatumId, DatumKind, DatumType};
use crate::dependency::{DependencyTracker, Vertex};
use crate::error::GraphError;
use crate::event::{GraphEvent, Observer};
use crate::node::{Node, NodeError, NodeId};
use crate::reconciler::{self, Declaration};

/// Nodes, their datums and the edges between them.
///
/// Every mutating call leaves the graph fully evaluated: affected datums
/// and scripts are re-evaluated before it returns, then observers are
/// notified.
pub struct Graph {
    pub(crate) nodes: Arena<Node>,
    pub(crate) node_names: IndexMap<String, NodeId>,
    pub(crate) datums: Arena<Datum>,
    pub(crate) tracker: DependencyTracker,
    pub(crate) capability: Box<dyn ExecutionCapability>,
    observers: Vec<Observer>,
    events: Vec<GraphEvent>,
    /// Datums to remove once the current update pass finishes
    pub(crate) pending_prune: Vec<DatumId>,
    next_node_order: u64,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::with_capability(Interpreter::new())
    }

    pub fn with_capability(capability: impl ExecutionCapability + 'static) -> Self {
        Self {
            nodes: Arena::new(),
            node_names: IndexMap::new(),
            datums: Arena::new(),
            tracker: DependencyTracker::new(),
            capability: Box::new(capability),
            observers: Vec::new(),
            events: Vec::new(),
            pending_prune: Vec::new(),
            next_node_order: 0,
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&GraphEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node.0)
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_names.get(name).copied()
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.node_id(name).and_then(|node| self.node(node))
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.node_names
            .values()
            .filter_map(|id| self.node(*id).map(|node| (*id, node)))
    }

    pub fn datum(&self, datum: DatumId) -> Option<&Datum> {
        self.datums.get(datum.0)
    }

    /// Looks up `node.datum`.
    pub fn datum_by_path(&self, path: &str) -> Option<DatumId> {
        let (node, datum) = path.split_once('.')?;
        self.node_by_name(node)?.datum(datum)
    }

    pub fn add_node(&mut self, name: &str) -> Result<NodeId, GraphError> {
        reconciler::validate_name("Node", name, |word| {
            self.capability.is_reserved_keyword(word)
        })
        .map_err(|reason| GraphError::InvalidNodeName {
            name: name.to_owned(),
            reason,
        })?;
        if self.node_names.contains_key(name) {
            return Err(GraphError::DuplicateNodeName(name.to_owned()));
        }
        let order = self.next_node_order;
        self.next_node_order += 1;
        let id = NodeId(self.nodes.alloc(Node::new(name, order)));
        self.node_names.insert(name.to_owned(), id);
        debug!("Added node '{name}'");
        self.emit(GraphEvent::NodeAdded {
            node: id,
            name: name.to_owned(),
        });
        self.flush_events();
        Ok(id)
    }

    /// Removes a node with all its datums. Readers elsewhere in the graph
    /// are re-resolved and fail if nothing else satisfies them.
    pub fn remove_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        let removed = self.nodes.free(node.0).ok_or(GraphError::StaleNode(node))?;
        self.node_names.shift_remove(&removed.name);

        let mut dirty = IndexSet::new();
        for (name, datum) in removed.datums {
            if self.datums.free(datum.0).is_some() {
                dirty.extend(self.tracker.remove_vertex(Vertex::Datum(datum)));
                self.emit(GraphEvent::DatumRemoved {
                    datum,
                    node,
                    name,
                });
            }
        }
        dirty.extend(self.tracker.remove_vertex(Vertex::Script(node)));
        self.pending_prune
            .retain(|datum| self.datums.is_valid(datum.0));
        debug!("Removed node '{}'", removed.name);
        self.emit(GraphEvent::NodeRemoved {
            node,
            name: removed.name,
        });

        self.update(dirty);
        self.flush_events();
        Ok(())
    }

    /// Constructs a datum directly, outside of any script. It lives until
    /// its node is removed unless a script later declares it.
    pub fn add_datum(
        &mut self,
        node: NodeId,
        name: &str,
        text: &str,
        value_type: ValueType,
    ) -> Result<DatumId, GraphError> {
        let owner = self.node(node).ok_or(GraphError::StaleNode(node))?;
        reconciler::validate_name("Datum", name, |word| {
            self.capability.is_reserved_keyword(word)
        })
        .map_err(|reason| GraphError::InvalidDatumName {
            name: name.to_owned(),
            reason,
        })?;
        if owner.datum(name).is_some() {
            return Err(GraphError::DuplicateDatumName(name.to_owned()));
        }

        let datum = self.create_datum(node, name, DatumKind::Value, value_type.into(), text);
        if let Some(owner) = self.nodes.get_mut(node.0) {
            owner.datums.insert(name.to_owned(), datum);
        }
        let mut dirty: IndexSet<Vertex> = [Vertex::Datum(datum), Vertex::Script(node)].into();
        dirty.extend(self.tracker.unresolved());
        self.update(dirty);
        self.flush_events();
        Ok(datum)
    }

    /// Replaces the expression of an input or directly constructed datum
    /// and re-evaluates everything reading it.
    pub fn set_text(&mut self, datum: DatumId, text: &str) -> Result<(), GraphError> {
        let target = self
            .datums
            .get_mut(datum.0)
            .ok_or(GraphError::StaleDatum(datum))?;
        if target.kind == DatumKind::Output {
            return Err(GraphError::ReadOnlyOutput(target.name.clone()));
        }
        target.text = text.to_owned();
        target.edited = true;
        self.datum_changed(datum);

        self.update([Vertex::Datum(datum)]);
        self.flush_events();
        Ok(())
    }

    /// Reconciles the node's datums with the declarations of `script` and
    /// runs it. A rejected script leaves datums and stored script untouched
    /// and only sets the node error.
    pub fn set_script(&mut self, node: NodeId, script: &str) -> Result<(), GraphError> {
        let name = self
            .node(node)
            .map(|node| node.name.clone())
            .ok_or(GraphError::StaleNode(node))?;
        let declarations =
            reconciler::declarations(script, |word| self.capability.is_reserved_keyword(word));
        match declarations {
            Ok(declarations) => self.reconcile(node, script, declarations),
            Err(error) => {
                debug!("Rejected script of node '{name}': {}", error.message);
                self.set_node_error(node, |owner| owner.script_error = Some(error));
            }
        }
        self.flush_events();
        Ok(())
    }

    fn reconcile(&mut self, node: NodeId, script: &str, declarations: Vec<Declaration>) {
        let Some(previous) = self.node(node).map(|node| node.datums.clone()) else {
            return;
        };
        let mut dirty = IndexSet::new();
        let mut created = false;
        let mut datums = IndexMap::with_capacity(previous.len().max(declarations.len()));
        for declaration in &declarations {
            let datum = match previous.get(&declaration.name) {
                Some(&datum) => {
                    if self.pin(datum, declaration) {
                        dirty.insert(Vertex::Datum(datum));
                    }
                    datum
                }
                None => {
                    created = true;
                    let datum = self.create_datum(
                        node,
                        &declaration.name,
                        declaration.kind,
                        declaration.datum_type,
                        &declaration.initial_text(),
                    );
                    if let Some(fresh) = self.datums.get_mut(datum.0) {
                        fresh.default_text = declaration.default.as_ref().map(|d| d.text.clone());
                    }
                    dirty.insert(Vertex::Datum(datum));
                    datum
                }
            };
            datums.insert(declaration.name.clone(), datum);
        }

        // Undeclared datums stay until the script runs successfully
        let mut stale = Vec::new();
        for (name, datum) in previous {
            if datums.contains_key(&name) {
                continue;
            }
            let declared_by_script = self
                .datum(datum)
                .is_some_and(|datum| datum.kind != DatumKind::Value);
            if declared_by_script {
                stale.push(datum);
            }
            datums.insert(name, datum);
        }

        let canonical = reconciler::canonicalize(script, &declarations, |name| {
            datums
                .get(name)
                .and_then(|datum| self.datum(*datum))
                .map(|datum| datum.text.clone())
        });

        let Some(owner) = self.nodes.get_mut(node.0) else {
            return;
        };
        owner.datums = datums;
        owner.stale = stale;
        owner.declarations = declarations;
        let script_changed = owner.script != canonical;
        owner.script = canonical;
        if script_changed {
            let script = owner.script.clone();
            self.emit(GraphEvent::ScriptChanged { node, script });
        }
        self.set_node_error(node, |owner| owner.script_error = None);

        dirty.insert(Vertex::Script(node));
        if created {
            dirty.extend(self.tracker.unresolved());
        }
        self.update(dirty);
    }

    /// Keeps an existing datum for a new declaration. Returns whether the
    /// datum needs to be evaluated again.
    fn pin(&mut self, datum: DatumId, declaration: &Declaration) -> bool {
        let Some(pinned) = self.datums.get_mut(datum.0) else {
            return false;
        };
        let changed = pinned.kind != declaration.kind || pinned.datum_type != declaration.datum_type;
        pinned.kind = declaration.kind;
        pinned.datum_type = declaration.datum_type;
        if !pinned.edited && declaration.default.is_some() {
            pinned.default_text = declaration.default.as_ref().map(|d| d.text.clone());
        }
        changed
    }

    pub(crate) fn create_datum(
        &mut self,
        node: NodeId,
        name: &str,
        kind: DatumKind,
        datum_type: DatumType,
        text: &str,
    ) -> DatumId {
        let datum = DatumId(
            self.datums
                .alloc(Datum::new(name, node, kind, datum_type, text)),
        );
        debug!("Created datum '{name}' ({kind:?}, {datum_type})");
        self.emit(GraphEvent::DatumCreated {
            datum,
            node,
            name: name.to_owned(),
        });
        datum
    }

    /// Applies `change` to the node and reports the error if it changed.
    pub(crate) fn set_node_error(&mut self, node: NodeId, change: impl FnOnce(&mut Node)) {
        let Some(owner) = self.nodes.get_mut(node.0) else {
            return;
        };
        let before: Option<NodeError> = owner.error().cloned();
        change(owner);
        let after = owner.error().cloned();
        if before != after {
            if let Some(error) = &after {
                debug!(
                    "Node '{}' error at line {}: {}",
                    owner.name, error.line, error.message
                );
            }
            self.emit(GraphEvent::NodeErrorChanged { node, error: after });
        }
    }

    pub(crate) fn emit(&mut self, event: GraphEvent) {
        self.events.push(event);
    }

    pub(crate) fn datum_changed(&mut self, datum: DatumId) {
        let Some(changed) = self.datum(datum) else {
            return;
        };
        let event = GraphEvent::DatumChanged {
            datum,
            text: changed.text.clone(),
            value: changed.value.clone(),
            valid: changed.is_valid(),
            error: changed.error.as_ref().map(|error| error.message.clone()),
        };
        self.emit(event);
    }

    fn flush_events(&mut self) {
        if self.events.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.events);
        if self.observers.is_empty() {
            return;
        }
        for event in &events {
            for observer in &mut self.observers {
                observer(event);
            }
        }
        if !self.events.is_empty() {
            warn!("Observers queued {} events while being notified", self.events.len());
        }
    }
}

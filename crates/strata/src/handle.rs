use std::cell::RefCell;
use std::rc::{Rc, Weak};

use strata_script::ValueType;

use crate::datum::DatumId;
use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::NodeId;

/// Shared, single-threaded access to a [`Graph`].
///
/// Collaborators such as editors or observers hold clones of the handle.
/// Any access made while an update is running (from an observer callback
/// or an execution capability that captured a handle) fails with
/// [`GraphError::Reentrancy`] instead of panicking.
#[derive(Clone, Default)]
pub struct GraphHandle {
    graph: Rc<RefCell<Graph>>,
}

impl GraphHandle {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph: Rc::new(RefCell::new(graph)),
        }
    }

    pub fn downgrade(&self) -> WeakGraphHandle {
        WeakGraphHandle {
            graph: Rc::downgrade(&self.graph),
        }
    }

    pub fn read<R>(&self, read: impl FnOnce(&Graph) -> R) -> Result<R, GraphError> {
        let graph = self
            .graph
            .try_borrow()
            .map_err(|_| GraphError::Reentrancy)?;
        Ok(read(&graph))
    }

    pub fn update<R>(&self, update: impl FnOnce(&mut Graph) -> R) -> Result<R, GraphError> {
        let mut graph = self
            .graph
            .try_borrow_mut()
            .map_err(|_| GraphError::Reentrancy)?;
        Ok(update(&mut graph))
    }

    pub fn add_node(&self, name: &str) -> Result<NodeId, GraphError> {
        self.update(|graph| graph.add_node(name))?
    }

    pub fn remove_node(&self, node: NodeId) -> Result<(), GraphError> {
        self.update(|graph| graph.remove_node(node))?
    }

    pub fn add_datum(
        &self,
        node: NodeId,
        name: &str,
        text: &str,
        value_type: ValueType,
    ) -> Result<DatumId, GraphError> {
        self.update(|graph| graph.add_datum(node, name, text, value_type))?
    }

    pub fn set_script(&self, node: NodeId, script: &str) -> Result<(), GraphError> {
        self.update(|graph| graph.set_script(node, script))?
    }

    pub fn set_text(&self, datum: DatumId, text: &str) -> Result<(), GraphError> {
        self.update(|graph| graph.set_text(datum, text))?
    }
}

/// Non-owning handle, e.g. for capabilities or observers stored inside the
/// graph they refer to.
#[derive(Clone, Default)]
pub struct WeakGraphHandle {
    graph: Weak<RefCell<Graph>>,
}

impl WeakGraphHandle {
    pub fn upgrade(&self) -> Option<GraphHandle> {
        self.graph.upgrade().map(|graph| GraphHandle { graph })
    }
}

//! Datum dependency graph and script re-evaluation engine.
//!
//! Nodes carry scripts declaring typed `input`/`output` datums. Editing a
//! script or a datum expression re-evaluates exactly the affected part of
//! the graph, keeping the identity of datums that survive the edit.

pub mod arena;
pub mod capability;
pub mod datum;
pub mod dependency;
pub mod diagnostics;
mod driver;
pub mod error;
pub mod event;
pub mod graph;
pub mod handle;
pub mod node;
mod reconciler;
mod references;

pub use capability::ExecutionCapability;
pub use datum::{Datum, DatumError, DatumId, DatumKind, DatumType};
pub use dependency::Vertex;
pub use error::{ErrorKind, GraphError};
pub use event::GraphEvent;
pub use graph::Graph;
pub use handle::{GraphHandle, WeakGraphHandle};
pub use node::{Node, NodeError, NodeId};

pub use strata_script::{EvalError, Interpreter, Namespace, Value, ValueType};

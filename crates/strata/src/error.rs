use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::datum::DatumId;
use crate::node::NodeId;

/// Category of a recorded evaluation failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    SyntaxError,
    InvalidName,
    UnresolvedReference,
    RuntimeError,
    RepresentationError,
    CircularDependency,
    /// Value does not have the datum's declared type
    TypeMismatch,
}

/// Misuse of the graph API. Evaluation failures are never returned as
/// errors; they are recorded on the datum or node instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("The graph is being updated and cannot be accessed re-entrantly")]
    Reentrancy,
    #[error("Datum {0:?} no longer exists")]
    StaleDatum(DatumId),
    #[error("Node {0:?} no longer exists")]
    StaleNode(NodeId),
    #[error("Datum '{0}' is a script output and cannot be edited")]
    ReadOnlyOutput(String),
    #[error("Node name '{0}' is already in use")]
    DuplicateNodeName(String),
    #[error("Invalid node name '{name}': {reason}")]
    InvalidNodeName { name: String, reason: String },
    #[error("Datum '{0}' already exists in this node")]
    DuplicateDatumName(String),
    #[error("Invalid datum name '{name}': {reason}")]
    InvalidDatumName { name: String, reason: String },
}

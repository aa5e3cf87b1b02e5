use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::arena::SlotId;
use crate::datum::DatumId;
use crate::error::ErrorKind;
use crate::reconciler::Declaration;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub(crate) SlotId);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeError {
    pub kind: ErrorKind,
    pub message: String,
    /// 1-based line in the node's script
    pub line: i32,
}

/// Container of datums with a script declaring them.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: String,
    /// Insertion order in the graph, used to break evaluation ties
    pub(crate) order: u64,
    pub(crate) datums: IndexMap<String, DatumId>,
    pub(crate) script: String,
    pub(crate) declarations: Vec<Declaration>,
    /// Script-declared datums no longer declared, removed after the next
    /// successful run of the script
    pub(crate) stale: Vec<DatumId>,
    /// Error of the last rejected script edit; sticks until a script is accepted
    pub(crate) script_error: Option<NodeError>,
    pub(crate) run_error: Option<NodeError>,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, order: u64) -> Self {
        Self {
            name: name.into(),
            order,
            datums: IndexMap::new(),
            script: String::new(),
            declarations: Vec::new(),
            stale: Vec::new(),
            script_error: None,
            run_error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last accepted script, canonicalized.
    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn error(&self) -> Option<&NodeError> {
        self.script_error.as_ref().or(self.run_error.as_ref())
    }

    pub fn error_message(&self) -> &str {
        self.error()
            .map(|error| error.message.as_str())
            .unwrap_or_default()
    }

    /// `-1` when there is no error.
    pub fn error_line(&self) -> i32 {
        self.error().map_or(-1, |error| error.line)
    }

    pub fn datum(&self, name: &str) -> Option<DatumId> {
        self.datums.get(name).copied()
    }

    /// Datums in declaration order.
    pub fn datums(&self) -> impl Iterator<Item = (&str, DatumId)> {
        self.datums.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn datum_count(&self) -> usize {
        self.datums.len()
    }

    pub(crate) fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations
            .iter()
            .find(|declaration| declaration.name == name)
    }
}

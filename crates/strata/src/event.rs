//! Change notifications delivered to graph observers.
//!
//! Events are queued while an edit is processed and delivered once the
//! graph is consistent again, in the order they happened.

use serde::{Deserialize, Serialize};
use strata_script::Value;

use crate::datum::DatumId;
use crate::node::{NodeError, NodeId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum GraphEvent {
    NodeAdded {
        node: NodeId,
        name: String,
    },
    NodeRemoved {
        node: NodeId,
        name: String,
    },
    ScriptChanged {
        node: NodeId,
        script: String,
    },
    NodeErrorChanged {
        node: NodeId,
        error: Option<NodeError>,
    },
    DatumCreated {
        datum: DatumId,
        node: NodeId,
        name: String,
    },
    DatumRemoved {
        datum: DatumId,
        node: NodeId,
        name: String,
    },
    /// Value, validity or error of a datum changed
    DatumChanged {
        datum: DatumId,
        text: String,
        value: Option<Value>,
        valid: bool,
        error: Option<String>,
    },
}

pub type Observer = Box<dyn FnMut(&GraphEvent)>;

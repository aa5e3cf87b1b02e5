use serde::{Deserialize, Serialize};
use std::fmt;
use strata_script::{Value, ValueType};

use crate::arena::SlotId;
use crate::error::ErrorKind;
use crate::node::NodeId;

/// Stable identity of a datum. Pinned datums keep their id across script
/// edits; the id of a removed datum stops resolving.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct DatumId(pub(crate) SlotId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatumKind {
    /// Constructed directly, not declared by a script
    Value,
    Input,
    Output,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatumType {
    Float,
    Int,
    Str,
    Bool,
    Any,
}

impl DatumType {
    pub fn value_type(self) -> Option<ValueType> {
        match self {
            Self::Float => Some(ValueType::Float),
            Self::Int => Some(ValueType::Int),
            Self::Str => Some(ValueType::Str),
            Self::Bool => Some(ValueType::Bool),
            Self::Any => None,
        }
    }

    /// Applies the declared type to an evaluated value.
    pub fn coerce(self, value: Value) -> Result<Value, String> {
        match self.value_type() {
            Some(value_type) => value_type.coerce(value),
            None => Ok(value),
        }
    }
}

impl From<ValueType> for DatumType {
    fn from(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Float => Self::Float,
            ValueType::Int => Self::Int,
            ValueType::Str => Self::Str,
            ValueType::Bool => Self::Bool,
        }
    }
}

impl fmt::Display for DatumType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.value_type() {
            Some(value_type) => write!(f, "{value_type}"),
            None => f.write_str("any"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatumError {
    pub kind: ErrorKind,
    pub message: String,
}

/// A named, typed cell holding an expression and its cached value.
#[derive(Debug, Clone)]
pub struct Datum {
    pub(crate) name: String,
    pub(crate) node: NodeId,
    pub(crate) kind: DatumKind,
    pub(crate) datum_type: DatumType,
    pub(crate) text: String,
    pub(crate) default_text: Option<String>,
    pub(crate) edited: bool,
    pub(crate) value: Option<Value>,
    pub(crate) error: Option<DatumError>,
}

impl Datum {
    pub(crate) fn new(
        name: impl Into<String>,
        node: NodeId,
        kind: DatumKind,
        datum_type: DatumType,
        text: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            node,
            kind,
            datum_type,
            text: text.into(),
            default_text: None,
            edited: false,
            value: None,
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> DatumKind {
        self.kind
    }

    pub fn datum_type(&self) -> DatumType {
        self.datum_type
    }

    /// Source expression; for outputs the representation of the last value.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Default most recently declared for this datum by its script.
    pub fn default_text(&self) -> Option<&str> {
        self.default_text.as_deref()
    }

    /// Whether the text was changed through `Graph::set_text`.
    pub fn is_edited(&self) -> bool {
        self.edited
    }

    /// Last successfully cached value. Stays around while the datum is invalid.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.value.is_some()
    }

    pub fn error(&self) -> Option<&DatumError> {
        self.error.as_ref()
    }

    /// Empty when the datum is valid.
    pub fn error_message(&self) -> &str {
        self.error
            .as_ref()
            .map(|error| error.message.as_str())
            .unwrap_or_default()
    }

    /// Value seen by readers: only valid datums expose one.
    pub(crate) fn valid_value(&self) -> Option<&Value> {
        if self.error.is_none() {
            self.value.as_ref()
        } else {
            None
        }
    }

    /// Stores a freshly evaluated value. Returns whether anything observable changed.
    pub(crate) fn commit(&mut self, value: Value) -> bool {
        let changed = self.error.is_some() || self.value.as_ref() != Some(&value);
        self.error = None;
        self.value = Some(value);
        changed
    }

    /// Records a failure, keeping the stale value. Returns whether anything
    /// observable changed.
    pub(crate) fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) -> bool {
        let error = DatumError {
            kind,
            message: message.into(),
        };
        let changed = self.error.as_ref() != Some(&error);
        self.error = Some(error);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datum() -> Datum {
        let node = NodeId(SlotId {
            index: 0,
            generation: 0,
        });
        Datum::new("x", node, DatumKind::Input, DatumType::Float, "1.0")
    }

    #[test]
    fn fresh_datum_is_not_valid() {
        let datum = datum();
        assert!(!datum.is_valid());
        assert_eq!(datum.error_message(), "");
    }

    #[test]
    fn failure_keeps_stale_value() {
        let mut datum = datum();
        assert!(datum.commit(Value::float(1.0)));
        assert!(!datum.commit(Value::float(1.0)));
        assert!(datum.fail(ErrorKind::RuntimeError, "boom"));
        assert!(!datum.fail(ErrorKind::RuntimeError, "boom"));
        assert!(!datum.is_valid());
        assert_eq!(datum.value(), Some(&Value::float(1.0)));
        assert_eq!(datum.valid_value(), None);
        assert_eq!(datum.error_message(), "boom");
    }

    #[test]
    fn any_type_accepts_everything() {
        assert_eq!(
            DatumType::Any.coerce(Value::text("a")),
            Ok(Value::text("a"))
        );
        assert_eq!(
            DatumType::Float.coerce(Value::Bool(true)),
            Err("Expected float, got bool".to_owned())
        );
    }
}

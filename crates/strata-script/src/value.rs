//! Runtime values of the script language.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::parser::Literal;

/// A declarable datum type (`float`, `int`, `str`, `bool`).
///
/// Types are first class values too: `float` in a script evaluates to
/// `Value::Type(ValueType::Float)`, and calling it converts its argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Float,
    Int,
    Str,
    Bool,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Str => "str",
            Self::Bool => "bool",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "float" => Some(Self::Float),
            "int" => Some(Self::Int),
            "str" => Some(Self::Str),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }

    /// Source text of the value a fresh datum of this type starts with.
    pub fn zero_text(self) -> &'static str {
        match self {
            Self::Float => "0.0",
            Self::Int => "0",
            Self::Str => "''",
            Self::Bool => "False",
        }
    }

    pub fn zero(self) -> Value {
        match self {
            Self::Float => Value::float(0.0),
            Self::Int => Value::Int(0),
            Self::Str => Value::text(""),
            Self::Bool => Value::Bool(false),
        }
    }

    /// Checks that `value` has this type. `int` widens to `float`.
    pub fn coerce(self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (Self::Float, Value::Float(number)) => Ok(Value::Float(number)),
            (Self::Float, Value::Int(number)) => Ok(Value::float(number as f64)),
            (Self::Int, Value::Int(number)) => Ok(Value::Int(number)),
            (Self::Str, Value::Str(text)) => Ok(Value::Str(text)),
            (Self::Bool, Value::Bool(boolean)) => Ok(Value::Bool(boolean)),
            (expected, value) => Err(format!(
                "Expected {}, got {}",
                expected.name(),
                value.type_name()
            )),
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Float, Value::Float(_) | Value::Int(_))
                | (Self::Int, Value::Int(_))
                | (Self::Str, Value::Str(_))
                | (Self::Bool, Value::Bool(_))
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExceptionKind {
    Exception,
    RuntimeError,
    ValueError,
    TypeError,
    NameError,
    AttributeError,
    ZeroDivisionError,
    OverflowError,
}

impl ExceptionKind {
    pub const ALL: [Self; 8] = [
        Self::Exception,
        Self::RuntimeError,
        Self::ValueError,
        Self::TypeError,
        Self::NameError,
        Self::AttributeError,
        Self::ZeroDivisionError,
        Self::OverflowError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Exception => "Exception",
            Self::RuntimeError => "RuntimeError",
            Self::ValueError => "ValueError",
            Self::TypeError => "TypeError",
            Self::NameError => "NameError",
            Self::AttributeError => "AttributeError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::OverflowError => "OverflowError",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Builtin {
    Print,
    Abs,
    Min,
    Max,
    Round,
    Input,
    Output,
    Exception(ExceptionKind),
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Abs => "abs",
            Self::Min => "min",
            Self::Max => "max",
            Self::Round => "round",
            Self::Input => "input",
            Self::Output => "output",
            Self::Exception(kind) => kind.name(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "print" => Self::Print,
            "abs" => Self::Abs,
            "min" => Self::Min,
            "max" => Self::Max,
            "round" => Self::Round,
            "input" => Self::Input,
            "output" => Self::Output,
            name => {
                let kind = ExceptionKind::ALL
                    .into_iter()
                    .find(|kind| kind.name() == name)?;
                Self::Exception(kind)
            }
        };
        Some(builtin)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(Arc<str>),
    Type(ValueType),
    Builtin(Builtin),
    Exception {
        kind: ExceptionKind,
        message: Arc<str>,
    },
    /// Read-only attribute map, e.g. another node's datums seen from a script
    Object(Arc<BTreeMap<Arc<str>, Value>>),
}

impl Value {
    pub fn float(number: f64) -> Self {
        Value::Float(OrderedFloat(number))
    }

    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Value::Str(text.into())
    }

    pub fn object(fields: impl IntoIterator<Item = (impl Into<Arc<str>>, Value)>) -> Self {
        Value::Object(Arc::new(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        ))
    }

    pub fn from_literal(literal: &Literal) -> Self {
        match literal {
            Literal::Int(number) => Value::Int(*number),
            Literal::Float(number) => Value::float(*number),
            Literal::Text(text) => Value::text(*text),
            Literal::Bool(boolean) => Value::Bool(*boolean),
            Literal::None => Value::None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Type(_) => "type",
            Value::Builtin(Builtin::Exception(_)) => "type",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Exception { kind, .. } => kind.name(),
            Value::Object(_) => "object",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(boolean) => Some(f64::from(u8::from(*boolean))),
            Value::Int(number) => Some(*number as f64),
            Value::Float(number) => Some(number.0),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.get(name),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(boolean) => *boolean,
            Value::Int(number) => *number != 0,
            Value::Float(number) => number.0 != 0.0,
            Value::Str(text) => !text.is_empty(),
            Value::Object(fields) => !fields.is_empty(),
            Value::Type(_) | Value::Builtin(_) | Value::Exception { .. } => true,
        }
    }

    /// Source text that evaluates back to an equal value, if there is one.
    pub fn represent(&self) -> Option<String> {
        match self {
            Value::None => Some("None".to_owned()),
            Value::Bool(_) | Value::Int(_) => Some(self.to_string()),
            Value::Float(number) if number.is_finite() => Some(float_repr(number.0)),
            Value::Float(number) => Some(format!("float('{}')", float_repr(number.0))),
            Value::Str(text) if text.contains(['\n', '\r']) => None,
            Value::Str(text) if !text.contains('\'') => Some(format!("'{text}'")),
            Value::Str(text) if !text.contains('"') => Some(format!("\"{text}\"")),
            _ => None,
        }
    }
}

fn float_repr(number: f64) -> String {
    if number.is_nan() {
        "nan".to_owned()
    } else if number == f64::INFINITY {
        "inf".to_owned()
    } else if number == f64::NEG_INFINITY {
        "-inf".to_owned()
    } else {
        // Debug keeps the trailing `.0` of integral floats
        format!("{number:?}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(number) => write!(f, "{number}"),
            Value::Float(number) => f.write_str(&float_repr(number.0)),
            Value::Str(text) => f.write_str(text),
            Value::Type(value_type) => write!(f, "<class '{value_type}'>"),
            Value::Builtin(Builtin::Exception(kind)) => write!(f, "<class '{}'>", kind.name()),
            Value::Builtin(builtin) => write!(f, "<built-in function {}>", builtin.name()),
            Value::Exception { message, .. } => f.write_str(message),
            Value::Object(fields) => {
                let names: Vec<_> = fields.keys().map(|name| name.as_ref()).collect();
                write!(f, "<object {}>", names.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_representation_keeps_fraction() {
        assert_eq!(Value::float(1.0).represent().as_deref(), Some("1.0"));
        assert_eq!(Value::float(-2.5).represent().as_deref(), Some("-2.5"));
        assert_eq!(Value::float(f64::INFINITY).represent().as_deref(), Some("float('inf')"));
    }

    #[test]
    fn text_representation_picks_quotes() {
        assert_eq!(Value::text("a").represent().as_deref(), Some("'a'"));
        assert_eq!(Value::text("it's").represent().as_deref(), Some("\"it's\""));
        assert_eq!(Value::text("'\"").represent(), None);
    }

    #[test]
    fn types_are_not_representable() {
        assert_eq!(Value::Type(ValueType::Float).represent(), None);
        assert_eq!(Value::Builtin(Builtin::Print).represent(), None);
        assert_eq!(Value::object([("x", Value::Int(1))]).represent(), None);
    }

    #[test]
    fn coercion_widens_int_to_float() {
        assert_eq!(ValueType::Float.coerce(Value::Int(3)), Ok(Value::float(3.0)));
        assert_eq!(
            ValueType::Float.coerce(Value::text("3")),
            Err("Expected float, got str".to_owned())
        );
        assert_eq!(
            ValueType::Int.coerce(Value::float(3.0)),
            Err("Expected int, got float".to_owned())
        );
    }

    #[test]
    fn builtin_names_round_trip() {
        for name in ["print", "abs", "min", "max", "round", "input", "output", "RuntimeError"] {
            assert_eq!(Builtin::from_name(name).map(Builtin::name), Some(name));
        }
        assert_eq!(Builtin::from_name("wargarble"), None);
    }
}

//! Small Python-flavoured language used for node scripts and datum
//! expressions.

pub mod error;
pub mod interpreter;
pub mod keywords;
pub mod parser;
pub mod value;

pub use error::EvalError;
pub use interpreter::{Interpreter, Namespace, builtin, is_builtin};
pub use keywords::{is_identifier, is_reserved_keyword};
pub use value::{Builtin, ExceptionKind, Value, ValueType};

use indexmap::IndexMap;
use log::{debug, trace};
use std::cmp::Ordering;
use std::fmt;

use crate::error::EvalError;
use crate::parser::{
    BinaryOperator, Expression, Spanned, Statement, parse_expression, parse_script,
};
use crate::value::{Builtin, ExceptionKind, Value, ValueType};

/// Names bound in a script, in binding order.
pub type Namespace = IndexMap<String, Value>;

/// Tree-walking interpreter for scripts and single expressions.
///
/// The interpreter itself keeps no bindings between runs; every call gets
/// its namespace explicitly. Text passed to `print` is kept for the most
/// recent call only.
#[derive(Debug, Default)]
pub struct Interpreter {
    printed: Vec<String>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every statement of `source`, returning the namespace after the
    /// last one.
    pub fn execute(&mut self, source: &str, namespace: Namespace) -> Result<Namespace, EvalError> {
        self.printed.clear();
        let statements = parse_script(source)?;
        let base = Namespace::new();
        let mut frame = Frame {
            base: &base,
            locals: namespace,
            printed: &mut self.printed,
        };
        for statement in &statements {
            trace!("Executing statement at {:?}", statement.span);
            frame
                .execute(&statement.node)
                .map_err(|raised| EvalError::at(source, statement.span.start, raised.to_string()))?;
        }
        Ok(frame.locals)
    }

    /// Evaluates one expression against `namespace` without changing it.
    pub fn evaluate(&mut self, source: &str, namespace: &Namespace) -> Result<Value, EvalError> {
        self.printed.clear();
        let expression = parse_expression(source)?;
        let mut frame = Frame {
            base: namespace,
            locals: Namespace::new(),
            printed: &mut self.printed,
        };
        frame
            .evaluate(&expression)
            .map_err(|raised| EvalError::at(source, expression.span.start, raised.to_string()))
    }

    pub fn represent(&self, value: &Value) -> Result<String, EvalError> {
        value.represent().ok_or_else(|| {
            EvalError::without_line(format!(
                "TypeError: cannot represent value of type '{}'",
                value.type_name()
            ))
        })
    }

    pub fn printed(&self) -> &[String] {
        &self.printed
    }

    pub fn take_printed(&mut self) -> Vec<String> {
        std::mem::take(&mut self.printed)
    }
}

/// Value a name resolves to when no binding shadows it.
pub fn builtin(name: &str) -> Option<Value> {
    ValueType::from_name(name)
        .map(Value::Type)
        .or_else(|| Builtin::from_name(name).map(Value::Builtin))
}

pub fn is_builtin(name: &str) -> bool {
    builtin(name).is_some()
}

#[derive(Debug)]
struct Raised {
    kind: ExceptionKind,
    message: String,
}

impl Raised {
    fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }
}

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(self.kind.name())
        } else {
            write!(f, "{}: {}", self.kind.name(), self.message)
        }
    }
}

type Flow<T> = Result<T, Raised>;

struct Frame<'a> {
    base: &'a Namespace,
    locals: Namespace,
    printed: &'a mut Vec<String>,
}

impl Frame<'_> {
    fn execute(&mut self, statement: &Statement) -> Flow<()> {
        match statement {
            Statement::Expression(expression) => {
                self.evaluate(expression)?;
            }
            Statement::Assign { target, value } => {
                let value = self.evaluate(value)?;
                self.locals.insert(target.node.to_owned(), value);
            }
            Statement::Raise { exception } => {
                return Err(match self.evaluate(exception)? {
                    Value::Exception { kind, message } => Raised::new(kind, message.to_string()),
                    Value::Builtin(Builtin::Exception(kind)) => Raised::new(kind, ""),
                    _ => Raised::type_error("exceptions must derive from BaseException"),
                });
            }
            Statement::Pass => {}
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.locals
            .get(name)
            .or_else(|| self.base.get(name))
            .cloned()
            .or_else(|| builtin(name))
    }

    fn is_bound(&self, name: &str) -> bool {
        self.locals.contains_key(name) || self.base.contains_key(name)
    }

    fn evaluate(&mut self, expression: &Spanned<Expression>) -> Flow<Value> {
        match &expression.node {
            Expression::Literal(literal) => Ok(Value::from_literal(literal)),
            Expression::Name(name) => self.lookup(name).ok_or_else(|| {
                Raised::new(
                    ExceptionKind::NameError,
                    format!("name '{name}' is not defined"),
                )
            }),
            Expression::Attribute { object, name } => {
                let object = self.evaluate(object)?;
                match &object {
                    Value::Object(fields) => fields.get(*name).cloned().ok_or_else(|| {
                        Raised::new(
                            ExceptionKind::AttributeError,
                            format!("object has no attribute '{name}'"),
                        )
                    }),
                    other => Err(Raised::new(
                        ExceptionKind::AttributeError,
                        format!("'{}' object has no attribute '{name}'", other.type_name()),
                    )),
                }
            }
            Expression::Call {
                function,
                arguments,
            } => {
                let function = self.evaluate(function)?;
                let arguments = arguments
                    .iter()
                    .map(|argument| self.evaluate(argument))
                    .collect::<Flow<Vec<_>>>()?;
                self.call(function, arguments)
            }
            Expression::Negate { operand } => negate(self.evaluate(operand)?),
            Expression::BinaryOperator {
                operator,
                operand_a,
                operand_b,
            } => {
                let a = self.evaluate(operand_a)?;
                let b = self.evaluate(operand_b)?;
                binary(*operator, a, b)
            }
        }
    }

    fn call(&mut self, function: Value, arguments: Vec<Value>) -> Flow<Value> {
        match function {
            Value::Type(value_type) => convert(value_type, arguments),
            Value::Builtin(builtin) => self.call_builtin(builtin, arguments),
            other => Err(Raised::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, arguments: Vec<Value>) -> Flow<Value> {
        match builtin {
            Builtin::Print => {
                let line = arguments
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                debug!("print: {line}");
                self.printed.push(line);
                Ok(Value::None)
            }
            Builtin::Abs => match single_argument("abs", arguments)? {
                Value::Bool(boolean) => Ok(Value::Int(i64::from(boolean))),
                Value::Int(number) => number.checked_abs().map(Value::Int).ok_or_else(overflow),
                Value::Float(number) => Ok(Value::float(number.0.abs())),
                other => Err(Raised::type_error(format!(
                    "bad operand type for abs(): '{}'",
                    other.type_name()
                ))),
            },
            Builtin::Min => extremum("min", BinaryOperator::Less, arguments),
            Builtin::Max => extremum("max", BinaryOperator::Greater, arguments),
            Builtin::Round => round(arguments),
            Builtin::Input => self.declare_input(arguments),
            Builtin::Output => {
                let [name, value]: [Value; 2] = arguments.try_into().map_err(|_| {
                    Raised::type_error("output() takes a name and a value")
                })?;
                let Value::Str(name) = name else {
                    return Err(Raised::type_error("output() name must be a str"));
                };
                self.locals.insert(name.to_string(), value);
                Ok(Value::None)
            }
            Builtin::Exception(kind) => {
                let message = arguments
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(Value::Exception {
                    kind,
                    message: message.into(),
                })
            }
        }
    }

    /// `input(name, type[, default])` keeps a binding supplied by the caller
    /// and otherwise binds the default (or the type's zero value).
    fn declare_input(&mut self, arguments: Vec<Value>) -> Flow<Value> {
        let mut arguments = arguments.into_iter();
        let (Some(Value::Str(name)), Some(Value::Type(value_type))) =
            (arguments.next(), arguments.next())
        else {
            return Err(Raised::type_error("input() takes a name, a type and an optional default"));
        };
        let default = arguments.next();
        if arguments.next().is_some() {
            return Err(Raised::type_error("input() takes at most 3 arguments"));
        }
        let value = if self.is_bound(&name) {
            self.lookup(&name).unwrap_or(Value::None)
        } else {
            default.unwrap_or_else(|| value_type.zero())
        };
        let value = value_type.coerce(value).map_err(Raised::type_error)?;
        self.locals.insert(name.to_string(), value);
        Ok(Value::None)
    }
}

/// Longest string a script may build, in bytes.
const MAX_TEXT_LENGTH: usize = 1 << 26;

fn overflow() -> Raised {
    Raised::new(ExceptionKind::OverflowError, "integer overflow")
}

fn single_argument(function: &str, arguments: Vec<Value>) -> Flow<Value> {
    let count = arguments.len();
    let [argument]: [Value; 1] = arguments.try_into().map_err(|_| {
        Raised::type_error(format!(
            "{function}() takes exactly one argument ({count} given)"
        ))
    })?;
    Ok(argument)
}

fn convert(value_type: ValueType, arguments: Vec<Value>) -> Flow<Value> {
    if arguments.is_empty() {
        return Ok(value_type.zero());
    }
    let argument = single_argument(value_type.name(), arguments)?;
    match (value_type, argument) {
        (ValueType::Str, argument) => Ok(Value::text(argument.to_string())),
        (ValueType::Bool, argument) => Ok(Value::Bool(argument.is_truthy())),
        (ValueType::Float, Value::Str(text)) => text
            .trim()
            .parse::<f64>()
            .map(Value::float)
            .map_err(|_| {
                Raised::new(
                    ExceptionKind::ValueError,
                    format!("could not convert string to float: '{text}'"),
                )
            }),
        (ValueType::Float, argument) => argument.as_f64().map(Value::float).ok_or_else(|| {
            Raised::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                argument.type_name()
            ))
        }),
        (ValueType::Int, Value::Str(text)) => {
            text.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                Raised::new(
                    ExceptionKind::ValueError,
                    format!("invalid literal for int() with base 10: '{text}'"),
                )
            })
        }
        (ValueType::Int, Value::Bool(boolean)) => Ok(Value::Int(i64::from(boolean))),
        (ValueType::Int, Value::Int(number)) => Ok(Value::Int(number)),
        (ValueType::Int, Value::Float(number)) => float_to_int(number.0),
        (ValueType::Int, argument) => Err(Raised::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            argument.type_name()
        ))),
    }
}

fn float_to_int(number: f64) -> Flow<Value> {
    if number.is_nan() {
        return Err(Raised::new(
            ExceptionKind::ValueError,
            "cannot convert float NaN to integer",
        ));
    }
    let truncated = number.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(Raised::new(
            ExceptionKind::OverflowError,
            "cannot convert float to integer",
        ));
    }
    Ok(Value::Int(truncated as i64))
}

fn extremum(function: &str, operator: BinaryOperator, arguments: Vec<Value>) -> Flow<Value> {
    let mut arguments = arguments.into_iter();
    let Some(mut best) = arguments.next() else {
        return Err(Raised::type_error(format!(
            "{function} expected at least 1 argument, got 0"
        )));
    };
    for argument in arguments {
        if compare(operator, &argument, &best)? {
            best = argument;
        }
    }
    Ok(best)
}

fn round(arguments: Vec<Value>) -> Flow<Value> {
    let mut arguments = arguments.into_iter();
    let (Some(number), digits, None) = (arguments.next(), arguments.next(), arguments.next())
    else {
        return Err(Raised::type_error("round() takes a number and optional digits"));
    };
    match (number, digits) {
        (Value::Int(number), _) => Ok(Value::Int(number)),
        (Value::Bool(boolean), _) => Ok(Value::Int(i64::from(boolean))),
        (Value::Float(number), None | Some(Value::None)) => {
            float_to_int(number.0.round_ties_even())
        }
        (Value::Float(number), Some(Value::Int(digits))) => {
            let digits = i32::try_from(digits).map_err(|_| overflow())?;
            let scale = 10f64.powi(digits);
            Ok(Value::float((number.0 * scale).round_ties_even() / scale))
        }
        (Value::Float(_), Some(digits)) => Err(Raised::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            digits.type_name()
        ))),
        (other, _) => Err(Raised::type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(boolean) => Some(Self::Int(i64::from(*boolean))),
            Value::Int(number) => Some(Self::Int(*number)),
            Value::Float(number) => Some(Self::Float(number.0)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(number) => number as f64,
            Self::Float(number) => number,
        }
    }
}

fn negate(value: Value) -> Flow<Value> {
    match Number::of(&value) {
        Some(Number::Int(number)) => number.checked_neg().map(Value::Int).ok_or_else(overflow),
        Some(Number::Float(number)) => Ok(Value::float(-number)),
        None => Err(Raised::type_error(format!(
            "bad operand type for unary -: '{}'",
            value.type_name()
        ))),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (Number::of(a), Number::of(b)) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

fn compare(operator: BinaryOperator, a: &Value, b: &Value) -> Flow<bool> {
    let ordering = match (Number::of(a), Number::of(b), a, b) {
        (Some(Number::Int(x)), Some(Number::Int(y)), _, _) => Some(x.cmp(&y)),
        (Some(x), Some(y), _, _) => x.as_f64().partial_cmp(&y.as_f64()),
        (_, _, Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ => {
            return Err(Raised::type_error(format!(
                "'{operator}' not supported between instances of '{}' and '{}'",
                a.type_name(),
                b.type_name()
            )));
        }
    };
    // NaN compares false with everything
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match operator {
        BinaryOperator::Greater => ordering == Ordering::Greater,
        BinaryOperator::GreaterOrEqual => ordering != Ordering::Less,
        BinaryOperator::Less => ordering == Ordering::Less,
        BinaryOperator::LessOrEqual => ordering != Ordering::Greater,
        _ => false,
    })
}

fn binary(operator: BinaryOperator, a: Value, b: Value) -> Flow<Value> {
    match operator {
        BinaryOperator::Equal => return Ok(Value::Bool(values_equal(&a, &b))),
        BinaryOperator::NotEqual => return Ok(Value::Bool(!values_equal(&a, &b))),
        BinaryOperator::Greater
        | BinaryOperator::GreaterOrEqual
        | BinaryOperator::Less
        | BinaryOperator::LessOrEqual => return compare(operator, &a, &b).map(Value::Bool),
        _ => {}
    }
    match (operator, &a, &b) {
        (BinaryOperator::Add, Value::Str(x), Value::Str(y)) => {
            return Ok(Value::text(format!("{x}{y}")));
        }
        (BinaryOperator::Multiply, Value::Str(text), Value::Int(count))
        | (BinaryOperator::Multiply, Value::Int(count), Value::Str(text)) => {
            let count = usize::try_from(*count).unwrap_or(0);
            let too_long = || Raised::new(ExceptionKind::OverflowError, "repeated string is too long");
            text.len()
                .checked_mul(count)
                .filter(|length| *length <= MAX_TEXT_LENGTH)
                .ok_or_else(too_long)?;
            return Ok(Value::text(text.repeat(count)));
        }
        _ => {}
    }
    match (Number::of(&a), Number::of(&b)) {
        (Some(Number::Int(x)), Some(Number::Int(y))) => int_arithmetic(operator, x, y),
        (Some(x), Some(y)) => float_arithmetic(operator, x.as_f64(), y.as_f64()),
        _ => Err(Raised::type_error(format!(
            "unsupported operand type(s) for {operator}: '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn int_arithmetic(operator: BinaryOperator, x: i64, y: i64) -> Flow<Value> {
    let result = match operator {
        BinaryOperator::Add => x.checked_add(y),
        BinaryOperator::Subtract => x.checked_sub(y),
        BinaryOperator::Multiply => x.checked_mul(y),
        BinaryOperator::Divide => return float_arithmetic(operator, x as f64, y as f64),
        BinaryOperator::Modulo => {
            if y == 0 {
                return Err(Raised::new(
                    ExceptionKind::ZeroDivisionError,
                    "integer modulo by zero",
                ));
            }
            x.checked_rem(y)
                .map(|remainder| if remainder != 0 && (remainder < 0) != (y < 0) { remainder + y } else { remainder })
        }
        BinaryOperator::Power => match u32::try_from(y) {
            Ok(exponent) => x.checked_pow(exponent),
            Err(_) if y < 0 => return float_arithmetic(operator, x as f64, y as f64),
            Err(_) => None,
        },
        _ => None,
    };
    result.map(Value::Int).ok_or_else(overflow)
}

fn float_arithmetic(operator: BinaryOperator, x: f64, y: f64) -> Flow<Value> {
    let result = match operator {
        BinaryOperator::Add => x + y,
        BinaryOperator::Subtract => x - y,
        BinaryOperator::Multiply => x * y,
        BinaryOperator::Divide if y == 0.0 => {
            return Err(Raised::new(
                ExceptionKind::ZeroDivisionError,
                "division by zero",
            ));
        }
        BinaryOperator::Divide => x / y,
        BinaryOperator::Modulo if y == 0.0 => {
            return Err(Raised::new(ExceptionKind::ZeroDivisionError, "float modulo"));
        }
        BinaryOperator::Modulo => {
            let remainder = x % y;
            if remainder != 0.0 && (remainder < 0.0) != (y < 0.0) {
                remainder + y
            } else {
                remainder
            }
        }
        BinaryOperator::Power => x.powf(y),
        _ => {
            return Err(Raised::type_error(format!(
                "unsupported operand type(s) for {operator}: 'float' and 'float'"
            )));
        }
    };
    Ok(Value::float(result))
}

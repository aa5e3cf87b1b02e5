use strata_script::{EvalError, Interpreter, Namespace, Value};

/// The script runtime the graph delegates evaluation to.
///
/// Every call receives its namespace explicitly; implementations must not
/// keep bindings from one call to the next.
pub trait ExecutionCapability {
    /// Runs a whole script body, returning the namespace it leaves behind.
    fn execute(&mut self, body: &str, namespace: Namespace) -> Result<Namespace, EvalError>;

    /// Evaluates a single datum expression.
    fn evaluate(&mut self, expression: &str, namespace: &Namespace) -> Result<Value, EvalError>;

    /// Literal text that evaluates back to `value`.
    fn represent_value(&self, value: &Value) -> Result<String, EvalError>;

    fn is_reserved_keyword(&self, name: &str) -> bool;

    /// Names resolved by the runtime itself, never by the graph.
    fn is_builtin(&self, name: &str) -> bool;
}

impl ExecutionCapability for Interpreter {
    fn execute(&mut self, body: &str, namespace: Namespace) -> Result<Namespace, EvalError> {
        Interpreter::execute(self, body, namespace)
    }

    fn evaluate(&mut self, expression: &str, namespace: &Namespace) -> Result<Value, EvalError> {
        Interpreter::evaluate(self, expression, namespace)
    }

    fn represent_value(&self, value: &Value) -> Result<String, EvalError> {
        self.represent(value)
    }

    fn is_reserved_keyword(&self, name: &str) -> bool {
        strata_script::is_reserved_keyword(name)
    }

    fn is_builtin(&self, name: &str) -> bool {
        strata_script::is_builtin(name)
    }
}

//! Execution bridge: evaluate snippet text with an injected `console`.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use thiserror::Error;

pub mod process;
pub mod script;
mod value;

pub use value::{join_args, Namespace, Native, Value};

/// Name under which the capability object is visible to evaluated code.
pub const CONSOLE: &str = "console";

/// Failure raised while evaluating a snippet. The `Display` form is the
/// description shown after the `Error: ` prefix in an output pane.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("SyntaxError: {message} (line {line})")]
    Syntax { message: String, line: usize },
    /// A value raised by a `throw` statement.
    #[error("{0}")]
    Thrown(Value),
    #[error("ReferenceError: {0}")]
    Reference(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("RangeError: {0}")]
    Range(String),
    /// The external interpreter could not be started or spoke no protocol.
    #[error("{0}")]
    Process(String),
}

impl EvalError {
    pub fn syntax(message: impl Into<String>, line: usize) -> Self {
        Self::Syntax { message: message.into(), line }
    }
}

/// Receiver of `console.log` calls made by evaluated code.
pub trait Console {
    fn log(&mut self, args: &[Value]);
}

/// The capability object handed to an evaluator. Its only operation is
/// logging.
pub struct Capabilities<'a> {
    console: &'a mut dyn Console,
}

impl<'a> Capabilities<'a> {
    pub fn new(console: &'a mut dyn Console) -> Self {
        Self { console }
    }

    pub fn log(&mut self, args: &[Value]) {
        self.console.log(args);
    }
}

/// Runs snippet text. Implementations decide how much of the host the code
/// can reach; the widget only depends on this contract.
pub trait Evaluator {
    fn name(&self) -> &str;

    fn evaluate(&self, code: &str, caps: &mut Capabilities<'_>) -> Result<Value, EvalError>;
}

/// Evaluator selection for the CLI and config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EvaluatorKind {
    /// Built-in restricted snippet interpreter.
    Script,
    /// External interpreter process (node by default).
    Process,
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluatorKind::Script => f.write_str("script"),
            EvaluatorKind::Process => f.write_str("process"),
        }
    }
}

impl FromStr for EvaluatorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "script" | "builtin" => Ok(EvaluatorKind::Script),
            "process" | "node" => Ok(EvaluatorKind::Process),
            other => anyhow::bail!("unknown evaluator: {other} (expected script|process)"),
        }
    }
}

/// Build the evaluator selected by `kind`.
pub fn build(kind: EvaluatorKind, interpreter: &str, step_limit: u64) -> Box<dyn Evaluator> {
    match kind {
        EvaluatorKind::Script => Box::new(script::ScriptEvaluator::new().with_step_limit(step_limit)),
        EvaluatorKind::Process => Box::new(process::ProcessEvaluator::new(interpreter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluator_kind_parse() {
        assert_eq!("script".parse::<EvaluatorKind>().unwrap(), EvaluatorKind::Script);
        assert_eq!("Node".parse::<EvaluatorKind>().unwrap(), EvaluatorKind::Process);
        assert!("lua".parse::<EvaluatorKind>().is_err());
    }

    #[test]
    fn test_thrown_error_display() {
        let err = EvalError::Thrown(Value::error("Error", "x"));
        assert_eq!(err.to_string(), "Error: x");
        let err = EvalError::syntax("unexpected token ')'", 3);
        assert_eq!(err.to_string(), "SyntaxError: unexpected token ')' (line 3)");
    }
}

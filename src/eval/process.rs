//! External interpreter evaluator.
//!
//! The snippet runs inside a bootstrap script that hands it a `console`
//! bridge and reports log calls, the result and any thrown error on stdout,
//! one record per line. The code runs with the full ambient capability of
//! the interpreter process.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

use super::{Capabilities, EvalError, Evaluator, Value};

const RECORD: char = '\u{1e}';

const BOOTSTRAP: &str = r#"
const __emit = (tag, payload) => process.stdout.write('\u001e' + tag + (payload === undefined ? '' : ' ' + payload) + '\n');
const __encode = (v) => (typeof v === 'number' && Number.isFinite(v)) || typeof v === 'boolean' || v === null
    ? JSON.stringify(v)
    : JSON.stringify(String(v));
const __bridge = { log: (...args) => __emit('LOG', JSON.stringify(args.map((a) => a === undefined || a === null ? '' : String(a)))) };
const __code = __CODE__;
// Direct eval rejects a top-level `return`; run such snippets as a function body.
const __run = () => {
    try {
        return ((console) => eval(__code))(__bridge);
    } catch (err) {
        if (err instanceof SyntaxError && /Illegal return/.test(err.message)) {
            return new Function('console', __code)(__bridge);
        }
        throw err;
    }
};
try {
    const __result = __run();
    __emit('RET', __result === undefined ? undefined : __encode(__result));
} catch (err) {
    __emit('ERR', JSON.stringify(String(err)));
}
"#;

#[derive(Debug, Clone)]
pub struct ProcessEvaluator {
    program: String,
    args: Vec<String>,
}

impl ProcessEvaluator {
    /// `interpreter` is a command line such as `node` or `node --no-warnings`.
    pub fn new(interpreter: &str) -> Self {
        let mut parts = interpreter.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "node".to_string());
        Self { program, args: parts.collect() }
    }

    fn script(code: &str) -> Result<String, EvalError> {
        let literal = serde_json::to_string(code).map_err(|e| EvalError::Process(e.to_string()))?;
        Ok(BOOTSTRAP.replace("__CODE__", &literal))
    }
}

impl Evaluator for ProcessEvaluator {
    fn name(&self) -> &str {
        &self.program
    }

    fn evaluate(&self, code: &str, caps: &mut Capabilities<'_>) -> Result<Value, EvalError> {
        let script = Self::script(code)?;
        let mut file = tempfile::Builder::new()
            .prefix("interact-")
            .suffix(".js")
            .tempfile()
            .map_err(|e| EvalError::Process(format!("failed to create script file: {e}")))?;
        file.write_all(script.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| EvalError::Process(format!("failed to write script file: {e}")))?;

        debug!(program = %self.program, path = %file.path().display(), "spawning interpreter");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| EvalError::Process(format!("failed to start {}: {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_records(&stdout, caps)? {
            Some(outcome) => outcome,
            None => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(EvalError::Process(format!(
                    "{} exited with {} without a result: {}",
                    self.program,
                    output.status.code().map_or_else(|| "a signal".to_string(), |c| format!("code {c}")),
                    stderr.trim()
                )))
            }
        }
    }
}

/// Replay the record stream into `caps`. Returns `None` when neither a
/// result nor an error record was seen.
fn parse_records(stdout: &str, caps: &mut Capabilities<'_>) -> Result<Option<Result<Value, EvalError>>, EvalError> {
    let mut outcome = None;
    for line in stdout.lines() {
        let Some(record) = line.strip_prefix(RECORD) else {
            // Direct writes to stdout by the snippet.
            caps.log(&[Value::from(line)]);
            continue;
        };
        let (tag, payload) = record.split_once(' ').unwrap_or((record, ""));
        let decode = |payload: &str| {
            serde_json::from_str::<serde_json::Value>(payload)
                .map_err(|e| EvalError::Process(format!("malformed {tag} record: {e}")))
        };
        match tag {
            "LOG" => {
                let args = match decode(payload)? {
                    serde_json::Value::Array(items) => items.into_iter().map(Value::from).collect::<Vec<_>>(),
                    other => vec![Value::from(other)],
                };
                caps.log(&args);
            }
            "RET" if payload.is_empty() => outcome = Some(Ok(Value::Undefined)),
            "RET" => outcome = Some(Ok(Value::from(decode(payload)?))),
            "ERR" => {
                let message = match decode(payload)? {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                outcome = Some(Err(EvalError::Thrown(Value::Str(message))));
            }
            other => debug!(tag = other, "ignoring unknown record"),
        }
    }
    Ok(outcome)
}

//! Built-in snippet interpreter.
//!
//! A small JavaScript-flavoured language with no access to the host beyond
//! the injected `console`. Evaluation is bounded by a step limit so a runaway
//! loop ends with a `RangeError` instead of hanging the UI.

mod ast;
mod interp;
mod lexer;
mod parser;

pub use interp::Closure;

use super::{Capabilities, EvalError, Evaluator, Value};

pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct ScriptEvaluator {
    step_limit: u64,
}

impl ScriptEvaluator {
    pub fn new() -> Self {
        Self { step_limit: DEFAULT_STEP_LIMIT }
    }

    /// `0` disables the limit.
    pub fn with_step_limit(mut self, step_limit: u64) -> Self {
        self.step_limit = step_limit;
        self
    }
}

impl Default for ScriptEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for ScriptEvaluator {
    fn name(&self) -> &str {
        "script"
    }

    fn evaluate(&self, code: &str, caps: &mut Capabilities<'_>) -> Result<Value, EvalError> {
        let program = parser::parse(code)?;
        interp::Interpreter::new(caps, self.step_limit).run(&program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{join_args, Console};

    #[derive(Default)]
    struct Lines(Vec<String>);

    impl Console for Lines {
        fn log(&mut self, args: &[Value]) {
            self.0.push(join_args(args));
        }
    }

    fn eval_with_log(code: &str) -> (Result<Value, EvalError>, Vec<String>) {
        let mut lines = Lines::default();
        let result = {
            let mut caps = Capabilities::new(&mut lines);
            ScriptEvaluator::new().evaluate(code, &mut caps)
        };
        (result, lines.0)
    }

    fn eval(code: &str) -> Result<Value, EvalError> {
        eval_with_log(code).0
    }

    fn show(code: &str) -> String {
        match eval(code) {
            Ok(value) => value.to_string(),
            Err(err) => format!("Error: {err}"),
        }
    }

    #[test]
    fn test_return_value() {
        assert_eq!(eval("return 2+2"), Ok(Value::Number(4.0)));
        assert_eq!(show("return 'a' + 1"), "a1");
        assert_eq!(show("return [1, 2, 3]"), "1,2,3");
    }

    #[test]
    fn test_completion_value_without_return() {
        assert_eq!(show("let x = 3\nx * 2"), "6");
        assert_eq!(eval("let x = 3"), Ok(Value::Undefined));
        assert_eq!(eval(""), Ok(Value::Undefined));
        assert_eq!(eval("console.log('hi')"), Ok(Value::Undefined));
    }

    #[test]
    fn test_throw() {
        let err = eval("throw new Error('x')").unwrap_err();
        assert_eq!(err, EvalError::Thrown(Value::error("Error", "x")));
        assert_eq!(err.to_string(), "Error: x");
        assert_eq!(show("throw 'plain'"), "Error: plain");
        assert_eq!(show("throw new TypeError()"), "Error: TypeError");
    }

    #[test]
    fn test_console_log_joins_arguments() {
        let (result, lines) = eval_with_log("console.log('a', 1)\nconsole.log([1, [2, 3]], null)");
        assert_eq!(result, Ok(Value::Undefined));
        assert_eq!(lines, vec!["a,1".to_string(), "1,2,3,".to_string()]);
    }

    #[test]
    fn test_logs_before_error_are_kept() {
        let (result, lines) = eval_with_log("console.log('before')\nthrow new Error('boom')\nconsole.log('after')");
        assert!(result.is_err());
        assert_eq!(lines, vec!["before".to_string()]);
    }

    #[test]
    fn test_control_flow() {
        let code = r#"
            let total = 0
            for (let i = 0; i < 10; i++) {
                if (i % 2 == 0) continue
                if (i > 7) break
                total += i
            }
            let n = 0
            while (true) { n++; if (n >= 3) break }
            return total + n
        "#;
        assert_eq!(eval(code), Ok(Value::Number(1.0 + 3.0 + 5.0 + 7.0 + 3.0)));
    }

    #[test]
    fn test_functions_and_closures() {
        let code = r#"
            function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2) }
            const counter = () => { let c = 0; return () => ++c }
            const next = counter()
            next(); next()
            return [fib(10), next(), typeof fib, (x => x * 2)(21)]
        "#;
        assert_eq!(show(code), "55,3,function,42");
    }

    #[test]
    fn test_hoisted_function_declaration() {
        assert_eq!(show("return double(4)\nfunction double(x) { return x * 2 }"), "8");
    }

    #[test]
    fn test_arrays_and_strings() {
        let code = r#"
            const xs = []
            xs.push(1, 2)
            xs[3] = 4
            return [xs.length, xs.join('-'), 'héllo'.length, 'abc'[1], xs[10]]
        "#;
        assert_eq!(show(code), "4,1-2--4,5,b,");
    }

    #[test]
    fn test_builtins() {
        assert_eq!(show("Math.max(1, 5, 3) + Math.floor(2.7)"), "7");
        assert_eq!(show("Math.round(-2.5)"), "-2");
        assert_eq!(show("String(12) + Number('3')"), "123");
        assert_eq!(show("1 / 0"), "Infinity");
        assert_eq!(show("0.1 + 0.2"), "0.30000000000000004");
        assert_eq!(show("2 ** 3 ** 2"), "512");
    }

    #[test]
    fn test_equality_operators() {
        assert_eq!(show("[1 == '1', 1 === '1', null == undefined, NaN == NaN]"), "true,false,true,false");
    }

    #[test]
    fn test_runtime_errors() {
        assert_eq!(show("missing + 1"), "Error: ReferenceError: missing is not defined");
        assert_eq!(show("const a = 1\na = 2"), "Error: TypeError: assignment to constant variable");
        assert_eq!(show("let f = 3\nf()"), "Error: TypeError: f is not a function");
        assert!(show("undefined.x").starts_with("Error: TypeError: cannot read properties of undefined"));
        assert!(show("let a = 1\nlet a = 2").starts_with("Error: SyntaxError"));
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let err = eval("let ok = 1\nreturn (").unwrap_err();
        assert!(matches!(err, EvalError::Syntax { line: 2, .. }), "got {err:?}");
    }

    #[test]
    fn test_step_limit_stops_infinite_loop() {
        let mut lines = Lines::default();
        let mut caps = Capabilities::new(&mut lines);
        let err = ScriptEvaluator::new().with_step_limit(1_000).evaluate("while (true) {}", &mut caps).unwrap_err();
        assert_eq!(err, EvalError::Range("step limit exceeded".to_string()));
    }

    #[test]
    fn test_deep_recursion_is_an_error() {
        let err = eval("function f(n) { return f(n + 1) }\nf(0)").unwrap_err();
        assert!(matches!(err, EvalError::Range(_)), "got {err:?}");
    }

    #[test]
    fn test_recursive_body_fails_cleanly_or_returns() {
        let code = "function f(n) { return n == 0 ? 0 : 1 + f(n - 1) }\n";
        assert_eq!(eval(&format!("{code}return f(20)")), Ok(Value::Number(20.0)));
        match eval(&format!("{code}return f(99)")) {
            Ok(value) => assert_eq!(value, Value::Number(99.0)),
            Err(err) => assert!(matches!(err, EvalError::Range(_)), "got {err:?}"),
        }
        let err = eval(&format!("{code}return f(100000)")).unwrap_err();
        assert!(matches!(err, EvalError::Range(_)), "got {err:?}");
    }

    #[test]
    fn test_self_containing_array() {
        assert_eq!(show("const a = [1]\na.push(a)\nreturn a"), "1,");
        assert_eq!(show("const a = [1]\na.push(a)\nreturn a.join('-')"), "1-");
        let (_, lines) = eval_with_log("const a = [1, 2]\na[2] = a\nconsole.log(a)");
        assert_eq!(lines, vec!["1,2,".to_string()]);
    }

    #[test]
    fn test_deeply_nested_arrays() {
        let wrapped = "let a = []\nfor (let i = 0; i < 100000; i++) { a = [a] }\nreturn a.length";
        assert_eq!(eval(wrapped), Ok(Value::Number(1.0)));
        let chained = "const root = []\nlet cur = root\nfor (let i = 0; i < 100000; i++) { const next = [i]; cur.push(next); cur = next }\nreturn root.length";
        assert_eq!(eval(chained), Ok(Value::Number(1.0)));
        let shown = show("let a = [1]\nfor (let i = 0; i < 100000; i++) { a = [a] }\nreturn a");
        assert_eq!(shown, "1");
    }

    #[test]
    fn test_round_near_half() {
        assert_eq!(show("Math.round(0.49999999999999994)"), "0");
        assert_eq!(show("Math.round(2.5)"), "3");
        assert_eq!(show("Math.round(-0.5)"), "0");
        assert_eq!(show("Math.round(1e300)"), "1e+300");
    }

    #[test]
    fn test_large_and_small_numbers() {
        assert_eq!(show("1e21"), "1e+21");
        assert_eq!(show("return [1e-7, 123e-20]"), "1e-7,1.23e-18");
    }

    #[test]
    fn test_deep_parentheses_are_a_syntax_error() {
        let code = format!("return {}1{}", "(".repeat(2_000), ")".repeat(2_000));
        assert!(matches!(eval(&code), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn test_console_is_only_capability() {
        assert!(show("require('fs')").starts_with("Error: ReferenceError"));
        assert!(show("process.exit(1)").starts_with("Error: ReferenceError"));
    }
}

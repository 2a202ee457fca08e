//! Values produced by evaluated snippets and their string conversion.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use super::script::Closure;

/// Built-in objects reachable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Console,
    Math,
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Native {
    ConsoleLog,
    MathAbs,
    MathFloor,
    MathCeil,
    MathRound,
    MathSqrt,
    MathMin,
    MathMax,
    MathPow,
    String,
    Number,
    /// Error constructor; the payload is the error name.
    ErrorCtor(&'static str),
}

impl Native {
    pub fn name(&self) -> &'static str {
        match self {
            Native::ConsoleLog => "log",
            Native::MathAbs => "abs",
            Native::MathFloor => "floor",
            Native::MathCeil => "ceil",
            Native::MathRound => "round",
            Native::MathSqrt => "sqrt",
            Native::MathMin => "min",
            Native::MathMax => "max",
            Native::MathPow => "pow",
            Native::String => "String",
            Native::Number => "Number",
            Native::ErrorCtor(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Array),
    Error { name: String, message: String },
    Function(Rc<Closure>),
    Native(Native),
    Namespace(Namespace),
}

/// Shared, mutable array storage. Arrays may contain themselves, so
/// joining and dropping walk the elements with an explicit stack.
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<Vec<Value>>>);

impl Array {
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// `Array.prototype.join`: nested arrays join with commas, `null` and
    /// `undefined` become empty, and an array already being joined
    /// contributes nothing.
    pub fn join(&self, sep: &str) -> String {
        let mut out = String::new();
        let mut open = HashSet::from([Rc::as_ptr(&self.0)]);
        let mut stack = vec![(Rc::clone(&self.0), 0usize)];
        loop {
            let depth = stack.len();
            let Some((items, index)) = stack.last_mut() else {
                break;
            };
            let next = items.borrow().get(*index).cloned();
            let first = *index == 0;
            *index += 1;
            let Some(value) = next else {
                if let Some((done, _)) = stack.pop() {
                    open.remove(&Rc::as_ptr(&done));
                }
                continue;
            };
            if !first {
                out.push_str(if depth == 1 { sep } else { "," });
            }
            match value {
                Value::Array(inner) => {
                    if open.insert(Rc::as_ptr(&inner.0)) {
                        stack.push((Rc::clone(&inner.0), 0));
                    }
                }
                Value::Undefined | Value::Null => {}
                other => out.push_str(&other.to_string()),
            }
        }
        out
    }
}

impl Deref for Array {
    type Target = RefCell<Vec<Value>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.borrow() == *other.0.borrow()
    }
}

// Elements may refer back to the array itself.
impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Array").field(&self.join(",")).finish()
    }
}

impl Drop for Array {
    fn drop(&mut self) {
        let Some(cell) = Rc::get_mut(&mut self.0) else {
            return;
        };
        let mut pending = std::mem::take(cell.get_mut());
        while let Some(value) = pending.pop() {
            if let Value::Array(mut inner) = value {
                if let Some(cell) = Rc::get_mut(&mut inner.0) {
                    pending.append(cell.get_mut());
                }
            }
        }
    }
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Array(Rc::new(RefCell::new(items))))
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Value::Error { name: name.into(), message: message.into() }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => parse_number(s),
            Value::Array(_) => parse_number(&self.to_string()),
            _ => f64::NAN,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Null | Value::Array(_) | Value::Error { .. } | Value::Namespace(_) => "object",
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a == b,
            (Value::Namespace(a), Value::Namespace(b)) => a == b,
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(_), Value::Str(_))
            | (Value::Str(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            (Value::Array(_), Value::Str(_)) | (Value::Str(_), Value::Array(_)) => {
                self.to_string() == other.to_string()
            }
            _ => self.strict_equals(other),
        }
    }
}

fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    match t {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts "inf" and "nan" spellings that scripts do not.
        _ if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => t.parse::<f64>().unwrap_or(f64::NAN),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format_finite(n)
    }
}

/// Shortest round-trip digits, laid out as `Number.prototype.toString`
/// does: plain decimals for exponents in -7..21, scientific otherwise.
fn format_finite(n: f64) -> String {
    let sign = if n < 0.0 { "-" } else { "" };
    let scientific = format!("{:e}", n.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let k = digits.len() as i32;
    // Position of the decimal point relative to the first digit.
    let point = exponent + 1;

    let body = if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat((-point) as usize))
    } else {
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{exp_sign}{}", exponent.abs())
        } else {
            format!("{first}.{rest}e{exp_sign}{}", exponent.abs())
        }
    };
    format!("{sign}{body}")
}

/// Join `console.log` arguments the way an argument list converts to a
/// string: comma separated, `null`/`undefined` as empty.
pub fn join_args(args: &[Value]) -> String {
    args.iter()
        .map(|v| match v {
            Value::Undefined | Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => f.write_str(&items.join(",")),
            Value::Error { name, message } if message.is_empty() => f.write_str(name),
            Value::Error { name, message } => write!(f, "{name}: {message}"),
            Value::Function(closure) => {
                write!(f, "function {}() {{ ... }}", closure.name().unwrap_or(""))
            }
            Value::Native(native) => write!(f, "function {}() {{ [native code] }}", native.name()),
            Value::Namespace(Namespace::Console) => f.write_str("[object console]"),
            Value::Namespace(Namespace::Math) => f.write_str("[object Math]"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from).collect()),
            other @ serde_json::Value::Object(_) => Value::Str(other.to_string()),
        }
    }
}

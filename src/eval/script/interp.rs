//! Tree-walking interpreter for the snippet language.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::ast::*;
use crate::eval::{Capabilities, EvalError, Namespace, Native, Value, CONSOLE};

const MAX_CALL_DEPTH: usize = 100;
const MAX_ARRAY_GROWTH: usize = 1 << 20;
/// Native stack evaluation may use before it fails like a call stack overflow.
const STACK_BUDGET: usize = 1 << 20;

type Env = Rc<RefCell<Scope>>;

#[derive(Debug, Default)]
pub struct Scope {
    vars: HashMap<String, Binding>,
    parent: Option<Env>,
}

#[derive(Debug)]
struct Binding {
    value: Value,
    kind: DeclKind,
}

impl Scope {
    fn child(parent: &Env) -> Env {
        Rc::new(RefCell::new(Scope { vars: HashMap::new(), parent: Some(Rc::clone(parent)) }))
    }
}

/// A function value: its declaration plus the scope it closes over.
pub struct Closure {
    decl: Rc<FunctionDecl>,
    env: Env,
}

impl Closure {
    pub fn name(&self) -> Option<&str> {
        self.decl.name.as_deref()
    }
}

// The captured scope may contain the closure itself.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure").field("name", &self.decl.name).field("params", &self.decl.params).finish()
    }
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Interpreter<'c, 'a> {
    caps: &'c mut Capabilities<'a>,
    globals: Env,
    steps: u64,
    step_limit: u64,
    depth: usize,
    /// Address near the bottom of the native stack when evaluation started.
    stack_base: usize,
    /// Value of the last top-level expression statement.
    completion: Value,
}

fn stack_address() -> usize {
    let marker = 0u8;
    std::ptr::addr_of!(marker) as usize
}

type EResult<T> = Result<T, EvalError>;

impl<'c, 'a> Interpreter<'c, 'a> {
    pub fn new(caps: &'c mut Capabilities<'a>, step_limit: u64) -> Self {
        let globals: Env = Rc::default();
        {
            let mut scope = globals.borrow_mut();
            let mut define = |name: &str, value: Value| {
                scope.vars.insert(name.to_string(), Binding { value, kind: DeclKind::Const });
            };
            define(CONSOLE, Value::Namespace(Namespace::Console));
            define("Math", Value::Namespace(Namespace::Math));
            define("String", Value::Native(Native::String));
            define("Number", Value::Native(Native::Number));
            define("Error", Value::Native(Native::ErrorCtor("Error")));
            define("TypeError", Value::Native(Native::ErrorCtor("TypeError")));
            define("RangeError", Value::Native(Native::ErrorCtor("RangeError")));
            define("NaN", Value::Number(f64::NAN));
            define("Infinity", Value::Number(f64::INFINITY));
        }
        Self { caps, globals, steps: 0, step_limit, depth: 0, stack_base: stack_address(), completion: Value::Undefined }
    }

    pub fn run(&mut self, program: &[Stmt]) -> EResult<Value> {
        let env = Scope::child(&self.globals);
        match self.exec_block(program, &env)? {
            Flow::Return(value) => Ok(value),
            _ => Ok(std::mem::replace(&mut self.completion, Value::Undefined)),
        }
    }

    fn tick(&mut self) -> EResult<()> {
        self.steps += 1;
        if self.step_limit > 0 && self.steps > self.step_limit {
            return Err(EvalError::Range("step limit exceeded".to_string()));
        }
        Ok(())
    }

    /// Deeply nested evaluation fails with a `RangeError` well before the
    /// thread's stack runs out, whatever the size of each frame.
    fn check_stack(&self) -> EResult<()> {
        if stack_address().abs_diff(self.stack_base) > STACK_BUDGET {
            return Err(EvalError::Range("maximum call stack size exceeded".to_string()));
        }
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt], env: &Env) -> EResult<Flow> {
        // Function declarations are visible throughout their block.
        for stmt in stmts {
            if let Stmt::Function(decl) = stmt {
                let name = decl.name.clone().unwrap_or_default();
                let closure = Value::Function(Rc::new(Closure { decl: Rc::clone(decl), env: Rc::clone(env) }));
                env.borrow_mut().vars.insert(name, Binding { value: closure, kind: DeclKind::Var });
            }
        }
        for stmt in stmts {
            match self.exec(stmt, env)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, env: &Env) -> EResult<Flow> {
        self.tick()?;
        self.check_stack()?;
        match stmt {
            Stmt::Empty | Stmt::Function(_) => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                let value = self.eval(expr, env)?;
                if self.depth == 0 {
                    self.completion = value;
                }
                Ok(Flow::Normal)
            }
            Stmt::Decl { kind, name, init, line } => {
                let value = match init {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Undefined,
                };
                let mut scope = env.borrow_mut();
                if let Some(existing) = scope.vars.get(name) {
                    if *kind != DeclKind::Var || existing.kind != DeclKind::Var {
                        return Err(EvalError::syntax(format!("identifier '{name}' has already been declared"), *line));
                    }
                }
                scope.vars.insert(name.clone(), Binding { value, kind: *kind });
                Ok(Flow::Normal)
            }
            Stmt::If { cond, then, otherwise } => {
                if self.eval(cond, env)?.truthy() {
                    self.exec_scoped(then, env)
                } else if let Some(otherwise) = otherwise {
                    self.exec_scoped(otherwise, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(cond, env)?.truthy() {
                    match self.exec_scoped(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For { init, cond, update, body } => {
                let loop_env = Scope::child(env);
                if let Some(init) = init {
                    self.exec(init, &loop_env)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !self.eval(cond, &loop_env)?.truthy() {
                            break;
                        }
                    } else {
                        self.tick()?;
                    }
                    match self.exec_scoped(body, &loop_env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &loop_env)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(stmts) => {
                let block_env = Scope::child(env);
                self.exec_block(stmts, &block_env)
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Throw(expr) => Err(EvalError::Thrown(self.eval(expr, env)?)),
        }
    }

    /// Loop and branch bodies get their own scope unless they are blocks,
    /// which create one anyway.
    fn exec_scoped(&mut self, stmt: &Stmt, env: &Env) -> EResult<Flow> {
        match stmt {
            Stmt::Block(_) => self.exec(stmt, env),
            _ => {
                let inner = Scope::child(env);
                self.exec(stmt, &inner)
            }
        }
    }

    fn lookup(&self, name: &str, env: &Env) -> EResult<Value> {
        let mut current = Some(Rc::clone(env));
        while let Some(scope) = current {
            let scope = scope.borrow();
            if let Some(binding) = scope.vars.get(name) {
                return Ok(binding.value.clone());
            }
            current = scope.parent.clone();
        }
        Err(EvalError::Reference(format!("{name} is not defined")))
    }

    fn assign(&self, name: &str, value: Value, env: &Env) -> EResult<()> {
        let mut current = Some(Rc::clone(env));
        while let Some(scope) = current {
            let mut scope = scope.borrow_mut();
            if let Some(binding) = scope.vars.get_mut(name) {
                if binding.kind == DeclKind::Const {
                    return Err(EvalError::Type("assignment to constant variable".to_string()));
                }
                binding.value = value;
                return Ok(());
            }
            current = scope.parent.clone();
        }
        Err(EvalError::Reference(format!("{name} is not defined")))
    }

    fn eval(&mut self, expr: &Expr, env: &Env) -> EResult<Value> {
        self.check_stack()?;
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::Str(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
                Literal::Undefined => Value::Undefined,
            }),
            Expr::Ident(name) => self.lookup(name, env),
            Expr::Array(items) => {
                let values = items.iter().map(|item| self.eval(item, env)).collect::<EResult<Vec<_>>>()?;
                Ok(Value::array(values))
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand, env)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::TypeOf => Value::from(value.type_of()),
                })
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left, env)?;
                match (op, left.truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.eval(right, env),
                }
            }
            Expr::Conditional(cond, then, otherwise) => {
                if self.eval(cond, env)?.truthy() {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            Expr::Assign { target, op, value } => {
                let rhs = self.eval(value, env)?;
                let new_value = match op {
                    Some(op) => binary(*op, &self.read_target(target, env)?, &rhs),
                    None => rhs,
                };
                self.write_target(target, new_value.clone(), env)?;
                Ok(new_value)
            }
            Expr::Update { target, delta, prefix } => {
                let old = self.read_target(target, env)?.to_number();
                let new = old + delta;
                self.write_target(target, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, env),
            Expr::New { callee, args } => {
                let ctor = self.eval(callee, env)?;
                let args = self.eval_args(args, env)?;
                match ctor {
                    Value::Native(Native::ErrorCtor(name)) => Ok(make_error(name, &args)),
                    _ => Err(EvalError::Type(format!("{} is not a constructor", callee.describe()))),
                }
            }
            Expr::Member { object, property } => {
                let object_value = self.eval(object, env)?;
                member(&object_value, property, object)
            }
            Expr::Index { object, index } => {
                let object_value = self.eval(object, env)?;
                let index = self.eval(index, env)?;
                Ok(index_value(&object_value, &index))
            }
            Expr::Function(decl) => {
                Ok(Value::Function(Rc::new(Closure { decl: Rc::clone(decl), env: Rc::clone(env) })))
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], env: &Env) -> EResult<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg, env)).collect()
    }

    fn read_target(&mut self, target: &Target, env: &Env) -> EResult<Value> {
        match target {
            Target::Ident(name) => self.lookup(name, env),
            Target::Index { object, index } => {
                let object = self.eval(object, env)?;
                let index = self.eval(index, env)?;
                Ok(index_value(&object, &index))
            }
        }
    }

    fn write_target(&mut self, target: &Target, value: Value, env: &Env) -> EResult<()> {
        match target {
            Target::Ident(name) => self.assign(name, value, env),
            Target::Index { object, index } => {
                let object_value = self.eval(object, env)?;
                let index = self.eval(index, env)?.to_number();
                let Value::Array(items) = object_value else {
                    return Err(EvalError::Type(format!("cannot assign to an index of {}", object.describe())));
                };
                if index < 0.0 || index.fract() != 0.0 || !index.is_finite() {
                    return Err(EvalError::Range(format!("invalid array index {index}")));
                }
                let index = index as usize;
                let mut items = items.borrow_mut();
                if index >= items.len() + MAX_ARRAY_GROWTH {
                    return Err(EvalError::Range(format!("invalid array index {index}")));
                }
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                Ok(())
            }
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], env: &Env) -> EResult<Value> {
        // Array methods bind to their receiver.
        if let Expr::Member { object, property } = callee {
            let receiver = self.eval(object, env)?;
            if let Value::Array(items) = &receiver {
                match property.as_str() {
                    "push" => {
                        let args = self.eval_args(args, env)?;
                        let mut items = items.borrow_mut();
                        items.extend(args);
                        return Ok(Value::Number(items.len() as f64));
                    }
                    "join" => {
                        let args = self.eval_args(args, env)?;
                        let sep = match args.first() {
                            None | Some(Value::Undefined) => ",".to_string(),
                            Some(sep) => sep.to_string(),
                        };
                        return Ok(Value::Str(items.join(&sep)));
                    }
                    _ => {}
                }
            }
            let function = member(&receiver, property, object)?;
            let args = self.eval_args(args, env)?;
            return self.call_value(&function, args, callee);
        }

        let function = self.eval(callee, env)?;
        let args = self.eval_args(args, env)?;
        self.call_value(&function, args, callee)
    }

    fn call_value(&mut self, function: &Value, args: Vec<Value>, callee: &Expr) -> EResult<Value> {
        self.tick()?;
        match function {
            Value::Native(native) => self.call_native(*native, &args),
            Value::Function(closure) => {
                if self.depth >= MAX_CALL_DEPTH {
                    return Err(EvalError::Range("maximum call stack size exceeded".to_string()));
                }
                let scope = Scope::child(&closure.env);
                {
                    let mut scope = scope.borrow_mut();
                    let mut args = args.into_iter();
                    for param in &closure.decl.params {
                        let value = args.next().unwrap_or(Value::Undefined);
                        scope.vars.insert(param.clone(), Binding { value, kind: DeclKind::Let });
                    }
                }
                self.depth += 1;
                let result = match &closure.decl.body {
                    FunctionBody::Expr(expr) => self.eval(expr, &scope),
                    FunctionBody::Block(stmts) => self.exec_block(stmts, &scope).map(|flow| match flow {
                        Flow::Return(value) => value,
                        _ => Value::Undefined,
                    }),
                };
                self.depth -= 1;
                result
            }
            _ => Err(EvalError::Type(format!("{} is not a function", callee.describe()))),
        }
    }

    fn call_native(&mut self, native: Native, args: &[Value]) -> EResult<Value> {
        let number = |i: usize| args.get(i).map_or(f64::NAN, Value::to_number);
        Ok(match native {
            Native::ConsoleLog => {
                self.caps.log(args);
                Value::Undefined
            }
            Native::MathAbs => Value::Number(number(0).abs()),
            Native::MathFloor => Value::Number(number(0).floor()),
            Native::MathCeil => Value::Number(number(0).ceil()),
            Native::MathRound => Value::Number(round_half_up(number(0))),
            Native::MathSqrt => Value::Number(number(0).sqrt()),
            Native::MathPow => Value::Number(number(0).powf(number(1))),
            Native::MathMin => Value::Number(
                args.iter().map(Value::to_number).fold(f64::INFINITY, |a, b| if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) }),
            ),
            Native::MathMax => Value::Number(
                args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, |a, b| if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) }),
            ),
            Native::String => Value::Str(args.first().map(Value::to_string).unwrap_or_default()),
            Native::Number => Value::Number(args.first().map_or(0.0, Value::to_number)),
            Native::ErrorCtor(name) => make_error(name, args),
        })
    }
}

/// Halves round toward positive infinity. Adding 0.5 first would round
/// 0.49999999999999994 up.
fn round_half_up(n: f64) -> f64 {
    let floor = n.floor();
    if n - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

fn make_error(name: &str, args: &[Value]) -> Value {
    let message = match args.first() {
        None | Some(Value::Undefined) => String::new(),
        Some(message) => message.to_string(),
    };
    Value::error(name, message)
}

fn member(object: &Value, property: &str, object_expr: &Expr) -> EResult<Value> {
    Ok(match (object, property) {
        (Value::Undefined | Value::Null, _) => {
            return Err(EvalError::Type(format!(
                "cannot read properties of {object} (reading '{property}' of {})",
                object_expr.describe()
            )))
        }
        (Value::Array(items), "length") => Value::Number(items.borrow().len() as f64),
        (Value::Str(s), "length") => Value::Number(s.encode_utf16().count() as f64),
        (Value::Error { name, .. }, "name") => Value::Str(name.clone()),
        (Value::Error { message, .. }, "message") => Value::Str(message.clone()),
        (Value::Namespace(Namespace::Console), "log") => Value::Native(Native::ConsoleLog),
        (Value::Namespace(Namespace::Math), name) => match name {
            "PI" => Value::Number(std::f64::consts::PI),
            "E" => Value::Number(std::f64::consts::E),
            "abs" => Value::Native(Native::MathAbs),
            "floor" => Value::Native(Native::MathFloor),
            "ceil" => Value::Native(Native::MathCeil),
            "round" => Value::Native(Native::MathRound),
            "sqrt" => Value::Native(Native::MathSqrt),
            "min" => Value::Native(Native::MathMin),
            "max" => Value::Native(Native::MathMax),
            "pow" => Value::Native(Native::MathPow),
            _ => Value::Undefined,
        },
        _ => Value::Undefined,
    })
}

fn index_value(object: &Value, index: &Value) -> Value {
    match object {
        Value::Array(items) => {
            let i = index.to_number();
            if i >= 0.0 && i.fract() == 0.0 {
                items.borrow().get(i as usize).cloned().unwrap_or(Value::Undefined)
            } else {
                Value::Undefined
            }
        }
        Value::Str(s) => {
            let i = index.to_number();
            if i >= 0.0 && i.fract() == 0.0 {
                s.chars().nth(i as usize).map(|c| Value::Str(c.to_string())).unwrap_or(Value::Undefined)
            } else {
                Value::Undefined
            }
        }
        _ => Value::Undefined,
    }
}

fn is_stringish(value: &Value) -> bool {
    !matches!(value, Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_))
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add if is_stringish(left) || is_stringish(right) => Value::Str(format!("{left}{right}")),
        BinaryOp::Add => Value::Number(left.to_number() + right.to_number()),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Pow => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            let Some(ordering) = ordering else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::LtEq => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}

//! Syntax tree for the snippet language.

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Decl { kind: DeclKind, name: String, init: Option<Expr>, line: usize },
    Expr(Expr),
    If { cond: Expr, then: Box<Stmt>, otherwise: Option<Box<Stmt>> },
    While { cond: Expr, body: Box<Stmt> },
    For { init: Option<Box<Stmt>>, cond: Option<Expr>, update: Option<Expr>, body: Box<Stmt> },
    Block(Vec<Stmt>),
    Break,
    Continue,
    Return(Option<Expr>),
    Throw(Expr),
    Function(Rc<FunctionDecl>),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// Concise arrow body: `x => x * 2`.
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Left-hand side of an assignment or update.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Ident(String),
    Index { object: Box<Expr>, index: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    Array(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign { target: Target, op: Option<BinaryOp>, value: Box<Expr> },
    Update { target: Target, delta: f64, prefix: bool },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    New { callee: Box<Expr>, args: Vec<Expr> },
    Member { object: Box<Expr>, property: String },
    Index { object: Box<Expr>, index: Box<Expr> },
    Function(Rc<FunctionDecl>),
}

impl Expr {
    /// Short source-like rendering used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Expr::Ident(name) => name.clone(),
            Expr::Member { object, property } => format!("{}.{}", object.describe(), property),
            Expr::Index { object, .. } => format!("{}[...]", object.describe()),
            Expr::Call { callee, .. } => format!("{}(...)", callee.describe()),
            Expr::Literal(Literal::Str(s)) => format!("\"{s}\""),
            Expr::Literal(Literal::Number(n)) => n.to_string(),
            _ => "expression".to_string(),
        }
    }
}

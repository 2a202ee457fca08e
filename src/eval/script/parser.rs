//! Recursive-descent parser for the snippet language.
//!
//! Statements may end with `;` or a line break. A top-level `return` ends
//! the snippet with its value.

use std::rc::Rc;

use super::ast::*;
use super::lexer::{tokenize, Token, TokenKind};
use crate::eval::EvalError;

/// Deepest statement or expression nesting a snippet may use.
const MAX_NESTING: usize = 100;

const RESERVED: &[&str] = &[
    "let", "const", "var", "if", "else", "while", "for", "break", "continue", "return", "throw",
    "function", "new", "typeof", "true", "false", "null", "undefined",
];

pub fn parse(source: &str) -> Result<Vec<Stmt>, EvalError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0, loop_depth: 0, depth: 0 };
    let mut program = Vec::new();
    while !parser.at_eof() {
        program.push(parser.statement()?);
    }
    Ok(program)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    loop_depth: usize,
    depth: usize,
}

type PResult<T> = Result<T, EvalError>;

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Punct(q) if *q == p)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(name) if name == kw)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> EvalError {
        let token = self.peek();
        let what = match &token.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Punct(p) => format!("token '{p}'"),
        };
        EvalError::syntax(format!("unexpected {what}"), token.line)
    }

    fn expect_punct(&mut self, p: &str) -> PResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn identifier(&mut self) -> PResult<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// `;`, or an implied terminator before `}`, end of input or a line break.
    fn terminator(&mut self) -> PResult<()> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(EvalError::syntax("nesting too deep", self.peek().line));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn statement(&mut self) -> PResult<Stmt> {
        self.nested(Self::statement_kind)
    }

    fn statement_kind(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.is_punct("{") {
            return self.block().map(Stmt::Block);
        }
        for (kw, kind) in [("let", DeclKind::Let), ("const", DeclKind::Const), ("var", DeclKind::Var)] {
            if self.eat_keyword(kw) {
                let stmt = self.declaration(kind, line)?;
                self.terminator()?;
                return Ok(stmt);
            }
        }
        if self.eat_keyword("if") {
            self.expect_punct("(")?;
            let cond = self.expression()?;
            self.expect_punct(")")?;
            let then = Box::new(self.statement()?);
            let otherwise = if self.eat_keyword("else") { Some(Box::new(self.statement()?)) } else { None };
            return Ok(Stmt::If { cond, then, otherwise });
        }
        if self.eat_keyword("while") {
            self.expect_punct("(")?;
            let cond = self.expression()?;
            self.expect_punct(")")?;
            let body = Box::new(self.loop_body()?);
            return Ok(Stmt::While { cond, body });
        }
        if self.eat_keyword("for") {
            return self.for_statement();
        }
        if self.eat_keyword("break") {
            if self.loop_depth == 0 {
                return Err(EvalError::syntax("illegal break statement", line));
            }
            self.terminator()?;
            return Ok(Stmt::Break);
        }
        if self.eat_keyword("continue") {
            if self.loop_depth == 0 {
                return Err(EvalError::syntax("illegal continue statement", line));
            }
            self.terminator()?;
            return Ok(Stmt::Continue);
        }
        if self.eat_keyword("return") {
            let value = if self.is_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before {
                None
            } else {
                Some(self.expression()?)
            };
            self.terminator()?;
            return Ok(Stmt::Return(value));
        }
        if self.eat_keyword("throw") {
            if self.peek().newline_before {
                return Err(EvalError::syntax("illegal newline after throw", line));
            }
            let value = self.expression()?;
            self.terminator()?;
            return Ok(Stmt::Throw(value));
        }
        if self.is_keyword("function") && matches!(self.peek_at(1).kind, TokenKind::Ident(_)) {
            self.advance();
            let name = self.identifier()?;
            let decl = self.function_rest(Some(name))?;
            return Ok(Stmt::Function(decl));
        }

        let expr = self.expression()?;
        self.terminator()?;
        Ok(Stmt::Expr(expr))
    }

    fn declaration(&mut self, kind: DeclKind, line: usize) -> PResult<Stmt> {
        let name = self.identifier()?;
        let init = if self.eat_punct("=") { Some(self.assignment()?) } else { None };
        if kind == DeclKind::Const && init.is_none() {
            return Err(EvalError::syntax("missing initializer in const declaration", line));
        }
        Ok(Stmt::Decl { kind, name, init, line })
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut stmts = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            stmts.push(self.statement()?);
        }
        self.advance();
        Ok(stmts)
    }

    fn loop_body(&mut self) -> PResult<Stmt> {
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        body
    }

    fn for_statement(&mut self) -> PResult<Stmt> {
        self.expect_punct("(")?;
        let line = self.peek().line;
        let init = if self.eat_punct(";") {
            None
        } else {
            let kind = [("let", DeclKind::Let), ("const", DeclKind::Const), ("var", DeclKind::Var)]
                .into_iter()
                .find(|(kw, _)| self.is_keyword(kw))
                .map(|(_, kind)| kind);
            let stmt = match kind {
                Some(kind) => {
                    self.advance();
                    self.declaration(kind, line)?
                }
                None => Stmt::Expr(self.expression()?),
            };
            self.expect_punct(";")?;
            Some(Box::new(stmt))
        };
        let cond = if self.is_punct(";") { None } else { Some(self.expression()?) };
        self.expect_punct(";")?;
        let update = if self.is_punct(")") { None } else { Some(self.expression()?) };
        self.expect_punct(")")?;
        let body = Box::new(self.loop_body()?);
        Ok(Stmt::For { init, cond, update, body })
    }

    /// Parameters and body after `function name?`.
    fn function_rest(&mut self, name: Option<String>) -> PResult<Rc<FunctionDecl>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.eat_punct(")") {
            params.push(self.identifier()?);
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }
        let body = self.function_block()?;
        Ok(Rc::new(FunctionDecl { name, params, body: FunctionBody::Block(body) }))
    }

    fn function_block(&mut self) -> PResult<Vec<Stmt>> {
        // Loops do not extend into nested functions.
        let saved = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.block();
        self.loop_depth = saved;
        body
    }

    pub fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> PResult<Expr> {
        self.nested(Self::assignment_kind)
    }

    fn assignment_kind(&mut self) -> PResult<Expr> {
        if self.arrow_ahead() {
            return self.arrow();
        }

        let left = self.conditional()?;
        let op = match &self.peek().kind {
            TokenKind::Punct("=") => None,
            TokenKind::Punct("+=") => Some(BinaryOp::Add),
            TokenKind::Punct("-=") => Some(BinaryOp::Sub),
            TokenKind::Punct("*=") => Some(BinaryOp::Mul),
            TokenKind::Punct("/=") => Some(BinaryOp::Div),
            TokenKind::Punct("%=") => Some(BinaryOp::Rem),
            _ => return Ok(left),
        };
        let line = self.advance().line;
        let target = to_target(left, line)?;
        let value = Box::new(self.assignment()?);
        Ok(Expr::Assign { target, op, value })
    }

    /// `x =>` or `( ... ) =>` at the current position.
    fn arrow_ahead(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                matches!(self.peek_at(1).kind, TokenKind::Punct("=>"))
            }
            TokenKind::Punct("(") => {
                let mut depth = 0usize;
                let mut offset = 0;
                loop {
                    match &self.peek_at(offset).kind {
                        TokenKind::Punct("(") => depth += 1,
                        TokenKind::Punct(")") => {
                            depth -= 1;
                            if depth == 0 {
                                return matches!(self.peek_at(offset + 1).kind, TokenKind::Punct("=>"));
                            }
                        }
                        TokenKind::Eof => return false,
                        _ => {}
                    }
                    offset += 1;
                }
            }
            _ => false,
        }
    }

    fn arrow(&mut self) -> PResult<Expr> {
        let mut params = Vec::new();
        if self.eat_punct("(") {
            while !self.eat_punct(")") {
                params.push(self.identifier()?);
                if !self.is_punct(")") {
                    self.expect_punct(",")?;
                }
            }
        } else {
            params.push(self.identifier()?);
        }
        self.expect_punct("=>")?;
        let body = if self.is_punct("{") {
            FunctionBody::Block(self.function_block()?)
        } else {
            FunctionBody::Expr(self.assignment()?)
        };
        Ok(Expr::Function(Rc::new(FunctionDecl { name: None, params, body })))
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let cond = self.logical_or()?;
        if !self.eat_punct("?") {
            return Ok(cond);
        }
        let then = self.assignment()?;
        self.expect_punct(":")?;
        let otherwise = self.assignment()?;
        Ok(Expr::Conditional(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    fn logical_or(&mut self) -> PResult<Expr> {
        let mut left = self.logical_and()?;
        while self.eat_punct("||") {
            let right = self.logical_and()?;
            left = Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> PResult<Expr> {
        let mut left = self.equality()?;
        while self.eat_punct("&&") {
            let right = self.equality()?;
            left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let mut left = next(self)?;
        'outer: loop {
            for (p, op) in ops {
                if self.eat_punct(p) {
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn equality(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNotEq),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::NotEq),
            ],
            Self::relational,
        )
    }

    fn relational(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[("<=", BinaryOp::LtEq), (">=", BinaryOp::GtEq), ("<", BinaryOp::Lt), (">", BinaryOp::Gt)],
            Self::additive,
        )
    }

    fn additive(&mut self) -> PResult<Expr> {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
            Self::exponent,
        )
    }

    fn exponent(&mut self) -> PResult<Expr> {
        let base = self.unary()?;
        if self.eat_punct("**") {
            // Right associative.
            let power = self.nested(Self::exponent)?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(power)));
        }
        Ok(base)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let op = if self.eat_punct("-") {
            Some(UnaryOp::Neg)
        } else if self.eat_punct("+") {
            Some(UnaryOp::Plus)
        } else if self.eat_punct("!") {
            Some(UnaryOp::Not)
        } else if self.eat_keyword("typeof") {
            Some(UnaryOp::TypeOf)
        } else {
            None
        };
        if let Some(op) = op {
            let operand = self.nested(Self::unary)?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }
        for (p, delta) in [("++", 1.0), ("--", -1.0)] {
            if self.eat_punct(p) {
                let operand = self.nested(Self::unary)?;
                let target = to_target(operand, line)?;
                return Ok(Expr::Update { target, delta, prefix: true });
            }
        }
        self.postfix()
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let expr = self.call()?;
        if self.peek().newline_before {
            return Ok(expr);
        }
        for (p, delta) in [("++", 1.0), ("--", -1.0)] {
            if self.is_punct(p) {
                let line = self.advance().line;
                let target = to_target(expr, line)?;
                return Ok(Expr::Update { target, delta, prefix: false });
            }
        }
        Ok(expr)
    }

    fn call(&mut self) -> PResult<Expr> {
        let mut expr = if self.eat_keyword("new") {
            let callee = self.member_chain()?;
            let args = if self.is_punct("(") { self.arguments()? } else { Vec::new() };
            Expr::New { callee: Box::new(callee), args }
        } else {
            self.primary()?
        };

        loop {
            if self.eat_punct(".") {
                let property = match self.advance().kind {
                    TokenKind::Ident(name) => name,
                    _ => return Err(EvalError::syntax("expected property name after '.'", self.peek().line)),
                };
                expr = Expr::Member { object: Box::new(expr), property };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index { object: Box::new(expr), index: Box::new(index) };
            } else if self.is_punct("(") {
                let args = self.arguments()?;
                expr = Expr::Call { callee: Box::new(expr), args };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Callee of a `new` expression: a primary followed by member accesses.
    fn member_chain(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        while self.eat_punct(".") {
            let property = self.identifier()?;
            expr = Expr::Member { object: Box::new(expr), property };
        }
        Ok(expr)
    }

    fn arguments(&mut self) -> PResult<Vec<Expr>> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            args.push(self.assignment()?);
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s)))
            }
            TokenKind::Punct("(") => {
                self.advance();
                let expr = self.expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => {
                self.advance();
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    items.push(self.assignment()?);
                    if !self.is_punct("]") {
                        self.expect_punct(",")?;
                    }
                }
                Ok(Expr::Array(items))
            }
            TokenKind::Ident(ref name) => match name.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Literal(Literal::Bool(true)))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Literal(Literal::Bool(false)))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Literal(Literal::Null))
                }
                "undefined" => {
                    self.advance();
                    Ok(Expr::Literal(Literal::Undefined))
                }
                "function" => {
                    self.advance();
                    let name = if matches!(self.peek().kind, TokenKind::Ident(_)) { Some(self.identifier()?) } else { None };
                    Ok(Expr::Function(self.function_rest(name)?))
                }
                _ => Ok(Expr::Ident(self.identifier()?)),
            },
            _ => Err(self.unexpected()),
        }
    }
}

fn to_target(expr: Expr, line: usize) -> PResult<Target> {
    match expr {
        Expr::Ident(name) => Ok(Target::Ident(name)),
        Expr::Index { object, index } => Ok(Target::Index { object, index }),
        _ => Err(EvalError::syntax("invalid assignment target", line)),
    }
}

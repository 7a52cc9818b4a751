//! Recursive-descent parser producing [`Program`].
//!
//! Accepts the statement and expression forms the interpreter implements and
//! rejects everything else as a syntax error at the offending token.

use std::sync::Arc;

use crate::error::{AdmissionKind, ScriptError};
use crate::script::ast::{
    BinOp, BoolOp, Callee, CmpOp, Const, Expr, FunctionDef, Param, Program, Stmt, StmtKind, Target,
    UnaryOp,
};
use crate::script::lexer::{Keyword, Token, TokenKind};

/// Deepest expression or block nesting accepted.
pub const MAX_NESTING: usize = 64;

type ParseResult<T> = Result<T, ScriptError>;

/// Parse a token stream that ends with `EndOfFile`.
///
/// # Errors
///
/// Returns a [`ScriptError`] of kind [`AdmissionKind::Syntax`] at the first
/// token that does not fit the grammar.
pub fn parse(source: &str, tokens: &[Token]) -> ParseResult<Program> {
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        depth: 0,
        loops: 0,
    };
    let mut body = Vec::new();
    while !parser.at(&TokenKind::EndOfFile) {
        parser.statement(&mut body)?;
    }
    Ok(Program { body })
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    loops: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        // The stream always ends with EndOfFile, which is never consumed.
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_next(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + 1).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::EndOfFile {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn at_punct(&self, p: &str) -> bool {
        self.peek().is_punct(p)
    }

    fn at_keyword(&self, k: Keyword) -> bool {
        self.peek().is_keyword(k)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.at_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, k: Keyword) -> bool {
        if self.at_keyword(k) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_at(&self, token: &Token, reason: impl Into<String>) -> ScriptError {
        ScriptError::new(AdmissionKind::Syntax, self.source, token.line, token.column, reason)
    }

    fn unexpected(&self) -> ScriptError {
        let token = self.peek();
        let reason = match token.kind {
            TokenKind::Indent => "unexpected indent".to_string(),
            TokenKind::Dedent => "unexpected unindent".to_string(),
            _ => format!("invalid syntax: unexpected {}", token.kind),
        };
        self.error_at(token, reason)
    }

    fn expect_punct(&mut self, p: &str) -> ParseResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            let token = self.peek();
            Err(self.error_at(token, format!("expected '{p}', found {}", token.kind)))
        }
    }

    fn expect_name(&mut self) -> ParseResult<Arc<str>> {
        match &self.peek().kind {
            TokenKind::Name(name) => {
                let name = Arc::from(name.as_str());
                self.advance();
                Ok(name)
            }
            _ => {
                let token = self.peek();
                Err(self.error_at(token, format!("expected a name, found {}", token.kind)))
            }
        }
    }

    fn expect_newline(&mut self) -> ParseResult<()> {
        match self.peek().kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::EndOfFile => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let token = self.peek();
            return Err(self.error_at(token, "too many nested parentheses or blocks"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ---- statements ----

    fn statement(&mut self, out: &mut Vec<Stmt>) -> ParseResult<()> {
        let token = self.peek().clone();
        let line = token.line;
        let kind = match token.kind {
            TokenKind::Keyword(Keyword::If) => self.if_statement()?,
            TokenKind::Keyword(Keyword::While) => {
                self.advance();
                let test = self.expression()?;
                self.expect_punct(":")?;
                let body = self.loop_body()?;
                StmtKind::While { test, body }
            }
            TokenKind::Keyword(Keyword::For) => {
                self.advance();
                let target = self.target_list()?;
                if !self.eat_keyword(Keyword::In) {
                    let token = self.peek();
                    return Err(self.error_at(token, "expected 'in'"));
                }
                let iter = self.expression_list()?;
                self.expect_punct(":")?;
                let body = self.loop_body()?;
                StmtKind::For { target, iter, body }
            }
            TokenKind::Keyword(Keyword::Def) => self.def_statement(line)?,
            TokenKind::Keyword(Keyword::Elif | Keyword::Else) | TokenKind::Indent | TokenKind::Dedent => {
                return Err(self.unexpected());
            }
            _ => return self.simple_statements(out),
        };
        out.push(Stmt { line, kind });
        Ok(())
    }

    fn simple_statements(&mut self, out: &mut Vec<Stmt>) -> ParseResult<()> {
        loop {
            let line = self.peek().line;
            let kind = self.small_statement()?;
            out.push(Stmt { line, kind });
            if self.at(&TokenKind::Semicolon) {
                self.advance();
                if matches!(self.peek().kind, TokenKind::Newline | TokenKind::EndOfFile) {
                    break;
                }
            } else {
                break;
            }
        }
        self.expect_newline()
    }

    fn small_statement(&mut self) -> ParseResult<StmtKind> {
        if self.eat_keyword(Keyword::Pass) {
            return Ok(StmtKind::Pass);
        }
        for (keyword, kind) in [(Keyword::Break, StmtKind::Break), (Keyword::Continue, StmtKind::Continue)] {
            if self.at_keyword(keyword) {
                if self.loops == 0 {
                    let token = self.peek();
                    return Err(self.error_at(token, format!("'{}' outside loop", keyword.as_str())));
                }
                self.advance();
                return Ok(kind);
            }
        }
        if self.eat_keyword(Keyword::Return) {
            if matches!(self.peek().kind, TokenKind::Newline | TokenKind::Semicolon | TokenKind::EndOfFile) {
                return Ok(StmtKind::Return(None));
            }
            return Ok(StmtKind::Return(Some(self.expression_list()?)));
        }

        let start = self.peek().clone();
        let first = self.expression_list()?;

        if let Some(op) = self.augmented_operator() {
            let target = self.to_target(first, &start)?;
            if matches!(target, Target::Tuple(_)) {
                return Err(self.error_at(&start, "illegal expression for augmented assignment"));
            }
            self.advance();
            let value = self.expression()?;
            return Ok(StmtKind::AugAssign { target, op, value });
        }

        if self.at_punct("=") {
            let mut chain = vec![(first, start.clone())];
            while self.eat_punct("=") {
                let start = self.peek().clone();
                chain.push((self.expression_list()?, start));
            }
            let (value, _) = chain.pop().unwrap_or((Expr::Const(Const::None), start));
            let targets = chain
                .into_iter()
                .map(|(expr, token)| self.to_target(expr, &token))
                .collect::<ParseResult<Vec<_>>>()?;
            return Ok(StmtKind::Assign { targets, value });
        }

        Ok(StmtKind::Expr(first))
    }

    fn augmented_operator(&self) -> Option<BinOp> {
        match self.peek().kind {
            TokenKind::Punct("+=") => Some(BinOp::Add),
            TokenKind::Punct("-=") => Some(BinOp::Sub),
            TokenKind::Punct("*=") => Some(BinOp::Mul),
            TokenKind::Punct("/=") => Some(BinOp::Div),
            TokenKind::Punct("//=") => Some(BinOp::FloorDiv),
            TokenKind::Punct("%=") => Some(BinOp::Mod),
            TokenKind::Punct("**=") => Some(BinOp::Pow),
            TokenKind::Punct("|=") => Some(BinOp::BitOr),
            TokenKind::Punct("&=") => Some(BinOp::BitAnd),
            TokenKind::Punct("^=") => Some(BinOp::BitXor),
            _ => None,
        }
    }

    fn to_target(&self, expr: Expr, token: &Token) -> ParseResult<Target> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Index { value, index } => Ok(Target::Index {
                value: *value,
                index: *index,
            }),
            Expr::Tuple(items) | Expr::List(items) => items
                .into_iter()
                .map(|item| self.to_target(item, token))
                .collect::<ParseResult<Vec<_>>>()
                .map(Target::Tuple),
            _ => Err(self.error_at(token, "cannot assign to expression")),
        }
    }

    fn target_list(&mut self) -> ParseResult<Target> {
        let start = self.peek().clone();
        let mut items = vec![self.arith_expr()?];
        let mut tuple = false;
        while self.eat_punct(",") {
            tuple = true;
            if self.at_keyword(Keyword::In) {
                break;
            }
            items.push(self.arith_expr()?);
        }
        let expr = if tuple {
            Expr::Tuple(items)
        } else {
            items.pop().unwrap_or(Expr::Const(Const::None))
        };
        self.to_target(expr, &start)
    }

    fn if_statement(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let mut branches = Vec::new();
        let test = self.expression()?;
        self.expect_punct(":")?;
        branches.push((test, self.block()?));
        let mut orelse = Vec::new();
        loop {
            if self.eat_keyword(Keyword::Elif) {
                let test = self.expression()?;
                self.expect_punct(":")?;
                branches.push((test, self.block()?));
            } else if self.eat_keyword(Keyword::Else) {
                self.expect_punct(":")?;
                orelse = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(StmtKind::If { branches, orelse })
    }

    fn def_statement(&mut self, line: usize) -> ParseResult<StmtKind> {
        self.advance();
        let name = self.expect_name()?;
        self.expect_punct("(")?;
        let mut params: Vec<Param> = Vec::new();
        while !self.at_punct(")") {
            let token = self.peek().clone();
            let name = self.expect_name()?;
            if params.iter().any(|p| p.name == name) {
                return Err(self.error_at(&token, format!("duplicate argument '{name}' in function definition")));
            }
            let default = if self.eat_punct("=") {
                Some(self.expression()?)
            } else {
                if params.iter().any(|p| p.default.is_some()) {
                    return Err(self.error_at(&token, "non-default argument follows default argument"));
                }
                None
            };
            params.push(Param { name, default });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        self.expect_punct(":")?;
        let enclosing_loops = std::mem::take(&mut self.loops);
        let body = self.block();
        self.loops = enclosing_loops;
        let body = body?;
        Ok(StmtKind::Def(Arc::new(FunctionDef {
            name,
            params,
            body,
            line,
        })))
    }

    fn loop_body(&mut self) -> ParseResult<Vec<Stmt>> {
        self.loops += 1;
        let body = self.block();
        self.loops -= 1;
        body
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut body = Vec::new();
        if !self.at(&TokenKind::Newline) {
            self.simple_statements(&mut body)?;
            return Ok(body);
        }
        self.advance();
        if !self.at(&TokenKind::Indent) {
            let token = self.peek();
            return Err(self.error_at(token, "expected an indented block"));
        }
        self.advance();
        self.enter()?;
        while !self.at(&TokenKind::Dedent) && !self.at(&TokenKind::EndOfFile) {
            self.statement(&mut body)?;
        }
        self.leave();
        if self.at(&TokenKind::Dedent) {
            self.advance();
        }
        Ok(body)
    }

    // ---- expressions ----

    /// `a, b` forms a tuple; a single expression stays as is.
    fn expression_list(&mut self) -> ParseResult<Expr> {
        let first = self.expression()?;
        if !self.at_punct(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            if self.ends_expression_list() {
                break;
            }
            items.push(self.expression()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn ends_expression_list(&self) -> bool {
        let token = self.peek();
        matches!(
            token.kind,
            TokenKind::Newline | TokenKind::EndOfFile | TokenKind::Semicolon
        ) || token.is_punct("=")
            || token.is_punct(")")
            || token.is_punct(":")
            || self.augmented_operator().is_some()
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        let body = self.or_test()?;
        let expr = if self.eat_keyword(Keyword::If) {
            let test = self.or_test()?;
            if !self.eat_keyword(Keyword::Else) {
                let token = self.peek().clone();
                self.leave();
                return Err(self.error_at(&token, "expected 'else' after conditional expression"));
            }
            let orelse = self.expression()?;
            Expr::Conditional {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            }
        } else {
            body
        };
        self.leave();
        Ok(expr)
    }

    fn or_test(&mut self) -> ParseResult<Expr> {
        let mut left = self.and_test()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.and_test()?;
            left = Expr::Logical {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_test(&mut self) -> ParseResult<Expr> {
        let mut left = self.not_test()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.not_test()?;
            left = Expr::Logical {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_test(&mut self) -> ParseResult<Expr> {
        if self.eat_keyword(Keyword::Not) {
            self.enter()?;
            let operand = self.not_test()?;
            self.leave();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison_operator(&mut self) -> Option<CmpOp> {
        let op = match self.peek().kind {
            TokenKind::Punct("==") => CmpOp::Eq,
            TokenKind::Punct("!=") => CmpOp::Ne,
            TokenKind::Punct("<") => CmpOp::Lt,
            TokenKind::Punct("<=") => CmpOp::Le,
            TokenKind::Punct(">") => CmpOp::Gt,
            TokenKind::Punct(">=") => CmpOp::Ge,
            TokenKind::Keyword(Keyword::In) => CmpOp::In,
            TokenKind::Keyword(Keyword::Not) if self.peek_next().is_keyword(Keyword::In) => {
                self.advance();
                CmpOp::NotIn
            }
            TokenKind::Keyword(Keyword::Is) => {
                if self.peek_next().is_keyword(Keyword::Not) {
                    self.advance();
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                }
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let left = self.bit_or()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_operator() {
            rest.push((op, self.bit_or()?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                rest,
            })
        }
    }

    fn bit_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.bit_xor()?;
        while self.eat_punct("|") {
            let right = self.bit_xor()?;
            left = binary(BinOp::BitOr, left, right);
        }
        Ok(left)
    }

    fn bit_xor(&mut self) -> ParseResult<Expr> {
        let mut left = self.bit_and()?;
        while self.eat_punct("^") {
            let right = self.bit_and()?;
            left = binary(BinOp::BitXor, left, right);
        }
        Ok(left)
    }

    fn bit_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.arith_expr()?;
        while self.eat_punct("&") {
            let right = self.arith_expr()?;
            left = binary(BinOp::BitAnd, left, right);
        }
        Ok(left)
    }

    /// Additive level.
    fn arith_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Punct("+") => BinOp::Add,
                TokenKind::Punct("-") => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = binary(op, left, right);
        }
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Punct("*") => BinOp::Mul,
                TokenKind::Punct("/") => BinOp::Div,
                TokenKind::Punct("//") => BinOp::FloorDiv,
                TokenKind::Punct("%") => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.factor()?;
            left = binary(op, left, right);
        }
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Pos),
            _ => None,
        };
        let Some(op) = op else {
            return self.power();
        };
        self.advance();
        self.enter()?;
        let operand = self.factor()?;
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> ParseResult<Expr> {
        let base = self.primary()?;
        if self.eat_punct("**") {
            self.enter()?;
            let exponent = self.factor()?;
            self.leave();
            return Ok(binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            if self.at_punct("(") {
                let token = self.peek().clone();
                let Expr::Name(name) = expr else {
                    return Err(self.error_at(&token, "only named functions can be called"));
                };
                let column = self.tokens[self.pos.saturating_sub(1)].column;
                self.advance();
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Callee::Unresolved(name),
                    args,
                    column,
                };
            } else if self.at_punct("[") {
                self.advance();
                expr = self.subscript(expr)?;
            } else if self.at_punct(".") {
                let dot = self.peek().clone();
                let Expr::Name(qualifier) = expr else {
                    return Err(self.error_at(&dot, "Use of \".\" is not allowed"));
                };
                let column = self.tokens[self.pos.saturating_sub(1)].column;
                self.advance();
                let member = self.expect_name()?;
                expr = Expr::Member {
                    qualifier,
                    member,
                    column,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.at_punct(")") {
            if matches!(self.peek().kind, TokenKind::Name(_)) && self.peek_next().is_punct("=") {
                let token = self.peek();
                return Err(self.error_at(token, "keyword arguments are not supported"));
            }
            if self.at_punct("*") || self.at_punct("**") {
                let token = self.peek();
                return Err(self.error_at(token, "argument unpacking is not supported"));
            }
            args.push(self.expression()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    fn subscript(&mut self, value: Expr) -> ParseResult<Expr> {
        let lower = if self.at_punct(":") {
            None
        } else {
            Some(self.expression()?)
        };
        if self.eat_punct(":") {
            let upper = if self.at_punct("]") {
                None
            } else {
                Some(Box::new(self.expression()?))
            };
            if self.at_punct(":") {
                let token = self.peek();
                return Err(self.error_at(token, "slice steps are not supported"));
            }
            self.expect_punct("]")?;
            return Ok(Expr::Slice {
                value: Box::new(value),
                lower: lower.map(Box::new),
                upper,
            });
        }
        self.expect_punct("]")?;
        let Some(index) = lower else {
            let token = self.peek();
            return Err(self.error_at(token, "empty subscript"));
        };
        Ok(Expr::Index {
            value: Box::new(value),
            index: Box::new(index),
        })
    }

    fn atom(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        let expr = match token.kind {
            TokenKind::Name(name) => Expr::Name(Arc::from(name.as_str())),
            TokenKind::Int(v) => Expr::Const(Const::Int(v)),
            TokenKind::Float(v) => Expr::Const(Const::Float(v)),
            TokenKind::Keyword(Keyword::True) => Expr::Const(Const::Bool(true)),
            TokenKind::Keyword(Keyword::False) => Expr::Const(Const::Bool(false)),
            TokenKind::Keyword(Keyword::None) => Expr::Const(Const::None),
            TokenKind::Str(first) => {
                self.advance();
                // Adjacent literals concatenate.
                let mut text = first;
                while let TokenKind::Str(next) = &self.peek().kind {
                    text.push_str(next);
                    self.advance();
                }
                return Ok(Expr::Const(Const::Str(Arc::from(text.as_str()))));
            }
            TokenKind::Punct("(") => {
                self.advance();
                self.enter()?;
                let expr = self.parenthesized()?;
                self.leave();
                return Ok(expr);
            }
            TokenKind::Punct("[") => {
                self.advance();
                self.enter()?;
                let mut items = Vec::new();
                while !self.at_punct("]") {
                    items.push(self.expression()?);
                    if self.at_keyword(Keyword::For) {
                        let token = self.peek();
                        return Err(self.error_at(token, "comprehensions are not supported"));
                    }
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct("]")?;
                self.leave();
                return Ok(Expr::List(items));
            }
            TokenKind::Punct("{") => {
                self.advance();
                self.enter()?;
                let expr = self.braced()?;
                self.leave();
                return Ok(expr);
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(expr)
    }

    /// `{}` and `{k: v}` are dicts, `{a, b}` is a set.
    fn braced(&mut self) -> ParseResult<Expr> {
        if self.eat_punct("}") {
            return Ok(Expr::Dict(Vec::new()));
        }
        let first = self.expression()?;
        if self.at_keyword(Keyword::For) {
            let token = self.peek();
            return Err(self.error_at(token, "comprehensions are not supported"));
        }
        if self.eat_punct(":") {
            let mut entries = vec![(first, self.expression()?)];
            while self.eat_punct(",") {
                if self.at_punct("}") {
                    break;
                }
                let key = self.expression()?;
                self.expect_punct(":")?;
                entries.push((key, self.expression()?));
            }
            if self.at_keyword(Keyword::For) {
                let token = self.peek();
                return Err(self.error_at(token, "comprehensions are not supported"));
            }
            self.expect_punct("}")?;
            return Ok(Expr::Dict(entries));
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            if self.at_punct("}") {
                break;
            }
            items.push(self.expression()?);
        }
        self.expect_punct("}")?;
        Ok(Expr::Set(items))
    }

    fn parenthesized(&mut self) -> ParseResult<Expr> {
        if self.eat_punct(")") {
            return Ok(Expr::Tuple(Vec::new()));
        }
        let first = self.expression()?;
        if self.at_keyword(Keyword::For) {
            let token = self.peek();
            return Err(self.error_at(token, "generator expressions are not supported"));
        }
        if self.eat_punct(")") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            if self.at_punct(")") {
                break;
            }
            items.push(self.expression()?);
        }
        self.expect_punct(")")?;
        Ok(Expr::Tuple(items))
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

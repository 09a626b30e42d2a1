//! Parser for Sigil source.
//!
//! Statements are parsed by recursive descent; expressions by precedence
//! climbing over the binding powers in [`infix_binding`].

use sigil_foundation::{Error, ErrorKind, Result};

use crate::ast::{
    ArrayItem, BinaryOp, Callee, Expr, ExprKind, FunctionDecl, IncDecOp, LogicalOp, Param,
    Program, Stmt, StmtKind, UnaryOp,
};
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{IndexSegment, Keyword, Segment, Token, TokenKind};

/// Binding power of assignment; the right side of `=` parses at this level.
const ASSIGN_BP: u8 = 4;
/// Binding power of `? :`.
const TERNARY_BP: u8 = 5;
/// Operand binding power of `!`; binds looser than arithmetic.
const NOT_BP: u8 = 18;
/// Operand binding power of `-`, `~` and casts; only `**` binds tighter.
const PREFIX_BP: u8 = 20;

/// Parser over one source unit.
pub struct Parser<'src> {
    /// Token source.
    lexer: Lexer<'src>,
    /// Lookahead.
    current: Token,
    /// Source text, for error context.
    source: &'src str,
}

impl<'src> Parser<'src> {
    /// Creates a parser.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        let mut parser = Self {
            lexer,
            current,
            source,
        };
        parser.skip_trivia();
        parser
    }

    /// Parses the whole unit.
    ///
    /// # Errors
    ///
    /// Returns a [`ErrorKind::ParseError`] on the first syntax error.
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut statements = Vec::new();
        while self.current.kind != TokenKind::Eof {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    /// Parses a single expression and requires the input to end after it.
    ///
    /// # Errors
    ///
    /// Returns a [`ErrorKind::ParseError`] on a syntax error.
    pub fn parse_expression(&mut self) -> Result<Expr> {
        let expr = self.parse_expr()?;
        if self.current.kind == TokenKind::Semicolon {
            self.advance();
        }
        if self.current.kind != TokenKind::Eof {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_statement(&mut self) -> Result<Stmt> {
        let start = self.current.span;
        let kind = match self.current.kind.clone() {
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::Semicolon => {
                self.advance();
                StmtKind::Empty
            }
            TokenKind::InlineHtml(text) => {
                self.advance();
                StmtKind::InlineHtml(text)
            }
            TokenKind::Keyword(keyword) => match keyword {
                Keyword::Echo => {
                    self.advance();
                    let exprs = self.parse_expr_list(&TokenKind::Semicolon)?;
                    self.end_statement()?;
                    StmtKind::Echo(exprs)
                }
                Keyword::If => self.parse_if()?,
                Keyword::While => {
                    self.advance();
                    let cond = self.parse_paren_expr()?;
                    let body = self.parse_body()?;
                    StmtKind::While { cond, body }
                }
                Keyword::Do => {
                    self.advance();
                    let body = self.parse_body()?;
                    self.expect_keyword(Keyword::While)?;
                    let cond = self.parse_paren_expr()?;
                    self.end_statement()?;
                    StmtKind::DoWhile { body, cond }
                }
                Keyword::For => self.parse_for()?,
                Keyword::Foreach => self.parse_foreach()?,
                Keyword::Function => StmtKind::Function(self.parse_function()?),
                Keyword::Return => {
                    self.advance();
                    let value = if self.at_statement_end() {
                        None
                    } else {
                        Some(self.parse_expr()?)
                    };
                    self.end_statement()?;
                    StmtKind::Return(value)
                }
                Keyword::Unset => {
                    self.advance();
                    self.expect(&TokenKind::LParen)?;
                    let targets = self.parse_expr_list(&TokenKind::RParen)?;
                    self.expect(&TokenKind::RParen)?;
                    self.end_statement()?;
                    StmtKind::Unset(targets)
                }
                Keyword::Const => self.parse_const()?,
                Keyword::Break | Keyword::Continue => {
                    self.advance();
                    let level = match self.current.kind {
                        TokenKind::Int(n) => {
                            let level = u32::try_from(n)
                                .ok()
                                .filter(|&n| n >= 1)
                                .ok_or_else(|| {
                                    self.error(&format!(
                                        "'{}' operator accepts only positive integers",
                                        keyword.as_str()
                                    ))
                                })?;
                            self.advance();
                            level
                        }
                        _ => 1,
                    };
                    self.end_statement()?;
                    if keyword == Keyword::Break {
                        StmtKind::Break(level)
                    } else {
                        StmtKind::Continue(level)
                    }
                }
                Keyword::Throw => {
                    self.advance();
                    let value = self.parse_expr()?;
                    self.end_statement()?;
                    StmtKind::Throw(value)
                }
                _ => self.parse_expr_statement()?,
            },
            _ => self.parse_expr_statement()?,
        };
        Ok(Stmt {
            kind,
            span: start.merge(self.current.span),
        })
    }

    fn parse_expr_statement(&mut self) -> Result<StmtKind> {
        let expr = self.parse_expr()?;
        self.end_statement()?;
        Ok(StmtKind::Expr(expr))
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        let open = self.current.span;
        self.expect(&TokenKind::LBrace)?;
        let mut statements = Vec::new();
        loop {
            match self.current.kind {
                TokenKind::RBrace => {
                    self.advance();
                    return Ok(statements);
                }
                TokenKind::Eof => return Err(self.error_at(open, "unclosed '{'")),
                _ => statements.push(self.parse_statement()?),
            }
        }
    }

    /// Parses a block, or a single statement as a one-element body.
    fn parse_body(&mut self) -> Result<Vec<Stmt>> {
        if self.current.kind == TokenKind::LBrace {
            self.parse_block()
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    fn parse_if(&mut self) -> Result<StmtKind> {
        self.advance();
        let mut branches = vec![(self.parse_paren_expr()?, self.parse_body()?)];
        let mut otherwise = None;
        loop {
            if self.current.kind.is_keyword(Keyword::ElseIf) {
                self.advance();
                branches.push((self.parse_paren_expr()?, self.parse_body()?));
            } else if self.current.kind.is_keyword(Keyword::Else) {
                self.advance();
                if self.current.kind.is_keyword(Keyword::If) {
                    self.advance();
                    branches.push((self.parse_paren_expr()?, self.parse_body()?));
                } else {
                    otherwise = Some(self.parse_body()?);
                    break;
                }
            } else {
                break;
            }
        }
        Ok(StmtKind::If {
            branches,
            otherwise,
        })
    }

    fn parse_for(&mut self) -> Result<StmtKind> {
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let init = self.parse_expr_list(&TokenKind::Semicolon)?;
        self.expect(&TokenKind::Semicolon)?;
        let cond = self.parse_expr_list(&TokenKind::Semicolon)?;
        self.expect(&TokenKind::Semicolon)?;
        let step = self.parse_expr_list(&TokenKind::RParen)?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_body()?;
        Ok(StmtKind::For {
            init,
            cond,
            step,
            body,
        })
    }

    fn parse_foreach(&mut self) -> Result<StmtKind> {
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let subject = self.parse_expr()?;
        self.expect_keyword(Keyword::As)?;

        let mut by_ref = self.eat(&TokenKind::Amp);
        let mut value = self.parse_foreach_target()?;
        let mut key = None;
        if !by_ref && self.eat(&TokenKind::DoubleArrow) {
            key = Some(value);
            by_ref = self.eat(&TokenKind::Amp);
            value = self.parse_foreach_target()?;
        }
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_body()?;
        Ok(StmtKind::Foreach {
            subject,
            key,
            value,
            by_ref,
            body,
        })
    }

    fn parse_foreach_target(&mut self) -> Result<Expr> {
        let target = self.parse_postfix()?;
        if target.is_writable() {
            Ok(target)
        } else {
            Err(self.error_at(target.span, "foreach target must be a variable"))
        }
    }

    fn parse_function(&mut self) -> Result<FunctionDecl> {
        let start = self.current.span;
        self.advance();
        // `function &name()` returns by reference; treated as by-value.
        self.eat(&TokenKind::Amp);
        let name = match &self.current.kind {
            TokenKind::Ident(name) => name.clone(),
            _ => return Err(self.error("expected function name")),
        };
        self.advance();

        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while self.current.kind != TokenKind::RParen {
            params.push(self.parse_param()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;

        let return_type = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type_hint()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(FunctionDecl {
            name,
            params,
            return_type,
            body,
            span: start.merge(self.current.span),
        })
    }

    fn parse_param(&mut self) -> Result<Param> {
        let type_hint = match self.current.kind {
            TokenKind::Ident(_) | TokenKind::Question | TokenKind::Keyword(Keyword::Array) => {
                Some(self.parse_type_hint()?)
            }
            _ => None,
        };
        let by_ref = self.eat(&TokenKind::Amp);
        let variadic = self.eat(&TokenKind::Ellipsis);
        let name = match &self.current.kind {
            TokenKind::Variable(name) => name.clone(),
            _ => return Err(self.error("expected parameter name")),
        };
        self.advance();
        let default = if self.eat(&TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Param {
            name,
            type_hint,
            default,
            by_ref,
            variadic,
        })
    }

    /// Parses `?int`, `int|string`, `array`.
    fn parse_type_hint(&mut self) -> Result<String> {
        let mut hint = String::new();
        if self.eat(&TokenKind::Question) {
            hint.push('?');
        }
        loop {
            match &self.current.kind {
                TokenKind::Ident(name) => hint.push_str(name),
                TokenKind::Keyword(Keyword::Array) => hint.push_str("array"),
                _ => return Err(self.error("expected type name")),
            }
            self.advance();
            if self.eat(&TokenKind::Pipe) {
                hint.push('|');
            } else {
                return Ok(hint);
            }
        }
    }

    fn parse_const(&mut self) -> Result<StmtKind> {
        self.advance();
        let mut items = Vec::new();
        loop {
            let name = match &self.current.kind {
                TokenKind::Ident(name) => name.clone(),
                _ => return Err(self.error("expected constant name")),
            };
            self.advance();
            self.expect(&TokenKind::Assign)?;
            items.push((name, self.parse_expr()?));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.end_statement()?;
        Ok(StmtKind::Const(items))
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Semicolon | TokenKind::Eof)
    }

    /// Consumes `;`. End of input also terminates the last statement.
    fn end_statement(&mut self) -> Result<()> {
        match self.current.kind {
            TokenKind::Semicolon => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    fn parse_paren_expr(&mut self) -> Result<Expr> {
        self.expect(&TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        Ok(expr)
    }

    /// Parses a comma-separated list that may be empty when `end` follows.
    fn parse_expr_list(&mut self, end: &TokenKind) -> Result<Vec<Expr>> {
        let mut exprs = Vec::new();
        if &self.current.kind == end {
            return Ok(exprs);
        }
        loop {
            exprs.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) || &self.current.kind == end {
                return Ok(exprs);
            }
        }
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;

        loop {
            if lhs.is_writable() {
                if let Some(assigned) = self.parse_assignment(&lhs)? {
                    lhs = assigned;
                    continue;
                }
            }

            if self.current.kind == TokenKind::Question {
                if TERNARY_BP < min_bp {
                    break;
                }
                self.advance();
                let then = if self.eat(&TokenKind::Colon) {
                    None
                } else {
                    let then = self.parse_expr_bp(ASSIGN_BP)?;
                    self.expect(&TokenKind::Colon)?;
                    Some(Box::new(then))
                };
                let otherwise = self.parse_expr_bp(TERNARY_BP + 1)?;
                let span = lhs.span.merge(otherwise.span);
                lhs = Expr::new(
                    ExprKind::Ternary {
                        cond: Box::new(lhs),
                        then,
                        otherwise: Box::new(otherwise),
                    },
                    span,
                );
                continue;
            }

            let Some((lbp, rbp, infix)) = infix_binding(&self.current.kind) else {
                break;
            };
            if lbp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_expr_bp(rbp)?;
            let span = lhs.span.merge(rhs.span);
            let (left, right) = (Box::new(lhs), Box::new(rhs));
            let kind = match infix {
                Infix::Binary(op) => ExprKind::Binary { op, left, right },
                Infix::Logical(op) => ExprKind::Logical { op, left, right },
                Infix::Coalesce => ExprKind::Coalesce { left, right },
            };
            lhs = Expr::new(kind, span);
        }

        Ok(lhs)
    }

    /// Parses an assignment operator following a writable expression.
    fn parse_assignment(&mut self, target: &Expr) -> Result<Option<Expr>> {
        let operator = match &self.current.kind {
            TokenKind::Assign | TokenKind::CoalesceAssign => None,
            TokenKind::AssignOp(op) => match infix_binding(op) {
                Some((_, _, Infix::Binary(op))) => Some(op),
                _ => return Err(self.error("invalid compound assignment")),
            },
            _ => return Ok(None),
        };
        let coalesce = self.current.kind == TokenKind::CoalesceAssign;
        let plain = self.current.kind == TokenKind::Assign;
        self.advance();

        let by_ref = plain && self.eat(&TokenKind::Amp);
        let value = self.parse_expr_bp(ASSIGN_BP)?;
        if by_ref && !value.is_writable() && !matches!(value.kind, ExprKind::Call { .. }) {
            return Err(self.error_at(value.span, "only variables can be assigned by reference"));
        }

        let span = target.span.merge(value.span);
        let target = Box::new(target.clone());
        let value = Box::new(value);
        let kind = match operator {
            Some(op) => ExprKind::AssignOp { op, target, value },
            None if coalesce => ExprKind::AssignCoalesce { target, value },
            None if by_ref => ExprKind::AssignRef { target, value },
            None => ExprKind::Assign { target, value },
        };
        Ok(Some(Expr::new(kind, span)))
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let start = self.current.span;
        let (op, bp) = match &self.current.kind {
            TokenKind::Bang => (UnaryOp::Not, NOT_BP),
            TokenKind::Tilde => (UnaryOp::BitNot, PREFIX_BP),
            TokenKind::Minus => (UnaryOp::Neg, PREFIX_BP),
            TokenKind::Plus => (UnaryOp::Plus, PREFIX_BP),
            TokenKind::Cast(ty) => {
                let ty = *ty;
                self.advance();
                let operand = self.parse_expr_bp(PREFIX_BP)?;
                let span = start.merge(operand.span);
                return Ok(Expr::new(ExprKind::Cast(ty, Box::new(operand)), span));
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if self.current.kind == TokenKind::PlusPlus {
                    IncDecOp::PreInc
                } else {
                    IncDecOp::PreDec
                };
                self.advance();
                let target = self.parse_postfix()?;
                if !target.is_writable() {
                    return Err(self.error_at(target.span, "cannot increment or decrement this expression"));
                }
                let span = start.merge(target.span);
                return Ok(Expr::new(
                    ExprKind::IncDec {
                        op,
                        target: Box::new(target),
                    },
                    span,
                ));
            }
            TokenKind::Keyword(Keyword::Print) => {
                self.advance();
                let operand = self.parse_expr_bp(ASSIGN_BP)?;
                let span = start.merge(operand.span);
                return Ok(Expr::new(ExprKind::Print(Box::new(operand)), span));
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_expr_bp(bp)?;
        let span = start.merge(operand.span);

        // Fold signs into numeric literals.
        let kind = match (op, operand.kind) {
            (UnaryOp::Neg, ExprKind::Int(n)) if n != i64::MIN => ExprKind::Int(-n),
            (UnaryOp::Neg, ExprKind::Float(f)) => ExprKind::Float(-f),
            (op, kind) => ExprKind::Unary {
                op,
                operand: Box::new(Expr::new(kind, operand.span)),
            },
        };
        Ok(Expr::new(kind, span))
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current.kind {
                TokenKind::LBracket => {
                    self.advance();
                    let index = if self.current.kind == TokenKind::RBracket {
                        None
                    } else {
                        Some(Box::new(self.parse_expr()?))
                    };
                    let end = self.current.span;
                    self.expect(&TokenKind::RBracket)?;
                    let span = expr.span.merge(end);
                    expr = Expr::new(
                        ExprKind::Dim {
                            base: Box::new(expr),
                            index,
                        },
                        span,
                    );
                }
                TokenKind::LParen if expr.is_writable() => {
                    let args = self.parse_args()?;
                    let span = expr.span.merge(self.current.span);
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Callee::Expr(Box::new(expr)),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus if expr.is_writable() => {
                    let op = if self.current.kind == TokenKind::PlusPlus {
                        IncDecOp::PostInc
                    } else {
                        IncDecOp::PostDec
                    };
                    let span = expr.span.merge(self.current.span);
                    self.advance();
                    return Ok(Expr::new(
                        ExprKind::IncDec {
                            op,
                            target: Box::new(expr),
                        },
                        span,
                    ));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let args = self.parse_expr_list(&TokenKind::RParen)?;
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let span = self.current.span;
        let kind = match self.current.kind.clone() {
            TokenKind::Int(n) => {
                self.advance();
                ExprKind::Int(n)
            }
            TokenKind::Float(f) => {
                self.advance();
                ExprKind::Float(f)
            }
            TokenKind::String(s) => {
                self.advance();
                ExprKind::String(s)
            }
            TokenKind::Template(segments) => {
                self.advance();
                return Ok(interpolate(segments, span));
            }
            TokenKind::Variable(name) => {
                self.advance();
                ExprKind::Variable(name)
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.current.kind == TokenKind::LParen {
                    let args = self.parse_args()?;
                    ExprKind::Call {
                        callee: Callee::Name(name),
                        args,
                    }
                } else {
                    ExprKind::Constant(name)
                }
            }
            TokenKind::LBracket => {
                self.advance();
                ExprKind::Array(self.parse_array_items(&TokenKind::RBracket)?)
            }
            TokenKind::Keyword(Keyword::Array) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                ExprKind::Array(self.parse_array_items(&TokenKind::RParen)?)
            }
            TokenKind::Keyword(Keyword::Isset) => {
                self.advance();
                let args = self.parse_args()?;
                if args.is_empty() {
                    return Err(self.error_at(span, "isset() expects at least one argument"));
                }
                ExprKind::Isset(args)
            }
            TokenKind::Keyword(Keyword::Empty) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let operand = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                ExprKind::Empty(Box::new(operand))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::Error(message) => return Err(self.error(&message)),
            _ => return Err(self.unexpected()),
        };
        Ok(Expr::new(kind, span))
    }

    /// Parses array items up to and including `close`.
    fn parse_array_items(&mut self, close: &TokenKind) -> Result<Vec<ArrayItem>> {
        let mut items = Vec::new();
        while &self.current.kind != close {
            let by_ref = self.eat(&TokenKind::Amp);
            let first = self.parse_expr()?;
            let item = if !by_ref && self.eat(&TokenKind::DoubleArrow) {
                let by_ref = self.eat(&TokenKind::Amp);
                ArrayItem {
                    key: Some(first),
                    value: self.parse_expr()?,
                    by_ref,
                }
            } else {
                ArrayItem {
                    key: None,
                    value: first,
                    by_ref,
                }
            };
            if item.by_ref && !item.value.is_writable() {
                return Err(self.error_at(item.value.span, "only variables can be referenced"));
            }
            items.push(item);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    fn skip_trivia(&mut self) {
        while self.current.kind.is_trivia() {
            self.current = self.lexer.next_token();
        }
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
        self.skip_trivia();
    }

    /// Consumes the current token if it matches.
    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.current.kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<()> {
        if std::mem::discriminant(&self.current.kind) == std::mem::discriminant(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected {}, found {}",
                expected.name(),
                self.current.kind.name()
            )))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        if self.eat(&TokenKind::Keyword(keyword)) {
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected '{}', found {}",
                keyword.as_str(),
                self.current.kind.name()
            )))
        }
    }

    fn unexpected(&self) -> Error {
        match &self.current.kind {
            TokenKind::Error(message) => self.error(message),
            other => self.error(&format!("unexpected {}", other.name())),
        }
    }

    fn error(&self, message: &str) -> Error {
        self.error_at(self.current.span, message)
    }

    fn error_at(&self, span: Span, message: &str) -> Error {
        Error::new(ErrorKind::ParseError {
            message: message.to_string(),
            line: span.line,
            column: span.column,
            context: span.line_text(self.source).to_string(),
        })
    }
}

/// What an infix token builds.
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
    Coalesce,
}

/// Returns `(left bp, right bp, operator)` for an infix token.
fn infix_binding(kind: &TokenKind) -> Option<(u8, u8, Infix)> {
    use BinaryOp as B;
    let left = |bp: u8, infix| Some((bp, bp + 1, infix));
    match kind {
        TokenKind::Keyword(Keyword::Or) => left(1, Infix::Logical(LogicalOp::Or)),
        TokenKind::Keyword(Keyword::Xor) => left(2, Infix::Logical(LogicalOp::Xor)),
        TokenKind::Keyword(Keyword::And) => left(3, Infix::Logical(LogicalOp::And)),
        TokenKind::Coalesce => Some((6, 6, Infix::Coalesce)),
        TokenKind::PipePipe => left(7, Infix::Logical(LogicalOp::Or)),
        TokenKind::AmpAmp => left(8, Infix::Logical(LogicalOp::And)),
        TokenKind::Pipe => left(9, Infix::Binary(B::BitOr)),
        TokenKind::Caret => left(10, Infix::Binary(B::BitXor)),
        TokenKind::Amp => left(11, Infix::Binary(B::BitAnd)),
        TokenKind::EqEq => left(12, Infix::Binary(B::Equal)),
        TokenKind::NotEq => left(12, Infix::Binary(B::NotEqual)),
        TokenKind::EqEqEq => left(12, Infix::Binary(B::Identical)),
        TokenKind::NotEqEq => left(12, Infix::Binary(B::NotIdentical)),
        TokenKind::Spaceship => left(12, Infix::Binary(B::Spaceship)),
        TokenKind::Lt => left(13, Infix::Binary(B::Less)),
        TokenKind::LtEq => left(13, Infix::Binary(B::LessEqual)),
        TokenKind::Gt => left(13, Infix::Binary(B::Greater)),
        TokenKind::GtEq => left(13, Infix::Binary(B::GreaterEqual)),
        TokenKind::Dot => left(14, Infix::Binary(B::Concat)),
        TokenKind::ShiftLeft => left(15, Infix::Binary(B::ShiftLeft)),
        TokenKind::ShiftRight => left(15, Infix::Binary(B::ShiftRight)),
        TokenKind::Plus => left(16, Infix::Binary(B::Add)),
        TokenKind::Minus => left(16, Infix::Binary(B::Sub)),
        TokenKind::Star => left(17, Infix::Binary(B::Mul)),
        TokenKind::Slash => left(17, Infix::Binary(B::Div)),
        TokenKind::Percent => left(17, Infix::Binary(B::Mod)),
        TokenKind::StarStar => Some((PREFIX_BP, PREFIX_BP, Infix::Binary(B::Pow))),
        _ => None,
    }
}

/// Lowers an interpolated string into a left-folded concatenation.
fn interpolate(segments: Vec<Segment>, span: Span) -> Expr {
    let part = |kind| Expr::new(kind, span);
    let mut parts = segments.into_iter().map(|segment| match segment {
        Segment::Text(text) => part(ExprKind::String(text)),
        Segment::Var(name) => part(ExprKind::Variable(name)),
        Segment::Index(name, index) => {
            let index = match index {
                IndexSegment::Int(n) => ExprKind::Int(n),
                IndexSegment::Name(key) => ExprKind::String(key),
                IndexSegment::Var(var) => ExprKind::Variable(var),
            };
            part(ExprKind::Dim {
                base: Box::new(part(ExprKind::Variable(name))),
                index: Some(Box::new(part(index))),
            })
        }
    });

    let mut acc = match parts.next() {
        Some(first @ Expr { kind: ExprKind::String(_), .. }) => first,
        Some(first) => part(ExprKind::Binary {
            op: BinaryOp::Concat,
            left: Box::new(part(ExprKind::String(String::new()))),
            right: Box::new(first),
        }),
        None => return part(ExprKind::String(String::new())),
    };
    for next in parts {
        acc = part(ExprKind::Binary {
            op: BinaryOp::Concat,
            left: Box::new(acc),
            right: Box::new(next),
        });
    }
    acc
}

/// Parses a source unit.
///
/// # Errors
///
/// Returns a [`ErrorKind::ParseError`] on the first syntax error.
pub fn parse(source: &str) -> Result<Program> {
    Parser::new(source).parse_program()
}

/// Parses a single expression.
///
/// # Errors
///
/// Returns a [`ErrorKind::ParseError`] on a syntax error.
pub fn parse_expression(source: &str) -> Result<Expr> {
    Parser::new(source).parse_expression()
}

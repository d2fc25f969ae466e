// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The main parser implementation.

use rustc_hash::FxHashSet;

use crate::ast::*;
use crate::error::SyntaxError;
use crate::lexer::{Scanner, Span, Token, TokenKind};

/// Deepest syntax tree the parser builds. Nested expressions and every link
/// of an operator or call chain count one level each, which also bounds the
/// recursion in codegen and when the tree is dropped.
pub const MAX_NESTING: usize = 256;

/// A recursive descent parser for the script language.
///
/// Like Ruby, whether a bare name is a local variable or a method call is
/// decided here, from the assignments seen so far in the current scope.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Token,
    previous: Token,
    scopes: Vec<FxHashSet<String>>,
    def_depth: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self {
            scanner,
            current,
            previous: Token::new(TokenKind::Eof, Span::new(0, 0), 1, 1),
            scopes: vec![FxHashSet::default()],
            def_depth: 0,
            depth: 0,
        }
    }

    /// Parses the source code into a Program AST node.
    pub fn parse_program(&mut self) -> Result<Program, SyntaxError> {
        let body = self.parse_statements(&[])?;
        if !self.check(&TokenKind::Eof) {
            return Err(self.unexpected());
        }
        Ok(Program { body })
    }

    /// Parses statements until end of input or one of `enders`.
    fn parse_statements(&mut self, enders: &[TokenKind]) -> Result<Vec<Node>, SyntaxError> {
        let mut body = Vec::new();

        loop {
            self.skip_terminators();
            if self.check(&TokenKind::Eof) || enders.contains(&self.current.kind) {
                break;
            }

            body.push(self.parse_statement()?);

            if self.current.kind.is_terminator() {
                continue;
            }
            if self.check(&TokenKind::Eof) || enders.contains(&self.current.kind) {
                break;
            }
            return Err(self.unexpected());
        }

        Ok(body)
    }

    /// Parses a single statement, including trailing modifiers.
    fn parse_statement(&mut self) -> Result<Node, SyntaxError> {
        let line = self.current.line;
        let mut node = match self.current.kind {
            TokenKind::Return => {
                self.advance();
                let value = if self.starts_expression() {
                    Some(self.parse_expression()?.boxed())
                } else {
                    None
                };
                Node::new(NodeKind::Return(value), line)
            }
            TokenKind::Break => {
                self.advance();
                Node::new(NodeKind::Break, line)
            }
            TokenKind::Next => {
                self.advance();
                Node::new(NodeKind::Next, line)
            }
            _ => self.parse_expression()?,
        };

        let base = self.depth;
        loop {
            match self.current.kind {
                TokenKind::If => {
                    self.enter()?;
                    self.advance();
                    let cond = self.parse_expression()?;
                    node = Node::new(
                        NodeKind::If {
                            cond: cond.boxed(),
                            then_body: vec![node],
                            else_body: None,
                        },
                        line,
                    );
                }
                TokenKind::Unless => {
                    self.enter()?;
                    self.advance();
                    let cond = self.parse_expression()?;
                    node = Node::new(
                        NodeKind::If {
                            cond: cond.boxed(),
                            then_body: Vec::new(),
                            else_body: Some(vec![node]),
                        },
                        line,
                    );
                }
                TokenKind::While | TokenKind::Until => {
                    self.enter()?;
                    let until = self.check(&TokenKind::Until);
                    self.advance();
                    let cond = self.parse_expression()?;
                    node = Node::new(
                        NodeKind::While {
                            cond: cond.boxed(),
                            body: vec![node],
                            until,
                        },
                        line,
                    );
                }
                _ => break,
            }
        }
        self.depth = base;

        Ok(node)
    }

    /// Parses an expression including the low-precedence `and` / `or`.
    pub fn parse_expression(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_not_expression()?;
        let base = self.depth;

        loop {
            let line = self.current.line;
            match self.current.kind {
                TokenKind::And => {
                    self.enter()?;
                    self.advance();
                    self.skip_newlines();
                    let rhs = self.parse_not_expression()?;
                    lhs = Node::new(NodeKind::And(lhs.boxed(), rhs.boxed()), line);
                }
                TokenKind::Or => {
                    self.enter()?;
                    self.advance();
                    self.skip_newlines();
                    let rhs = self.parse_not_expression()?;
                    lhs = Node::new(NodeKind::Or(lhs.boxed(), rhs.boxed()), line);
                }
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            }
        }
    }

    fn parse_not_expression(&mut self) -> Result<Node, SyntaxError> {
        self.nested(Self::not_expression)
    }

    fn not_expression(&mut self) -> Result<Node, SyntaxError> {
        if self.check(&TokenKind::Not) {
            let line = self.current.line;
            self.advance();
            let operand = self.parse_not_expression()?;
            return Ok(Node::new(NodeKind::Not(operand.boxed()), line));
        }
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Node, SyntaxError> {
        let target = self.parse_or()?;

        let op = match self.current.kind {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(BinaryOp::Add),
            TokenKind::MinusAssign => Some(BinaryOp::Sub),
            TokenKind::StarAssign => Some(BinaryOp::Mul),
            TokenKind::SlashAssign => Some(BinaryOp::Div),
            _ => return Ok(target),
        };
        let assign_token = self.current.clone();
        self.advance();
        self.skip_newlines();

        let rhs = self.parse_not_expression()?;
        let line = target.line;
        let value = match op {
            None => rhs,
            Some(op) => Node::new(
                NodeKind::Binary {
                    op,
                    lhs: target.clone().boxed(),
                    rhs: rhs.boxed(),
                },
                line,
            ),
        };

        let kind = match target.kind {
            NodeKind::LocalGet(name) => NodeKind::LocalSet(name, value.boxed()),
            NodeKind::GlobalGet(name) => NodeKind::GlobalSet(name, value.boxed()),
            NodeKind::ConstGet(name) => {
                if self.def_depth > 0 {
                    return Err(SyntaxError::new(
                        assign_token.line,
                        assign_token.column,
                        "dynamic constant assignment",
                    ));
                }
                NodeKind::ConstSet(name, value.boxed())
            }
            NodeKind::Call {
                receiver: Some(receiver),
                method,
                mut args,
            } => {
                let setter = if method == "[]" {
                    "[]=".to_string()
                } else if args.is_empty() {
                    format!("{}=", method)
                } else {
                    return Err(Self::unexpected_token(&assign_token));
                };
                args.push(value);
                NodeKind::Call {
                    receiver: Some(receiver),
                    method: setter,
                    args,
                }
            }
            _ => return Err(Self::unexpected_token(&assign_token)),
        };

        Ok(Node::new(kind, line))
    }

    fn parse_or(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_and()?;
        let base = self.depth;
        while self.check(&TokenKind::PipePipe) {
            self.enter()?;
            let line = self.current.line;
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_and()?;
            lhs = Node::new(NodeKind::Or(lhs.boxed(), rhs.boxed()), line);
        }
        self.depth = base;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_equality()?;
        let base = self.depth;
        while self.check(&TokenKind::AmpAmp) {
            self.enter()?;
            let line = self.current.line;
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_equality()?;
            lhs = Node::new(NodeKind::And(lhs.boxed(), rhs.boxed()), line);
        }
        self.depth = base;
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_comparison()?;
        let base = self.depth;
        loop {
            let op = match self.current.kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::Ne,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            lhs = self.binary_tail(lhs, op, Self::parse_comparison)?;
        }
    }

    fn parse_comparison(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_shift()?;
        let base = self.depth;
        loop {
            let op = match self.current.kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            lhs = self.binary_tail(lhs, op, Self::parse_shift)?;
        }
    }

    fn parse_shift(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_additive()?;
        let base = self.depth;
        while self.check(&TokenKind::LtLt) {
            self.enter()?;
            let line = self.current.line;
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_additive()?;
            lhs = Node::new(
                NodeKind::Call {
                    receiver: Some(lhs.boxed()),
                    method: "<<".to_string(),
                    args: vec![rhs],
                },
                line,
            );
        }
        self.depth = base;
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_multiplicative()?;
        let base = self.depth;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            lhs = self.binary_tail(lhs, op, Self::parse_multiplicative)?;
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_unary()?;
        let base = self.depth;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            lhs = self.binary_tail(lhs, op, Self::parse_unary)?;
        }
    }

    /// Consumes a binary operator and its right operand.
    fn binary_tail(
        &mut self,
        lhs: Node,
        op: BinaryOp,
        operand: fn(&mut Self) -> Result<Node, SyntaxError>,
    ) -> Result<Node, SyntaxError> {
        self.enter()?;
        let line = self.current.line;
        self.advance();
        self.skip_newlines();
        let rhs = operand(self)?;
        Ok(Node::new(
            NodeKind::Binary {
                op,
                lhs: lhs.boxed(),
                rhs: rhs.boxed(),
            },
            line,
        ))
    }

    fn parse_unary(&mut self) -> Result<Node, SyntaxError> {
        self.nested(Self::unary)
    }

    fn unary(&mut self) -> Result<Node, SyntaxError> {
        let line = self.current.line;
        match self.current.kind {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Node::new(NodeKind::Negate(operand.boxed()), line))
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Node::new(NodeKind::Not(operand.boxed()), line))
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Node, SyntaxError> {
        let operand = self.parse_postfix()?;
        if self.check(&TokenKind::StarStar) {
            let base = self.depth;
            let node = self.binary_tail(operand, BinaryOp::Pow, Self::parse_unary)?;
            self.depth = base;
            return Ok(node);
        }
        Ok(operand)
    }

    fn parse_postfix(&mut self) -> Result<Node, SyntaxError> {
        let mut node = self.parse_primary()?;
        let base = self.depth;

        loop {
            let line = self.current.line;
            match self.current.kind {
                TokenKind::Dot => {
                    self.enter()?;
                    self.advance();
                    self.skip_newlines();
                    let method = match &self.current.kind {
                        TokenKind::Identifier(name) | TokenKind::Constant(name) => name.clone(),
                        _ => return Err(self.unexpected()),
                    };
                    self.advance();
                    let args = self.parse_call_args()?;
                    node = Node::new(
                        NodeKind::Call {
                            receiver: Some(node.boxed()),
                            method,
                            args,
                        },
                        line,
                    );
                }
                TokenKind::LeftBracket => {
                    self.enter()?;
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_expression()?;
                    self.skip_newlines();
                    self.expect(&TokenKind::RightBracket)?;
                    node = Node::new(
                        NodeKind::Call {
                            receiver: Some(node.boxed()),
                            method: "[]".to_string(),
                            args: vec![index],
                        },
                        line,
                    );
                }
                _ => {
                    self.depth = base;
                    return Ok(node);
                }
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Node, SyntaxError> {
        let line = self.current.line;
        let kind = match self.current.kind.clone() {
            TokenKind::Integer(n) => {
                self.advance();
                NodeKind::Integer(n)
            }
            TokenKind::Float(n) => {
                self.advance();
                NodeKind::Float(n)
            }
            TokenKind::String(s) => {
                self.advance();
                NodeKind::Str(s)
            }
            TokenKind::Symbol(s) => {
                self.advance();
                NodeKind::Symbol(s)
            }
            TokenKind::Nil => {
                self.advance();
                NodeKind::Nil
            }
            TokenKind::True => {
                self.advance();
                NodeKind::True
            }
            TokenKind::False => {
                self.advance();
                NodeKind::False
            }
            TokenKind::SelfKw => {
                self.advance();
                NodeKind::SelfRef
            }
            TokenKind::Global(name) => {
                self.advance();
                NodeKind::GlobalGet(name)
            }
            TokenKind::Constant(name) => {
                self.advance();
                NodeKind::ConstGet(name)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                return self.parse_identifier(name, line);
            }
            TokenKind::LeftParen => {
                self.advance();
                let body = self.parse_statements(&[TokenKind::RightParen])?;
                self.expect(&TokenKind::RightParen)?;
                NodeKind::Block(body)
            }
            TokenKind::LeftBracket => {
                self.advance();
                NodeKind::Array(self.parse_list(&TokenKind::RightBracket)?)
            }
            TokenKind::Begin => {
                self.advance();
                let body = self.parse_statements(&[TokenKind::End])?;
                self.expect(&TokenKind::End)?;
                NodeKind::Block(body)
            }
            TokenKind::If => {
                self.advance();
                return self.parse_if_rest(line);
            }
            TokenKind::Unless => {
                self.advance();
                return self.parse_unless_rest(line);
            }
            TokenKind::While | TokenKind::Until => {
                let until = self.check(&TokenKind::Until);
                self.advance();
                return self.parse_while_rest(until, line);
            }
            TokenKind::Def => {
                self.advance();
                return self.parse_def_rest(line);
            }
            _ => return Err(self.unexpected()),
        };
        Ok(Node::new(kind, line))
    }

    fn parse_identifier(&mut self, name: String, line: u32) -> Result<Node, SyntaxError> {
        let paren_follows = self.check(&TokenKind::LeftParen) && self.adjacent();
        if self.is_local(&name) && !paren_follows {
            return Ok(Node::new(NodeKind::LocalGet(name), line));
        }

        // Assignment declares the local before its value is parsed.
        if !paren_follows
            && matches!(
                self.current.kind,
                TokenKind::Assign
                    | TokenKind::PlusAssign
                    | TokenKind::MinusAssign
                    | TokenKind::StarAssign
                    | TokenKind::SlashAssign
            )
        {
            self.declare(&name);
            return Ok(Node::new(NodeKind::LocalGet(name), line));
        }

        let args = self.parse_call_args()?;
        Ok(Node::new(
            NodeKind::Call {
                receiver: None,
                method: name,
                args,
            },
            line,
        ))
    }

    /// Parses `(a, b)` directly after a method name, or unparenthesized
    /// command arguments on the same line.
    fn parse_call_args(&mut self) -> Result<Vec<Node>, SyntaxError> {
        if self.check(&TokenKind::LeftParen) && self.adjacent() {
            self.advance();
            return self.parse_list(&TokenKind::RightParen);
        }

        if !self.starts_command_argument() {
            return Ok(Vec::new());
        }

        let mut args = vec![self.parse_not_expression()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            self.skip_newlines();
            args.push(self.parse_not_expression()?);
        }
        Ok(args)
    }

    /// Parses a comma separated list after its opening delimiter.
    fn parse_list(&mut self, close: &TokenKind) -> Result<Vec<Node>, SyntaxError> {
        let mut items = Vec::new();
        self.skip_newlines();

        while !self.check(close) {
            items.push(self.parse_not_expression()?);
            self.skip_newlines();
            if self.check(&TokenKind::Comma) {
                self.advance();
                self.skip_newlines();
            } else {
                break;
            }
        }

        self.expect(close)?;
        Ok(items)
    }

    /// Parses the remainder of `if` / `elsif` after the keyword.
    fn parse_if_rest(&mut self, line: u32) -> Result<Node, SyntaxError> {
        let cond = self.parse_expression()?;
        self.expect_then()?;
        let then_body =
            self.parse_statements(&[TokenKind::Elsif, TokenKind::Else, TokenKind::End])?;

        let else_body = match self.current.kind {
            TokenKind::Elsif => {
                let elsif_line = self.current.line;
                self.advance();
                // the nested branch consumes the shared `end`
                return Ok(Node::new(
                    NodeKind::If {
                        cond: cond.boxed(),
                        then_body,
                        else_body: Some(vec![self.nested(|p| p.parse_if_rest(elsif_line))?]),
                    },
                    line,
                ));
            }
            TokenKind::Else => {
                self.advance();
                Some(self.parse_statements(&[TokenKind::End])?)
            }
            _ => None,
        };
        self.expect(&TokenKind::End)?;

        Ok(Node::new(
            NodeKind::If {
                cond: cond.boxed(),
                then_body,
                else_body,
            },
            line,
        ))
    }

    fn parse_unless_rest(&mut self, line: u32) -> Result<Node, SyntaxError> {
        let cond = self.parse_expression()?;
        self.expect_then()?;
        let body = self.parse_statements(&[TokenKind::Else, TokenKind::End])?;
        let otherwise = if self.check(&TokenKind::Else) {
            self.advance();
            self.parse_statements(&[TokenKind::End])?
        } else {
            Vec::new()
        };
        self.expect(&TokenKind::End)?;

        Ok(Node::new(
            NodeKind::If {
                cond: cond.boxed(),
                then_body: otherwise,
                else_body: Some(body),
            },
            line,
        ))
    }

    fn parse_while_rest(&mut self, until: bool, line: u32) -> Result<Node, SyntaxError> {
        let cond = self.parse_expression()?;
        if self.check(&TokenKind::Do) {
            self.advance();
        } else if self.current.kind.is_terminator() {
            self.skip_terminators();
        } else {
            return Err(self.unexpected());
        }
        let body = self.parse_statements(&[TokenKind::End])?;
        self.expect(&TokenKind::End)?;

        Ok(Node::new(
            NodeKind::While {
                cond: cond.boxed(),
                body,
                until,
            },
            line,
        ))
    }

    fn parse_def_rest(&mut self, line: u32) -> Result<Node, SyntaxError> {
        let name = match &self.current.kind {
            TokenKind::Identifier(name) | TokenKind::Constant(name) => name.clone(),
            _ => return Err(self.unexpected()),
        };
        self.advance();

        let mut params: Vec<String> = Vec::new();
        let parenthesized = self.check(&TokenKind::LeftParen);
        if parenthesized {
            self.advance();
            self.skip_newlines();
        }
        while let TokenKind::Identifier(param) = &self.current.kind {
            if params.contains(param) {
                return Err(SyntaxError::new(
                    self.current.line,
                    self.current.column,
                    "duplicated argument name",
                ));
            }
            params.push(param.clone());
            self.advance();
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
            self.skip_newlines();
        }
        if parenthesized {
            self.skip_newlines();
            self.expect(&TokenKind::RightParen)?;
        }

        self.scopes.push(params.iter().cloned().collect());
        self.def_depth += 1;
        let body = self.parse_statements(&[TokenKind::End]);
        self.def_depth -= 1;
        self.scopes.pop();
        let body = body?;
        self.expect(&TokenKind::End)?;

        Ok(Node::new(NodeKind::Def { name, params, body }, line))
    }

    fn expect_then(&mut self) -> Result<(), SyntaxError> {
        if self.check(&TokenKind::Then) {
            self.advance();
            return Ok(());
        }
        if !self.current.kind.is_terminator() {
            return Err(self.unexpected());
        }
        self.skip_terminators();
        if self.check(&TokenKind::Then) {
            self.advance();
        }
        Ok(())
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn advance(&mut self) {
        let next = self.scanner.next_token();
        self.previous = std::mem::replace(&mut self.current, next);
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), SyntaxError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            let mut error = self.unexpected();
            if !matches!(self.current.kind, TokenKind::UnterminatedString | TokenKind::Invalid(_)) {
                error.message = format!("{}, expecting {}", error.message, kind);
            }
            Err(error)
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_terminators(&mut self) {
        while self.current.kind.is_terminator() {
            self.advance();
        }
    }

    /// True when the current token touches the previous one.
    fn adjacent(&self) -> bool {
        self.current.span.start == self.previous.span.end
    }

    fn peek_token(&self) -> Token {
        self.scanner.clone().next_token()
    }

    fn starts_expression(&self) -> bool {
        !self.current.kind.is_terminator()
            && !matches!(
                self.current.kind,
                TokenKind::Eof
                    | TokenKind::End
                    | TokenKind::If
                    | TokenKind::Unless
                    | TokenKind::While
                    | TokenKind::Until
                    | TokenKind::RightParen
            )
    }

    fn starts_command_argument(&self) -> bool {
        match self.current.kind {
            TokenKind::Integer(_)
            | TokenKind::Float(_)
            | TokenKind::String(_)
            | TokenKind::Symbol(_)
            | TokenKind::Identifier(_)
            | TokenKind::Constant(_)
            | TokenKind::Global(_)
            | TokenKind::Nil
            | TokenKind::True
            | TokenKind::False
            | TokenKind::SelfKw
            | TokenKind::Not
            | TokenKind::Bang
            | TokenKind::UnterminatedString => true,
            // `puts [1]` and `puts (1)` but not `a[1]` / `a(1)`
            TokenKind::LeftBracket | TokenKind::LeftParen => !self.adjacent(),
            // `puts -1` but not `a - 1` or `a-1`
            TokenKind::Minus => {
                !self.adjacent() && self.peek_token().span.start == self.current.span.end
            }
            _ => false,
        }
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.last().is_some_and(|scope| scope.contains(name))
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    /// Runs `parse` one level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        let base = self.depth;
        self.enter()?;
        let result = parse(self);
        self.depth = base;
        result
    }

    /// Takes one level of the nesting budget. Callers reset `depth` once the
    /// construct is complete.
    fn enter(&mut self) -> Result<(), SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(SyntaxError::new(
                self.current.line,
                self.current.column,
                "nesting too deep",
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn unexpected(&self) -> SyntaxError {
        Self::unexpected_token(&self.current)
    }

    fn unexpected_token(token: &Token) -> SyntaxError {
        let message = match &token.kind {
            TokenKind::UnterminatedString => "unterminated string meets end of file".to_string(),
            TokenKind::Invalid(ch) => {
                format!("invalid character '{}' in expression", ch.escape_default())
            }
            other => format!("syntax error, unexpected {}", other),
        };
        SyntaxError::new(token.line, token.column, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        Parser::new(src).parse_program().expect("should parse")
    }

    fn parse_err(src: &str) -> SyntaxError {
        Parser::new(src).parse_program().expect_err("should fail")
    }

    #[test]
    fn test_parse_binary_expression() {
        let program = parse("1 + 1");
        assert_eq!(program.body.len(), 1);
        assert!(matches!(
            program.body[0].kind,
            NodeKind::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 3");
        let NodeKind::Binary { op, rhs, .. } = &program.body[0].kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(rhs.kind, NodeKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_local_vs_method_call() {
        let program = parse("foo\nfoo = 1\nfoo");
        assert!(matches!(program.body[0].kind, NodeKind::Call { .. }));
        assert!(matches!(program.body[1].kind, NodeKind::LocalSet(..)));
        assert!(matches!(program.body[2].kind, NodeKind::LocalGet(_)));
    }

    #[test]
    fn test_command_call() {
        let program = parse("raise \"boom\"");
        let NodeKind::Call {
            receiver,
            method,
            args,
        } = &program.body[0].kind
        else {
            panic!("expected call");
        };
        assert!(receiver.is_none());
        assert_eq!(method, "raise");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_command_call_with_negative_argument() {
        let program = parse("puts -1");
        let NodeKind::Call { args, .. } = &program.body[0].kind else {
            panic!("expected call");
        };
        assert!(matches!(args[0].kind, NodeKind::Negate(_)));
    }

    #[test]
    fn test_def_with_params() {
        let program = parse("def add(a, b)\n  a + b\nend");
        let NodeKind::Def { name, params, body } = &program.body[0].kind else {
            panic!("expected def");
        };
        assert_eq!(name, "add");
        assert_eq!(params, &["a".to_string(), "b".to_string()]);
        assert!(matches!(body[0].kind, NodeKind::Binary { .. }));
    }

    #[test]
    fn test_def_params_are_scoped() {
        let program = parse("def f(a)\n  a\nend\na");
        assert!(matches!(program.body[1].kind, NodeKind::Call { .. }));
    }

    #[test]
    fn test_if_elsif_else() {
        let program = parse("if a\n 1\nelsif b\n 2\nelse\n 3\nend");
        let NodeKind::If { else_body, .. } = &program.body[0].kind else {
            panic!("expected if");
        };
        let nested = &else_body.as_ref().expect("elsif branch")[0];
        assert!(matches!(nested.kind, NodeKind::If { else_body: Some(_), .. }));
    }

    #[test]
    fn test_modifiers() {
        let program = parse("x = 0\nx += 1 while x < 10\nputs x unless x == 0");
        assert!(matches!(program.body[1].kind, NodeKind::While { until: false, .. }));
        assert!(matches!(program.body[2].kind, NodeKind::If { .. }));
    }

    #[test]
    fn test_index_and_index_assignment() {
        let program = parse("a = [1, 2]\na[0] = a[1]");
        let NodeKind::Call { method, args, .. } = &program.body[1].kind else {
            panic!("expected call");
        };
        assert_eq!(method, "[]=");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_line_numbers() {
        let program = parse("1\n\n3");
        assert_eq!(program.body[0].line, 1);
        assert_eq!(program.body[1].line, 3);
    }

    #[test]
    fn test_incomplete_def_is_syntax_error() {
        let err = parse_err("def");
        assert_eq!(err.message, "syntax error, unexpected end of file");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_missing_end() {
        let err = parse_err("if x\n 1\n");
        assert!(err.message.contains("expecting 'end'"), "{}", err.message);
    }

    #[test]
    fn test_unterminated_string() {
        let err = parse_err("puts \"abc");
        assert_eq!(err.message, "unterminated string meets end of file");
    }

    #[test]
    fn test_dynamic_constant_assignment() {
        let err = parse_err("def f\n  X = 1\nend");
        assert_eq!(err.message, "dynamic constant assignment");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_err("1 = 2");
        assert!(err.message.contains("unexpected '='"));
    }

    #[test]
    fn test_duplicated_argument() {
        let err = parse_err("def f(a, a)\nend");
        assert_eq!(err.message, "duplicated argument name");
    }

    #[test]
    fn test_nesting_within_limit() {
        let depth = 100;
        let src = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        parse(&src);
        let src = format!("{}1{}", "[".repeat(depth), "]".repeat(depth));
        parse(&src);
        parse(&format!("x = 1{}", " + 1".repeat(200)));
    }

    #[test]
    fn test_deep_nesting_is_syntax_error() {
        let depth = 10_000;
        let src = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse_err(&src).message, "nesting too deep");

        let src = format!("{}1", "-".repeat(depth));
        assert_eq!(parse_err(&src).message, "nesting too deep");

        let src = format!("if x\n{}end", "elsif x\n".repeat(depth));
        assert_eq!(parse_err(&src).message, "nesting too deep");
    }

    #[test]
    fn test_long_chains_are_bounded() {
        let src = format!("1{}", " + 1".repeat(MAX_NESTING * 4));
        assert_eq!(parse_err(&src).message, "nesting too deep");

        let src = format!("x = [1]\nx{}", "[0]".repeat(MAX_NESTING * 4));
        assert_eq!(parse_err(&src).message, "nesting too deep");

        let src = format!("1{}", " if true".repeat(MAX_NESTING * 4));
        assert_eq!(parse_err(&src).message, "nesting too deep");
    }
}

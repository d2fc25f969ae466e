// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Token definitions for the script lexer.

use std::fmt;

/// A span in the source code, representing a range of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the length of this span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if this span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The span in the source code
    pub span: Span,
    /// 1-based line of the first character
    pub line: u32,
    /// 1-based column of the first character
    pub column: u32,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, span: Span, line: u32, column: u32) -> Self {
        Self {
            kind,
            span,
            line,
            column,
        }
    }
}

/// The different kinds of tokens in the script language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Integer literal
    Integer(i64),
    /// Floating point literal (also produced for integers that overflow)
    Float(f64),
    /// String literal, escapes already processed
    String(String),
    /// Symbol literal (`:name`)
    Symbol(String),

    // Names
    /// Local variable or method name
    Identifier(String),
    /// Capitalized name
    Constant(String),
    /// Global variable (`$name`)
    Global(String),

    // Keywords
    Def,
    End,
    If,
    Elsif,
    Else,
    Unless,
    While,
    Until,
    Do,
    Then,
    Begin,
    Return,
    Break,
    Next,
    Nil,
    True,
    False,
    SelfKw,
    And,
    Or,
    Not,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Semicolon,
    Newline,

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    EqEq,
    BangEq,
    Bang,
    Lt,
    Le,
    Gt,
    Ge,
    AmpAmp,
    PipePipe,
    LtLt,

    // Special
    /// A string literal without its closing quote
    UnterminatedString,
    /// A character the lexer does not understand
    Invalid(char),
    /// End of input
    Eof,
}

impl TokenKind {
    /// Returns true for tokens that terminate a statement.
    pub fn is_terminator(&self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::Semicolon)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(n) => write!(f, "integer literal {}", n),
            TokenKind::Float(n) => write!(f, "float literal {}", n),
            TokenKind::String(_) => f.write_str("string literal"),
            TokenKind::Symbol(s) => write!(f, "symbol literal :{}", s),
            TokenKind::Identifier(s) => write!(f, "local variable or method '{}'", s),
            TokenKind::Constant(s) => write!(f, "constant '{}'", s),
            TokenKind::Global(s) => write!(f, "global variable '${}'", s),
            TokenKind::Def => f.write_str("'def'"),
            TokenKind::End => f.write_str("'end'"),
            TokenKind::If => f.write_str("'if'"),
            TokenKind::Elsif => f.write_str("'elsif'"),
            TokenKind::Else => f.write_str("'else'"),
            TokenKind::Unless => f.write_str("'unless'"),
            TokenKind::While => f.write_str("'while'"),
            TokenKind::Until => f.write_str("'until'"),
            TokenKind::Do => f.write_str("'do'"),
            TokenKind::Then => f.write_str("'then'"),
            TokenKind::Begin => f.write_str("'begin'"),
            TokenKind::Return => f.write_str("'return'"),
            TokenKind::Break => f.write_str("'break'"),
            TokenKind::Next => f.write_str("'next'"),
            TokenKind::Nil => f.write_str("'nil'"),
            TokenKind::True => f.write_str("'true'"),
            TokenKind::False => f.write_str("'false'"),
            TokenKind::SelfKw => f.write_str("'self'"),
            TokenKind::And => f.write_str("'and'"),
            TokenKind::Or => f.write_str("'or'"),
            TokenKind::Not => f.write_str("'not'"),
            TokenKind::LeftParen => f.write_str("'('"),
            TokenKind::RightParen => f.write_str("')'"),
            TokenKind::LeftBracket => f.write_str("'['"),
            TokenKind::RightBracket => f.write_str("']'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Dot => f.write_str("'.'"),
            TokenKind::Semicolon => f.write_str("';'"),
            TokenKind::Newline => f.write_str("'\\n'"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::StarStar => f.write_str("'**'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::Percent => f.write_str("'%'"),
            TokenKind::Assign => f.write_str("'='"),
            TokenKind::PlusAssign => f.write_str("'+='"),
            TokenKind::MinusAssign => f.write_str("'-='"),
            TokenKind::StarAssign => f.write_str("'*='"),
            TokenKind::SlashAssign => f.write_str("'/='"),
            TokenKind::EqEq => f.write_str("'=='"),
            TokenKind::BangEq => f.write_str("'!='"),
            TokenKind::Bang => f.write_str("'!'"),
            TokenKind::Lt => f.write_str("'<'"),
            TokenKind::Le => f.write_str("'<='"),
            TokenKind::Gt => f.write_str("'>'"),
            TokenKind::Ge => f.write_str("'>='"),
            TokenKind::AmpAmp => f.write_str("'&&'"),
            TokenKind::PipePipe => f.write_str("'||'"),
            TokenKind::LtLt => f.write_str("'<<'"),
            TokenKind::UnterminatedString => f.write_str("unterminated string"),
            TokenKind::Invalid(ch) => write!(f, "character '{}'", ch.escape_default()),
            TokenKind::Eof => f.write_str("end of file"),
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The scanner that produces tokens from source text.

use super::{Span, Token, TokenKind};

/// A scanner that tokenizes script source code.
#[derive(Clone)]
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: u32,
    line_start: usize,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    /// Returns the source text being scanned.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.current_pos;
        let line = self.line;
        let column = (start - self.line_start) as u32 + 1;

        let Some((_pos, ch)) = self.advance() else {
            return Token::new(TokenKind::Eof, Span::new(start, start), line, column);
        };

        let kind = match ch {
            '\n' => {
                self.line += 1;
                self.line_start = self.current_pos;
                TokenKind::Newline
            }
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,

            '+' => self.either('=', TokenKind::PlusAssign, TokenKind::Plus),
            '-' => self.either('=', TokenKind::MinusAssign, TokenKind::Minus),
            '/' => self.either('=', TokenKind::SlashAssign, TokenKind::Slash),
            '%' => TokenKind::Percent,
            '*' => self.scan_star(),
            '=' => self.either('=', TokenKind::EqEq, TokenKind::Assign),
            '!' => self.either('=', TokenKind::BangEq, TokenKind::Bang),
            '<' => self.scan_less_than(),
            '>' => self.either('=', TokenKind::Ge, TokenKind::Gt),
            '&' => self.either('&', TokenKind::AmpAmp, TokenKind::Invalid('&')),
            '|' => self.either('|', TokenKind::PipePipe, TokenKind::Invalid('|')),

            '"' => self.scan_double_quoted(),
            '\'' => self.scan_single_quoted(),
            ':' => self.scan_symbol(),
            '$' => self.scan_global(),

            '0'..='9' => self.scan_number(ch),

            _ if is_id_start(ch) => self.scan_identifier(ch),

            _ => TokenKind::Invalid(ch),
        };

        Token::new(kind, Span::new(start, self.current_pos), line, column)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    fn either(&mut self, expected: char, matched: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.peek() == Some(expected) {
            self.advance();
            matched
        } else {
            otherwise
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.advance();
                }
                Some('\\') if self.peek_next() == Some('\n') => {
                    // line continuation
                    self.advance();
                    self.advance();
                    self.line += 1;
                    self.line_start = self.current_pos;
                }
                Some('#') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_star(&mut self) -> TokenKind {
        match self.peek() {
            Some('*') => {
                self.advance();
                TokenKind::StarStar
            }
            Some('=') => {
                self.advance();
                TokenKind::StarAssign
            }
            _ => TokenKind::Star,
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        match self.peek() {
            Some('=') => {
                self.advance();
                TokenKind::Le
            }
            Some('<') => {
                self.advance();
                TokenKind::LtLt
            }
            _ => TokenKind::Lt,
        }
    }

    fn scan_double_quoted(&mut self) -> TokenKind {
        let mut value = String::new();

        loop {
            let Some((_, ch)) = self.advance() else {
                return TokenKind::UnterminatedString;
            };
            match ch {
                '"' => return TokenKind::String(value),
                '\\' => {
                    let Some((_, escaped)) = self.advance() else {
                        return TokenKind::UnterminatedString;
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        's' => value.push(' '),
                        'e' => value.push('\x1b'),
                        '\n' => {
                            self.line += 1;
                            self.line_start = self.current_pos;
                        }
                        other => value.push(other),
                    }
                }
                '\n' => {
                    self.line += 1;
                    self.line_start = self.current_pos;
                    value.push('\n');
                }
                other => value.push(other),
            }
        }
    }

    fn scan_single_quoted(&mut self) -> TokenKind {
        let mut value = String::new();

        loop {
            let Some((_, ch)) = self.advance() else {
                return TokenKind::UnterminatedString;
            };
            match ch {
                '\'' => return TokenKind::String(value),
                '\\' if matches!(self.peek(), Some('\'' | '\\')) => {
                    if let Some((_, escaped)) = self.advance() {
                        value.push(escaped);
                    }
                }
                '\n' => {
                    self.line += 1;
                    self.line_start = self.current_pos;
                    value.push('\n');
                }
                other => value.push(other),
            }
        }
    }

    fn scan_symbol(&mut self) -> TokenKind {
        match self.peek() {
            Some(ch) if is_id_start(ch) => {
                self.advance();
                match self.scan_identifier(ch) {
                    TokenKind::Identifier(name) | TokenKind::Constant(name) => {
                        TokenKind::Symbol(name)
                    }
                    // keywords are valid symbol names
                    _ => TokenKind::Symbol(self.source[self.symbol_start()..self.current_pos].to_string()),
                }
            }
            _ => TokenKind::Invalid(':'),
        }
    }

    /// Byte offset just after the `:` of the symbol being scanned.
    fn symbol_start(&self) -> usize {
        let text = &self.source[..self.current_pos];
        text.rfind(':').map_or(self.current_pos, |pos| pos + 1)
    }

    fn scan_global(&mut self) -> TokenKind {
        let mut name = String::new();

        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if name.is_empty() {
            TokenKind::Invalid('$')
        } else {
            TokenKind::Global(name)
        }
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        let mut value = String::from(first);
        let mut is_float = false;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                value.push(ch);
                self.advance();
            } else if ch == '_' && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            } else {
                break;
            }
        }

        // A dot followed by a digit is a fraction; otherwise it is a method call.
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            value.push('.');
            self.advance();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() {
                    value.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            let after = lookahead.next().map(|(_, c)| c);
            let exponent_follows = match after {
                Some(c) if c.is_ascii_digit() => true,
                Some('+' | '-') => lookahead.next().is_some_and(|(_, c)| c.is_ascii_digit()),
                _ => false,
            };
            if exponent_follows {
                is_float = true;
                value.push('e');
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    value.push(sign);
                    self.advance();
                }
                while let Some(ch) = self.peek() {
                    if ch.is_ascii_digit() {
                        value.push(ch);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        if !is_float {
            if let Ok(n) = value.parse::<i64>() {
                return TokenKind::Integer(n);
            }
        }

        match value.parse::<f64>() {
            Ok(n) => TokenKind::Float(n),
            Err(_) => TokenKind::Invalid(first),
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::from(first);

        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Predicate and bang method names: `nil?`, `push!`, but not `x!=1`.
        if matches!(self.peek(), Some('?' | '!')) && self.peek_next() != Some('=') {
            if let Some((_, suffix)) = self.advance() {
                name.push(suffix);
            }
            return TokenKind::Identifier(name);
        }

        match name.as_str() {
            "def" => TokenKind::Def,
            "end" => TokenKind::End,
            "if" => TokenKind::If,
            "elsif" => TokenKind::Elsif,
            "else" => TokenKind::Else,
            "unless" => TokenKind::Unless,
            "while" => TokenKind::While,
            "until" => TokenKind::Until,
            "do" => TokenKind::Do,
            "then" => TokenKind::Then,
            "begin" => TokenKind::Begin,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "next" => TokenKind::Next,
            "nil" => TokenKind::Nil,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "self" => TokenKind::SelfKw,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            _ if first.is_uppercase() => TokenKind::Constant(name),
            _ => TokenKind::Identifier(name),
        }
    }
}

/// Checks if a character can start an identifier.
fn is_id_start(ch: char) -> bool {
    ch == '_' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

/// Checks if a character can continue an identifier.
fn is_id_continue(ch: char) -> bool {
    ch == '_' || unicode_xid::UnicodeXID::is_xid_continue(ch)
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Tokenizer for the script subset.
//!
//! Newlines are significant: they end statements, so the scanner emits
//! [`TokenKind::Newline`] instead of skipping them. Tokens carry a [`Span`]
//! with the line and column used in syntax errors and line tables.
//!
//! ```rust
//! use ritec_vm::lexer::{Scanner, TokenKind};
//!
//! let mut scanner = Scanner::new("x = 42\nputs x");
//! let mut kinds = Vec::new();
//! loop {
//!     let token = scanner.next_token();
//!     if matches!(token.kind, TokenKind::Eof) {
//!         break;
//!     }
//!     kinds.push(token.kind);
//! }
//! assert_eq!(kinds[2], TokenKind::Integer(42));
//! assert_eq!(kinds[3], TokenKind::Newline);
//! ```

mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{Span, Token, TokenKind};

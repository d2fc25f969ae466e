// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Recursive-descent parser producing [`crate::ast::Program`].
//!
//! The first error stops parsing; there is no recovery.
//!
//! ```rust
//! use ritec_vm::parser::Parser;
//!
//! let program = Parser::new("def twice(x)\n  x * 2\nend\ntwice(4)").parse_program().unwrap();
//! assert_eq!(program.body.len(), 2);
//!
//! let err = Parser::new("def").parse_program().unwrap_err();
//! assert!(err.message.contains("syntax error"));
//! ```

mod parser;

pub use parser::{MAX_NESTING, Parser};

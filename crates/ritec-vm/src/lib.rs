// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # ritec-vm
//!
//! A small virtual machine for a subset of Ruby, with a compiler to RITE
//! bytecode.
//!
//! ## Overview
//!
//! This crate provides:
//! - Lexer and recursive-descent parser
//! - Bytecode compiler producing [`Irep`] trees
//! - RITE binary dump and load
//! - Mark-and-sweep heap with a protection arena and counted roots
//! - Stack-based interpreter with exceptions and backtraces
//!
//! ## Quick Start
//!
//! ```rust
//! use ritec_vm::{State, Value};
//!
//! let mut state = State::new();
//! let result = state.load_string("1 + 2").unwrap();
//! assert_eq!(result, Value::Integer(3));
//! ```
//!
//! ## Compiling without running
//!
//! ```rust
//! use ritec_vm::{DumpFlags, State};
//!
//! let mut state = State::new();
//! let mut cxt = state.ccontext_new();
//! cxt.no_exec = true;
//! let proc_value = state.load_nstring_cxt(b"puts 42", &mut cxt);
//! state.ccontext_free(cxt);
//!
//! let bin = state.dump_proc(proc_value, DumpFlags::NONE).unwrap();
//! assert_eq!(&bin[0..4], b"RITE");
//! assert_eq!(state.output(), "");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod error;
pub mod gc;
pub mod lexer;
pub mod parser;
pub mod rite;
pub mod state;
pub mod value;
pub mod vm;

pub use compiler::Irep;
pub use error::{CodegenError, DumpError, RiteError, SyntaxError};
pub use gc::ObjRef;
pub use rite::DumpFlags;
pub use state::{CompileContext, State};
pub use value::{Sym, Value};

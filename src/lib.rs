// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # ritec
//!
//! A host-embeddable compilation boundary for an embedded script VM.
//!
//! Source goes in; either a serialized RITE binary or a pinned callable unit
//! comes out. Nothing is ever executed: every load runs with `no_execute`
//! and `capture_errors` set, and a failure comes back as a [`Diagnostic`]
//! built from the VM's pending exception.
//!
//! The VM is reached only through the [`ExecutionContext`] trait. With the
//! default `vm` feature it is implemented for [`ritec_vm::State`], and the
//! C ABI in [`ffi`] is built on top of it.
//!
//! ## Quick Start
//!
//! ```rust
//! # #[cfg(feature = "vm")] {
//! use ritec::{CompileOptions, Compiler};
//! use ritec_vm::{State, Value};
//!
//! let options = CompileOptions::new().with_filename("main.rb");
//! let mut compiler = Compiler::with_options(State::new(), options);
//!
//! // serialized binary
//! let bin = compiler.compile(b"1 + 1").unwrap();
//! assert!(bin.starts_with(b"RITE"));
//!
//! // pinned callable unit
//! let handle = compiler.compile_to_handle(b"20 + 22").unwrap();
//! let unit = compiler.get(&handle).unwrap();
//! assert_eq!(compiler.context_mut().exec(unit), Ok(Value::Integer(42)));
//! compiler.release_handle(handle);
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod context;
pub mod diagnostic;
pub mod error;
pub mod handle;
pub mod options;
pub mod scope;

#[cfg(feature = "vm")]
pub mod ffi;
#[cfg(feature = "parallel")]
pub mod parallel;
#[cfg(feature = "vm")]
mod vm;

#[cfg(test)]
mod testing;

pub use compiler::{Compiler, compile, compile_to_value, release_value};
pub use context::{ExecutionContext, LoadConfig};
pub use diagnostic::Diagnostic;
pub use error::{CompileError, Result, STATUS_FAILED, STATUS_OK};
pub use handle::{HandleRegistry, ProcHandle};
pub use options::{CompileOptions, DumpFlags};
pub use scope::CompileScope;

#[cfg(feature = "parallel")]
pub use parallel::{ParallelCompiler, compile_parallel};

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode compiler.
//!
//! Transforms an AST into an [`Irep`] tree that the interpreter executes
//! and the `rite` module serializes.
//!
//! # Module Structure
//!
//! - `irep`: Instruction sequence definitions
//! - `codegen`: Code generation from AST

pub mod codegen;
pub mod irep;

pub use codegen::compile_program;
pub use irep::{DebugInfo, Instruction, Irep, LineEntry, OpCode, PoolValue};

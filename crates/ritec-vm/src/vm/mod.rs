// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Stack-based interpreter.
//!
//! The interpreter methods are defined on [`State`](crate::State) so the
//! operand stack and call frames are visible to the collector.

mod builtins;
mod inspect;
mod interpreter;

use std::rc::Rc;

use crate::compiler::Irep;
use crate::value::{Sym, Value};

/// Nested method calls allowed before `SystemStackError`.
pub const MAX_CALL_DEPTH: usize = 64;

/// An active call.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) irep: Rc<Irep>,
    pub(crate) pc: usize,
    pub(crate) locals: Vec<Value>,
    pub(crate) argc: usize,
    pub(crate) self_value: Value,
    /// `None` for the top-level frame
    pub(crate) method: Option<Sym>,
    pub(crate) stack_base: usize,
}

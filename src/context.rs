// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The capability contract an embedding VM provides.
//!
//! The compiler never touches VM internals. Everything it needs (loading
//! source, reading the pending exception, serializing and pinning a
//! callable unit) goes through [`ExecutionContext`].

use std::error::Error;

use crate::options::DumpFlags;

/// Configuration handed to [`ExecutionContext::compile_context_new`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadConfig {
    /// Build the callable unit without running top-level code
    pub no_execute: bool,
    /// Leave load failures in the pending exception slot
    pub capture_errors: bool,
    /// Filename for diagnostics and debug info
    pub filename: Option<String>,
}

impl LoadConfig {
    /// The only configuration the compiler uses: build, never run, and
    /// capture errors.
    pub fn compile_only(filename: Option<&str>) -> Self {
        Self {
            no_execute: true,
            capture_errors: true,
            filename: filename.map(str::to_string),
        }
    }
}

/// An embedding script VM instance.
///
/// Implementations are single threaded: one context must not be used from
/// two threads at once. Independent contexts share nothing.
pub trait ExecutionContext {
    /// A value owned by the context. Holding one does not keep it alive.
    type Value: Copy;

    /// The VM-side compilation context.
    type CompileContext;

    /// Failure reported by [`dump`](Self::dump).
    type DumpError: Error + Send + Sync + 'static;

    /// Saves the allocation arena index.
    fn arena_save(&mut self) -> usize;

    /// Restores the allocation arena, unprotecting everything allocated
    /// since the matching save.
    fn arena_restore(&mut self, index: usize);

    /// Creates a compilation context.
    fn compile_context_new(&mut self, config: &LoadConfig) -> Self::CompileContext;

    /// Frees a compilation context. It is not used again afterwards.
    fn compile_context_free(&mut self, cxt: &mut Self::CompileContext);

    /// Loads `source` under `cxt`, returning the candidate result.
    fn load(&mut self, source: &[u8], cxt: &mut Self::CompileContext) -> Self::Value;

    /// The exception raised by the last load, if any.
    fn pending_exception(&self) -> Option<Self::Value>;

    /// Human-readable inspection of a value.
    fn inspect(&self, value: Self::Value) -> String;

    /// Backtrace frames of an exception, innermost first.
    fn backtrace(&self, exception: Self::Value) -> Option<Vec<String>>;

    /// Returns true if `value` is a callable unit.
    fn is_callable(&self, value: Self::Value) -> bool;

    /// Serializes a callable unit.
    fn dump(&self, value: Self::Value, flags: DumpFlags) -> Result<Vec<u8>, Self::DumpError>;

    /// Registers `value` as a collector root. Pins are counted.
    fn pin(&mut self, value: Self::Value);

    /// Removes one registration made by [`pin`](Self::pin).
    fn unpin(&mut self, value: Self::Value);
}

impl<C: ExecutionContext + ?Sized> ExecutionContext for &mut C {
    type Value = C::Value;
    type CompileContext = C::CompileContext;
    type DumpError = C::DumpError;

    fn arena_save(&mut self) -> usize {
        (**self).arena_save()
    }

    fn arena_restore(&mut self, index: usize) {
        (**self).arena_restore(index)
    }

    fn compile_context_new(&mut self, config: &LoadConfig) -> Self::CompileContext {
        (**self).compile_context_new(config)
    }

    fn compile_context_free(&mut self, cxt: &mut Self::CompileContext) {
        (**self).compile_context_free(cxt)
    }

    fn load(&mut self, source: &[u8], cxt: &mut Self::CompileContext) -> Self::Value {
        (**self).load(source, cxt)
    }

    fn pending_exception(&self) -> Option<Self::Value> {
        (**self).pending_exception()
    }

    fn inspect(&self, value: Self::Value) -> String {
        (**self).inspect(value)
    }

    fn backtrace(&self, exception: Self::Value) -> Option<Vec<String>> {
        (**self).backtrace(exception)
    }

    fn is_callable(&self, value: Self::Value) -> bool {
        (**self).is_callable(value)
    }

    fn dump(&self, value: Self::Value, flags: DumpFlags) -> Result<Vec<u8>, Self::DumpError> {
        (**self).dump(value, flags)
    }

    fn pin(&mut self, value: Self::Value) {
        (**self).pin(value)
    }

    fn unpin(&mut self, value: Self::Value) {
        (**self).unpin(value)
    }
}

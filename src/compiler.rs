// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compile orchestration.
//!
//! Both paths share the same front half:
//!
//! 1. open a [`CompileScope`] (arena save + compilation context)
//! 2. load the source with `no_execute` and `capture_errors`
//! 3. a pending exception wins over whatever value the load returned
//! 4. a non-callable result is a shape error
//!
//! The callable unit is only protected by the scope, so the binary path
//! serializes it and the handle path pins it before the scope closes.

use std::path::Path;

use crate::context::{ExecutionContext, LoadConfig};
use crate::diagnostic::Diagnostic;
use crate::error::{CompileError, Result};
use crate::handle::{HandleRegistry, ProcHandle};
use crate::options::CompileOptions;
use crate::scope::CompileScope;

/// Compiles `source` to a serialized binary without running it.
pub fn compile<C>(ctx: &mut C, source: &[u8], options: &CompileOptions) -> Result<Vec<u8>>
where
    C: ExecutionContext + ?Sized,
{
    tracing::debug!(len = source.len(), "compiling to binary");
    let config = LoadConfig::compile_only(options.filename());
    let mut scope = CompileScope::open(ctx, &config);

    let result = load_callable(&mut scope, source).and_then(|unit| {
        scope
            .context()
            .dump(unit, options.dump_flags())
            .map_err(|err| CompileError::Serialization(Box::new(err)))
    });
    drop(scope);

    match &result {
        Ok(bin) => tracing::debug!(size = bin.len(), "compiled to binary"),
        Err(err) => tracing::warn!(error = %err, "compilation failed"),
    }
    result
}

/// Compiles `source` and pins the resulting callable unit.
///
/// The returned value stays alive until it is passed to [`release_value`].
pub fn compile_to_value<C>(ctx: &mut C, source: &[u8], options: &CompileOptions) -> Result<C::Value>
where
    C: ExecutionContext + ?Sized,
{
    tracing::debug!(len = source.len(), "compiling to handle");
    let config = LoadConfig::compile_only(options.filename());
    let mut scope = CompileScope::open(ctx, &config);

    let result = load_callable(&mut scope, source);
    if let Ok(unit) = result {
        scope.context_mut().pin(unit);
    }
    drop(scope);

    if let Err(err) = &result {
        tracing::warn!(error = %err, "compilation failed");
    }
    result
}

/// Unpins a value returned by [`compile_to_value`].
pub fn release_value<C>(ctx: &mut C, value: C::Value)
where
    C: ExecutionContext + ?Sized,
{
    ctx.unpin(value);
}

fn load_callable<C>(scope: &mut CompileScope<'_, C>, source: &[u8]) -> Result<C::Value>
where
    C: ExecutionContext + ?Sized,
{
    let value = scope.load(source);
    if let Some(exception) = scope.context().pending_exception() {
        return Err(CompileError::Source(Diagnostic::capture(
            scope.context(),
            exception,
        )));
    }
    if !scope.context().is_callable(value) {
        return Err(CompileError::Shape);
    }
    Ok(value)
}

/// A compiler bound to one execution context.
///
/// Owns the handles it issues; dropping the compiler unpins any handle that
/// was never released.
///
/// ```rust
/// # #[cfg(feature = "vm")] {
/// use ritec::Compiler;
/// use ritec_vm::State;
///
/// let mut compiler = Compiler::new(State::new());
/// let bin = compiler.compile(b"1 + 1").unwrap();
/// assert_eq!(&bin[0..4], b"RITE");
///
/// let err = compiler.compile(b"def").unwrap_err();
/// assert!(err.to_string().contains("syntax error"));
/// # }
/// ```
pub struct Compiler<C: ExecutionContext> {
    ctx: C,
    options: CompileOptions,
    handles: HandleRegistry<C::Value>,
}

impl<C: ExecutionContext> Compiler<C> {
    /// Creates a compiler with default options.
    pub fn new(ctx: C) -> Self {
        Self::with_options(ctx, CompileOptions::default())
    }

    /// Creates a compiler with the given options.
    pub fn with_options(ctx: C, options: CompileOptions) -> Self {
        Self {
            ctx,
            options,
            handles: HandleRegistry::new(),
        }
    }

    /// The options used for every call.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compiles `source` to a serialized binary.
    pub fn compile(&mut self, source: &[u8]) -> Result<Vec<u8>> {
        compile(&mut self.ctx, source, &self.options)
    }

    /// Reads and compiles a source file. The path becomes the filename
    /// unless the options already name one.
    pub fn compile_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let source = std::fs::read(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let options = match self.options.filename() {
            Some(_) => self.options.clone(),
            None => self
                .options
                .clone()
                .with_filename(path.to_string_lossy().into_owned()),
        };
        compile(&mut self.ctx, &source, &options)
    }

    /// Compiles `source` and returns a handle to the pinned callable unit.
    pub fn compile_to_handle(&mut self, source: &[u8]) -> Result<ProcHandle> {
        let unit = compile_to_value(&mut self.ctx, source, &self.options)?;
        Ok(self.handles.insert(unit))
    }

    /// Unpins the callable unit behind `handle`.
    ///
    /// A handle from another compiler is a caller bug: it is reported in
    /// debug builds and otherwise ignored.
    pub fn release_handle(&mut self, handle: ProcHandle) {
        match self.handles.remove(handle) {
            Some(unit) => release_value(&mut self.ctx, unit),
            None => {
                tracing::error!("release_handle called with a handle this compiler does not own");
                if cfg!(debug_assertions) {
                    panic!("release_handle called with a foreign or released handle");
                }
            }
        }
    }

    /// The callable unit behind `handle`, for invoking it in this context.
    pub fn get(&self, handle: &ProcHandle) -> Option<C::Value> {
        self.handles.get(handle)
    }

    /// Number of handles not yet released.
    pub fn outstanding_handles(&self) -> usize {
        self.handles.len()
    }

    /// The execution context.
    pub fn context(&self) -> &C {
        &self.ctx
    }

    /// The execution context, mutably.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    /// Rebuilds a handle from a [`ProcHandle::to_raw`] token issued by this
    /// compiler. Released and unknown tokens give `None`.
    pub fn handle_from_raw(&self, raw: u64) -> Option<ProcHandle> {
        self.handles.from_raw(raw)
    }
}

impl<C: ExecutionContext> Drop for Compiler<C> {
    fn drop(&mut self) {
        let leaked = self.handles.drain();
        if !leaked.is_empty() {
            tracing::warn!(count = leaked.len(), "unpinning handles that were never released");
        }
        for unit in leaked {
            self.ctx.unpin(unit);
        }
    }
}

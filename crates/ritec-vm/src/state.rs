// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interpreter state.
//!
//! A [`State`] owns the heap, the symbol table, global variables, constants,
//! top-level methods and the pending exception. It is single threaded; run
//! independent states on independent threads.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::compiler::{Irep, compile_program};
use crate::error::{DumpError, RiteError};
use crate::gc::{Exception, Heap, ObjRef, Object};
use crate::parser::Parser;
use crate::rite::{DumpFlags, dump_irep, load_irep};
use crate::value::{Sym, SymbolTable, Value};
use crate::vm::Frame;

/// Options for one load, created with [`State::ccontext_new`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileContext {
    /// Filename used in messages, backtraces and debug info
    pub filename: Option<String>,
    /// Compile only; return the callable unit instead of running it
    pub no_exec: bool,
    /// Keep load errors in the pending exception instead of logging them
    pub capture_errors: bool,
}

impl CompileContext {
    /// Sets the filename.
    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.filename = Some(filename.into());
    }
}

/// The interpreter state.
pub struct State {
    pub(crate) heap: Heap,
    pub(crate) symbols: SymbolTable,
    pub(crate) globals: FxHashMap<Sym, Value>,
    pub(crate) consts: FxHashMap<Sym, Value>,
    pub(crate) methods: FxHashMap<Sym, Rc<Irep>>,
    pub(crate) exc: Option<ObjRef>,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) output: String,
    open_contexts: usize,
}

impl State {
    /// Creates a fresh state.
    pub fn new() -> Self {
        Self {
            heap: Heap::new(),
            symbols: SymbolTable::new(),
            globals: FxHashMap::default(),
            consts: FxHashMap::default(),
            methods: FxHashMap::default(),
            exc: None,
            stack: Vec::new(),
            frames: Vec::new(),
            output: String::new(),
            open_contexts: 0,
        }
    }

    // ========================================================================
    // Compilation contexts and loading
    // ========================================================================

    /// Creates a compilation context. Pair every call with
    /// [`ccontext_free`](Self::ccontext_free).
    pub fn ccontext_new(&mut self) -> CompileContext {
        self.open_contexts += 1;
        CompileContext::default()
    }

    /// Releases a compilation context.
    pub fn ccontext_free(&mut self, cxt: CompileContext) {
        self.open_contexts = self.open_contexts.saturating_sub(1);
        drop(cxt);
    }

    /// Number of compilation contexts created and not yet freed.
    pub fn open_compile_contexts(&self) -> usize {
        self.open_contexts
    }

    /// Parses and compiles `source`.
    ///
    /// With `no_exec` the new proc is returned without running it; otherwise
    /// it runs and its result is returned. On failure the pending exception
    /// is set and `nil` is returned.
    pub fn load_nstring_cxt(&mut self, source: &[u8], cxt: &mut CompileContext) -> Value {
        self.exc = None;
        let filename = cxt.filename.as_deref();

        let Ok(text) = std::str::from_utf8(source) else {
            let message = prefixed(filename, "invalid multibyte char (UTF-8)");
            return self.load_failed(cxt, Exception::new("SyntaxError", message));
        };

        let program = match Parser::new(text).parse_program() {
            Ok(program) => program,
            Err(err) => {
                let message = err.render(filename);
                return self.load_failed(cxt, Exception::new("SyntaxError", message));
            }
        };

        let irep = match compile_program(&program, filename) {
            Ok(irep) => irep,
            Err(err) => {
                let message = prefixed(filename, &err.to_string());
                return self.load_failed(cxt, Exception::new("ScriptError", message));
            }
        };
        debug!(
            len = source.len(),
            iseq = irep.iseq.len(),
            "compiled source"
        );

        let proc_value = Value::Object(self.alloc(Object::Proc(Rc::new(irep))));
        if cxt.no_exec {
            return proc_value;
        }
        self.exec(proc_value).unwrap_or(Value::Nil)
    }

    /// Compiles and runs `source`, returning its value or the raised
    /// exception.
    pub fn load_string(&mut self, source: &str) -> Result<Value, Value> {
        let mut cxt = self.ccontext_new();
        cxt.capture_errors = true;
        let value = self.load_nstring_cxt(source.as_bytes(), &mut cxt);
        self.ccontext_free(cxt);
        match self.exc() {
            Some(exc) => Err(exc),
            None => Ok(value),
        }
    }

    fn load_failed(&mut self, cxt: &CompileContext, exception: Exception) -> Value {
        if !cxt.capture_errors {
            debug!(message = %exception.message, "load failed");
        }
        let exc = self.alloc(Object::Exception(exception));
        self.exc = Some(exc);
        Value::Nil
    }

    /// Reads a RITE binary and returns a proc for its top-level irep.
    pub fn load_binary(&mut self, bin: &[u8]) -> Result<Value, RiteError> {
        let irep = load_irep(bin)?;
        Ok(Value::Object(self.alloc(Object::Proc(Rc::new(irep)))))
    }

    /// Serializes the irep of a proc.
    pub fn dump_proc(&self, proc_value: Value, flags: DumpFlags) -> Result<Vec<u8>, DumpError> {
        let Value::Object(r) = proc_value else {
            return Err(DumpError::NotAProc);
        };
        match self.heap.get(r) {
            Some(Object::Proc(irep)) => dump_irep(irep, flags),
            Some(_) => Err(DumpError::NotAProc),
            None => Err(DumpError::StaleReference(r.index())),
        }
    }

    /// Returns the irep behind a proc.
    pub fn proc_irep(&self, value: Value) -> Option<Rc<Irep>> {
        match self.object(value)? {
            Object::Proc(irep) => Some(Rc::clone(irep)),
            _ => None,
        }
    }

    /// Returns true if `value` is a live proc.
    pub fn is_proc(&self, value: Value) -> bool {
        matches!(self.object(value), Some(Object::Proc(_)))
    }

    // ========================================================================
    // Exceptions
    // ========================================================================

    /// The pending exception, if the last load or exec failed.
    pub fn exc(&self) -> Option<Value> {
        self.exc.map(Value::Object)
    }

    /// Clears the pending exception.
    pub fn clear_exc(&mut self) {
        self.exc = None;
    }

    /// Backtrace of an exception, if it was captured.
    pub fn backtrace(&self, exc: Value) -> Option<Vec<String>> {
        match self.object(exc)? {
            Object::Exception(e) => e.backtrace.clone(),
            _ => None,
        }
    }

    /// Class name of an exception.
    pub fn exception_class(&self, exc: Value) -> Option<&str> {
        match self.object(exc)? {
            Object::Exception(e) => Some(&e.class),
            _ => None,
        }
    }

    /// Message of an exception.
    pub fn exception_message(&self, exc: Value) -> Option<&str> {
        match self.object(exc)? {
            Object::Exception(e) => Some(&e.message),
            _ => None,
        }
    }

    // ========================================================================
    // Garbage collection
    // ========================================================================

    /// Current GC arena index.
    pub fn arena_save(&self) -> usize {
        self.heap.arena_save()
    }

    /// Restores the GC arena. Collects immediately in stress mode.
    pub fn arena_restore(&mut self, index: usize) {
        self.heap.arena_restore(index);
        if self.heap.is_stress() {
            self.full_gc();
        }
    }

    /// Keeps `value` alive until a matching [`gc_unregister`](Self::gc_unregister).
    pub fn gc_register(&mut self, value: Value) {
        if let Value::Object(r) = value {
            self.heap.register(r);
        }
    }

    /// Drops one registration of `value`. Returns false if it had none.
    pub fn gc_unregister(&mut self, value: Value) -> bool {
        match value {
            Value::Object(r) => self.heap.unregister(r),
            _ => false,
        }
    }

    /// Number of outstanding registrations of `value`.
    pub fn gc_root_count(&self, value: Value) -> usize {
        value.as_object().map_or(0, |r| self.heap.root_count(r))
    }

    /// Runs a full collection and returns the number of freed objects.
    pub fn full_gc(&mut self) -> usize {
        self.collect_with(&[])
    }

    /// Enables or disables GC stress mode.
    pub fn set_gc_stress(&mut self, stress: bool) {
        self.heap.set_stress(stress);
    }

    /// Number of live heap objects.
    pub fn live_objects(&self) -> usize {
        self.heap.live()
    }

    /// Returns true if `value` is an immediate or a live object.
    pub fn is_live(&self, value: Value) -> bool {
        value.as_object().is_none_or(|r| self.heap.is_live(r))
    }

    pub(crate) fn alloc(&mut self, object: Object) -> ObjRef {
        if self.heap.needs_collection() {
            let mut pending = Vec::new();
            object.for_each_child(|v| pending.push(*v));
            self.collect_with(&pending);
        }
        self.heap.alloc(object)
    }

    fn collect_with(&mut self, extra: &[Value]) -> usize {
        let exc = self.exc.map(Value::Object);
        let frames = self
            .frames
            .iter()
            .flat_map(|f| f.locals.iter().chain(std::iter::once(&f.self_value)));
        let roots = self
            .globals
            .values()
            .chain(self.consts.values())
            .chain(self.stack.iter())
            .chain(frames)
            .chain(exc.iter())
            .chain(extra.iter());
        let freed = self.heap.collect(roots);
        trace!(freed, collections = self.heap.collections(), "collected");
        freed
    }

    // ========================================================================
    // Objects and symbols
    // ========================================================================

    pub(crate) fn object(&self, value: Value) -> Option<&Object> {
        self.heap.get(value.as_object()?)
    }

    /// Creates a string.
    pub fn str_new(&mut self, s: &str) -> Value {
        Value::Object(self.alloc(Object::String(s.to_string())))
    }

    /// Returns the contents of a string value.
    pub fn string_value(&self, value: Value) -> Option<&str> {
        match self.object(value)? {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements of an array value.
    pub fn array_values(&self, value: Value) -> Option<&[Value]> {
        match self.object(value)? {
            Object::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Interns a symbol.
    pub fn intern(&mut self, name: &str) -> Sym {
        self.symbols.intern(name)
    }

    /// Name of a symbol.
    pub fn sym_name(&self, sym: Sym) -> &str {
        self.symbols.name(sym)
    }

    /// Reads a global variable. The leading `$` is optional.
    pub fn global(&self, name: &str) -> Value {
        let name = name.strip_prefix('$').unwrap_or(name);
        self.symbols
            .get(name)
            .and_then(|sym| self.globals.get(&sym).copied())
            .unwrap_or_default()
    }

    /// Everything written by `puts`, `print` and `p` so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Takes the captured output, leaving it empty.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

fn prefixed(filename: Option<&str>, message: &str) -> String {
    match filename {
        Some(file) => format!("{}: {}", file, message),
        None => message.to_string(),
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! [`ExecutionContext`] for the bundled `ritec-vm` interpreter.

use ritec_vm::{State, Value};

use crate::context::{ExecutionContext, LoadConfig};
use crate::options::DumpFlags;

impl ExecutionContext for State {
    type Value = Value;
    type CompileContext = ritec_vm::CompileContext;
    type DumpError = ritec_vm::DumpError;

    fn arena_save(&mut self) -> usize {
        State::arena_save(self)
    }

    fn arena_restore(&mut self, index: usize) {
        State::arena_restore(self, index)
    }

    fn compile_context_new(&mut self, config: &LoadConfig) -> Self::CompileContext {
        let mut cxt = self.ccontext_new();
        cxt.no_exec = config.no_execute;
        cxt.capture_errors = config.capture_errors;
        if let Some(filename) = &config.filename {
            cxt.set_filename(filename.as_str());
        }
        cxt
    }

    fn compile_context_free(&mut self, cxt: &mut Self::CompileContext) {
        self.ccontext_free(std::mem::take(cxt));
    }

    fn load(&mut self, source: &[u8], cxt: &mut Self::CompileContext) -> Value {
        self.load_nstring_cxt(source, cxt)
    }

    fn pending_exception(&self) -> Option<Value> {
        self.exc()
    }

    fn inspect(&self, value: Value) -> String {
        State::inspect(self, value)
    }

    fn backtrace(&self, exception: Value) -> Option<Vec<String>> {
        State::backtrace(self, exception)
    }

    fn is_callable(&self, value: Value) -> bool {
        self.is_proc(value)
    }

    fn dump(&self, value: Value, flags: DumpFlags) -> Result<Vec<u8>, ritec_vm::DumpError> {
        let flags = ritec_vm::DumpFlags {
            debug_info: flags.debug_info,
        };
        self.dump_proc(value, flags)
    }

    fn pin(&mut self, value: Value) {
        self.gc_register(value);
    }

    fn unpin(&mut self, value: Value) {
        if !self.gc_unregister(value) {
            tracing::warn!(?value, "unpinned a value that was not pinned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, compile_to_value, release_value};
    use crate::options::CompileOptions;

    #[test]
    fn test_context_flags_reach_the_vm() {
        let mut state = State::new();
        let mut cxt =
            ExecutionContext::compile_context_new(&mut state, &LoadConfig::compile_only(Some("x.rb")));
        assert!(cxt.no_exec);
        assert!(cxt.capture_errors);
        assert_eq!(cxt.filename.as_deref(), Some("x.rb"));
        assert_eq!(state.open_compile_contexts(), 1);

        ExecutionContext::compile_context_free(&mut state, &mut cxt);
        assert_eq!(state.open_compile_contexts(), 0);
    }

    #[test]
    fn test_compile_leaves_no_garbage_rooted() {
        let mut state = State::new();
        let arena = State::arena_save(&state);
        compile(&mut state, b"x = [1, 2, 3]\nx.length", &CompileOptions::new()).unwrap();
        assert_eq!(State::arena_save(&state), arena);
        assert_eq!(state.open_compile_contexts(), 0);
        state.full_gc();
        assert_eq!(state.live_objects(), 0);
    }

    #[test]
    fn test_pinned_unit_survives_stress_collection() {
        let mut state = State::new();
        state.set_gc_stress(true);
        let unit = compile_to_value(&mut state, b"1 + 1", &CompileOptions::new()).unwrap();
        assert!(state.is_live(unit));
        assert_eq!(state.gc_root_count(unit), 1);

        for i in 0..10 {
            state.str_new(&format!("garbage {}", i));
        }
        assert!(state.is_live(unit));
        assert_eq!(state.exec(unit), Ok(Value::Integer(2)));

        release_value(&mut state, unit);
        state.full_gc();
        assert!(!state.is_live(unit));
    }

    #[test]
    fn test_exec_failure_is_not_a_compile_failure() {
        let mut state = State::new();
        let unit = compile_to_value(&mut state, b"raise \"boom\"", &CompileOptions::new()).unwrap();
        assert!(state.exc().is_none());
        let exc = state.exec(unit).unwrap_err();
        assert_eq!(State::inspect(&state, exc), "boom (RuntimeError)");
        release_value(&mut state, unit);
    }
}

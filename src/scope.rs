// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-call scoped resources.

use crate::context::{ExecutionContext, LoadConfig};

/// Holds the allocation scope and the compilation context for one compile
/// call.
///
/// Opening saves the arena index and creates the compilation context.
/// Dropping frees the compilation context and then restores the arena, on
/// every exit path including unwinding.
///
/// Values produced inside the scope are only protected until it drops.
/// Serialize or pin a callable unit before letting the scope go.
pub struct CompileScope<'a, C: ExecutionContext + ?Sized> {
    ctx: &'a mut C,
    arena: usize,
    cxt: C::CompileContext,
}

impl<'a, C: ExecutionContext + ?Sized> CompileScope<'a, C> {
    /// Saves the arena and creates a compilation context configured by
    /// `config`.
    pub fn open(ctx: &'a mut C, config: &LoadConfig) -> Self {
        let arena = ctx.arena_save();
        let cxt = ctx.compile_context_new(config);
        tracing::trace!(arena, "opened compile scope");
        Self { ctx, arena, cxt }
    }

    /// Loads `source` under the scope's compilation context.
    pub fn load(&mut self, source: &[u8]) -> C::Value {
        self.ctx.load(source, &mut self.cxt)
    }

    /// The execution context.
    pub fn context(&self) -> &C {
        &*self.ctx
    }

    /// The execution context, mutably.
    pub fn context_mut(&mut self) -> &mut C {
        &mut *self.ctx
    }

    /// The arena index restored on drop.
    pub fn arena_index(&self) -> usize {
        self.arena
    }
}

impl<C: ExecutionContext + ?Sized> Drop for CompileScope<'_, C> {
    fn drop(&mut self) {
        self.ctx.compile_context_free(&mut self.cxt);
        self.ctx.arena_restore(self.arena);
        tracing::trace!(arena = self.arena, "closed compile scope");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, LoadBehavior, MockContext};

    #[test]
    fn test_scope_releases_in_order() {
        let mut ctx = MockContext::new();
        {
            let mut scope = CompileScope::open(&mut ctx, &LoadConfig::compile_only(None));
            scope.load(b"1");
        }
        assert_eq!(
            ctx.events(),
            vec![
                Event::ArenaSave(0),
                Event::ContextNew,
                Event::Load,
                Event::ContextFree,
                Event::ArenaRestore(0),
            ]
        );
        assert_eq!(ctx.open_contexts, 0);
    }

    #[test]
    fn test_scope_passes_config() {
        let mut ctx = MockContext::new();
        drop(CompileScope::open(
            &mut ctx,
            &LoadConfig::compile_only(Some("x.rb")),
        ));
        let config = ctx.last_config.clone().unwrap();
        assert!(config.no_execute);
        assert!(config.capture_errors);
        assert_eq!(config.filename.as_deref(), Some("x.rb"));
    }

    #[test]
    fn test_scope_releases_on_unwind() {
        let mut ctx = MockContext::new();
        ctx.next_load = LoadBehavior::Panic;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut scope = CompileScope::open(&mut ctx, &LoadConfig::compile_only(None));
            scope.load(b"x");
        }));
        assert!(result.is_err());
        assert_eq!(ctx.open_contexts, 0);
        assert_eq!(ctx.events().last(), Some(&Event::ArenaRestore(0)));
    }
}

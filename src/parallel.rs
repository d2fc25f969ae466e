// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Batch compilation over independent execution contexts.
//!
//! One context is never shared between threads. Each rayon worker builds its
//! own with `make_context`, so the context type does not need to be `Send`.

use rayon::prelude::*;

use crate::compiler::compile;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::options::CompileOptions;

/// Compiles every source to a binary on the global rayon pool.
///
/// Results are returned in input order.
pub fn compile_parallel<S, C, F>(
    sources: &[S],
    options: &CompileOptions,
    make_context: F,
) -> Vec<Result<Vec<u8>>>
where
    S: AsRef<[u8]> + Sync,
    C: ExecutionContext,
    F: Fn() -> C + Sync + Send,
{
    tracing::debug!(count = sources.len(), "compiling batch");
    sources
        .par_iter()
        .map_init(&make_context, |ctx, source| {
            compile(ctx, source.as_ref(), options)
        })
        .collect()
}

/// Batch compiler with a dedicated thread pool.
pub struct ParallelCompiler {
    pool: rayon::ThreadPool,
    options: CompileOptions,
}

impl ParallelCompiler {
    /// Creates a batch compiler with `num_threads` workers (0 means rayon's
    /// default).
    pub fn with_threads(
        num_threads: usize,
        options: CompileOptions,
    ) -> std::result::Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("ritec-compile-{}", i))
            .build()?;
        Ok(Self { pool, options })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Compiles every source on this compiler's pool.
    pub fn compile_all<S, C, F>(&self, sources: &[S], make_context: F) -> Vec<Result<Vec<u8>>>
    where
        S: AsRef<[u8]> + Sync,
        C: ExecutionContext,
        F: Fn() -> C + Sync + Send,
    {
        self.pool
            .install(|| compile_parallel(sources, &self.options, make_context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockContext;

    #[test]
    fn test_results_keep_input_order() {
        let sources: Vec<String> = (0..32).map(|i| format!("{}", i)).collect();
        let results = compile_parallel(&sources, &CompileOptions::default(), MockContext::new);
        assert_eq!(results.len(), 32);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn test_dedicated_pool() {
        let compiler = ParallelCompiler::with_threads(2, CompileOptions::default()).unwrap();
        assert_eq!(compiler.threads(), 2);
        let results = compiler.compile_all(&["a", "b", "c"], || {
            let mut ctx = MockContext::new();
            ctx.fail_dump = true;
            ctx
        });
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_err()));
    }
}

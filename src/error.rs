// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the compile boundary.

use std::error::Error;
use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::Diagnostic;

/// Status code for a successful call.
pub const STATUS_OK: i32 = 0;

/// Status code for a failed call.
pub const STATUS_FAILED: i32 = -1;

/// Result type for compile operations.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors that can occur while compiling.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The source failed to parse or raised while loading
    #[error("{0}")]
    Source(Diagnostic),

    /// Loading succeeded but did not produce a callable unit
    #[error("failed to produce a callable unit")]
    Shape,

    /// The callable unit could not be serialized
    #[error("failed to serialize")]
    Serialization(#[source] Box<dyn Error + Send + Sync>),

    /// A source file could not be read
    #[error("failed to read source file {}: {source}", path.display())]
    Io {
        /// The file that was requested
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    /// The status code this error is reported with across the C ABI.
    pub fn status(&self) -> i32 {
        STATUS_FAILED
    }

    /// The diagnostic text handed to the caller.
    pub fn diagnostic(&self) -> Diagnostic {
        match self {
            CompileError::Source(diagnostic) => diagnostic.clone(),
            other => Diagnostic::new(other.to_string()),
        }
    }

    /// Returns true for failures caused by the source text itself.
    pub fn is_source_error(&self) -> bool {
        matches!(self, CompileError::Source(_))
    }
}

impl From<Diagnostic> for CompileError {
    fn from(diagnostic: Diagnostic) -> Self {
        CompileError::Source(diagnostic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_messages() {
        assert_eq!(CompileError::Shape.to_string(), "failed to produce a callable unit");
        let err = CompileError::Serialization("table too large".into());
        assert_eq!(err.to_string(), "failed to serialize");
        assert_eq!(
            err.source().map(|e| e.to_string()),
            Some("table too large".to_string())
        );
    }

    #[test]
    fn test_every_variant_fails_with_minus_one() {
        let errors = [
            CompileError::Source(Diagnostic::new("x")),
            CompileError::Shape,
            CompileError::Serialization("y".into()),
        ];
        for err in errors {
            assert_eq!(err.status(), STATUS_FAILED);
            assert!(!err.diagnostic().message().is_empty());
        }
        assert_eq!(STATUS_OK, 0);
    }

    #[test]
    fn test_source_diagnostic_is_passed_through() {
        let err = CompileError::from(Diagnostic::new("boom (RuntimeError)"));
        assert!(err.is_source_error());
        assert_eq!(err.to_string(), "boom (RuntimeError)");
        assert_eq!(err.diagnostic().message(), "boom (RuntimeError)");
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the reference VM.
//!
//! Script-level failures (syntax errors, raised exceptions) surface as
//! exception objects in [`State`](crate::State). The types here cover the
//! host-facing operations that return `Result`.

use thiserror::Error;

/// A parse failure with its source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}:{column}: {message}")]
pub struct SyntaxError {
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
    /// Parser message, e.g. `syntax error, unexpected end of file`
    pub message: String,
}

impl SyntaxError {
    /// Creates a new syntax error.
    pub fn new(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }

    /// Renders the error the way exception messages show it.
    pub fn render(&self, filename: Option<&str>) -> String {
        match filename {
            Some(file) => format!("{}:{}:{}: {}", file, self.line, self.column, self.message),
            None => self.to_string(),
        }
    }
}

/// A failure turning a parsed program into an instruction sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("codegen error: {message} (line {line})")]
pub struct CodegenError {
    /// 1-based line of the offending node
    pub line: u32,
    /// What went wrong
    pub message: String,
}

impl CodegenError {
    /// Creates a new codegen error.
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Errors raised while serializing a callable unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DumpError {
    /// The value is not a proc
    #[error("value is not a proc")]
    NotAProc,

    /// The object reference points at a reclaimed slot
    #[error("stale object reference (slot {0} was collected)")]
    StaleReference(u32),

    /// A table does not fit its length prefix
    #[error("{what} count {count} exceeds the binary format limit")]
    TooLarge {
        /// Which table overflowed
        what: &'static str,
        /// The actual count
        count: usize,
    },
}

/// Errors raised while reading a binary produced by the dumper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiteError {
    /// The input is shorter than a header or record requires
    #[error("binary size is too short")]
    TooShort,

    /// The input does not start with the `RITE` identifier
    #[error("binary header is incorrect")]
    BadIdentifier,

    /// The major version differs or the minor version is newer
    #[error("incompatible RITE version: expected=03.00 actual={major}.{minor}")]
    IncompatibleVersion {
        /// Major version found
        major: String,
        /// Minor version found
        minor: String,
    },

    /// A pool entry has an unknown type tag
    #[error("unknown pool value type {0}")]
    UnknownPoolType(u8),

    /// A string is not valid UTF-8
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// The binary has no `IREP` section
    #[error("binary has no IREP section")]
    MissingIrep,

    /// Child ireps are nested deeper than any compiled program can be
    #[error("irep nesting too deep")]
    TooDeep,
}

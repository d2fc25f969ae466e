// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiler configuration.

/// Options applied to every compile call of a [`Compiler`](crate::Compiler).
///
/// ```rust
/// use ritec::CompileOptions;
///
/// let options = CompileOptions::new()
///     .with_filename("app.rb")
///     .with_debug_info(true);
/// assert_eq!(options.filename(), Some("app.rb"));
/// assert!(options.dump_flags().debug_info);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    filename: Option<String>,
    debug_info: bool,
}

impl CompileOptions {
    /// Default options: no filename, no debug info.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filename used in diagnostics and debug info.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Emits line tables into serialized binaries.
    pub fn with_debug_info(mut self, debug_info: bool) -> Self {
        self.debug_info = debug_info;
        self
    }

    /// The configured filename.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Whether debug info is emitted.
    pub fn debug_info(&self) -> bool {
        self.debug_info
    }

    /// Serializer flags derived from these options.
    pub fn dump_flags(&self) -> DumpFlags {
        DumpFlags {
            debug_info: self.debug_info,
        }
    }
}

/// Flags passed to [`ExecutionContext::dump`](crate::ExecutionContext::dump).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpFlags {
    /// Include filenames and line tables
    pub debug_info: bool,
}

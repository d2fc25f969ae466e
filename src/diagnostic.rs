// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Turning a pending exception into a caller-owned message.

use std::fmt;

use crate::context::ExecutionContext;

/// A formatted compile failure.
///
/// Holds only owned text; nothing from the execution context escapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    message: String,
}

impl Diagnostic {
    /// Wraps a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Formats `exception`: its inspection, then its backtrace frames
    /// joined by newlines when a non-empty backtrace exists.
    ///
    /// The inspection and the first frame are also separated by a newline,
    /// so the first line is always the inspection alone:
    ///
    /// ```text
    /// boom (RuntimeError)
    /// main.rb:2:in f
    /// main.rb:5
    /// ```
    pub fn capture<C: ExecutionContext + ?Sized>(ctx: &C, exception: C::Value) -> Self {
        let mut message = ctx.inspect(exception);
        if let Some(frames) = ctx.backtrace(exception).filter(|frames| !frames.is_empty()) {
            message.push('\n');
            message.push_str(&frames.join("\n"));
        }
        Self { message }
    }

    /// The formatted text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Takes the formatted text.
    pub fn into_message(self) -> String {
        self.message
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<String> for Diagnostic {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockContext;

    #[test]
    fn test_capture_without_backtrace() {
        let mut ctx = MockContext::new();
        let exc = ctx.raise("line 1:4: syntax error, unexpected end of file (SyntaxError)", None);
        let diagnostic = Diagnostic::capture(&ctx, exc);
        assert_eq!(
            diagnostic.message(),
            "line 1:4: syntax error, unexpected end of file (SyntaxError)"
        );
    }

    #[test]
    fn test_capture_joins_backtrace() {
        let mut ctx = MockContext::new();
        let exc = ctx.raise(
            "boom (RuntimeError)",
            Some(vec!["a.rb:2:in f".into(), "a.rb:5".into()]),
        );
        let diagnostic = Diagnostic::capture(&ctx, exc);
        assert_eq!(diagnostic.to_string(), "boom (RuntimeError)\na.rb:2:in f\na.rb:5");
        assert_eq!(diagnostic.message().lines().next(), Some("boom (RuntimeError)"));
    }

    #[test]
    fn test_capture_with_empty_backtrace() {
        let mut ctx = MockContext::new();
        let exc = ctx.raise("x (RuntimeError)", Some(Vec::new()));
        assert_eq!(Diagnostic::capture(&ctx, exc).into_message(), "x (RuntimeError)");
    }
}

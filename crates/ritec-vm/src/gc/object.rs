// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Heap object kinds.

use std::rc::Rc;

use crate::compiler::Irep;
use crate::value::Value;

/// A heap-allocated object.
#[derive(Debug, Clone)]
pub enum Object {
    /// Mutable string
    String(String),
    /// Mutable array
    Array(Vec<Value>),
    /// Callable unit wrapping a compiled irep
    Proc(Rc<Irep>),
    /// Exception instance
    Exception(Exception),
}

impl Object {
    /// Class name shown by `inspect` and error messages.
    pub fn class_name(&self) -> &str {
        match self {
            Object::String(_) => "String",
            Object::Array(_) => "Array",
            Object::Proc(_) => "Proc",
            Object::Exception(e) => &e.class,
        }
    }

    /// Calls `f` on every value this object references.
    pub(crate) fn for_each_child(&self, mut f: impl FnMut(&Value)) {
        if let Object::Array(items) = self {
            items.iter().for_each(&mut f);
        }
    }
}

/// An exception object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    /// Class name, e.g. `RuntimeError`
    pub class: String,
    /// Message given at raise time
    pub message: String,
    /// Call stack at raise time; `None` for errors raised while loading
    pub backtrace: Option<Vec<String>>,
}

impl Exception {
    /// Creates an exception without a backtrace.
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
            backtrace: None,
        }
    }

    /// Attaches a backtrace.
    pub fn with_backtrace(mut self, backtrace: Vec<String>) -> Self {
        self.backtrace = Some(backtrace);
        self
    }

    /// Renders the exception the way `inspect` does.
    pub fn inspect(&self) -> String {
        if self.message.is_empty() {
            self.class.clone()
        } else {
            format!("{} ({})", self.message, self.class)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_inspect() {
        assert_eq!(
            Exception::new("RuntimeError", "boom").inspect(),
            "boom (RuntimeError)"
        );
        assert_eq!(Exception::new("StandardError", "").inspect(), "StandardError");
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! String conversions: `inspect` and `to_s`.

use crate::gc::{ObjRef, Object};
use crate::state::State;
use crate::value::Value;

impl State {
    /// Developer-facing representation of a value, as `p` prints it.
    ///
    /// Exceptions render as `message (Class)`.
    pub fn inspect(&self, value: Value) -> String {
        let mut seen = Vec::new();
        self.inspect_into(value, &mut seen)
    }

    /// Plain conversion, as `puts` prints it.
    pub fn to_s(&self, value: Value) -> String {
        match value {
            Value::Nil => String::new(),
            Value::Symbol(sym) => self.sym_name(sym).to_string(),
            Value::Object(r) => match self.heap.get(r) {
                Some(Object::String(s)) => s.clone(),
                Some(Object::Exception(e)) => e.message.clone(),
                _ => self.inspect(value),
            },
            _ => self.inspect(value),
        }
    }

    /// Class name of a value.
    pub fn class_of(&self, value: Value) -> &str {
        match value {
            Value::Nil => "NilClass",
            Value::Bool(true) => "TrueClass",
            Value::Bool(false) => "FalseClass",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Symbol(_) => "Symbol",
            Value::Main => "Object",
            Value::Object(r) => self.heap.get(r).map_or("Object", Object::class_name),
        }
    }

    fn inspect_into(&self, value: Value, seen: &mut Vec<ObjRef>) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(f) => format_float(f),
            Value::Symbol(sym) => format!(":{}", self.sym_name(sym)),
            Value::Main => "main".to_string(),
            Value::Object(r) => match self.heap.get(r) {
                None => "#<collected>".to_string(),
                Some(Object::String(s)) => quote(s),
                Some(Object::Proc(_)) => format!("#<Proc:0x{:04x}>", r.index()),
                Some(Object::Exception(e)) => e.inspect(),
                Some(Object::Array(items)) => {
                    if seen.contains(&r) {
                        return "[...]".to_string();
                    }
                    seen.push(r);
                    let parts: Vec<String> = items
                        .iter()
                        .map(|item| self.inspect_into(*item, seen))
                        .collect();
                    seen.pop();
                    format!("[{}]", parts.join(", "))
                }
            },
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{1b}' => out.push_str("\\e"),
            c if c.is_control() => out.push_str(&format!("\\x{:02X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(f64::INFINITY), "Infinity");
        assert_eq!(format_float(f64::NAN), "NaN");
    }

    #[test]
    fn test_inspect_values() {
        let mut state = State::new();
        let value = state.load_string("[1, \"a\\n\", :b, nil, 1.0]").unwrap();
        assert_eq!(state.inspect(value), "[1, \"a\\n\", :b, nil, 1.0]");
        assert_eq!(state.to_s(Value::Nil), "");
        assert_eq!(state.inspect(Value::Main), "main");
    }

    #[test]
    fn test_recursive_array() {
        let mut state = State::new();
        let value = state.load_string("a = [1]\na << a\na").unwrap();
        assert_eq!(state.inspect(value), "[1, [...]]");
    }

    #[test]
    fn test_exception_inspect() {
        let mut state = State::new();
        let exc = state.load_string("raise \"boom\"").unwrap_err();
        assert_eq!(state.inspect(exc), "boom (RuntimeError)");
        assert_eq!(state.class_of(exc), "RuntimeError");
    }
}

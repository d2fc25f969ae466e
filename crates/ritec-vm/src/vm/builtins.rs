// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Method dispatch and built-in methods.

use super::interpreter::Flow;
use crate::gc::Object;
use crate::state::State;
use crate::value::{Sym, Value};

impl State {
    /// Calls `sym` on `receiver`. Methods defined with `def` take
    /// precedence over built-ins.
    pub(crate) fn send(&mut self, receiver: Value, sym: Sym, args: Vec<Value>) -> Flow {
        if let Some(body) = self.methods.get(&sym).cloned() {
            return self.call_irep(body, receiver, Some(sym), args);
        }

        let name = self.sym_name(sym).to_string();
        match name.as_str() {
            "puts" => {
                if args.is_empty() {
                    self.output.push('\n');
                }
                for arg in &args {
                    self.puts_value(*arg);
                }
                Ok(Value::Nil)
            }
            "print" => {
                for arg in &args {
                    let s = self.to_s(*arg);
                    self.output.push_str(&s);
                }
                Ok(Value::Nil)
            }
            "p" => {
                for arg in &args {
                    let s = self.inspect(*arg);
                    self.output.push_str(&s);
                    self.output.push('\n');
                }
                Ok(match args.as_slice() {
                    [] => Value::Nil,
                    [one] => *one,
                    _ => Value::Object(self.alloc(Object::Array(args))),
                })
            }
            "raise" => Err(self.make_raise(&args)),
            "inspect" => {
                self.check_arity(&args, 0)?;
                let s = self.inspect(receiver);
                Ok(self.str_new(&s))
            }
            "to_s" => {
                self.check_arity(&args, 0)?;
                let s = self.to_s(receiver);
                Ok(self.str_new(&s))
            }
            "nil?" => {
                self.check_arity(&args, 0)?;
                Ok(Value::Bool(receiver.is_nil()))
            }
            "length" | "size" => {
                self.check_arity(&args, 0)?;
                match self.object(receiver) {
                    Some(Object::String(s)) => Ok(Value::Integer(s.chars().count() as i64)),
                    Some(Object::Array(items)) => Ok(Value::Integer(items.len() as i64)),
                    _ => Err(self.no_method_error(&name, receiver)),
                }
            }
            "[]" => {
                self.check_arity(&args, 1)?;
                self.index(receiver, args[0], &name)
            }
            "[]=" => {
                self.check_arity(&args, 2)?;
                self.index_set(receiver, args[0], args[1], &name)
            }
            "<<" | "push" => {
                self.check_arity(&args, 1)?;
                self.append(receiver, args[0], &name)
            }
            "first" | "last" => {
                self.check_arity(&args, 0)?;
                match self.object(receiver) {
                    Some(Object::Array(items)) => {
                        let item = if name == "first" {
                            items.first()
                        } else {
                            items.last()
                        };
                        Ok(item.copied().unwrap_or_default())
                    }
                    _ => Err(self.no_method_error(&name, receiver)),
                }
            }
            "join" => {
                let separator = match args.as_slice() {
                    [] => String::new(),
                    [sep] => self.to_s(*sep),
                    _ => return Err(self.arity_error(args.len(), 1)),
                };
                let Some(items) = self.array_values(receiver) else {
                    return Err(self.no_method_error(&name, receiver));
                };
                let joined = items
                    .iter()
                    .map(|item| self.to_s(*item))
                    .collect::<Vec<_>>()
                    .join(&separator);
                Ok(self.str_new(&joined))
            }
            _ => Err(self.no_method_error(&name, receiver)),
        }
    }

    fn puts_value(&mut self, value: Value) {
        if let Some(items) = self.array_values(value) {
            let lines: Vec<String> = items.iter().map(|item| self.to_s(*item)).collect();
            for line in lines {
                self.push_line(&line);
            }
            return;
        }
        let s = self.to_s(value);
        self.push_line(&s);
    }

    fn push_line(&mut self, line: &str) {
        self.output.push_str(line);
        if !line.ends_with('\n') {
            self.output.push('\n');
        }
    }

    fn make_raise(&mut self, args: &[Value]) -> Value {
        match args {
            [] => self.new_exception("RuntimeError", "unhandled exception"),
            [value] if matches!(self.object(*value), Some(Object::Exception(_))) => *value,
            [value] => {
                if let Some(message) = self.string_value(*value).map(str::to_string) {
                    self.new_exception("RuntimeError", message)
                } else {
                    self.new_exception("TypeError", "exception class/object expected")
                }
            }
            _ => self.arity_error(args.len(), 1),
        }
    }

    fn index(&mut self, receiver: Value, index: Value, name: &str) -> Flow {
        let Value::Integer(i) = index else {
            let message = format!("no implicit conversion into Integer from {}", self.class_of(index));
            return Err(self.new_exception("TypeError", message));
        };
        match self.object(receiver) {
            Some(Object::Array(items)) => {
                Ok(resolve_index(i, items.len()).map_or(Value::Nil, |i| items[i]))
            }
            Some(Object::String(s)) => {
                let chars: Vec<char> = s.chars().collect();
                match resolve_index(i, chars.len()) {
                    Some(i) => {
                        let ch = chars[i].to_string();
                        Ok(self.str_new(&ch))
                    }
                    None => Ok(Value::Nil),
                }
            }
            _ => Err(self.no_method_error(name, receiver)),
        }
    }

    fn index_set(&mut self, receiver: Value, index: Value, value: Value, name: &str) -> Flow {
        let Value::Integer(i) = index else {
            let message = format!("no implicit conversion into Integer from {}", self.class_of(index));
            return Err(self.new_exception("TypeError", message));
        };
        let Some(Object::Array(items)) = receiver.as_object().and_then(|r| self.heap.get_mut(r))
        else {
            return Err(self.no_method_error(name, receiver));
        };

        let slot = if i < 0 {
            match resolve_index(i, items.len()) {
                Some(slot) => slot,
                None => {
                    let message = format!("index {} too small for array", i);
                    return Err(self.new_exception("IndexError", message));
                }
            }
        } else {
            i as usize
        };
        if slot >= items.len() {
            items.resize(slot + 1, Value::Nil);
        }
        items[slot] = value;
        Ok(value)
    }

    fn append(&mut self, receiver: Value, value: Value, name: &str) -> Flow {
        let appended = self.string_value(value).map(str::to_string);
        match receiver.as_object().and_then(|r| self.heap.get_mut(r)) {
            Some(Object::Array(items)) => {
                items.push(value);
                Ok(receiver)
            }
            Some(Object::String(s)) if name == "<<" => match appended {
                Some(tail) => {
                    s.push_str(&tail);
                    Ok(receiver)
                }
                None => {
                    let message = format!(
                        "no implicit conversion of {} into String",
                        self.class_of(value)
                    );
                    Err(self.new_exception("TypeError", message))
                }
            },
            _ => Err(self.no_method_error(name, receiver)),
        }
    }

    fn check_arity(&mut self, args: &[Value], expected: usize) -> Result<(), Value> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(self.arity_error(args.len(), expected))
        }
    }

    fn arity_error(&mut self, given: usize, expected: usize) -> Value {
        let message = format!(
            "wrong number of arguments (given {}, expected {})",
            given, expected
        );
        self.new_exception("ArgumentError", message)
    }
}

/// Resolves a possibly negative index against `len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 {
        len as i64 + index
    } else {
        index
    };
    (0..len as i64).contains(&resolved).then_some(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(0, 3), Some(0));
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(-4, 3), None);
    }

    #[test]
    fn test_puts_and_p_output() {
        let mut state = State::new();
        state
            .load_string("puts 1, [2, 3]\nputs\np \"x\"\nprint :y")
            .unwrap();
        assert_eq!(state.take_output(), "1\n2\n3\n\n\"x\"\ny");
    }

    #[test]
    fn test_array_builtins() {
        let mut state = State::new();
        let value = state
            .load_string("a = [1, 2]\na.push(3)\na[5] = 6\n[a.size, a.first, a.last, a[-1], a[9]]")
            .unwrap();
        assert_eq!(state.inspect(value), "[6, 1, 6, 6, nil]");
    }

    #[test]
    fn test_string_builtins() {
        let mut state = State::new();
        let value = state
            .load_string("s = \"ab\"\ns << \"c\"\n[s, s.length, s[1], s * 2, 12.to_s]")
            .unwrap();
        assert_eq!(state.inspect(value), "[\"abc\", 3, \"b\", \"abcabc\", \"12\"]");
    }

    #[test]
    fn test_user_method_shadows_builtin() {
        let mut state = State::new();
        let value = state.load_string("def puts(x)\n  x * 2\nend\nputs 21").unwrap();
        assert_eq!(value, Value::Integer(42));
        assert_eq!(state.output(), "");
    }

    #[test]
    fn test_builtin_errors() {
        let mut state = State::new();
        let exc = state.load_string("undefined_thing").unwrap_err();
        assert_eq!(
            state.exception_message(exc),
            Some("undefined method 'undefined_thing' for main")
        );
        let exc = state.load_string("1.length").unwrap_err();
        assert_eq!(
            state.exception_message(exc),
            Some("undefined method 'length' for an instance of Integer")
        );
        let exc = state.load_string("[].first(1)").unwrap_err();
        assert_eq!(state.exception_class(exc), Some("ArgumentError"));
    }
}

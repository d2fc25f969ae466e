// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode interpreter.

use std::rc::Rc;

use tracing::debug;

use super::{Frame, MAX_CALL_DEPTH};
use crate::compiler::{Instruction, Irep, OpCode, PoolValue};
use crate::gc::{Exception, Object};
use crate::state::State;
use crate::value::{Sym, Value};

/// Result of running script code; the error is the raised exception.
pub(crate) type Flow = Result<Value, Value>;

impl State {
    /// Runs a proc at top level.
    ///
    /// Returns the value of its last expression, or the raised exception,
    /// which is also left pending in [`exc`](State::exc).
    pub fn exec(&mut self, proc_value: Value) -> Result<Value, Value> {
        self.exc = None;
        let Some(irep) = self.proc_irep(proc_value) else {
            let message = format!("{} is not a proc", self.inspect(proc_value));
            let exc = self.new_exception("TypeError", message);
            self.exc = exc.as_object();
            return Err(exc);
        };

        let ai = self.heap.arena_save();
        let frames = self.frames.len();
        let stack = self.stack.len();

        let result = self.call_irep(irep, Value::Main, None, Vec::new());

        self.frames.truncate(frames);
        self.stack.truncate(stack);
        self.heap.arena_restore(ai);
        match result {
            Ok(value) => {
                if let Value::Object(r) = value {
                    self.heap.protect(r);
                }
                Ok(value)
            }
            Err(exc) => {
                debug!(exception = %self.inspect(exc), "exec raised");
                self.exc = exc.as_object();
                Err(exc)
            }
        }
    }

    /// Pushes a frame and runs `irep` to its `Return`.
    pub(crate) fn call_irep(
        &mut self,
        irep: Rc<Irep>,
        self_value: Value,
        method: Option<Sym>,
        args: Vec<Value>,
    ) -> Flow {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(self.new_exception("SystemStackError", "stack level too deep"));
        }

        let argc = args.len();
        let mut locals = args;
        locals.resize(usize::from(irep.nlocals).max(locals.len()), Value::Nil);
        self.frames.push(Frame {
            irep,
            pc: 0,
            locals,
            argc,
            self_value,
            method,
            stack_base: self.stack.len(),
        });

        let result = self.run_frame();

        if let Some(frame) = self.frames.pop() {
            self.stack.truncate(frame.stack_base);
        }
        result
    }

    fn run_frame(&mut self) -> Flow {
        let Some(frame) = self.frames.last() else {
            return Ok(Value::Nil);
        };
        let irep = Rc::clone(&frame.irep);
        let ai = self.heap.arena_save();
        let mut pc = 0;

        loop {
            let Some(insn) = Instruction::decode(&irep.iseq, pc) else {
                return Err(self.new_exception("ScriptError", "corrupt instruction sequence"));
            };
            if let Some(frame) = self.frames.last_mut() {
                frame.pc = pc;
            }
            pc = insn.next;
            let a = usize::from(insn.a);

            match insn.opcode {
                OpCode::Nop => {}
                OpCode::LoadNil => self.push(Value::Nil),
                OpCode::LoadTrue => self.push(Value::Bool(true)),
                OpCode::LoadFalse => self.push(Value::Bool(false)),
                OpCode::LoadSelf => {
                    let value = self.frames.last().map_or(Value::Main, |f| f.self_value);
                    self.push(value);
                }
                OpCode::LoadI8 => self.push(Value::Integer(i64::from(insn.a as u8 as i8))),
                OpCode::LoadL | OpCode::String => {
                    let value = match irep.pool.get(a) {
                        Some(PoolValue::Int(n)) => Value::Integer(*n),
                        Some(PoolValue::Float(f)) => Value::Float(*f),
                        Some(PoolValue::Str(s)) => {
                            let s = s.clone();
                            Value::Object(self.alloc(Object::String(s)))
                        }
                        None => return Err(self.corrupt()),
                    };
                    self.push(value);
                }
                OpCode::LoadSym => {
                    let sym = self.irep_sym(&irep, a)?;
                    self.push(Value::Symbol(sym));
                }

                OpCode::GetLocal => {
                    let value = self
                        .frames
                        .last()
                        .and_then(|f| f.locals.get(a).copied())
                        .unwrap_or_default();
                    self.push(value);
                }
                OpCode::SetLocal => {
                    let value = self.peek();
                    if let Some(slot) = self.frames.last_mut().and_then(|f| f.locals.get_mut(a)) {
                        *slot = value;
                    }
                }
                OpCode::GetGlobal => {
                    let sym = self.irep_sym(&irep, a)?;
                    let value = self.globals.get(&sym).copied().unwrap_or_default();
                    self.push(value);
                }
                OpCode::SetGlobal => {
                    let sym = self.irep_sym(&irep, a)?;
                    let value = self.peek();
                    self.globals.insert(sym, value);
                }
                OpCode::GetConst => {
                    let sym = self.irep_sym(&irep, a)?;
                    match self.consts.get(&sym).copied() {
                        Some(value) => self.push(value),
                        None => {
                            let message =
                                format!("uninitialized constant {}", self.sym_name(sym));
                            return Err(self.new_exception("NameError", message));
                        }
                    }
                }
                OpCode::SetConst => {
                    let sym = self.irep_sym(&irep, a)?;
                    let value = self.peek();
                    self.consts.insert(sym, value);
                }

                OpCode::Pop => {
                    self.pop();
                }
                OpCode::Dup => {
                    let value = self.peek();
                    self.push(value);
                }

                OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Mod
                | OpCode::Pow
                | OpCode::Eq
                | OpCode::Lt
                | OpCode::Le
                | OpCode::Gt
                | OpCode::Ge => {
                    let rhs = self.peek_at(0);
                    let lhs = self.peek_at(1);
                    let result = self.binary_op(insn.opcode, lhs, rhs)?;
                    self.pop();
                    self.pop();
                    self.push(result);
                }
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(!value.is_truthy()));
                }
                OpCode::Neg => {
                    let value = self.peek();
                    let result = match value {
                        Value::Integer(n) => match n.checked_neg() {
                            Some(n) => Value::Integer(n),
                            None => Value::Float(-(n as f64)),
                        },
                        Value::Float(f) => Value::Float(-f),
                        other => return Err(self.no_method_error("-@", other)),
                    };
                    self.pop();
                    self.push(result);
                }

                OpCode::Jmp => pc = a,
                OpCode::JmpIf => {
                    if self.pop().is_truthy() {
                        pc = a;
                    }
                }
                OpCode::JmpNot => {
                    if !self.pop().is_truthy() {
                        pc = a;
                    }
                }

                OpCode::Send => {
                    let sym = self.irep_sym(&irep, a)?;
                    let argc = usize::from(insn.b);
                    let len = self.stack.len();
                    if len < argc + 1 {
                        return Err(self.corrupt());
                    }
                    // arguments stay on the stack, and so rooted, during the call
                    let receiver = self.stack[len - argc - 1];
                    let args = self.stack[len - argc..].to_vec();
                    let result = self.send(receiver, sym, args)?;
                    self.stack.truncate(len - argc - 1);
                    self.push(result);
                }
                OpCode::Array => {
                    let len = self.stack.len();
                    if len < a {
                        return Err(self.corrupt());
                    }
                    let items = self.stack[len - a..].to_vec();
                    let array = self.alloc(Object::Array(items));
                    self.stack.truncate(len - a);
                    self.push(Value::Object(array));
                }
                OpCode::Def => {
                    let sym = self.irep_sym(&irep, a)?;
                    let Some(body) = irep.reps.get(usize::from(insn.b)) else {
                        return Err(self.corrupt());
                    };
                    self.methods.insert(sym, Rc::clone(body));
                    self.push(Value::Symbol(sym));
                }
                OpCode::Return => return Ok(self.pop()),
                OpCode::Enter => {
                    let given = self.frames.last().map_or(0, |f| f.argc);
                    if given != a {
                        let message = format!(
                            "wrong number of arguments (given {}, expected {})",
                            given, a
                        );
                        return Err(self.new_exception("ArgumentError", message));
                    }
                }
            }

            // the new value is on the stack now
            self.arena_restore(ai);
        }
    }

    // ========================================================================
    // Stack helpers
    // ========================================================================

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or_default()
    }

    fn peek(&self) -> Value {
        self.peek_at(0)
    }

    fn peek_at(&self, depth: usize) -> Value {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|i| self.stack.get(i).copied())
            .unwrap_or_default()
    }

    fn irep_sym(&mut self, irep: &Irep, index: usize) -> Result<Sym, Value> {
        match irep.syms.get(index) {
            Some(name) => Ok(self.intern(name)),
            None => Err(self.corrupt()),
        }
    }

    fn corrupt(&mut self) -> Value {
        self.new_exception("ScriptError", "corrupt instruction sequence")
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn binary_op(&mut self, op: OpCode, lhs: Value, rhs: Value) -> Flow {
        use Value::{Float, Integer};

        if op == OpCode::Eq {
            return Ok(Value::Bool(self.values_equal(lhs, rhs)));
        }

        match (lhs, rhs) {
            (Integer(a), Integer(b)) => self.integer_op(op, a, b),
            (Integer(a), Float(b)) => self.float_op(op, a as f64, b),
            (Float(a), Integer(b)) => self.float_op(op, a, b as f64),
            (Float(a), Float(b)) => self.float_op(op, a, b),
            _ => self.object_op(op, lhs, rhs),
        }
    }

    fn integer_op(&mut self, op: OpCode, a: i64, b: i64) -> Flow {
        let overflow = || Value::Float(float_arith(op, a as f64, b as f64));
        let value = match op {
            OpCode::Add => a.checked_add(b).map_or_else(overflow, Value::Integer),
            OpCode::Sub => a.checked_sub(b).map_or_else(overflow, Value::Integer),
            OpCode::Mul => a.checked_mul(b).map_or_else(overflow, Value::Integer),
            OpCode::Div | OpCode::Mod if b == 0 => {
                return Err(self.new_exception("ZeroDivisionError", "divided by 0"));
            }
            OpCode::Div => match a.checked_div(b) {
                Some(q) if a % b != 0 && (a < 0) != (b < 0) => Value::Integer(q - 1),
                Some(q) => Value::Integer(q),
                None => overflow(),
            },
            OpCode::Mod => {
                let r = a.wrapping_rem(b);
                if r != 0 && (r < 0) != (b < 0) {
                    Value::Integer(r + b)
                } else {
                    Value::Integer(r)
                }
            }
            OpCode::Pow => match u32::try_from(b) {
                Ok(exp) => a.checked_pow(exp).map_or_else(overflow, Value::Integer),
                Err(_) => overflow(),
            },
            OpCode::Lt => Value::Bool(a < b),
            OpCode::Le => Value::Bool(a <= b),
            OpCode::Gt => Value::Bool(a > b),
            OpCode::Ge => Value::Bool(a >= b),
            _ => Value::Nil,
        };
        Ok(value)
    }

    fn float_op(&mut self, op: OpCode, a: f64, b: f64) -> Flow {
        let value = match op {
            OpCode::Lt => Value::Bool(a < b),
            OpCode::Le => Value::Bool(a <= b),
            OpCode::Gt => Value::Bool(a > b),
            OpCode::Ge => Value::Bool(a >= b),
            _ => Value::Float(float_arith(op, a, b)),
        };
        Ok(value)
    }

    fn object_op(&mut self, op: OpCode, lhs: Value, rhs: Value) -> Flow {
        enum Outcome {
            New(Object),
            Compare(bool),
            NegativeRepeat,
            Undefined,
        }

        let outcome = match (self.object(lhs), self.object(rhs)) {
            (Some(Object::String(a)), Some(Object::String(b))) => match op {
                OpCode::Add => Outcome::New(Object::String(format!("{}{}", a, b))),
                OpCode::Lt => Outcome::Compare(a < b),
                OpCode::Le => Outcome::Compare(a <= b),
                OpCode::Gt => Outcome::Compare(a > b),
                OpCode::Ge => Outcome::Compare(a >= b),
                _ => Outcome::Undefined,
            },
            (Some(Object::String(s)), None) if op == OpCode::Mul => match rhs {
                Value::Integer(n) if n >= 0 => Outcome::New(Object::String(s.repeat(n as usize))),
                Value::Integer(_) => Outcome::NegativeRepeat,
                _ => Outcome::Undefined,
            },
            (Some(Object::Array(a)), Some(Object::Array(b))) if op == OpCode::Add => {
                Outcome::New(Object::Array(a.iter().chain(b).copied().collect()))
            }
            _ => Outcome::Undefined,
        };

        match outcome {
            Outcome::New(object) => Ok(Value::Object(self.alloc(object))),
            Outcome::Compare(b) => Ok(Value::Bool(b)),
            Outcome::NegativeRepeat => {
                Err(self.new_exception("ArgumentError", "negative argument"))
            }
            Outcome::Undefined if matches!(lhs, Value::Integer(_) | Value::Float(_)) => {
                let message = format!(
                    "{} can't be coerced into {}",
                    self.class_of(rhs),
                    self.class_of(lhs)
                );
                Err(self.new_exception("TypeError", message))
            }
            Outcome::Undefined => Err(self.no_method_error(operator_name(op), lhs)),
        }
    }

    pub(crate) fn values_equal(&self, lhs: Value, rhs: Value) -> bool {
        match (lhs, rhs) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                a as f64 == b
            }
            (Value::Object(a), Value::Object(b)) if a != b => {
                match (self.heap.get(a), self.heap.get(b)) {
                    (Some(Object::String(x)), Some(Object::String(y))) => x == y,
                    (Some(Object::Array(x)), Some(Object::Array(y))) => {
                        x.len() == y.len()
                            && x.iter().zip(y).all(|(l, r)| self.values_equal(*l, *r))
                    }
                    _ => false,
                }
            }
            _ => lhs == rhs,
        }
    }

    // ========================================================================
    // Exceptions
    // ========================================================================

    /// Creates an exception carrying the current backtrace.
    pub(crate) fn new_exception(&mut self, class: &str, message: impl Into<String>) -> Value {
        let backtrace = self.capture_backtrace();
        let exception = Exception::new(class, message).with_backtrace(backtrace);
        Value::Object(self.alloc(Object::Exception(exception)))
    }

    pub(crate) fn no_method_error(&mut self, method: &str, receiver: Value) -> Value {
        let target = match receiver {
            Value::Main => "main".to_string(),
            Value::Nil => "nil".to_string(),
            other => format!("an instance of {}", self.class_of(other)),
        };
        let message = format!("undefined method '{}' for {}", method, target);
        self.new_exception("NoMethodError", message)
    }

    /// Innermost frame first.
    fn capture_backtrace(&self) -> Vec<String> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let file = frame.irep.filename().unwrap_or("(unknown)");
                let mut entry = match frame.irep.line_at(frame.pc) {
                    Some(line) => format!("{}:{}", file, line),
                    None => file.to_string(),
                };
                if let Some(method) = frame.method {
                    entry.push_str(&format!(":in {}", self.sym_name(method)));
                }
                entry
            })
            .collect()
    }
}

fn float_arith(op: OpCode, a: f64, b: f64) -> f64 {
    match op {
        OpCode::Add => a + b,
        OpCode::Sub => a - b,
        OpCode::Mul => a * b,
        OpCode::Div => a / b,
        OpCode::Mod => {
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }
        }
        OpCode::Pow => a.powf(b),
        _ => f64::NAN,
    }
}

fn operator_name(op: OpCode) -> &'static str {
    match op {
        OpCode::Add => "+",
        OpCode::Sub => "-",
        OpCode::Mul => "*",
        OpCode::Div => "/",
        OpCode::Mod => "%",
        OpCode::Pow => "**",
        OpCode::Lt => "<",
        OpCode::Le => "<=",
        OpCode::Gt => ">",
        OpCode::Ge => ">=",
        _ => "==",
    }
}

#[cfg(test)]
mod tests {
    use crate::State;
    use crate::value::Value;

    fn eval(src: &str) -> (State, Result<Value, Value>) {
        let mut state = State::new();
        let result = state.load_string(src);
        (state, result)
    }

    fn eval_int(src: &str) -> i64 {
        match eval(src).1 {
            Ok(Value::Integer(n)) => n,
            other => panic!("expected integer from {:?}, got {:?}", src, other),
        }
    }

    fn eval_error(src: &str) -> (String, String) {
        let (state, result) = eval(src);
        let exc = result.expect_err("should raise");
        (
            state.exception_class(exc).unwrap().to_string(),
            state.exception_message(exc).unwrap().to_string(),
        )
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_int("1 + 1"), 2);
        assert_eq!(eval_int("2 + 3 * 4"), 14);
        assert_eq!(eval_int("2 ** 10"), 1024);
        assert_eq!(eval_int("-7 / 2"), -4);
        assert_eq!(eval_int("-7 % 3"), 2);
        assert_eq!(eval_int("100000 * 3"), 300000);
    }

    #[test]
    fn test_float_and_overflow() {
        assert_eq!(eval("1.5 + 1").1, Ok(Value::Float(2.5)));
        assert!(matches!(eval("9223372036854775807 + 1").1, Ok(Value::Float(_))));
    }

    #[test]
    fn test_locals_and_loops() {
        assert_eq!(eval_int("i = 0\nsum = 0\nwhile i < 5\n  i += 1\n  sum += i\nend\nsum"), 15);
        assert_eq!(eval_int("i = 0\nuntil i >= 3 do i += 1 end\ni"), 3);
        assert_eq!(eval_int("i = 0\nwhile true\n  i += 1\n  break if i == 4\nend\ni"), 4);
        assert_eq!(
            eval_int("i = 0\nn = 0\nwhile i < 6\n  i += 1\n  next if i % 2 == 0\n  n += 1\nend\nn"),
            3
        );
    }

    #[test]
    fn test_methods() {
        assert_eq!(eval_int("def add(a, b)\n  a + b\nend\nadd(2, 3)"), 5);
        assert_eq!(
            eval_int("def fib(n)\n  return n if n < 2\n  fib(n - 1) + fib(n - 2)\nend\nfib(15)"),
            610
        );
    }

    #[test]
    fn test_conditionals() {
        assert_eq!(eval_int("x = 5\nif x > 3\n  1\nelsif x > 1\n  2\nelse\n  3\nend"), 1);
        assert_eq!(eval("nil || false").1, Ok(Value::Bool(false)));
        assert_eq!(eval_int("nil || 7"), 7);
        assert_eq!(eval("1 && nil").1, Ok(Value::Nil));
        assert_eq!(eval("1 != 2").1, Ok(Value::Bool(true)));
    }

    #[test]
    fn test_globals_and_constants() {
        assert_eq!(eval_int("$x = 4\nLIMIT = 10\n$x + LIMIT"), 14);
    }

    #[test]
    fn test_raise() {
        let (class, message) = eval_error("raise \"boom\"");
        assert_eq!(class, "RuntimeError");
        assert_eq!(message, "boom");
    }

    #[test]
    fn test_runtime_errors() {
        assert_eq!(eval_error("1 / 0").0, "ZeroDivisionError");
        assert_eq!(eval_error("Missing").1, "uninitialized constant Missing");
        assert_eq!(eval_error("nil + 1").1, "undefined method '+' for nil");
        assert_eq!(eval_error("1 + \"a\"").1, "String can't be coerced into Integer");
        assert_eq!(
            eval_error("def f(a)\nend\nf(1, 2)").1,
            "wrong number of arguments (given 2, expected 1)"
        );
        assert_eq!(eval_error("def f\n  f\nend\nf").0, "SystemStackError");
    }

    #[test]
    fn test_backtrace_names_method_and_lines() {
        let mut state = State::new();
        let mut cxt = state.ccontext_new();
        cxt.set_filename("bt.rb");
        state.load_nstring_cxt(b"def fail\n  raise \"x\"\nend\nfail", &mut cxt);
        state.ccontext_free(cxt);
        let exc = state.exc().unwrap();
        assert_eq!(
            state.backtrace(exc),
            Some(vec!["bt.rb:2:in fail".to_string(), "bt.rb:4".to_string()])
        );
    }

    #[test]
    fn test_exec_under_gc_stress() {
        let mut state = State::new();
        state.set_gc_stress(true);
        let result = state.load_string("a = [\"x\", \"y\"]\na << \"z\"\na.join(\"-\")");
        let value = result.expect("should run");
        assert_eq!(state.string_value(value), Some("x-y-z"));
    }
}

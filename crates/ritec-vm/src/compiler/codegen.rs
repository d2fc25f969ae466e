// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Code generation from AST to instruction sequences.
//!
//! Every node leaves exactly one value on the operand stack. Statement
//! lists pop all but their last value.

use std::rc::Rc;

use crate::ast::*;
use crate::compiler::irep::{DebugInfo, Irep, LineEntry, OpCode, PoolValue};
use crate::error::CodegenError;

/// Compiles a parsed program into its top-level irep.
pub fn compile_program(program: &Program, filename: Option<&str>) -> Result<Irep, CodegenError> {
    let mut scope = Scope::new(filename, Vec::new());
    scope.compile_body(&program.body, 1)?;
    scope.emit(OpCode::Return, -1);
    scope.finish(1)
}

/// An active enclosing loop.
struct LoopContext {
    start: usize,
    depth: u16,
    breaks: Vec<usize>,
}

/// Compilation state for one irep.
struct Scope<'f> {
    filename: Option<&'f str>,
    iseq: Vec<u8>,
    pool: Vec<PoolValue>,
    syms: Vec<String>,
    reps: Vec<Rc<Irep>>,
    locals: Vec<String>,
    lines: Vec<LineEntry>,
    loops: Vec<LoopContext>,
    depth: u16,
    max_depth: u16,
}

impl<'f> Scope<'f> {
    fn new(filename: Option<&'f str>, params: Vec<String>) -> Self {
        Self {
            filename,
            iseq: Vec::new(),
            pool: Vec::new(),
            syms: Vec::new(),
            reps: Vec::new(),
            locals: params,
            lines: Vec::new(),
            loops: Vec::new(),
            depth: 0,
            max_depth: 0,
        }
    }

    fn finish(self, line: u32) -> Result<Irep, CodegenError> {
        let nlocals = u16::try_from(self.locals.len())
            .map_err(|_| CodegenError::new(line, "too many local variables"))?;
        Ok(Irep {
            nlocals,
            nregs: self.max_depth,
            iseq: self.iseq,
            pool: self.pool,
            syms: self.syms,
            reps: self.reps,
            debug: Some(DebugInfo {
                filename: self.filename.map(str::to_string),
                lines: self.lines,
            }),
        })
    }

    // ========================================================================
    // Emission helpers
    // ========================================================================

    /// Emits an opcode and applies its stack effect.
    fn emit(&mut self, op: OpCode, effect: i32) {
        self.iseq.push(op as u8);
        self.adjust(effect);
    }

    fn emit_u8(&mut self, op: OpCode, operand: u8, effect: i32) {
        self.emit(op, effect);
        self.iseq.push(operand);
    }

    fn emit_u16(&mut self, op: OpCode, operand: u16, effect: i32) {
        self.emit(op, effect);
        self.iseq.extend_from_slice(&operand.to_be_bytes());
    }

    fn adjust(&mut self, effect: i32) {
        self.depth = (i32::from(self.depth) + effect).max(0) as u16;
        self.max_depth = self.max_depth.max(self.depth);
    }

    /// Emits a jump with a placeholder target and returns the patch offset.
    fn emit_jump(&mut self, op: OpCode, effect: i32) -> usize {
        self.emit_u16(op, 0xFFFF, effect);
        self.iseq.len() - 2
    }

    fn patch_jump(&mut self, at: usize, line: u32) -> Result<(), CodegenError> {
        let target = self.here(line)?;
        self.iseq[at..at + 2].copy_from_slice(&target.to_be_bytes());
        Ok(())
    }

    fn here(&self, line: u32) -> Result<u16, CodegenError> {
        u16::try_from(self.iseq.len()).map_err(|_| CodegenError::new(line, "iseq too long"))
    }

    fn mark_line(&mut self, line: u32) {
        if self.lines.last().is_some_and(|entry| entry.line == line) {
            return;
        }
        let pc = self.iseq.len() as u32;
        match self.lines.last_mut() {
            // nothing was emitted for the previous line
            Some(entry) if entry.pc == pc => entry.line = line,
            _ => self.lines.push(LineEntry { pc, line }),
        }
    }

    fn symbol(&mut self, name: &str, line: u32) -> Result<u16, CodegenError> {
        let index = match self.syms.iter().position(|s| s == name) {
            Some(index) => index,
            None => {
                self.syms.push(name.to_string());
                self.syms.len() - 1
            }
        };
        u16::try_from(index).map_err(|_| CodegenError::new(line, "too many symbols"))
    }

    fn constant(&mut self, value: PoolValue, line: u32) -> Result<u16, CodegenError> {
        let index = match self.pool.iter().position(|p| *p == value) {
            Some(index) => index,
            None => {
                self.pool.push(value);
                self.pool.len() - 1
            }
        };
        u16::try_from(index).map_err(|_| CodegenError::new(line, "too many pool entries"))
    }

    fn local(&mut self, name: &str, line: u32) -> Result<u8, CodegenError> {
        let index = match self.locals.iter().position(|l| l == name) {
            Some(index) => index,
            None => {
                self.locals.push(name.to_string());
                self.locals.len() - 1
            }
        };
        u8::try_from(index).map_err(|_| CodegenError::new(line, "too many local variables"))
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn compile_body(&mut self, body: &[Node], line: u32) -> Result<(), CodegenError> {
        if body.is_empty() {
            self.mark_line(line);
            self.emit(OpCode::LoadNil, 1);
            return Ok(());
        }
        for (i, node) in body.iter().enumerate() {
            if i > 0 {
                self.emit(OpCode::Pop, -1);
            }
            self.compile_node(node)?;
        }
        Ok(())
    }

    fn compile_node(&mut self, node: &Node) -> Result<(), CodegenError> {
        let line = node.line;
        self.mark_line(line);

        match &node.kind {
            NodeKind::Nil => self.emit(OpCode::LoadNil, 1),
            NodeKind::True => self.emit(OpCode::LoadTrue, 1),
            NodeKind::False => self.emit(OpCode::LoadFalse, 1),
            NodeKind::SelfRef => self.emit(OpCode::LoadSelf, 1),
            NodeKind::Integer(n) => self.load_integer(*n, line)?,
            NodeKind::Float(n) => {
                let index = self.constant(PoolValue::Float(*n), line)?;
                self.emit_u16(OpCode::LoadL, index, 1);
            }
            NodeKind::Str(s) => {
                let index = self.constant(PoolValue::Str(s.clone()), line)?;
                self.emit_u16(OpCode::String, index, 1);
            }
            NodeKind::Symbol(s) => {
                let index = self.symbol(s, line)?;
                self.emit_u16(OpCode::LoadSym, index, 1);
            }
            NodeKind::Array(items) => {
                let count = u8::try_from(items.len())
                    .map_err(|_| CodegenError::new(line, "too many array elements"))?;
                for item in items {
                    self.compile_node(item)?;
                }
                self.emit_u8(OpCode::Array, count, 1 - i32::from(count));
            }

            NodeKind::LocalGet(name) => {
                let slot = self.local(name, line)?;
                self.emit_u8(OpCode::GetLocal, slot, 1);
            }
            NodeKind::LocalSet(name, value) => {
                let slot = self.local(name, line)?;
                self.compile_node(value)?;
                self.emit_u8(OpCode::SetLocal, slot, 0);
            }
            NodeKind::GlobalGet(name) => {
                let index = self.symbol(name, line)?;
                self.emit_u16(OpCode::GetGlobal, index, 1);
            }
            NodeKind::GlobalSet(name, value) => {
                let index = self.symbol(name, line)?;
                self.compile_node(value)?;
                self.emit_u16(OpCode::SetGlobal, index, 0);
            }
            NodeKind::ConstGet(name) => {
                let index = self.symbol(name, line)?;
                self.emit_u16(OpCode::GetConst, index, 1);
            }
            NodeKind::ConstSet(name, value) => {
                let index = self.symbol(name, line)?;
                self.compile_node(value)?;
                self.emit_u16(OpCode::SetConst, index, 0);
            }

            NodeKind::Call {
                receiver,
                method,
                args,
            } => {
                let argc = u8::try_from(args.len())
                    .map_err(|_| CodegenError::new(line, "too many arguments"))?;
                match receiver {
                    Some(receiver) => self.compile_node(receiver)?,
                    None => self.emit(OpCode::LoadSelf, 1),
                }
                for arg in args {
                    self.compile_node(arg)?;
                }
                let index = self.symbol(method, line)?;
                self.mark_line(line);
                self.emit_u16(OpCode::Send, index, -i32::from(argc));
                self.iseq.push(argc);
            }
            NodeKind::Binary { op, lhs, rhs } => {
                self.compile_node(lhs)?;
                self.compile_node(rhs)?;
                self.mark_line(line);
                let opcode = match op {
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Sub => OpCode::Sub,
                    BinaryOp::Mul => OpCode::Mul,
                    BinaryOp::Div => OpCode::Div,
                    BinaryOp::Mod => OpCode::Mod,
                    BinaryOp::Pow => OpCode::Pow,
                    BinaryOp::Eq | BinaryOp::Ne => OpCode::Eq,
                    BinaryOp::Lt => OpCode::Lt,
                    BinaryOp::Le => OpCode::Le,
                    BinaryOp::Gt => OpCode::Gt,
                    BinaryOp::Ge => OpCode::Ge,
                };
                self.emit(opcode, -1);
                if *op == BinaryOp::Ne {
                    self.emit(OpCode::Not, 0);
                }
            }
            NodeKind::Negate(operand) => match &operand.kind {
                NodeKind::Integer(n) => match n.checked_neg() {
                    Some(negated) => self.load_integer(negated, line)?,
                    None => {
                        let index = self.constant(PoolValue::Float(-(*n as f64)), line)?;
                        self.emit_u16(OpCode::LoadL, index, 1);
                    }
                },
                NodeKind::Float(n) => {
                    let index = self.constant(PoolValue::Float(-n), line)?;
                    self.emit_u16(OpCode::LoadL, index, 1);
                }
                _ => {
                    self.compile_node(operand)?;
                    self.emit(OpCode::Neg, 0);
                }
            },
            NodeKind::Not(operand) => {
                self.compile_node(operand)?;
                self.emit(OpCode::Not, 0);
            }
            NodeKind::And(lhs, rhs) => self.compile_short_circuit(OpCode::JmpNot, lhs, rhs, line)?,
            NodeKind::Or(lhs, rhs) => self.compile_short_circuit(OpCode::JmpIf, lhs, rhs, line)?,

            NodeKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.compile_node(cond)?;
                let to_else = self.emit_jump(OpCode::JmpNot, -1);
                self.compile_body(then_body, line)?;
                let to_end = self.emit_jump(OpCode::Jmp, 0);
                self.adjust(-1);
                self.patch_jump(to_else, line)?;
                match else_body {
                    Some(body) => self.compile_body(body, line)?,
                    None => self.emit(OpCode::LoadNil, 1),
                }
                self.patch_jump(to_end, line)?;
            }
            NodeKind::While { cond, body, until } => {
                let start = self.iseq.len();
                self.compile_node(cond)?;
                let exit_op = if *until { OpCode::JmpIf } else { OpCode::JmpNot };
                let to_exit = self.emit_jump(exit_op, -1);

                self.loops.push(LoopContext {
                    start,
                    depth: self.depth,
                    breaks: Vec::new(),
                });
                let compiled = self.compile_body(body, line);
                let context = self.loops.pop();
                compiled?;

                self.emit(OpCode::Pop, -1);
                let start = u16::try_from(start)
                    .map_err(|_| CodegenError::new(line, "iseq too long"))?;
                self.emit_u16(OpCode::Jmp, start, 0);
                self.patch_jump(to_exit, line)?;
                if let Some(context) = context {
                    for at in context.breaks {
                        self.patch_jump(at, line)?;
                    }
                }
                self.emit(OpCode::LoadNil, 1);
            }
            NodeKind::Break => {
                let Some(context) = self.loops.last() else {
                    return Err(CodegenError::new(line, "unexpected break"));
                };
                let extra = self.depth.saturating_sub(context.depth);
                let resume = self.depth;
                for _ in 0..extra {
                    self.emit(OpCode::Pop, -1);
                }
                let at = self.emit_jump(OpCode::Jmp, 0);
                if let Some(context) = self.loops.last_mut() {
                    context.breaks.push(at);
                }
                self.depth = resume;
                self.adjust(1);
            }
            NodeKind::Next => {
                let Some(context) = self.loops.last() else {
                    return Err(CodegenError::new(line, "unexpected next"));
                };
                let extra = self.depth.saturating_sub(context.depth);
                let start = context.start;
                let resume = self.depth;
                for _ in 0..extra {
                    self.emit(OpCode::Pop, -1);
                }
                let start = u16::try_from(start)
                    .map_err(|_| CodegenError::new(line, "iseq too long"))?;
                self.emit_u16(OpCode::Jmp, start, 0);
                self.depth = resume;
                self.adjust(1);
            }
            NodeKind::Return(value) => {
                match value {
                    Some(value) => self.compile_node(value)?,
                    None => self.emit(OpCode::LoadNil, 1),
                }
                self.emit(OpCode::Return, -1);
                self.adjust(1);
            }
            NodeKind::Def { name, params, body } => {
                let arity = u8::try_from(params.len())
                    .map_err(|_| CodegenError::new(line, "too many parameters"))?;
                let mut child = Scope::new(self.filename, params.clone());
                child.mark_line(line);
                child.emit_u8(OpCode::Enter, arity, 0);
                child.compile_body(body, line)?;
                child.emit(OpCode::Return, -1);
                let irep = child.finish(line)?;

                let rep = u16::try_from(self.reps.len())
                    .map_err(|_| CodegenError::new(line, "too many nested ireps"))?;
                self.reps.push(Rc::new(irep));
                let index = self.symbol(name, line)?;
                self.emit_u16(OpCode::Def, index, 1);
                self.iseq.extend_from_slice(&rep.to_be_bytes());
            }
            NodeKind::Block(body) => self.compile_body(body, line)?,
        }

        Ok(())
    }

    fn load_integer(&mut self, n: i64, line: u32) -> Result<(), CodegenError> {
        match i8::try_from(n) {
            Ok(small) => self.emit_u8(OpCode::LoadI8, small as u8, 1),
            Err(_) => {
                let index = self.constant(PoolValue::Int(n), line)?;
                self.emit_u16(OpCode::LoadL, index, 1);
            }
        }
        Ok(())
    }

    fn compile_short_circuit(
        &mut self,
        jump: OpCode,
        lhs: &Node,
        rhs: &Node,
        line: u32,
    ) -> Result<(), CodegenError> {
        self.compile_node(lhs)?;
        self.emit(OpCode::Dup, 1);
        let to_end = self.emit_jump(jump, -1);
        self.emit(OpCode::Pop, -1);
        self.compile_node(rhs)?;
        self.patch_jump(to_end, line)
    }
}

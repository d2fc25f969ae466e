// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Instruction sequence definitions.
//!
//! An [`Irep`] is the body of one callable unit: a byte-encoded instruction
//! sequence, its constant pool, the symbols it references and nested ireps
//! for methods defined inside it. Operands are big-endian.

use std::rc::Rc;

/// A compiled instruction sequence with its tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Irep {
    /// Number of local variable slots (parameters first)
    pub nlocals: u16,
    /// Maximum operand stack depth
    pub nregs: u16,
    /// Encoded instructions
    pub iseq: Vec<u8>,
    /// Constant pool
    pub pool: Vec<PoolValue>,
    /// Referenced symbol names
    pub syms: Vec<String>,
    /// Nested ireps (method bodies)
    pub reps: Vec<Rc<Irep>>,
    /// Source positions, absent when loaded from a stripped binary
    pub debug: Option<DebugInfo>,
}

impl Irep {
    /// Returns the source line for the instruction at `pc`, if known.
    pub fn line_at(&self, pc: usize) -> Option<u32> {
        let debug = self.debug.as_ref()?;
        debug
            .lines
            .iter()
            .take_while(|entry| entry.pc as usize <= pc)
            .last()
            .map(|entry| entry.line)
    }

    /// Returns the filename recorded in the debug info.
    pub fn filename(&self) -> Option<&str> {
        self.debug.as_ref()?.filename.as_deref()
    }

    /// Returns a copy of this irep tree with all debug info removed.
    pub fn stripped(&self) -> Irep {
        Irep {
            debug: None,
            reps: self.reps.iter().map(|rep| Rc::new(rep.stripped())).collect(),
            ..self.clone()
        }
    }

    /// Decodes the instruction at `pc`.
    pub fn decode(&self, pc: usize) -> Option<Instruction> {
        Instruction::decode(&self.iseq, pc)
    }
}

/// A constant pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolValue {
    /// String literal contents
    Str(String),
    /// Integer that does not fit an `i8` operand
    Int(i64),
    /// Float literal
    Float(f64),
}

/// Debug information for one irep.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DebugInfo {
    /// Source filename given at compile time
    pub filename: Option<String>,
    /// Line table, sorted by `pc`
    pub lines: Vec<LineEntry>,
}

/// Maps an instruction offset to the line it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEntry {
    /// Offset of the first instruction of the line
    pub pc: u32,
    /// 1-based line
    pub line: u32,
}

/// Operation codes for the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// No operation
    Nop = 0,
    /// Push nil
    LoadNil,
    /// Push true
    LoadTrue,
    /// Push false
    LoadFalse,
    /// Push self
    LoadSelf,
    /// Push a small integer (i8 operand)
    LoadI8,
    /// Push a pool integer or float (u16 pool index)
    LoadL,
    /// Push a symbol (u16 symbol index)
    LoadSym,
    /// Push a new string from the pool (u16 pool index)
    String,
    /// Push a local (u8 slot)
    GetLocal,
    /// Store the top of stack into a local without popping (u8 slot)
    SetLocal,
    /// Push a global (u16 symbol index)
    GetGlobal,
    /// Store into a global without popping (u16 symbol index)
    SetGlobal,
    /// Push a constant (u16 symbol index)
    GetConst,
    /// Store into a constant without popping (u16 symbol index)
    SetConst,
    /// Pop the top value
    Pop,
    /// Duplicate the top value
    Dup,
    /// Add top two values
    Add,
    /// Subtract
    Sub,
    /// Multiply
    Mul,
    /// Divide
    Div,
    /// Modulo
    Mod,
    /// Exponentiation
    Pow,
    /// Equality
    Eq,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Logical NOT
    Not,
    /// Unary minus
    Neg,
    /// Unconditional jump (u16 absolute target)
    Jmp,
    /// Pop, jump if truthy (u16 absolute target)
    JmpIf,
    /// Pop, jump if falsy (u16 absolute target)
    JmpNot,
    /// Call a method (u16 symbol index, u8 argument count)
    Send,
    /// Collect values into an array (u8 count)
    Array,
    /// Define a method (u16 symbol index, u16 child irep index)
    Def,
    /// Return the top of stack from the current frame
    Return,
    /// Check the argument count on method entry (u8 required count)
    Enter,
}

impl OpCode {
    const ALL: [OpCode; 38] = [
        OpCode::Nop,
        OpCode::LoadNil,
        OpCode::LoadTrue,
        OpCode::LoadFalse,
        OpCode::LoadSelf,
        OpCode::LoadI8,
        OpCode::LoadL,
        OpCode::LoadSym,
        OpCode::String,
        OpCode::GetLocal,
        OpCode::SetLocal,
        OpCode::GetGlobal,
        OpCode::SetGlobal,
        OpCode::GetConst,
        OpCode::SetConst,
        OpCode::Pop,
        OpCode::Dup,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::Pow,
        OpCode::Eq,
        OpCode::Lt,
        OpCode::Le,
        OpCode::Gt,
        OpCode::Ge,
        OpCode::Not,
        OpCode::Neg,
        OpCode::Jmp,
        OpCode::JmpIf,
        OpCode::JmpNot,
        OpCode::Send,
        OpCode::Array,
        OpCode::Def,
        OpCode::Return,
        OpCode::Enter,
    ];

    /// Decodes an opcode byte.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        Self::ALL.get(byte as usize).copied()
    }

    /// Number of operand bytes following the opcode.
    pub fn operand_len(self) -> usize {
        match self {
            OpCode::LoadI8
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::Array
            | OpCode::Enter => 1,
            OpCode::LoadL
            | OpCode::LoadSym
            | OpCode::String
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::GetConst
            | OpCode::SetConst
            | OpCode::Jmp
            | OpCode::JmpIf
            | OpCode::JmpNot => 2,
            OpCode::Send => 3,
            OpCode::Def => 4,
            _ => 0,
        }
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The operation
    pub opcode: OpCode,
    /// First operand (zero when absent)
    pub a: u16,
    /// Second operand (zero when absent)
    pub b: u16,
    /// Offset of the following instruction
    pub next: usize,
}

impl Instruction {
    /// Decodes the instruction at `pc` in `iseq`.
    pub fn decode(iseq: &[u8], pc: usize) -> Option<Instruction> {
        let opcode = OpCode::from_u8(*iseq.get(pc)?)?;
        let len = opcode.operand_len();
        let operands = iseq.get(pc + 1..pc + 1 + len)?;
        let u16_at = |i: usize| u16::from_be_bytes([operands[i], operands[i + 1]]);

        let (a, b) = match len {
            0 => (0, 0),
            1 => (operands[0] as u16, 0),
            2 => (u16_at(0), 0),
            3 => (u16_at(0), operands[2] as u16),
            _ => (u16_at(0), u16_at(2)),
        };

        Some(Instruction {
            opcode,
            a,
            b,
            next: pc + 1 + len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip_through_byte() {
        for op in OpCode::ALL {
            assert_eq!(OpCode::from_u8(op as u8), Some(op));
        }
        assert_eq!(OpCode::from_u8(OpCode::ALL.len() as u8), None);
    }

    #[test]
    fn test_decode_send() {
        let iseq = [OpCode::Send as u8, 0x01, 0x02, 3, OpCode::Return as u8];
        let insn = Instruction::decode(&iseq, 0).unwrap();
        assert_eq!(insn.opcode, OpCode::Send);
        assert_eq!(insn.a, 0x0102);
        assert_eq!(insn.b, 3);
        assert_eq!(insn.next, 4);
        assert_eq!(Instruction::decode(&iseq, 4).unwrap().opcode, OpCode::Return);
    }

    #[test]
    fn test_decode_truncated_operand() {
        let iseq = [OpCode::Jmp as u8, 0x00];
        assert!(Instruction::decode(&iseq, 0).is_none());
    }

    #[test]
    fn test_line_at() {
        let irep = Irep {
            debug: Some(DebugInfo {
                filename: Some("a.rb".into()),
                lines: vec![LineEntry { pc: 0, line: 1 }, LineEntry { pc: 5, line: 3 }],
            }),
            ..Irep::default()
        };
        assert_eq!(irep.line_at(0), Some(1));
        assert_eq!(irep.line_at(4), Some(1));
        assert_eq!(irep.line_at(9), Some(3));
        assert_eq!(irep.filename(), Some("a.rb"));
        assert_eq!(irep.stripped().line_at(0), None);
    }
}

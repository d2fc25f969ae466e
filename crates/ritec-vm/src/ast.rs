// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Abstract Syntax Tree definitions.
//!
//! Everything is an expression; statement lists evaluate to their last value.

/// A complete program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Top-level statements
    pub body: Vec<Node>,
}

/// An AST node with the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// What the node is
    pub kind: NodeKind,
    /// 1-based source line
    pub line: u32,
}

impl Node {
    /// Creates a new node.
    pub fn new(kind: NodeKind, line: u32) -> Self {
        Self { kind, line }
    }

    /// Boxes this node.
    pub fn boxed(self) -> Box<Node> {
        Box::new(self)
    }
}

/// Node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// `nil`
    Nil,
    /// `true`
    True,
    /// `false`
    False,
    /// `self`
    SelfRef,
    /// Integer literal
    Integer(i64),
    /// Float literal
    Float(f64),
    /// String literal
    Str(String),
    /// Symbol literal
    Symbol(String),
    /// Array literal
    Array(Vec<Node>),

    /// Local variable read
    LocalGet(String),
    /// Local variable assignment
    LocalSet(String, Box<Node>),
    /// Global variable read
    GlobalGet(String),
    /// Global variable assignment
    GlobalSet(String, Box<Node>),
    /// Constant read
    ConstGet(String),
    /// Constant assignment
    ConstSet(String, Box<Node>),

    /// Method call; `receiver` is `None` for calls on `self`
    Call {
        /// Explicit receiver
        receiver: Option<Box<Node>>,
        /// Method name
        method: String,
        /// Arguments
        args: Vec<Node>,
    },
    /// Binary operator with a dedicated instruction
    Binary {
        /// The operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Node>,
        /// Right operand
        rhs: Box<Node>,
    },
    /// Unary minus
    Negate(Box<Node>),
    /// `!x` / `not x`
    Not(Box<Node>),
    /// `a && b` / `a and b`
    And(Box<Node>, Box<Node>),
    /// `a || b` / `a or b`
    Or(Box<Node>, Box<Node>),

    /// `if` / `unless` / modifier forms
    If {
        /// Condition
        cond: Box<Node>,
        /// Taken when the condition is truthy
        then_body: Vec<Node>,
        /// Taken otherwise
        else_body: Option<Vec<Node>>,
    },
    /// `while` / `until`
    While {
        /// Loop condition
        cond: Box<Node>,
        /// Loop body
        body: Vec<Node>,
        /// Loop while the condition is falsy
        until: bool,
    },
    /// `break`
    Break,
    /// `next`
    Next,
    /// `return` with optional value
    Return(Option<Box<Node>>),
    /// Method definition
    Def {
        /// Method name
        name: String,
        /// Parameter names
        params: Vec<String>,
        /// Method body
        body: Vec<Node>,
    },
    /// `( ... )` or `begin ... end`
    Block(Vec<Node>),
}

/// Binary operators compiled to dedicated instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

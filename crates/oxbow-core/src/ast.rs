// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Abstract syntax tree for Oxbow programs.
//!
//! The variant set is closed: a program is a sequence of class
//! declarations, each holding fields and methods, whose bodies are built
//! from the statement and expression forms below. Declaration and statement
//! nodes record the 1-based source line of their leading token; exact byte
//! spans are not carried through the tree (span recovery for optimiser
//! output is reconstructed from the token stream, see `source_map`).
//!
//! The parser exclusively owns node construction. The optimiser never
//! mutates a tree in place; it builds a fresh one, so the original and
//! optimised ASTs are independent structures.

use ecow::EcoString;
use serde::Serialize;

/// A whole compilation unit: an ordered sequence of class declarations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    /// Class declarations in source order.
    pub classes: Vec<ClassDecl>,
}

/// `class Name [extends Super] is <members> end`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDecl {
    pub name: EcoString,
    /// Superclass name, resolved later by semantic analysis.
    pub superclass: Option<EcoString>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    /// Line of the `class` keyword.
    pub line: u32,
}

/// A field declaration: `var name` inside a class body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDecl {
    pub name: EcoString,
    pub line: u32,
}

/// `method name(params) => expr` or `method name(params) [is] ... end`.
///
/// The short form desugars during parsing into a single `return` statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDecl {
    pub name: EcoString,
    pub params: Vec<EcoString>,
    pub body: Vec<Stmt>,
    /// Line of the `method` keyword.
    pub line: u32,
}

/// A statement. Every variant records the line of its leading token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    /// `var name [:= init]`
    VarDecl {
        name: EcoString,
        init: Option<Expr>,
        line: u32,
    },
    /// `target := value` where the target is an identifier, field access
    /// or index access.
    Assign { target: Expr, value: Expr, line: u32 },
    /// `if c then ... elif c2 then ... else ... end`
    If {
        /// The `if` arm followed by any `elif` arms, in order.
        arms: Vec<IfArm>,
        else_body: Option<Vec<Stmt>>,
        line: u32,
    },
    /// `while cond loop ... end`
    While {
        cond: Expr,
        body: Vec<Stmt>,
        line: u32,
    },
    /// `loop ... end` (unconditional; exits via `break`/`return`).
    Loop { body: Vec<Stmt>, line: u32 },
    /// `return [expr]`
    Return { value: Option<Expr>, line: u32 },
    /// `break`
    Break { line: u32 },
    /// An expression evaluated for its effect.
    Expr { expr: Expr, line: u32 },
}

impl Stmt {
    /// The source line of the statement's leading token.
    #[must_use]
    pub const fn line(&self) -> u32 {
        match self {
            Self::VarDecl { line, .. }
            | Self::Assign { line, .. }
            | Self::If { line, .. }
            | Self::While { line, .. }
            | Self::Loop { line, .. }
            | Self::Return { line, .. }
            | Self::Break { line }
            | Self::Expr { line, .. } => *line,
        }
    }
}

/// One `if`/`elif` arm: a condition and its body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfArm {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Literal(Literal),
    Identifier(EcoString),
    This,
    /// `new Class(args)`
    New { class: EcoString, args: Vec<Expr> },
    /// `receiver.method(args)`; `receiver` is `None` for implicit-this
    /// calls written as `method(args)`.
    Call {
        receiver: Option<Box<Expr>>,
        method: EcoString,
        args: Vec<Expr>,
    },
    /// `receiver.field`
    FieldAccess {
        receiver: Box<Expr>,
        field: EcoString,
    },
    /// `receiver[index]`
    IndexAccess {
        receiver: Box<Expr>,
        index: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
}

impl Expr {
    /// Returns `true` for literal expressions.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Returns `true` when evaluating the expression can have no externally
    /// observable effect: no calls, no construction, no index access (which
    /// may trap on bad indices).
    #[must_use]
    pub fn is_pure(&self) -> bool {
        match self {
            Self::Literal(_) | Self::Identifier(_) | Self::This => true,
            Self::FieldAccess { receiver, .. } => receiver.is_pure(),
            Self::Binary { lhs, rhs, .. } => lhs.is_pure() && rhs.is_pure(),
            Self::Unary { operand, .. } => operand.is_pure(),
            Self::New { .. } | Self::Call { .. } | Self::IndexAccess { .. } => false,
        }
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Str(EcoString),
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    /// The surface syntax of the operator.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// Returns `true` for operators whose result is a boolean.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::Eq | Self::Ne
        )
    }
}

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    /// Arithmetic negation, `-x`.
    Neg,
    /// Boolean negation, `not x`.
    Not,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stmt_line_accessor() {
        let stmt = Stmt::Break { line: 7 };
        assert_eq!(stmt.line(), 7);
        let stmt = Stmt::Return {
            value: None,
            line: 9,
        };
        assert_eq!(stmt.line(), 9);
    }

    #[test]
    fn purity_rejects_calls_and_construction() {
        let call = Expr::Call {
            receiver: None,
            method: "foo".into(),
            args: vec![],
        };
        assert!(!call.is_pure());

        let arith = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expr::Literal(Literal::Integer(1))),
            rhs: Box::new(Expr::Identifier("x".into())),
        };
        assert!(arith.is_pure());

        let with_call = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(call),
            rhs: Box::new(Expr::Literal(Literal::Integer(1))),
        };
        assert!(!with_call.is_pure());
    }
}

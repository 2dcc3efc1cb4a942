// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Constant folding of literal arithmetic, comparison and boolean
//! expressions.
//!
//! Folding is bottom-up, so nested literal expressions collapse fully in
//! one sweep. Integer arithmetic folds only when it cannot overflow or trap
//! (checked ops, no division by zero); mixed integer/real operands promote
//! to real, matching the runtime's promotion rule.

use ecow::{eco_format, EcoString};

use crate::ast::{BinaryOp, Expr, Literal, Program, Stmt, UnaryOp};
use crate::unparse::unparse_expr;

use super::{Pass, PassContext, StepKind};

pub(crate) struct ConstantFold;

impl Pass for ConstantFold {
    fn name(&self) -> &'static str {
        "constant-fold"
    }

    fn run(&self, program: &mut Program, cx: &mut PassContext) -> bool {
        let mut changed = false;
        for class in &mut program.classes {
            for method in &mut class.methods {
                for stmt in &mut method.body {
                    changed |= fold_stmt(stmt, cx);
                }
            }
        }
        changed
    }
}

fn fold_stmt(stmt: &mut Stmt, cx: &mut PassContext) -> bool {
    let line = stmt.line();
    match stmt {
        Stmt::VarDecl { init, .. } => init
            .as_mut()
            .is_some_and(|init| fold_expr(init, line, cx)),
        Stmt::Assign { target, value, .. } => {
            // Index expressions inside the target can fold too.
            let mut changed = fold_expr(target, line, cx);
            changed |= fold_expr(value, line, cx);
            changed
        }
        Stmt::If { arms, else_body, .. } => {
            let mut changed = false;
            for arm in arms {
                changed |= fold_expr(&mut arm.cond, line, cx);
                for stmt in &mut arm.body {
                    changed |= fold_stmt(stmt, cx);
                }
            }
            if let Some(body) = else_body {
                for stmt in body {
                    changed |= fold_stmt(stmt, cx);
                }
            }
            changed
        }
        Stmt::While { cond, body, .. } => {
            let mut changed = fold_expr(cond, line, cx);
            for stmt in body {
                changed |= fold_stmt(stmt, cx);
            }
            changed
        }
        Stmt::Loop { body, .. } => {
            let mut changed = false;
            for stmt in body {
                changed |= fold_stmt(stmt, cx);
            }
            changed
        }
        Stmt::Return { value, .. } => value
            .as_mut()
            .is_some_and(|value| fold_expr(value, line, cx)),
        Stmt::Break { .. } => false,
        Stmt::Expr { expr, .. } => fold_expr(expr, line, cx),
    }
}

fn fold_expr(expr: &mut Expr, line: u32, cx: &mut PassContext) -> bool {
    let mut changed = match expr {
        Expr::Literal(_) | Expr::Identifier(_) | Expr::This => false,
        Expr::New { args, .. } => {
            let mut changed = false;
            for arg in args {
                changed |= fold_expr(arg, line, cx);
            }
            changed
        }
        Expr::Call { receiver, args, .. } => {
            let mut changed = receiver
                .as_deref_mut()
                .is_some_and(|receiver| fold_expr(receiver, line, cx));
            for arg in args {
                changed |= fold_expr(arg, line, cx);
            }
            changed
        }
        Expr::FieldAccess { receiver, .. } => fold_expr(receiver, line, cx),
        Expr::IndexAccess { receiver, index } => {
            let mut changed = fold_expr(receiver, line, cx);
            changed |= fold_expr(index, line, cx);
            changed
        }
        Expr::Binary { lhs, rhs, .. } => {
            let mut changed = fold_expr(lhs, line, cx);
            changed |= fold_expr(rhs, line, cx);
            changed
        }
        Expr::Unary { operand, .. } => fold_expr(operand, line, cx),
    };

    if let Some(folded) = try_fold(expr) {
        let before = EcoString::from(unparse_expr(expr));
        let replacement = Expr::Literal(folded);
        let after = EcoString::from(unparse_expr(&replacement));
        cx.record(
            StepKind::ConstantFold,
            eco_format!("folded `{before}` to `{after}`"),
            line,
            Some(before),
            Some(after),
        );
        *expr = replacement;
        changed = true;
    }
    changed
}

/// Evaluates the expression when both operands are literals and evaluation
/// cannot trap or overflow.
fn try_fold(expr: &Expr) -> Option<Literal> {
    match expr {
        Expr::Binary { op, lhs, rhs } => {
            let (Expr::Literal(lhs), Expr::Literal(rhs)) = (lhs.as_ref(), rhs.as_ref()) else {
                return None;
            };
            eval_binary(*op, lhs, rhs)
        }
        Expr::Unary { op, operand } => {
            let Expr::Literal(operand) = operand.as_ref() else {
                return None;
            };
            match (op, operand) {
                (UnaryOp::Neg, Literal::Integer(v)) => v.checked_neg().map(Literal::Integer),
                (UnaryOp::Neg, Literal::Real(v)) => Some(Literal::Real(-v)),
                (UnaryOp::Not, Literal::Boolean(v)) => Some(Literal::Boolean(!v)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn eval_binary(op: BinaryOp, lhs: &Literal, rhs: &Literal) -> Option<Literal> {
    use Literal::{Boolean, Integer, Real, Str};
    match (lhs, rhs) {
        (Integer(a), Integer(b)) => match op {
            BinaryOp::Add => a.checked_add(*b).map(Integer),
            BinaryOp::Sub => a.checked_sub(*b).map(Integer),
            BinaryOp::Mul => a.checked_mul(*b).map(Integer),
            BinaryOp::Div => a.checked_div(*b).map(Integer),
            BinaryOp::Mod => a.checked_rem(*b).map(Integer),
            BinaryOp::Lt => Some(Boolean(a < b)),
            BinaryOp::Le => Some(Boolean(a <= b)),
            BinaryOp::Gt => Some(Boolean(a > b)),
            BinaryOp::Ge => Some(Boolean(a >= b)),
            BinaryOp::Eq => Some(Boolean(a == b)),
            BinaryOp::Ne => Some(Boolean(a != b)),
            BinaryOp::And | BinaryOp::Or => None,
        },
        (Integer(_) | Real(_), Integer(_) | Real(_)) => {
            let a = as_real(lhs)?;
            let b = as_real(rhs)?;
            match op {
                BinaryOp::Add => Some(Real(a + b)),
                BinaryOp::Sub => Some(Real(a - b)),
                BinaryOp::Mul => Some(Real(a * b)),
                BinaryOp::Div => Some(Real(a / b)),
                BinaryOp::Mod => Some(Real(a % b)),
                BinaryOp::Lt => Some(Boolean(a < b)),
                BinaryOp::Le => Some(Boolean(a <= b)),
                BinaryOp::Gt => Some(Boolean(a > b)),
                BinaryOp::Ge => Some(Boolean(a >= b)),
                BinaryOp::Eq => Some(Boolean(a == b)),
                BinaryOp::Ne => Some(Boolean(a != b)),
                BinaryOp::And | BinaryOp::Or => None,
            }
        }
        (Boolean(a), Boolean(b)) => match op {
            BinaryOp::And => Some(Boolean(*a && *b)),
            BinaryOp::Or => Some(Boolean(*a || *b)),
            BinaryOp::Eq => Some(Boolean(a == b)),
            BinaryOp::Ne => Some(Boolean(a != b)),
            _ => None,
        },
        (Str(a), Str(b)) => match op {
            BinaryOp::Add => Some(Str(eco_format!("{a}{b}"))),
            BinaryOp::Eq => Some(Boolean(a == b)),
            BinaryOp::Ne => Some(Boolean(a != b)),
            _ => None,
        },
        _ => None,
    }
}

fn as_real(literal: &Literal) -> Option<f64> {
    match literal {
        Literal::Integer(v) => Some(*v as f64),
        Literal::Real(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::{lex, parse};
    use pretty_assertions::assert_eq;

    fn fold_method_body(source: &str) -> (Program, PassContext) {
        let mut program = parse(lex(source).expect("lexes")).expect("parses");
        let mut cx = PassContext::default();
        ConstantFold.run(&mut program, &mut cx);
        (program, cx)
    }

    fn first_return(program: &Program) -> &Expr {
        match &program.classes[0].methods[0].body[0] {
            Stmt::Return { value: Some(v), .. } => v,
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn nested_arithmetic_folds_in_one_sweep() {
        let (program, cx) = fold_method_body("class A is\nmethod m() => 1 + 2 * 3\nend\n");
        assert_eq!(first_return(&program), &Expr::Literal(Literal::Integer(7)));
        assert_eq!(cx.steps.len(), 2);
    }

    #[test]
    fn mixed_operands_promote_to_real() {
        let (program, _) = fold_method_body("class A is\nmethod m() => 1 + 0.5\nend\n");
        assert_eq!(first_return(&program), &Expr::Literal(Literal::Real(1.5)));
    }

    #[test]
    fn division_by_zero_does_not_fold() {
        let (program, cx) = fold_method_body("class A is\nmethod m() => 1 / 0\nend\n");
        assert!(matches!(first_return(&program), Expr::Binary { .. }));
        assert!(cx.steps.is_empty());
    }

    #[test]
    fn overflow_does_not_fold() {
        let (_, cx) =
            fold_method_body("class A is\nmethod m() => 9223372036854775807 + 1\nend\n");
        assert!(cx.steps.is_empty());
    }

    #[test]
    fn booleans_and_strings_fold() {
        let (program, _) = fold_method_body("class A is\nmethod m() => true and not false\nend\n");
        assert_eq!(
            first_return(&program),
            &Expr::Literal(Literal::Boolean(true))
        );

        let (program, _) =
            fold_method_body("class A is\nmethod m() => \"ab\" + \"cd\"\nend\n");
        assert_eq!(
            first_return(&program),
            &Expr::Literal(Literal::Str("abcd".into()))
        );
    }

    #[test]
    fn comparisons_fold_to_booleans() {
        let (program, _) = fold_method_body("class A is\nmethod m() => 3 < 4\nend\n");
        assert_eq!(
            first_return(&program),
            &Expr::Literal(Literal::Boolean(true))
        );
    }

    #[test]
    fn non_literal_operands_are_left_alone() {
        let (program, cx) = fold_method_body("class A is\nmethod m(x) => x + 1\nend\n");
        assert!(matches!(first_return(&program), Expr::Binary { .. }));
        assert!(cx.steps.is_empty());
    }
}

// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Control-flow passes: `if` simplification, `while` elimination,
//! unreachable-code elimination and unused-variable removal.
//!
//! These run after constant folding, so conditions that fold to a boolean
//! literal arrive here already folded. Unused-variable removal refuses to
//! fire when the initializer may have an observable effect (a call, `new`,
//! or index access); the binding stays and so does the effect.

use ecow::{eco_format, EcoString};

use crate::ast::{Expr, Literal, Program, Stmt};
use crate::unparse::unparse_stmt;

use super::{Pass, PassContext, StepKind};

pub(crate) struct IfSimplify;
pub(crate) struct WhileEliminate;
pub(crate) struct UnreachableElimination;
pub(crate) struct RemoveUnusedVar;

/// Runs `rewrite` over every statement block of the program.
fn for_each_block(
    program: &mut Program,
    cx: &mut PassContext,
    rewrite: &impl Fn(&mut Vec<Stmt>, &mut PassContext) -> bool,
) -> bool {
    let mut changed = false;
    for class in &mut program.classes {
        for method in &mut class.methods {
            changed |= rewrite_blocks(&mut method.body, cx, rewrite);
        }
    }
    changed
}

fn rewrite_blocks(
    stmts: &mut Vec<Stmt>,
    cx: &mut PassContext,
    rewrite: &impl Fn(&mut Vec<Stmt>, &mut PassContext) -> bool,
) -> bool {
    let mut changed = false;
    for stmt in stmts.iter_mut() {
        match stmt {
            Stmt::If { arms, else_body, .. } => {
                for arm in arms {
                    changed |= rewrite_blocks(&mut arm.body, cx, rewrite);
                }
                if let Some(body) = else_body {
                    changed |= rewrite_blocks(body, cx, rewrite);
                }
            }
            Stmt::While { body, .. } | Stmt::Loop { body, .. } => {
                changed |= rewrite_blocks(body, cx, rewrite);
            }
            _ => {}
        }
    }
    changed | rewrite(stmts, cx)
}

fn literal_bool(expr: &Expr) -> Option<bool> {
    match expr {
        Expr::Literal(Literal::Boolean(value)) => Some(*value),
        _ => None,
    }
}

fn snippet(stmts: &[Stmt]) -> Option<EcoString> {
    if stmts.is_empty() {
        return None;
    }
    let joined = stmts.iter().map(|s| unparse_stmt(s)).collect::<Vec<_>>().join("\n");
    Some(EcoString::from(joined))
}

impl Pass for IfSimplify {
    fn name(&self) -> &'static str {
        "if-simplify"
    }

    fn run(&self, program: &mut Program, cx: &mut PassContext) -> bool {
        for_each_block(program, cx, &|stmts, cx| {
            let mut changed = false;
            let mut rebuilt = Vec::with_capacity(stmts.len());
            for stmt in stmts.drain(..) {
                match simplify_if(stmt) {
                    Simplified::Replaced { original, replacement } => {
                        let message = match snippet(&replacement) {
                            Some(_) => EcoString::from("simplified `if` with a constant condition"),
                            None => EcoString::from("removed `if` with no taken branch"),
                        };
                        cx.record(
                            StepKind::IfSimplify,
                            message,
                            original.line(),
                            Some(EcoString::from(unparse_stmt(&original))),
                            snippet(&replacement),
                        );
                        rebuilt.extend(replacement);
                        changed = true;
                    }
                    Simplified::Kept(stmt) => rebuilt.push(stmt),
                }
            }
            *stmts = rebuilt;
            changed
        })
    }
}

enum Simplified {
    Kept(Stmt),
    Replaced {
        original: Stmt,
        replacement: Vec<Stmt>,
    },
}

fn simplify_if(stmt: Stmt) -> Simplified {
    let Stmt::If { arms, else_body, line } = stmt else {
        return Simplified::Kept(stmt);
    };
    let original = Stmt::If {
        arms: arms.clone(),
        else_body: else_body.clone(),
        line,
    };

    let mut kept_arms = Vec::with_capacity(arms.len());
    let mut kept_else = else_body;
    let mut changed = false;
    for arm in arms {
        match literal_bool(&arm.cond) {
            Some(false) => changed = true,
            Some(true) => {
                // Everything after a constant-true arm is dead.
                kept_else = Some(arm.body);
                changed = true;
                break;
            }
            None => kept_arms.push(arm),
        }
    }

    if !changed {
        return Simplified::Kept(original);
    }
    let replacement = if kept_arms.is_empty() {
        kept_else.unwrap_or_default()
    } else {
        vec![Stmt::If {
            arms: kept_arms,
            else_body: kept_else,
            line,
        }]
    };
    Simplified::Replaced { original, replacement }
}

impl Pass for WhileEliminate {
    fn name(&self) -> &'static str {
        "while-eliminate"
    }

    fn run(&self, program: &mut Program, cx: &mut PassContext) -> bool {
        for_each_block(program, cx, &|stmts, cx| {
            let mut changed = false;
            stmts.retain(|stmt| {
                let Stmt::While { cond, line, .. } = stmt else { return true };
                if literal_bool(cond) != Some(false) {
                    return true;
                }
                cx.record(
                    StepKind::WhileEliminate,
                    EcoString::from("removed `while` loop with a constant-false condition"),
                    *line,
                    Some(EcoString::from(unparse_stmt(stmt))),
                    None,
                );
                changed = true;
                false
            });
            changed
        })
    }
}

impl Pass for UnreachableElimination {
    fn name(&self) -> &'static str {
        "unreachable-elimination"
    }

    fn run(&self, program: &mut Program, cx: &mut PassContext) -> bool {
        for_each_block(program, cx, &|stmts, cx| {
            let Some(cut) = stmts
                .iter()
                .position(|stmt| matches!(stmt, Stmt::Return { .. } | Stmt::Break { .. }))
            else {
                return false;
            };
            if cut + 1 >= stmts.len() {
                return false;
            }
            let removed: Vec<Stmt> = stmts.drain(cut + 1..).collect();
            cx.record(
                StepKind::UnreachableElimination,
                eco_format!("removed {} unreachable statement(s)", removed.len()),
                removed[0].line(),
                snippet(&removed),
                None,
            );
            true
        })
    }
}

impl Pass for RemoveUnusedVar {
    fn name(&self) -> &'static str {
        "remove-unused-var"
    }

    fn run(&self, program: &mut Program, cx: &mut PassContext) -> bool {
        let mut changed = false;
        for class in &mut program.classes {
            for method in &mut class.methods {
                let mut candidates: Vec<EcoString> = Vec::new();
                collect_var_decls(&method.body, &mut candidates);
                candidates.retain(|name| count_uses(&method.body, name) == 0);
                if candidates.is_empty() {
                    continue;
                }
                changed |= remove_decls(&mut method.body, &candidates, cx);
            }
        }
        changed
    }
}

fn collect_var_decls(stmts: &[Stmt], out: &mut Vec<EcoString>) {
    for stmt in stmts {
        match stmt {
            Stmt::VarDecl { name, .. } => out.push(name.clone()),
            Stmt::If { arms, else_body, .. } => {
                for arm in arms {
                    collect_var_decls(&arm.body, out);
                }
                if let Some(body) = else_body {
                    collect_var_decls(body, out);
                }
            }
            Stmt::While { body, .. } | Stmt::Loop { body, .. } => collect_var_decls(body, out),
            _ => {}
        }
    }
}

/// Counts reads and writes of `name` across the method, not counting the
/// declaration itself.
fn count_uses(stmts: &[Stmt], name: &str) -> usize {
    stmts
        .iter()
        .map(|stmt| match stmt {
            Stmt::VarDecl { init, .. } => {
                init.as_ref().map_or(0, |init| count_in_expr(init, name))
            }
            Stmt::Assign { target, value, .. } => {
                count_in_expr(target, name) + count_in_expr(value, name)
            }
            Stmt::If { arms, else_body, .. } => {
                arms.iter()
                    .map(|arm| count_in_expr(&arm.cond, name) + count_uses(&arm.body, name))
                    .sum::<usize>()
                    + else_body.as_deref().map_or(0, |body| count_uses(body, name))
            }
            Stmt::While { cond, body, .. } => count_in_expr(cond, name) + count_uses(body, name),
            Stmt::Loop { body, .. } => count_uses(body, name),
            Stmt::Return { value, .. } => {
                value.as_ref().map_or(0, |value| count_in_expr(value, name))
            }
            Stmt::Break { .. } => 0,
            Stmt::Expr { expr, .. } => count_in_expr(expr, name),
        })
        .sum()
}

fn count_in_expr(expr: &Expr, name: &str) -> usize {
    match expr {
        Expr::Literal(_) | Expr::This => 0,
        Expr::Identifier(id) => usize::from(id == name),
        Expr::New { args, .. } => args.iter().map(|a| count_in_expr(a, name)).sum(),
        Expr::Call { receiver, args, .. } => {
            receiver.as_deref().map_or(0, |r| count_in_expr(r, name))
                + args.iter().map(|a| count_in_expr(a, name)).sum::<usize>()
        }
        Expr::FieldAccess { receiver, .. } => count_in_expr(receiver, name),
        Expr::IndexAccess { receiver, index } => {
            count_in_expr(receiver, name) + count_in_expr(index, name)
        }
        Expr::Binary { lhs, rhs, .. } => count_in_expr(lhs, name) + count_in_expr(rhs, name),
        Expr::Unary { operand, .. } => count_in_expr(operand, name),
    }
}

fn remove_decls(stmts: &mut Vec<Stmt>, names: &[EcoString], cx: &mut PassContext) -> bool {
    let mut changed = false;
    for stmt in stmts.iter_mut() {
        match stmt {
            Stmt::If { arms, else_body, .. } => {
                for arm in arms {
                    changed |= remove_decls(&mut arm.body, names, cx);
                }
                if let Some(body) = else_body {
                    changed |= remove_decls(body, names, cx);
                }
            }
            Stmt::While { body, .. } | Stmt::Loop { body, .. } => {
                changed |= remove_decls(body, names, cx);
            }
            _ => {}
        }
    }
    stmts.retain(|stmt| {
        let Stmt::VarDecl { name, init, line } = stmt else { return true };
        if !names.contains(name) {
            return true;
        }
        // Initializers with observable effects pin the declaration in place.
        if init.as_ref().is_some_and(|init| !init.is_pure()) {
            return true;
        }
        cx.record(
            StepKind::RemoveUnusedVar,
            eco_format!("removed unused variable `{name}`"),
            *line,
            Some(EcoString::from(unparse_stmt(stmt))),
            None,
        );
        changed = true;
        false
    });
    changed
}

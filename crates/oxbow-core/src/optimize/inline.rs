// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Inlining passes: call-site inlining of trivially small methods and
//! constructor-literal elision.
//!
//! A method is inlinable when its body is a single valued `return` whose
//! expression mentions nothing but the method's own parameters; such a
//! method cannot recurse and cannot touch state. Call sites qualify when
//! the receiver is `this` (explicit or implicit) so the target resolves in
//! the current class's chain, and every argument is pure, because
//! substitution may duplicate or drop argument evaluation.
//!
//! Constructor-literal elision collapses `new C(..lit..).f` to the literal
//! argument when `C`'s `init` is a plain field-copy constructor.

use std::collections::HashMap;

use ecow::{eco_format, EcoString};

use crate::ast::{ClassDecl, Expr, MethodDecl, Program, Stmt};
use crate::unparse::unparse_expr;

use super::{Pass, PassContext, StepKind};

pub(crate) struct InlineFunction;
pub(crate) struct ConstructorLiteralElide;

/// Node-count ceiling for an inlinable body expression.
const MAX_INLINE_NODES: usize = 8;

impl Pass for InlineFunction {
    fn name(&self) -> &'static str {
        "inline-function"
    }

    fn run(&self, program: &mut Program, cx: &mut PassContext) -> bool {
        let targets = collect_inlinable(program);
        if targets.is_empty() {
            return false;
        }
        let supers: HashMap<EcoString, Option<EcoString>> = program
            .classes
            .iter()
            .map(|c| (c.name.clone(), c.superclass.clone()))
            .collect();

        let mut changed = false;
        for class in &mut program.classes {
            let class_name = class.name.clone();
            for method in &mut class.methods {
                for stmt in &mut method.body {
                    changed |= rewrite_stmt(stmt, &mut |expr, line, cx| {
                        try_inline(expr, line, &class_name, &targets, &supers, cx)
                    }, cx);
                }
            }
        }
        changed
    }
}

impl Pass for ConstructorLiteralElide {
    fn name(&self) -> &'static str {
        "constructor-literal-elide"
    }

    fn run(&self, program: &mut Program, cx: &mut PassContext) -> bool {
        let copy_inits = collect_copy_constructors(program);
        if copy_inits.is_empty() {
            return false;
        }
        let mut changed = false;
        for class in &mut program.classes {
            for method in &mut class.methods {
                for stmt in &mut method.body {
                    changed |= rewrite_stmt(stmt, &mut |expr, line, cx| {
                        try_elide(expr, line, &copy_inits, cx)
                    }, cx);
                }
            }
        }
        changed
    }
}

type Rewriter<'a> = dyn FnMut(&mut Expr, u32, &mut PassContext) -> bool + 'a;

/// Applies `rewrite` to every expression of the statement, bottom-up.
fn rewrite_stmt(stmt: &mut Stmt, rewrite: &mut Rewriter<'_>, cx: &mut PassContext) -> bool {
    let line = stmt.line();
    match stmt {
        Stmt::VarDecl { init, .. } => init
            .as_mut()
            .is_some_and(|init| rewrite_expr(init, line, rewrite, cx)),
        Stmt::Assign { target, value, .. } => {
            let mut changed = rewrite_expr(target, line, rewrite, cx);
            changed |= rewrite_expr(value, line, rewrite, cx);
            changed
        }
        Stmt::If { arms, else_body, .. } => {
            let mut changed = false;
            for arm in arms {
                changed |= rewrite_expr(&mut arm.cond, line, rewrite, cx);
                for stmt in &mut arm.body {
                    changed |= rewrite_stmt(stmt, rewrite, cx);
                }
            }
            if let Some(body) = else_body {
                for stmt in body {
                    changed |= rewrite_stmt(stmt, rewrite, cx);
                }
            }
            changed
        }
        Stmt::While { cond, body, .. } => {
            let mut changed = rewrite_expr(cond, line, rewrite, cx);
            for stmt in body {
                changed |= rewrite_stmt(stmt, rewrite, cx);
            }
            changed
        }
        Stmt::Loop { body, .. } => {
            let mut changed = false;
            for stmt in body {
                changed |= rewrite_stmt(stmt, rewrite, cx);
            }
            changed
        }
        Stmt::Return { value, .. } => value
            .as_mut()
            .is_some_and(|value| rewrite_expr(value, line, rewrite, cx)),
        Stmt::Break { .. } => false,
        Stmt::Expr { expr, .. } => rewrite_expr(expr, line, rewrite, cx),
    }
}

fn rewrite_expr(
    expr: &mut Expr,
    line: u32,
    rewrite: &mut Rewriter<'_>,
    cx: &mut PassContext,
) -> bool {
    let mut changed = match expr {
        Expr::Literal(_) | Expr::Identifier(_) | Expr::This => false,
        Expr::New { args, .. } => {
            let mut changed = false;
            for arg in args {
                changed |= rewrite_expr(arg, line, rewrite, cx);
            }
            changed
        }
        Expr::Call { receiver, args, .. } => {
            let mut changed = receiver
                .as_deref_mut()
                .is_some_and(|receiver| rewrite_expr(receiver, line, rewrite, cx));
            for arg in args {
                changed |= rewrite_expr(arg, line, rewrite, cx);
            }
            changed
        }
        Expr::FieldAccess { receiver, .. } => rewrite_expr(receiver, line, rewrite, cx),
        Expr::IndexAccess { receiver, index } => {
            let mut changed = rewrite_expr(receiver, line, rewrite, cx);
            changed |= rewrite_expr(index, line, rewrite, cx);
            changed
        }
        Expr::Binary { lhs, rhs, .. } => {
            let mut changed = rewrite_expr(lhs, line, rewrite, cx);
            changed |= rewrite_expr(rhs, line, rewrite, cx);
            changed
        }
        Expr::Unary { operand, .. } => rewrite_expr(operand, line, rewrite, cx),
    };
    changed |= rewrite(expr, line, cx);
    changed
}

/// An inlinable method: its parameters and the returned expression.
struct InlineTarget {
    params: Vec<EcoString>,
    body: Expr,
}

fn collect_inlinable(program: &Program) -> HashMap<(EcoString, EcoString), InlineTarget> {
    let mut targets = HashMap::new();
    for class in &program.classes {
        for method in &class.methods {
            if method.name == "init" {
                continue;
            }
            let [Stmt::Return { value: Some(body), .. }] = method.body.as_slice() else {
                continue;
            };
            if !params_only(body, &method.params) || node_count(body) > MAX_INLINE_NODES {
                continue;
            }
            targets.insert(
                (class.name.clone(), method.name.clone()),
                InlineTarget {
                    params: method.params.clone(),
                    body: body.clone(),
                },
            );
        }
    }
    targets
}

/// `true` when the expression mentions only the given parameters, with no
/// calls, construction, field or index access, and no `this`.
fn params_only(expr: &Expr, params: &[EcoString]) -> bool {
    match expr {
        Expr::Literal(_) => true,
        Expr::Identifier(name) => params.contains(name),
        Expr::Binary { lhs, rhs, .. } => params_only(lhs, params) && params_only(rhs, params),
        Expr::Unary { operand, .. } => params_only(operand, params),
        _ => false,
    }
}

fn node_count(expr: &Expr) -> usize {
    match expr {
        Expr::Literal(_) | Expr::Identifier(_) | Expr::This => 1,
        Expr::Binary { lhs, rhs, .. } => 1 + node_count(lhs) + node_count(rhs),
        Expr::Unary { operand, .. } => 1 + node_count(operand),
        Expr::New { args, .. } => 1 + args.iter().map(node_count).sum::<usize>(),
        Expr::Call { receiver, args, .. } => {
            1 + receiver.as_deref().map_or(0, node_count)
                + args.iter().map(node_count).sum::<usize>()
        }
        Expr::FieldAccess { receiver, .. } => 1 + node_count(receiver),
        Expr::IndexAccess { receiver, index } => 1 + node_count(receiver) + node_count(index),
    }
}

fn try_inline(
    expr: &mut Expr,
    line: u32,
    current_class: &EcoString,
    targets: &HashMap<(EcoString, EcoString), InlineTarget>,
    supers: &HashMap<EcoString, Option<EcoString>>,
    cx: &mut PassContext,
) -> bool {
    let Expr::Call { receiver, method, args } = &*expr else {
        return false;
    };
    if !matches!(receiver.as_deref(), None | Some(Expr::This)) {
        return false;
    }
    if !args.iter().all(Expr::is_pure) {
        return false;
    }
    // Resolve through the superclass chain, bounded against cycles.
    let mut class = current_class.clone();
    let mut remaining = supers.len() + 1;
    let target = loop {
        if remaining == 0 {
            return false;
        }
        remaining -= 1;
        if let Some(target) = targets.get(&(class.clone(), method.clone())) {
            break target;
        }
        match supers.get(&class) {
            Some(Some(parent)) => class = parent.clone(),
            _ => return false,
        }
    };
    if target.params.len() != args.len() {
        return false;
    }

    let before = EcoString::from(unparse_expr(expr));
    let message = eco_format!("inlined call to `{method}`");
    let mut inlined = target.body.clone();
    substitute(&mut inlined, &target.params, args);
    let after = EcoString::from(unparse_expr(&inlined));
    cx.record(StepKind::InlineFunction, message, line, Some(before), Some(after));
    *expr = inlined;
    true
}

/// Replaces parameter identifiers with the corresponding argument trees.
fn substitute(expr: &mut Expr, params: &[EcoString], args: &[Expr]) {
    match expr {
        Expr::Identifier(name) => {
            if let Some(index) = params.iter().position(|p| p == name) {
                *expr = args[index].clone();
            }
        }
        Expr::Binary { lhs, rhs, .. } => {
            substitute(lhs, params, args);
            substitute(rhs, params, args);
        }
        Expr::Unary { operand, .. } => substitute(operand, params, args),
        // params_only admits nothing else.
        _ => {}
    }
}

/// Field-to-parameter mapping of a plain copy constructor.
struct CopyInit {
    params: Vec<EcoString>,
    fields: HashMap<EcoString, usize>,
}

fn collect_copy_constructors(program: &Program) -> HashMap<EcoString, CopyInit> {
    let mut inits = HashMap::new();
    for class in &program.classes {
        if let Some(init) = copy_constructor(class) {
            inits.insert(class.name.clone(), init);
        }
    }
    inits
}

/// Recognises an `init` whose body is nothing but `field := param` copies.
fn copy_constructor(class: &ClassDecl) -> Option<CopyInit> {
    let init: &MethodDecl = class.methods.iter().find(|m| m.name == "init")?;
    let mut fields = HashMap::new();
    for stmt in &init.body {
        let Stmt::Assign {
            target: Expr::Identifier(field),
            value: Expr::Identifier(param),
            ..
        } = stmt
        else {
            return None;
        };
        if !class.fields.iter().any(|f| &f.name == field) {
            return None;
        }
        let index = init.params.iter().position(|p| p == param)?;
        fields.insert(field.clone(), index);
    }
    Some(CopyInit {
        params: init.params.clone(),
        fields,
    })
}

fn try_elide(
    expr: &mut Expr,
    line: u32,
    copy_inits: &HashMap<EcoString, CopyInit>,
    cx: &mut PassContext,
) -> bool {
    let Expr::FieldAccess { receiver, field } = &*expr else {
        return false;
    };
    let Expr::New { class, args } = receiver.as_ref() else {
        return false;
    };
    let Some(init) = copy_inits.get(class) else {
        return false;
    };
    if init.params.len() != args.len() || !args.iter().all(Expr::is_pure) {
        return false;
    }
    let index = match init.fields.get(field) {
        Some(index) => *index,
        None => return false,
    };
    if !args[index].is_literal() {
        return false;
    }

    let before = EcoString::from(unparse_expr(expr));
    let replacement = args[index].clone();
    let after = EcoString::from(unparse_expr(&replacement));
    let message = eco_format!("elided construction of `{class}` into `{after}`");
    cx.record(
        StepKind::ConstructorLiteralElide,
        message,
        line,
        Some(before),
        Some(after),
    );
    *expr = replacement;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::{optimize, optimized_source, StepKind};
    use crate::source_analysis::{lex, parse};
    use pretty_assertions::assert_eq;

    fn program(source: &str) -> Program {
        parse(lex(source).expect("lexes")).expect("parses")
    }

    #[test]
    fn trivial_method_calls_are_inlined() {
        let (optimized, steps) = optimize(&program(
            "class Main is\n\
             method double(n) => n * 2\n\
             method Main() is\n\
             io.PrintInteger(double(21))\n\
             end\n\
             end\n",
        ));
        let printed = optimized_source(&optimized);
        // Substituted and then folded by the next sweep.
        assert!(printed.contains("io.PrintInteger(42)"));
        assert!(steps.iter().any(|s| s.kind == StepKind::InlineFunction));
    }

    #[test]
    fn inlining_preserves_precedence() {
        let (optimized, _) = optimize(&program(
            "class Main is\n\
             method sum(a, b) => a + b\n\
             method Main() is\n\
             io.PrintInteger(sum(x, 2) * 3)\n\
             end\n\
             end\n",
        ));
        assert!(optimized_source(&optimized).contains("(x + 2) * 3"));
    }

    #[test]
    fn impure_arguments_block_inlining() {
        let (optimized, steps) = optimize(&program(
            "class Main is\n\
             method double(n) => n * 2\n\
             method Main() is\n\
             io.PrintInteger(double(roll()))\n\
             end\n\
             end\n",
        ));
        assert!(optimized_source(&optimized).contains("double(roll())"));
        assert!(!steps.iter().any(|s| s.kind == StepKind::InlineFunction));
    }

    #[test]
    fn methods_touching_state_are_not_inlined() {
        let (optimized, steps) = optimize(&program(
            "class Main is\n\
             var total\n\
             method read() => total\n\
             method Main() is\n\
             io.PrintInteger(read())\n\
             end\n\
             end\n",
        ));
        assert!(optimized_source(&optimized).contains("read()"));
        assert!(!steps.iter().any(|s| s.kind == StepKind::InlineFunction));
    }

    #[test]
    fn inherited_helpers_inline_too() {
        let (optimized, _) = optimize(&program(
            "class Base is\n\
             method twice(n) => n + n\n\
             end\n\
             class Main extends Base is\n\
             method Main() is\n\
             io.PrintInteger(this.twice(3))\n\
             end\n\
             end\n",
        ));
        assert!(optimized_source(&optimized).contains("io.PrintInteger(6)"));
    }

    #[test]
    fn constructor_field_read_collapses_to_the_literal() {
        let (optimized, steps) = optimize(&program(
            "class Point is\n\
             var x\n\
             var y\n\
             method init(x0, y0) is\n\
             x := x0\n\
             y := y0\n\
             end\n\
             end\n\
             class Main is\n\
             method Main() is\n\
             io.PrintInteger(new Point(3, 4).x)\n\
             end\n\
             end\n",
        ));
        assert!(optimized_source(&optimized).contains("io.PrintInteger(3)"));
        let step = steps
            .iter()
            .find(|s| s.kind == StepKind::ConstructorLiteralElide)
            .unwrap();
        assert_eq!(step.before.as_deref(), Some("new Point(3, 4).x"));
        assert_eq!(step.after.as_deref(), Some("3"));
    }

    #[test]
    fn elision_requires_a_copy_constructor() {
        let (optimized, steps) = optimize(&program(
            "class Counter is\n\
             var n\n\
             method init(n0) is\n\
             n := n0 + 1\n\
             end\n\
             end\n\
             class Main is\n\
             method Main() is\n\
             io.PrintInteger(new Counter(3).n)\n\
             end\n\
             end\n",
        ));
        assert!(optimized_source(&optimized).contains("new Counter(3).n"));
        assert!(!steps.iter().any(|s| s.kind == StepKind::ConstructorLiteralElide));
    }
}

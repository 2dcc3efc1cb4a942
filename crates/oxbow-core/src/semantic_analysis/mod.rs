// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Semantic analysis: name resolution and shape checks over the parsed
//! program.
//!
//! The analyser is advisory. It never stops the pipeline; it produces a
//! [`SemanticReport`] of errors (undefined names, wrong arity, duplicate
//! declarations, unknown superclasses, inheritance cycles, `break` outside
//! a loop) and warnings (missing return paths, unreachable statements,
//! unused locals/fields/methods). Every finding carries the line of the
//! statement or declaration it was found in.
//!
//! Calls are arity-checked only where the receiver's class is statically
//! known: `this`, implicit-this, `new C(..)` receivers, and variables whose
//! last assignment was a `new` expression. Calls on the `io`/`math`/
//! `screen`/`time` namespaces are checked against the host import table.

mod scope;

pub use scope::{Binding, BindingKind, Scope};

use std::collections::{HashMap, HashSet};

use ecow::{eco_format, EcoString};
use serde::Serialize;
use tracing::debug;

use crate::ast::{ClassDecl, Expr, MethodDecl, Program, Stmt};
use crate::builtins;
use crate::codegen::imports;
use crate::diagnostics::{Diagnostic, Stage};

/// The analyser's accumulated findings.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SemanticReport {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl SemanticReport {
    /// `true` when no errors were found (warnings may still be present).
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Analyses a program and reports all findings.
#[must_use]
pub fn analyse(program: &Program) -> SemanticReport {
    let mut analyser = Analyser::new(program);
    analyser.run();
    debug!(
        errors = analyser.report.errors.len(),
        warnings = analyser.report.warnings.len(),
        "semantic analysis complete"
    );
    analyser.report
}

struct Analyser<'a> {
    program: &'a Program,
    classes: HashMap<&'a str, &'a ClassDecl>,
    report: SemanticReport,
    /// Field names read anywhere in the program.
    read_fields: HashSet<EcoString>,
    /// Method names called anywhere in the program.
    called_methods: HashSet<EcoString>,
}

/// Per-method walk state.
struct MethodCtx<'a> {
    class: &'a ClassDecl,
    scope: Scope,
    loop_depth: u32,
}

impl<'a> Analyser<'a> {
    fn new(program: &'a Program) -> Self {
        Self {
            program,
            classes: HashMap::new(),
            report: SemanticReport::default(),
            read_fields: HashSet::new(),
            called_methods: HashSet::new(),
        }
    }

    fn error(&mut self, line: u32, message: EcoString) {
        self.report.errors.push(Diagnostic::error(Stage::Semantic, line, message));
    }

    fn warning(&mut self, line: u32, message: EcoString) {
        self.report.warnings.push(Diagnostic::warning(Stage::Semantic, line, message));
    }

    fn run(&mut self) {
        self.collect_classes();
        self.check_hierarchy();
        for class in &self.program.classes {
            self.check_members(class);
        }
        for class in &self.program.classes {
            for method in &class.methods {
                self.check_method(class, method);
            }
        }
        self.report_unused_members();
    }

    fn collect_classes(&mut self) {
        for class in &self.program.classes {
            if builtins::builtin_class(&class.name).is_some() {
                self.error(
                    class.line,
                    eco_format!("class `{}` shadows a built-in class", class.name),
                );
                continue;
            }
            if self.classes.insert(class.name.as_str(), class).is_some() {
                self.error(
                    class.line,
                    eco_format!("duplicate class `{}`", class.name),
                );
            }
        }
    }

    fn check_hierarchy(&mut self) {
        let mut findings = Vec::new();
        for class in &self.program.classes {
            let Some(superclass) = &class.superclass else { continue };
            if !self.classes.contains_key(superclass.as_str()) {
                findings.push((
                    class.line,
                    eco_format!(
                        "class `{}` extends unknown class `{superclass}`",
                        class.name
                    ),
                ));
                continue;
            }
            // Walk the chain; coming back to the start is a cycle.
            let mut seen = HashSet::new();
            seen.insert(class.name.as_str());
            let mut current = superclass.as_str();
            loop {
                if !seen.insert(current) {
                    findings.push((
                        class.line,
                        eco_format!("inheritance cycle involving `{}`", class.name),
                    ));
                    break;
                }
                match self
                    .classes
                    .get(current)
                    .and_then(|c| c.superclass.as_deref())
                {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }
        for (line, message) in findings {
            self.error(line, message);
        }
    }

    fn check_members(&mut self, class: &ClassDecl) {
        let mut fields = HashSet::new();
        for field in &class.fields {
            if !fields.insert(field.name.as_str()) {
                self.error(
                    field.line,
                    eco_format!("duplicate field `{}` in class `{}`", field.name, class.name),
                );
            }
        }
        let mut methods = HashSet::new();
        for method in &class.methods {
            if !methods.insert(method.name.as_str()) {
                self.error(
                    method.line,
                    eco_format!(
                        "duplicate method `{}` in class `{}`",
                        method.name, class.name
                    ),
                );
            }
            let mut params = HashSet::new();
            for param in &method.params {
                if !params.insert(param.as_str()) {
                    self.error(
                        method.line,
                        eco_format!(
                            "duplicate parameter `{param}` in method `{}`",
                            method.name
                        ),
                    );
                }
            }
        }
    }

    fn check_method(&mut self, class: &'a ClassDecl, method: &'a MethodDecl) {
        let mut ctx = MethodCtx {
            class,
            scope: Scope::new(),
            loop_depth: 0,
        };
        ctx.scope.push();
        for param in &method.params {
            ctx.scope.define(param, BindingKind::Parameter, method.line);
        }
        self.walk_block(&method.body, &mut ctx);
        ctx.scope.pop();

        if method_returns_value(&method.body) && !always_returns(&method.body) {
            self.warning(
                method.line,
                eco_format!(
                    "method `{}` may not return a value on every path",
                    method.name
                ),
            );
        }
    }

    /// Walks one statement block in a fresh scope level, reporting
    /// unreachable trailing statements and unused locals.
    fn walk_block(&mut self, stmts: &[Stmt], ctx: &mut MethodCtx<'a>) {
        ctx.scope.push();
        let mut exited = false;
        for stmt in stmts {
            if exited {
                self.warning(stmt.line(), EcoString::from("unreachable statement"));
                exited = false; // once per block
            }
            self.walk_stmt(stmt, ctx);
            if matches!(stmt, Stmt::Return { .. } | Stmt::Break { .. }) {
                exited = true;
            }
        }
        for binding in ctx.scope.pop() {
            if !binding.used && binding.kind == BindingKind::Local {
                self.warning(
                    binding.line,
                    eco_format!("unused variable `{}`", binding.name),
                );
            }
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt, ctx: &mut MethodCtx<'a>) {
        match stmt {
            Stmt::VarDecl { name, init, line } => {
                if let Some(init) = init {
                    self.walk_expr(init, *line, ctx);
                }
                if ctx.scope.define(name, BindingKind::Local, *line).is_some() {
                    self.error(*line, eco_format!("variable `{name}` is already defined"));
                }
                if let Some(Expr::New { class, .. }) = init {
                    ctx.scope.set_class_hint(name, Some(class.clone()));
                }
            }
            Stmt::Assign { target, value, line } => {
                self.walk_expr(value, *line, ctx);
                self.walk_assign_target(target, value, *line, ctx);
            }
            Stmt::If { arms, else_body, line } => {
                for arm in arms {
                    self.walk_expr(&arm.cond, *line, ctx);
                    self.walk_block(&arm.body, ctx);
                }
                if let Some(body) = else_body {
                    self.walk_block(body, ctx);
                }
            }
            Stmt::While { cond, body, line } => {
                self.walk_expr(cond, *line, ctx);
                ctx.loop_depth += 1;
                self.walk_block(body, ctx);
                ctx.loop_depth -= 1;
            }
            Stmt::Loop { body, .. } => {
                ctx.loop_depth += 1;
                self.walk_block(body, ctx);
                ctx.loop_depth -= 1;
            }
            Stmt::Return { value, line } => {
                if let Some(value) = value {
                    self.walk_expr(value, *line, ctx);
                }
            }
            Stmt::Break { line } => {
                if ctx.loop_depth == 0 {
                    self.error(*line, EcoString::from("`break` outside of a loop"));
                }
            }
            Stmt::Expr { expr, line } => self.walk_expr(expr, *line, ctx),
        }
    }

    fn walk_assign_target(
        &mut self,
        target: &Expr,
        value: &Expr,
        line: u32,
        ctx: &mut MethodCtx<'a>,
    ) {
        match target {
            Expr::Identifier(name) => {
                if ctx.scope.is_defined(name) {
                    // The hint tracks only the trivially known case.
                    let hint = match value {
                        Expr::New { class, .. } => Some(class.clone()),
                        _ => None,
                    };
                    ctx.scope.set_class_hint(name, hint);
                } else if !self.field_exists(&ctx.class.name, name) {
                    self.error(
                        line,
                        eco_format!("assignment to undefined variable `{name}`"),
                    );
                }
            }
            Expr::FieldAccess { receiver, field } => {
                self.walk_expr(receiver, line, ctx);
                if let Some(class) = self.receiver_class(Some(receiver), ctx) {
                    if self.classes.contains_key(class.as_str())
                        && !self.field_exists(&class, field)
                    {
                        self.error(
                            line,
                            eco_format!("class `{class}` has no field `{field}`"),
                        );
                    }
                }
            }
            Expr::IndexAccess { receiver, index } => {
                self.walk_expr(receiver, line, ctx);
                self.walk_expr(index, line, ctx);
            }
            // The parser only produces the three target shapes above.
            _ => {}
        }
    }

    fn walk_expr(&mut self, expr: &Expr, line: u32, ctx: &mut MethodCtx<'a>) {
        match expr {
            Expr::Literal(_) | Expr::This => {}
            Expr::Identifier(name) => {
                if ctx.scope.mark_used(name).is_some() || ctx.scope.is_defined(name) {
                    return;
                }
                if self.field_exists(&ctx.class.name, name) {
                    self.read_fields.insert(name.clone());
                } else {
                    self.error(line, eco_format!("undefined name `{name}`"));
                }
            }
            Expr::New { class, args } => {
                for arg in args {
                    self.walk_expr(arg, line, ctx);
                }
                match self.constructor_arity(class) {
                    Some(arity) if arity != args.len() => self.error(
                        line,
                        eco_format!(
                            "constructor of `{class}` expects {arity} argument(s), got {}",
                            args.len()
                        ),
                    ),
                    Some(_) => {}
                    None => self.error(line, eco_format!("unknown class `{class}`")),
                }
            }
            Expr::Call { receiver, method, args } => {
                self.walk_call(receiver.as_deref(), method, args, line, ctx);
            }
            Expr::FieldAccess { receiver, field } => {
                self.walk_expr(receiver, line, ctx);
                self.read_fields.insert(field.clone());
                if let Some(class) = self.receiver_class(Some(receiver), ctx) {
                    if self.classes.contains_key(class.as_str())
                        && !self.field_exists(&class, field)
                    {
                        self.error(
                            line,
                            eco_format!("class `{class}` has no field `{field}`"),
                        );
                    }
                }
            }
            Expr::IndexAccess { receiver, index } => {
                self.walk_expr(receiver, line, ctx);
                self.walk_expr(index, line, ctx);
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.walk_expr(lhs, line, ctx);
                self.walk_expr(rhs, line, ctx);
            }
            Expr::Unary { operand, .. } => self.walk_expr(operand, line, ctx),
        }
    }

    fn walk_call(
        &mut self,
        receiver: Option<&Expr>,
        method: &EcoString,
        args: &[Expr],
        line: u32,
        ctx: &mut MethodCtx<'a>,
    ) {
        // Host-namespace calls resolve against the import table, not the
        // class hierarchy; `io` etc. only act as namespaces when no local
        // shadows the name.
        if let Some(Expr::Identifier(ns)) = receiver {
            if imports::is_host_namespace(ns) && !ctx.scope.is_defined(ns) {
                for arg in args {
                    self.walk_expr(arg, line, ctx);
                }
                match imports::lookup(ns, method) {
                    Some(import) if import.params.len() != args.len() => self.error(
                        line,
                        eco_format!(
                            "`{ns}.{method}` expects {} argument(s), got {}",
                            import.params.len(),
                            args.len()
                        ),
                    ),
                    Some(_) => {}
                    None => self.error(
                        line,
                        eco_format!("unknown host function `{ns}.{method}`"),
                    ),
                }
                return;
            }
        }

        if let Some(receiver) = receiver {
            self.walk_expr(receiver, line, ctx);
        }
        for arg in args {
            self.walk_expr(arg, line, ctx);
        }
        self.called_methods.insert(method.clone());

        let Some(class) = self.receiver_class(receiver, ctx) else {
            return; // receiver class unknown; nothing to check
        };
        match self.method_arity(&class, method) {
            Some(arity) if arity != args.len() => self.error(
                line,
                eco_format!(
                    "method `{class}.{method}` expects {arity} argument(s), got {}",
                    args.len()
                ),
            ),
            Some(_) => {}
            None if self.classes.contains_key(class.as_str())
                || builtins::builtin_class(&class).is_some() =>
            {
                self.error(line, eco_format!("class `{class}` has no method `{method}`"));
            }
            None => {}
        }
    }

    /// The statically known class of a call receiver, if any.
    fn receiver_class(&self, receiver: Option<&Expr>, ctx: &MethodCtx<'a>) -> Option<EcoString> {
        match receiver {
            None | Some(Expr::This) => Some(ctx.class.name.clone()),
            Some(Expr::New { class, .. }) => Some(class.clone()),
            Some(Expr::Identifier(name)) => ctx.scope.class_hint(name),
            _ => None,
        }
    }

    /// Looks a method up through the superclass chain or the builtin table,
    /// returning its arity.
    fn method_arity(&self, class: &str, method: &str) -> Option<usize> {
        if let Some(builtin) = builtins::builtin_method(class, method) {
            return Some(builtin.arity);
        }
        let mut seen = HashSet::new();
        let mut current = class;
        while seen.insert(current) {
            let decl = self.classes.get(current)?;
            if let Some(found) = decl.methods.iter().find(|m| m.name == method) {
                return Some(found.params.len());
            }
            current = decl.superclass.as_deref()?;
        }
        None
    }

    /// Constructor arity: the `init` method's, or zero when absent.
    fn constructor_arity(&self, class: &str) -> Option<usize> {
        if let Some(builtin) = builtins::builtin_class(class) {
            return Some(builtin.constructor_arity);
        }
        if !self.classes.contains_key(class) {
            return None;
        }
        Some(self.method_arity(class, "init").unwrap_or(0))
    }

    fn field_exists(&self, class: &str, field: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = class;
        while seen.insert(current) {
            let Some(decl) = self.classes.get(current) else { return false };
            if decl.fields.iter().any(|f| f.name == field) {
                return true;
            }
            match decl.superclass.as_deref() {
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }

    fn report_unused_members(&mut self) {
        let mut findings = Vec::new();
        for class in &self.program.classes {
            for field in &class.fields {
                if !self.read_fields.contains(&field.name) {
                    findings.push((
                        field.line,
                        eco_format!("unused field `{}`", field.name),
                    ));
                }
            }
            for method in &class.methods {
                if method.name == "Main" || method.name == "init" {
                    continue;
                }
                if !self.called_methods.contains(&method.name) {
                    findings.push((
                        method.line,
                        eco_format!("method `{}` is never called", method.name),
                    ));
                }
            }
        }
        findings.sort_by_key(|(line, _)| *line);
        for (line, message) in findings {
            self.warning(line, message);
        }
    }
}

/// Whether any `return` in the body carries a value.
fn method_returns_value(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Return { value, .. } => value.is_some(),
        Stmt::If { arms, else_body, .. } => {
            arms.iter().any(|arm| method_returns_value(&arm.body))
                || else_body.as_deref().is_some_and(method_returns_value)
        }
        Stmt::While { body, .. } | Stmt::Loop { body, .. } => method_returns_value(body),
        _ => false,
    })
}

/// Conservative: `true` only when every path through the block reaches a
/// `return`.
fn always_returns(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Return { .. } => true,
        Stmt::If { arms, else_body, .. } => {
            else_body.as_deref().is_some_and(always_returns)
                && arms.iter().all(|arm| always_returns(&arm.body))
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::{lex, parse};
    use pretty_assertions::assert_eq;

    fn analyse_source(source: &str) -> SemanticReport {
        let tokens = lex(source).expect("lexes");
        let program = parse(tokens).expect("parses");
        analyse(&program)
    }

    fn messages(diagnostics: &[Diagnostic]) -> Vec<String> {
        diagnostics.iter().map(|d| d.message.to_string()).collect()
    }

    #[test]
    fn clean_program_has_no_findings() {
        let report = analyse_source(
            "class Main is\n\
             method Main() is\n\
             io.PrintInteger(42)\n\
             end\n\
             end\n",
        );
        assert!(report.is_clean());
        assert_eq!(report.warnings.len(), 0);
    }

    #[test]
    fn undefined_name_is_an_error() {
        let report = analyse_source(
            "class Main is\n\
             method Main() is\n\
             io.PrintInteger(x)\n\
             end\n\
             end\n",
        );
        assert_eq!(messages(&report.errors), vec!["undefined name `x`"]);
        assert_eq!(report.errors[0].line, 3);
    }

    #[test]
    fn duplicate_class_and_members() {
        let report = analyse_source(
            "class A is\n\
             var f\n\
             var f\n\
             method m() is end\n\
             method m() is end\n\
             end\n\
             class A is end\n",
        );
        let errors = messages(&report.errors);
        assert!(errors.contains(&"duplicate field `f` in class `A`".to_string()));
        assert!(errors.contains(&"duplicate method `m` in class `A`".to_string()));
        assert!(errors.contains(&"duplicate class `A`".to_string()));
    }

    #[test]
    fn unknown_superclass_and_cycle() {
        let report = analyse_source(
            "class A extends Missing is end\n\
             class B extends C is end\n\
             class C extends B is end\n",
        );
        let errors = messages(&report.errors);
        assert!(errors.contains(&"class `A` extends unknown class `Missing`".to_string()));
        assert!(errors.iter().any(|m| m.contains("inheritance cycle")));
    }

    #[test]
    fn arity_checked_when_receiver_known() {
        let report = analyse_source(
            "class Main is\n\
             method helper(a, b) => a + b\n\
             method Main() is\n\
             var r := helper(1)\n\
             io.PrintInteger(r)\n\
             end\n\
             end\n",
        );
        assert_eq!(
            messages(&report.errors),
            vec!["method `Main.helper` expects 2 argument(s), got 1"]
        );
    }

    #[test]
    fn flow_local_hint_checks_calls_through_variables() {
        let report = analyse_source(
            "class Point is\n\
             var x\n\
             method init(x0) is\n\
             x := x0\n\
             end\n\
             method get() => x\n\
             end\n\
             class Main is\n\
             method Main() is\n\
             var p := new Point(1)\n\
             io.PrintInteger(p.get(5))\n\
             end\n\
             end\n",
        );
        assert_eq!(
            messages(&report.errors),
            vec!["method `Point.get` expects 0 argument(s), got 1"]
        );
    }

    #[test]
    fn constructor_arity_uses_init() {
        let report = analyse_source(
            "class Point is\n\
             method init(x, y) is end\n\
             end\n\
             class Main is\n\
             method Main() is\n\
             var p := new Point(1)\n\
             var q := new Array()\n\
             io.PrintInteger(p.x)\n\
             io.PrintArray(q)\n\
             end\n\
             end\n",
        );
        let errors = messages(&report.errors);
        assert!(errors.contains(&"constructor of `Point` expects 2 argument(s), got 1".to_string()));
        assert!(errors.contains(&"constructor of `Array` expects 1 argument(s), got 0".to_string()));
    }

    #[test]
    fn host_calls_are_checked() {
        let report = analyse_source(
            "class Main is\n\
             method Main() is\n\
             io.PrintInteger(1, 2)\n\
             io.Blink()\n\
             end\n\
             end\n",
        );
        let errors = messages(&report.errors);
        assert!(errors.contains(&"`io.PrintInteger` expects 1 argument(s), got 2".to_string()));
        assert!(errors.contains(&"unknown host function `io.Blink`".to_string()));
    }

    #[test]
    fn break_outside_loop() {
        let report = analyse_source(
            "class Main is\n\
             method Main() is\n\
             break\n\
             end\n\
             end\n",
        );
        assert_eq!(messages(&report.errors), vec!["`break` outside of a loop"]);

        let clean = analyse_source(
            "class Main is\n\
             method Main() is\n\
             loop\n\
             break\n\
             end\n\
             end\n\
             end\n",
        );
        assert!(clean.is_clean());
    }

    #[test]
    fn unreachable_after_return() {
        let report = analyse_source(
            "class Main is\n\
             method Main() is\n\
             return 1\n\
             io.PrintLine()\n\
             end\n\
             end\n",
        );
        assert!(messages(&report.warnings)
            .contains(&"unreachable statement".to_string()));
    }

    #[test]
    fn missing_return_path_is_a_warning() {
        let report = analyse_source(
            "class Main is\n\
             method pick(flag) is\n\
             if flag then\n\
             return 1\n\
             end\n\
             end\n\
             method Main() is\n\
             io.PrintInteger(pick(true))\n\
             end\n\
             end\n",
        );
        assert!(messages(&report.warnings)
            .iter()
            .any(|m| m.contains("may not return a value on every path")));
    }

    #[test]
    fn complete_if_else_return_is_not_flagged() {
        let report = analyse_source(
            "class Main is\n\
             method pick(flag) is\n\
             if flag then\n\
             return 1\n\
             else\n\
             return 2\n\
             end\n\
             end\n\
             method Main() is\n\
             io.PrintInteger(pick(true))\n\
             end\n\
             end\n",
        );
        assert!(!messages(&report.warnings)
            .iter()
            .any(|m| m.contains("may not return")));
    }

    #[test]
    fn unused_local_field_and_method() {
        let report = analyse_source(
            "class Main is\n\
             var ghost\n\
             method helper() => 1\n\
             method Main() is\n\
             var dead := 3\n\
             io.PrintLine()\n\
             end\n\
             end\n",
        );
        let warnings = messages(&report.warnings);
        assert!(warnings.contains(&"unused variable `dead`".to_string()));
        assert!(warnings.contains(&"unused field `ghost`".to_string()));
        assert!(warnings.contains(&"method `helper` is never called".to_string()));
    }

    #[test]
    fn fields_resolve_through_inheritance() {
        let report = analyse_source(
            "class Base is\n\
             var value\n\
             end\n\
             class Derived extends Base is\n\
             method get() => value\n\
             end\n\
             class Main is\n\
             method Main() is\n\
             var d := new Derived()\n\
             io.PrintInteger(d.get())\n\
             end\n\
             end\n",
        );
        assert!(report.is_clean(), "errors: {:?}", report.errors);
    }

    #[test]
    fn assignment_to_undefined_variable() {
        let report = analyse_source(
            "class Main is\n\
             method Main() is\n\
             nope := 3\n\
             end\n\
             end\n",
        );
        assert_eq!(
            messages(&report.errors),
            vec!["assignment to undefined variable `nope`"]
        );
    }

    #[test]
    fn shadowing_a_builtin_class_is_an_error() {
        let report = analyse_source("class Array is end\n");
        assert_eq!(
            messages(&report.errors),
            vec!["class `Array` shadows a built-in class"]
        );
    }
}

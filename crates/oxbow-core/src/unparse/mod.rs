// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! AST unparser: converts AST nodes back to source text.
//!
//! Used for the pretty-printed optimized program in the pipeline result and
//! for the before/after snippets attached to optimization steps. Output is
//! canonical rather than faithful: discarded comments and the original
//! whitespace do not survive, blocks are indented two spaces, and
//! single-`return` method bodies are re-sugared to the `=>` short form.
//!
//! Expressions are re-parenthesised from precedence, so unparsed text
//! re-parses to the same tree.

use crate::ast::{
    BinaryOp, ClassDecl, Expr, IfArm, Literal, MethodDecl, Program, Stmt, UnaryOp,
};

/// Unparses a whole program, classes separated by blank lines.
#[must_use]
pub fn unparse_program(program: &Program) -> String {
    let mut printer = Printer::new();
    for (i, class) in program.classes.iter().enumerate() {
        if i > 0 {
            printer.out.push('\n');
        }
        printer.class(class);
    }
    printer.out
}

/// Unparses a single class declaration.
#[must_use]
pub fn unparse_class(class: &ClassDecl) -> String {
    let mut printer = Printer::new();
    printer.class(class);
    printer.out
}

/// Unparses a single statement (used for step snippets).
#[must_use]
pub fn unparse_stmt(stmt: &Stmt) -> String {
    let mut printer = Printer::new();
    printer.stmt(stmt);
    // Snippets read better without the trailing newline.
    printer.out.truncate(printer.out.trim_end().len());
    printer.out
}

/// Unparses a single expression.
#[must_use]
pub fn unparse_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, 0);
    out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn new() -> Self {
        Self { out: String::new(), indent: 0 }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn class(&mut self, class: &ClassDecl) {
        let header = match &class.superclass {
            Some(superclass) => format!("class {} extends {superclass} is", class.name),
            None => format!("class {} is", class.name),
        };
        self.line(&header);
        self.indent += 1;
        for field in &class.fields {
            self.line(&format!("var {}", field.name));
        }
        for method in &class.methods {
            self.method(method);
        }
        self.indent -= 1;
        self.line("end");
    }

    fn method(&mut self, method: &MethodDecl) {
        let params = method.params.join(", ");
        // Re-sugar a lone valued return to the short form.
        if let [Stmt::Return { value: Some(value), .. }] = method.body.as_slice() {
            self.line(&format!(
                "method {}({params}) => {}",
                method.name,
                unparse_expr(value)
            ));
            return;
        }
        self.line(&format!("method {}({params}) is", method.name));
        self.indent += 1;
        for stmt in &method.body {
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.line("end");
    }

    fn block(&mut self, stmts: &[Stmt]) {
        self.indent += 1;
        for stmt in stmts {
            self.stmt(stmt);
        }
        self.indent -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl { name, init, .. } => match init {
                Some(init) => self.line(&format!("var {name} := {}", unparse_expr(init))),
                None => self.line(&format!("var {name}")),
            },
            Stmt::Assign { target, value, .. } => {
                self.line(&format!(
                    "{} := {}",
                    unparse_expr(target),
                    unparse_expr(value)
                ));
            }
            Stmt::If { arms, else_body, .. } => {
                self.if_stmt(arms, else_body.as_deref());
            }
            Stmt::While { cond, body, .. } => {
                self.line(&format!("while {} loop", unparse_expr(cond)));
                self.block(body);
                self.line("end");
            }
            Stmt::Loop { body, .. } => {
                self.line("loop");
                self.block(body);
                self.line("end");
            }
            Stmt::Return { value, .. } => match value {
                Some(value) => self.line(&format!("return {}", unparse_expr(value))),
                None => self.line("return"),
            },
            Stmt::Break { .. } => self.line("break"),
            Stmt::Expr { expr, .. } => self.line(&unparse_expr(expr)),
        }
    }

    fn if_stmt(&mut self, arms: &[IfArm], else_body: Option<&[Stmt]>) {
        for (i, arm) in arms.iter().enumerate() {
            let keyword = if i == 0 { "if" } else { "elif" };
            self.line(&format!("{keyword} {} then", unparse_expr(&arm.cond)));
            self.block(&arm.body);
        }
        if let Some(body) = else_body {
            self.line("else");
            self.block(body);
        }
        self.line("end");
    }
}

/// Binding strength of a binary operator; higher binds tighter.
fn precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => 1,
        BinaryOp::And => 2,
        BinaryOp::Eq | BinaryOp::Ne => 3,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 4,
        BinaryOp::Add | BinaryOp::Sub => 5,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 6,
    }
}

fn write_expr(out: &mut String, expr: &Expr, min_prec: u8) {
    match expr {
        Expr::Literal(literal) => write_literal(out, literal),
        Expr::Identifier(name) => out.push_str(name),
        Expr::This => out.push_str("this"),
        Expr::New { class, args } => {
            out.push_str("new ");
            out.push_str(class);
            write_args(out, args);
        }
        Expr::Call { receiver, method, args } => {
            if let Some(receiver) = receiver {
                write_postfix_receiver(out, receiver);
                out.push('.');
            }
            out.push_str(method);
            write_args(out, args);
        }
        Expr::FieldAccess { receiver, field } => {
            write_postfix_receiver(out, receiver);
            out.push('.');
            out.push_str(field);
        }
        Expr::IndexAccess { receiver, index } => {
            write_postfix_receiver(out, receiver);
            out.push('[');
            write_expr(out, index, 0);
            out.push(']');
        }
        Expr::Binary { op, lhs, rhs } => {
            let prec = precedence(*op);
            let parens = prec < min_prec;
            if parens {
                out.push('(');
            }
            write_expr(out, lhs, prec);
            out.push(' ');
            out.push_str(op.symbol());
            out.push(' ');
            // Left-associative: a right operand at the same level needs parens.
            write_expr(out, rhs, prec + 1);
            if parens {
                out.push(')');
            }
        }
        Expr::Unary { op, operand } => {
            match op {
                UnaryOp::Neg => out.push('-'),
                UnaryOp::Not => out.push_str("not "),
            }
            let needs_parens = matches!(operand.as_ref(), Expr::Binary { .. });
            if needs_parens {
                out.push('(');
            }
            write_expr(out, operand, u8::MAX);
            if needs_parens {
                out.push(')');
            }
        }
    }
}

/// Postfix receivers bind tightest, so binary/unary receivers are wrapped.
fn write_postfix_receiver(out: &mut String, receiver: &Expr) {
    let needs_parens = matches!(receiver, Expr::Binary { .. } | Expr::Unary { .. });
    if needs_parens {
        out.push('(');
    }
    write_expr(out, receiver, 0);
    if needs_parens {
        out.push(')');
    }
}

fn write_args(out: &mut String, args: &[Expr]) {
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, arg, 0);
    }
    out.push(')');
}

fn write_literal(out: &mut String, literal: &Literal) {
    match literal {
        Literal::Integer(value) => out.push_str(&value.to_string()),
        Literal::Real(value) => {
            // Keep a decimal point so the text re-lexes as a real.
            if value.fract() == 0.0 && value.is_finite() {
                out.push_str(&format!("{value:.1}"));
            } else {
                out.push_str(&value.to_string());
            }
        }
        Literal::Boolean(value) => out.push_str(if *value { "true" } else { "false" }),
        Literal::Str(value) => {
            out.push('"');
            for c in value.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    '\0' => out.push_str("\\0"),
                    _ => out.push(c),
                }
            }
            out.push('"');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::{lex, parse};
    use pretty_assertions::assert_eq;

    fn roundtrip(source: &str) -> String {
        let program = parse(lex(source).expect("lexes")).expect("parses");
        unparse_program(&program)
    }

    #[test]
    fn class_with_fields_and_methods() {
        let out = roundtrip(
            "class Point extends Base is\n\
             var x\n\
             var y\n\
             method init(x0, y0) is\n\
             x := x0\n\
             y := y0\n\
             end\n\
             end\n",
        );
        assert_eq!(
            out,
            "class Point extends Base is\n  var x\n  var y\n  method init(x0, y0) is\n    x := x0\n    y := y0\n  end\nend\n"
        );
    }

    #[test]
    fn short_method_form_is_resugared() {
        let out = roundtrip("class A is\nmethod get() is\nreturn 41 + 1\nend\nend\n");
        assert_eq!(out, "class A is\n  method get() => 41 + 1\nend\n");
    }

    #[test]
    fn if_elif_else_layout() {
        let out = roundtrip(
            "class A is\n\
             method m(x) is\n\
             if x < 0 then\n\
             return 0 - 1\n\
             elif x == 0 then\n\
             return 0\n\
             else\n\
             return 1\n\
             end\n\
             end\n\
             end\n",
        );
        assert!(out.contains("    if x < 0 then\n      return 0 - 1\n    elif x == 0 then"));
        assert!(out.contains("    else\n      return 1\n    end\n"));
    }

    #[test]
    fn precedence_parentheses_survive() {
        let program = parse(lex("class A is\nmethod m(a, b, c) => (a + b) * c\nend\n").unwrap())
            .unwrap();
        let expr = match &program.classes[0].methods[0].body[0] {
            Stmt::Return { value: Some(v), .. } => v.clone(),
            other => panic!("unexpected body {other:?}"),
        };
        assert_eq!(unparse_expr(&expr), "(a + b) * c");
    }

    #[test]
    fn redundant_parentheses_are_dropped() {
        let program = parse(lex("class A is\nmethod m(a, b, c) => a * b + c\nend\n").unwrap())
            .unwrap();
        let expr = match &program.classes[0].methods[0].body[0] {
            Stmt::Return { value: Some(v), .. } => v.clone(),
            other => panic!("unexpected body {other:?}"),
        };
        assert_eq!(unparse_expr(&expr), "a * b + c");
    }

    #[test]
    fn reals_keep_their_decimal_point() {
        assert_eq!(
            unparse_expr(&Expr::Literal(Literal::Real(3.0))),
            "3.0"
        );
        assert_eq!(
            unparse_expr(&Expr::Literal(Literal::Real(3.25))),
            "3.25"
        );
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(
            unparse_expr(&Expr::Literal(Literal::Str("a\"b\n".into()))),
            "\"a\\\"b\\n\""
        );
    }

    #[test]
    fn unparse_reparses_to_the_same_tree() {
        let source = "class Main is\n\
                      var total\n\
                      method init() is\n\
                      total := 0\n\
                      end\n\
                      method add(n) is\n\
                      total := total + n\n\
                      while total > 100 loop\n\
                      total := total - 100\n\
                      end\n\
                      end\n\
                      method Main() is\n\
                      var m := new Main()\n\
                      m.add(7)\n\
                      io.PrintInteger(m.total)\n\
                      end\n\
                      end\n";
        let program = parse(lex(source).unwrap()).unwrap();
        let printed = unparse_program(&program);
        let reparsed = parse(lex(&printed).unwrap()).unwrap();
        // Lines differ after reformatting, so compare unparsed text instead.
        assert_eq!(unparse_program(&reparsed), printed);
    }
}

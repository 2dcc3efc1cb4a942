// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Recursive descent parser for Oxbow source code.
//!
//! The parser consumes the full token sequence and produces a [`Program`],
//! or fails fast with a [`ParseError`] positioned at the offending token.
//! There is no statement-level recovery: one syntax error terminates
//! parsing for the whole unit (the surrounding pipeline carries the error
//! into the aggregate result).
//!
//! Expression parsing is precedence climbing over the fixed operator
//! ladder: `or` < `and` < `== !=` < `< <= > >=` < `+ -` < `* / %` <
//! unary < postfix (call, field access, indexing).
//!
//! # Example
//!
//! ```
//! use oxbow_core::source_analysis::{lex, parse};
//!
//! let tokens = lex("class A is end").unwrap();
//! let program = parse(tokens).unwrap();
//! assert_eq!(program.classes.len(), 1);
//! ```

use ecow::EcoString;

use crate::ast::{
    BinaryOp, ClassDecl, Expr, FieldDecl, IfArm, Literal, MethodDecl, Program, Stmt, UnaryOp,
};

use super::{ParseError, Token, TokenKind};

/// Maximum expression nesting before the parser bails out.
///
/// Guards against stack overflow on pathological input like `((((((...`.
const MAX_NESTING_DEPTH: usize = 64;

/// Parses a full token sequence (terminated by `Eof`) into a [`Program`].
///
/// # Errors
///
/// Returns the first [`ParseError`] encountered; nothing after it is
/// parsed.
pub fn parse(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
    nesting_depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(
            tokens.last().is_some_and(|t| t.kind().is_eof()),
            "token stream must be Eof-terminated"
        );
        Self {
            tokens,
            current: 0,
            nesting_depth: 0,
        }
    }

    // ------------------------------------------------------------------
    // Token management
    // ------------------------------------------------------------------

    fn current_token(&self) -> &Token {
        self.tokens
            .get(self.current)
            .unwrap_or_else(|| self.tokens.last().expect("non-empty token stream"))
    }

    fn current_kind(&self) -> &TokenKind {
        self.current_token().kind()
    }

    fn is_at_end(&self) -> bool {
        self.current_kind().is_eof()
    }

    fn advance(&mut self) -> Token {
        let token = self.current_token().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes a token of the given kind or fails with "expected X,
    /// found Y" at the current token.
    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!(
                "expected {what}, found {}",
                self.current_kind().describe()
            )))
        }
    }

    /// Consumes an identifier and returns its name.
    fn expect_identifier(&mut self, what: &str) -> Result<EcoString, ParseError> {
        if let TokenKind::Identifier(name) = self.current_kind() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error_here(format!(
                "expected {what}, found {}",
                self.current_kind().describe()
            )))
        }
    }

    fn error_here(&self, message: impl Into<EcoString>) -> ParseError {
        let token = self.current_token();
        ParseError::new(message, token.span(), token.line(), token.column())
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut classes = Vec::new();
        while !self.is_at_end() {
            classes.push(self.parse_class()?);
        }
        Ok(Program { classes })
    }

    fn parse_class(&mut self) -> Result<ClassDecl, ParseError> {
        let class_token = self.expect(&TokenKind::Class, "`class`")?;
        let line = class_token.line();
        let name = self.expect_identifier("class name")?;

        let superclass = if self.match_token(&TokenKind::Extends) {
            Some(self.expect_identifier("superclass name")?)
        } else {
            None
        };

        self.expect(&TokenKind::Is, "`is`")?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        loop {
            match self.current_kind() {
                TokenKind::Var => {
                    let var_token = self.advance();
                    let name = self.expect_identifier("field name")?;
                    fields.push(FieldDecl {
                        name,
                        line: var_token.line(),
                    });
                }
                TokenKind::Method => methods.push(self.parse_method()?),
                TokenKind::End => {
                    self.advance();
                    break;
                }
                _ => {
                    return Err(self.error_here(format!(
                        "expected `var`, `method` or `end` in class body, found {}",
                        self.current_kind().describe()
                    )));
                }
            }
        }

        Ok(ClassDecl {
            name,
            superclass,
            fields,
            methods,
            line,
        })
    }

    fn parse_method(&mut self) -> Result<MethodDecl, ParseError> {
        let method_token = self.expect(&TokenKind::Method, "`method`")?;
        let line = method_token.line();
        let name = self.expect_identifier("method name")?;

        self.expect(&TokenKind::LeftParen, "`(`")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                params.push(self.expect_identifier("parameter name")?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "`)`")?;

        // Short form `=> expr` desugars to a single return.
        if self.match_token(&TokenKind::FatArrow) {
            let expr_line = self.current_token().line();
            let value = self.parse_expr()?;
            return Ok(MethodDecl {
                name,
                params,
                body: vec![Stmt::Return {
                    value: Some(value),
                    line: expr_line,
                }],
                line,
            });
        }

        // Block form, with the `is` mirroring the class header optional.
        self.match_token(&TokenKind::Is);
        let body = self.parse_block()?;
        self.expect(&TokenKind::End, "`end`")?;
        Ok(MethodDecl {
            name,
            params,
            body,
            line,
        })
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Parses statements up to (not consuming) `end`, `elif` or `else`.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        while !matches!(
            self.current_kind(),
            TokenKind::End | TokenKind::Elif | TokenKind::Else | TokenKind::Eof
        ) {
            body.push(self.parse_stmt()?);
        }
        Ok(body)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.current_token().line();
        match self.current_kind() {
            TokenKind::Var => {
                self.advance();
                let name = self.expect_identifier("variable name")?;
                let init = if self.match_token(&TokenKind::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(Stmt::VarDecl { name, init, line })
            }
            TokenKind::If => self.parse_if(line),
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::Loop, "`loop`")?;
                let body = self.parse_block()?;
                self.expect(&TokenKind::End, "`end`")?;
                Ok(Stmt::While { cond, body, line })
            }
            TokenKind::Loop => {
                self.advance();
                let body = self.parse_block()?;
                self.expect(&TokenKind::End, "`end`")?;
                Ok(Stmt::Loop { body, line })
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.starts_expression() {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(Stmt::Return { value, line })
            }
            TokenKind::Break => {
                self.advance();
                Ok(Stmt::Break { line })
            }
            _ => {
                let expr = self.parse_expr()?;
                if self.match_token(&TokenKind::Assign) {
                    if !matches!(
                        expr,
                        Expr::Identifier(_) | Expr::FieldAccess { .. } | Expr::IndexAccess { .. }
                    ) {
                        return Err(self.error_here(
                            "assignment target must be a variable, field or index expression",
                        ));
                    }
                    let value = self.parse_expr()?;
                    Ok(Stmt::Assign {
                        target: expr,
                        value,
                        line,
                    })
                } else {
                    Ok(Stmt::Expr { expr, line })
                }
            }
        }
    }

    fn parse_if(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect(&TokenKind::If, "`if`")?;
        let mut arms = Vec::new();

        let cond = self.parse_expr()?;
        self.expect(&TokenKind::Then, "`then`")?;
        let body = self.parse_block()?;
        arms.push(IfArm { cond, body });

        while self.match_token(&TokenKind::Elif) {
            let cond = self.parse_expr()?;
            self.expect(&TokenKind::Then, "`then`")?;
            let body = self.parse_block()?;
            arms.push(IfArm { cond, body });
        }

        let else_body = if self.match_token(&TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };

        self.expect(&TokenKind::End, "`end`")?;
        Ok(Stmt::If {
            arms,
            else_body,
            line,
        })
    }

    /// Returns `true` if the current token can begin an expression; used
    /// to decide whether `return` carries a value.
    fn starts_expression(&self) -> bool {
        use super::TokenCategory;
        let kind = self.current_kind();
        kind.is_in(TokenCategory::Literal)
            || matches!(
                kind,
                TokenKind::Identifier(_)
                    | TokenKind::This
                    | TokenKind::New
                    | TokenKind::LeftParen
                    | TokenKind::Minus
                    | TokenKind::Not
            )
    }

    // ------------------------------------------------------------------
    // Expressions (precedence climbing)
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.nesting_depth += 1;
        if self.nesting_depth > MAX_NESTING_DEPTH {
            return Err(self.error_here("expression is nested too deeply"));
        }
        let result = self.parse_or();
        self.nesting_depth -= 1;
        result
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.match_token(&TokenKind::Or) {
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_equality()?;
        while self.match_token(&TokenKind::And) {
            let rhs = self.parse_equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::EqualEqual => BinaryOp::Eq,
                TokenKind::NotEqual => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::Less => BinaryOp::Lt,
                TokenKind::LessEqual => BinaryOp::Le,
                TokenKind::Greater => BinaryOp::Gt,
                TokenKind::GreaterEqual => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current_kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Not => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.match_token(&TokenKind::Dot) {
                let name = self.expect_identifier("member name after `.`")?;
                if self.check(&TokenKind::LeftParen) {
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        receiver: Some(Box::new(expr)),
                        method: name,
                        args,
                    };
                } else {
                    expr = Expr::FieldAccess {
                        receiver: Box::new(expr),
                        field: name,
                    };
                }
            } else if self.match_token(&TokenKind::LeftBracket) {
                let index = self.parse_expr()?;
                self.expect(&TokenKind::RightBracket, "`]`")?;
                expr = Expr::IndexAccess {
                    receiver: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current_kind().clone() {
            TokenKind::Integer(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::Integer(value)))
            }
            TokenKind::Real(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::Real(value)))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(value)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            TokenKind::This => {
                self.advance();
                Ok(Expr::This)
            }
            TokenKind::New => {
                self.advance();
                let class = self.expect_identifier("class name after `new`")?;
                let args = self.parse_args()?;
                Ok(Expr::New { class, args })
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LeftParen) {
                    let args = self.parse_args()?;
                    Ok(Expr::Call {
                        receiver: None,
                        method: name,
                        args,
                    })
                } else {
                    Ok(Expr::Identifier(name))
                }
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RightParen, "`)`")?;
                Ok(expr)
            }
            other => Err(self.error_here(format!(
                "expected an expression, found {}",
                other.describe()
            ))),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(&TokenKind::LeftParen, "`(`")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "`)`")?;
        Ok(args)
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::lex;
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> Program {
        parse(lex(source).expect("lexes")).expect("parses")
    }

    fn parse_err(source: &str) -> ParseError {
        parse(lex(source).expect("lexes")).expect_err("should fail")
    }

    #[test]
    fn empty_class() {
        let program = parse_source("class A is end");
        assert_eq!(program.classes.len(), 1);
        let class = &program.classes[0];
        assert_eq!(class.name, "A");
        assert_eq!(class.superclass, None);
        assert!(class.fields.is_empty());
        assert!(class.methods.is_empty());
    }

    #[test]
    fn class_with_superclass_and_members() {
        let program = parse_source(
            "class Dog extends Animal is\n  var name\n  method speak() => 1\nend",
        );
        let class = &program.classes[0];
        assert_eq!(class.superclass.as_deref(), Some("Animal"));
        assert_eq!(class.fields[0].name, "name");
        assert_eq!(class.methods[0].name, "speak");
    }

    #[test]
    fn short_form_desugars_to_return() {
        let program = parse_source("class A is method two() => 1 + 1 end");
        let body = &program.classes[0].methods[0].body;
        assert!(matches!(body[0], Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn method_block_form_with_and_without_is() {
        let with_is = parse_source("class A is method f() is return 1 end end");
        let without = parse_source("class A is method f() return 1 end end");
        assert_eq!(
            with_is.classes[0].methods[0].body,
            without.classes[0].methods[0].body
        );
    }

    #[test]
    fn if_elif_else_chain() {
        let program = parse_source(
            "class A is method f(x) is\n\
             if x < 0 then return 1\n\
             elif x == 0 then return 2\n\
             else return 3 end\n\
             end end",
        );
        let body = &program.classes[0].methods[0].body;
        let Stmt::If {
            arms, else_body, ..
        } = &body[0]
        else {
            panic!("expected if statement");
        };
        assert_eq!(arms.len(), 2);
        assert!(else_body.is_some());
    }

    #[test]
    fn operator_precedence() {
        let program = parse_source("class A is method f() => 1 + 2 * 3 end");
        let Stmt::Return {
            value: Some(expr), ..
        } = &program.classes[0].methods[0].body[0]
        else {
            panic!("expected return");
        };
        // `+` at the root, `*` nested on the right.
        let Expr::Binary { op, rhs, .. } = expr else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            rhs.as_ref(),
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn assignment_targets() {
        let program = parse_source(
            "class A is var f method m(i) is\n\
             this.f := 1\n\
             i := 2\n\
             this.f[i] := 3\n\
             end end",
        );
        let body = &program.classes[0].methods[0].body;
        assert!(matches!(
            body[0],
            Stmt::Assign {
                target: Expr::FieldAccess { .. },
                ..
            }
        ));
        assert!(matches!(
            body[1],
            Stmt::Assign {
                target: Expr::Identifier(_),
                ..
            }
        ));
        assert!(matches!(
            body[2],
            Stmt::Assign {
                target: Expr::IndexAccess { .. },
                ..
            }
        ));
    }

    #[test]
    fn invalid_assignment_target_rejected() {
        let err = parse_err("class A is method m() is 1 + 2 := 3 end end");
        assert!(err.message.contains("assignment target"));
    }

    #[test]
    fn bare_return_takes_no_value_before_end() {
        let program = parse_source("class A is method m() is return end end");
        assert!(matches!(
            program.classes[0].methods[0].body[0],
            Stmt::Return { value: None, .. }
        ));
    }

    #[test]
    fn implicit_this_call_and_new() {
        let program =
            parse_source("class A is method m() is var x := helper(new B(1), this) end end");
        let Stmt::VarDecl {
            init: Some(Expr::Call {
                receiver, args, ..
            }),
            ..
        } = &program.classes[0].methods[0].body[0]
        else {
            panic!("expected var with call initializer");
        };
        assert!(receiver.is_none());
        assert!(matches!(args[0], Expr::New { .. }));
        assert!(matches!(args[1], Expr::This));
    }

    #[test]
    fn missing_end_is_positioned_at_eof() {
        let err = parse_err("class A is method m() is return 1");
        assert!(err.message.contains("expected `end`"));
    }

    #[test]
    fn statement_lines_follow_leading_tokens() {
        let program = parse_source("class A is method m() is\nvar x := 1\nx := 2\nend end");
        let body = &program.classes[0].methods[0].body;
        assert_eq!(body[0].line(), 2);
        assert_eq!(body[1].line(), 3);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let open = "(".repeat(80);
        let close = ")".repeat(80);
        let source = format!("class A is method m() => {open}1{close} end");
        let err = parse_err(&source);
        assert!(err.message.contains("nested too deeply"));
    }
}

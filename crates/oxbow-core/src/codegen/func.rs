// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Method body emission.
//!
//! Every user method compiles to one wasm function taking `this` plus its
//! declared parameters and returning one value, all of them box addresses.
//! Falling off the end of a method yields a null-standing zero integer box.
//!
//! Method dispatch is static. The receiver class is known for `this` and
//! implicit-this calls, for `new C(..)` receivers, and for locals whose
//! last assignment was a `new` expression (the flow-local hint); anything
//! else is a generation error. `and`/`or` evaluate both operands; there is
//! no short-circuiting in the runtime.

use std::collections::HashMap;

use ecow::EcoString;

use crate::ast::{BinaryOp, Expr, IfArm, Literal, MethodDecl, Stmt, UnaryOp};
use crate::builtins;

use super::encoder::{op, InstrSink, ValType};
use super::helpers::Helper;
use super::imports::{self, HostParam, HostResult};
use super::layout;
use super::{ClassInfo, GenError, ModuleCx};

/// One named local binding: its slot and, when known, the class of the
/// object it holds.
struct Slot {
    index: u32,
    hint: Option<EcoString>,
}

pub(crate) struct FuncEmitter<'a> {
    cx: &'a ModuleCx,
    class: &'a ClassInfo,
    sink: InstrSink,
    /// Locals allocated beyond the parameters.
    extra_locals: u32,
    param_count: u32,
    scopes: Vec<HashMap<EcoString, Slot>>,
    /// Structured-control nesting depth, for `break` label arithmetic.
    ctrl_depth: u32,
    /// Depth of the exit block of each enclosing loop.
    loop_exits: Vec<u32>,
}

impl<'a> FuncEmitter<'a> {
    pub(crate) fn new(cx: &'a ModuleCx, class: &'a ClassInfo, method: &MethodDecl) -> Self {
        let mut scopes = vec![HashMap::new()];
        // Slot 0 is `this`; declared parameters follow.
        for (i, param) in method.params.iter().enumerate() {
            scopes[0].insert(
                param.clone(),
                Slot {
                    index: i as u32 + 1,
                    hint: None,
                },
            );
        }
        Self {
            cx,
            class,
            sink: InstrSink::new(),
            extra_locals: 0,
            param_count: method.params.len() as u32 + 1,
            scopes,
            ctrl_depth: 0,
            loop_exits: Vec::new(),
        }
    }

    /// Emits the whole method and returns the finished code entry.
    pub(crate) fn emit(mut self, method: &MethodDecl) -> Result<Vec<u8>, GenError> {
        for stmt in &method.body {
            self.stmt(stmt)?;
        }
        // Implicit result when control falls off the end.
        self.sink.i32_const(0);
        call(&mut self.sink, Helper::BoxInt);
        Ok(self.sink.finish(&[(self.extra_locals, ValType::I32)]))
    }

    fn alloc_local(&mut self) -> u32 {
        let index = self.param_count + self.extra_locals;
        self.extra_locals += 1;
        index
    }

    fn lookup(&self, name: &str) -> Option<&Slot> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn set_hint(&mut self, name: &str, hint: Option<EcoString>) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                slot.hint = hint;
                return;
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), GenError> {
        match stmt {
            Stmt::VarDecl { name, init, line } => {
                let hint = match init {
                    Some(Expr::New { class, .. }) => Some(class.clone()),
                    _ => None,
                };
                match init {
                    Some(init) => self.expr(init, *line)?,
                    None => {
                        self.sink.i32_const(0);
                        call(&mut self.sink, Helper::BoxInt);
                    }
                }
                let index = self.alloc_local();
                self.sink.op_u32(op::LOCAL_SET, index);
                self.scopes
                    .last_mut()
                    .expect("method scope is open")
                    .insert(name.clone(), Slot { index, hint });
                Ok(())
            }
            Stmt::Assign { target, value, line } => self.assign(target, value, *line),
            Stmt::If { arms, else_body, line } => {
                self.if_chain(arms, else_body.as_deref(), *line)
            }
            Stmt::While { cond, body, line } => {
                self.sink.open(op::BLOCK);
                self.ctrl_depth += 1;
                self.loop_exits.push(self.ctrl_depth);
                self.sink.open(op::LOOP);
                self.ctrl_depth += 1;
                self.truthy(cond, *line)?;
                self.sink.op(op::I32_EQZ);
                self.sink.op_u32(op::BR_IF, 1);
                self.block(body)?;
                self.sink.op_u32(op::BR, 0);
                self.sink.op(op::END);
                self.sink.op(op::END);
                self.ctrl_depth -= 2;
                self.loop_exits.pop();
                Ok(())
            }
            Stmt::Loop { body, .. } => {
                self.sink.open(op::BLOCK);
                self.ctrl_depth += 1;
                self.loop_exits.push(self.ctrl_depth);
                self.sink.open(op::LOOP);
                self.ctrl_depth += 1;
                self.block(body)?;
                self.sink.op_u32(op::BR, 0);
                self.sink.op(op::END);
                self.sink.op(op::END);
                self.ctrl_depth -= 2;
                self.loop_exits.pop();
                Ok(())
            }
            Stmt::Return { value, line } => {
                match value {
                    Some(value) => self.expr(value, *line)?,
                    None => {
                        self.sink.i32_const(0);
                        call(&mut self.sink, Helper::BoxInt);
                    }
                }
                self.sink.op(op::RETURN);
                Ok(())
            }
            Stmt::Break { line } => {
                let Some(exit) = self.loop_exits.last() else {
                    return Err(GenError::BreakOutsideLoop { line: *line });
                };
                self.sink.op_u32(op::BR, self.ctrl_depth - exit);
                Ok(())
            }
            Stmt::Expr { expr, line } => {
                self.expr(expr, *line)?;
                self.sink.op(op::DROP);
                Ok(())
            }
        }
    }

    fn block(&mut self, stmts: &[Stmt]) -> Result<(), GenError> {
        self.scopes.push(HashMap::new());
        let result = stmts.iter().try_for_each(|stmt| self.stmt(stmt));
        self.scopes.pop();
        result
    }

    fn if_chain(
        &mut self,
        arms: &[IfArm],
        else_body: Option<&[Stmt]>,
        line: u32,
    ) -> Result<(), GenError> {
        let Some((arm, rest)) = arms.split_first() else {
            if let Some(body) = else_body {
                return self.block(body);
            }
            return Ok(());
        };
        self.truthy(&arm.cond, line)?;
        self.sink.open(op::IF);
        self.ctrl_depth += 1;
        self.block(&arm.body)?;
        if !rest.is_empty() || else_body.is_some() {
            self.sink.op(op::ELSE);
            self.if_chain(rest, else_body, line)?;
        }
        self.sink.op(op::END);
        self.ctrl_depth -= 1;
        Ok(())
    }

    fn assign(&mut self, target: &Expr, value: &Expr, line: u32) -> Result<(), GenError> {
        match target {
            Expr::Identifier(name) => {
                if let Some(slot) = self.lookup(name) {
                    let index = slot.index;
                    self.expr(value, line)?;
                    self.sink.op_u32(op::LOCAL_SET, index);
                    let hint = match value {
                        Expr::New { class, .. } => Some(class.clone()),
                        _ => None,
                    };
                    self.set_hint(name, hint);
                    Ok(())
                } else if let Some(offset) = self.cx.field_offset(&self.class.name, name) {
                    self.sink.op_u32(op::LOCAL_GET, 0);
                    self.expr(value, line)?;
                    self.sink.i32_store(offset);
                    Ok(())
                } else {
                    Err(GenError::UnknownVariable {
                        name: name.clone(),
                        line,
                    })
                }
            }
            Expr::FieldAccess { receiver, field } => {
                let class = self.receiver_class(Some(receiver), field, line)?;
                let offset = self.cx.field_offset(&class, field).ok_or_else(|| {
                    GenError::UnknownField {
                        class: class.clone(),
                        field: field.clone(),
                        line,
                    }
                })?;
                self.expr(receiver, line)?;
                self.expr(value, line)?;
                self.sink.i32_store(offset);
                Ok(())
            }
            Expr::IndexAccess { receiver, index } => {
                self.expr(receiver, line)?;
                self.expr(index, line)?;
                self.expr(value, line)?;
                call(&mut self.sink, Helper::IndexSet);
                self.sink.op(op::DROP);
                Ok(())
            }
            // The parser only produces the three shapes above.
            other => Err(GenError::UnknownVariable {
                name: EcoString::from(crate::unparse::unparse_expr(other)),
                line,
            }),
        }
    }

    /// Evaluates a condition down to a raw i32.
    fn truthy(&mut self, cond: &Expr, line: u32) -> Result<(), GenError> {
        self.expr(cond, line)?;
        call(&mut self.sink, Helper::Truthy);
        Ok(())
    }

    fn expr(&mut self, expr: &Expr, line: u32) -> Result<(), GenError> {
        match expr {
            Expr::Literal(literal) => self.literal(literal, line),
            Expr::Identifier(name) => {
                if let Some(index) = self.lookup(name).map(|slot| slot.index) {
                    self.sink.op_u32(op::LOCAL_GET, index);
                    Ok(())
                } else if let Some(offset) = self.cx.field_offset(&self.class.name, name) {
                    self.sink.op_u32(op::LOCAL_GET, 0);
                    self.sink.i32_load(offset);
                    Ok(())
                } else {
                    Err(GenError::UnknownVariable {
                        name: name.clone(),
                        line,
                    })
                }
            }
            Expr::This => {
                self.sink.op_u32(op::LOCAL_GET, 0);
                Ok(())
            }
            Expr::New { class, args } => self.construct(class, args, line),
            Expr::Call { receiver, method, args } => {
                self.call_expr(receiver.as_deref(), method, args, line)
            }
            Expr::FieldAccess { receiver, field } => {
                let class = self.receiver_class(Some(receiver), field, line)?;
                let offset = self.cx.field_offset(&class, field).ok_or_else(|| {
                    GenError::UnknownField {
                        class: class.clone(),
                        field: field.clone(),
                        line,
                    }
                })?;
                self.expr(receiver, line)?;
                self.sink.i32_load(offset);
                Ok(())
            }
            Expr::IndexAccess { receiver, index } => {
                self.expr(receiver, line)?;
                self.expr(index, line)?;
                call(&mut self.sink, Helper::IndexGet);
                Ok(())
            }
            Expr::Binary { op: bin_op, lhs, rhs } => {
                self.expr(lhs, line)?;
                self.expr(rhs, line)?;
                call(&mut self.sink, binary_helper(*bin_op));
                Ok(())
            }
            Expr::Unary { op: un_op, operand } => {
                self.expr(operand, line)?;
                let helper = match un_op {
                    UnaryOp::Neg => Helper::Neg,
                    UnaryOp::Not => Helper::Not,
                };
                call(&mut self.sink, helper);
                Ok(())
            }
        }
    }

    fn literal(&mut self, literal: &Literal, line: u32) -> Result<(), GenError> {
        match literal {
            Literal::Integer(value) => {
                let value = i32::try_from(*value).map_err(|_| GenError::IntegerOverflow {
                    value: *value,
                    line,
                })?;
                self.sink.i32_const(value);
                call(&mut self.sink, Helper::BoxInt);
            }
            Literal::Real(value) => {
                self.sink.f64_const(*value);
                call(&mut self.sink, Helper::BoxReal);
            }
            Literal::Boolean(value) => {
                self.sink.i32_const(i32::from(*value));
                call(&mut self.sink, Helper::BoxBool);
            }
            Literal::Str(value) => {
                let address = self
                    .cx
                    .strings
                    .get(value)
                    .copied()
                    .expect("string literal interned during collection");
                self.sink.i32_const(address as i32);
            }
        }
        Ok(())
    }

    fn construct(&mut self, class: &EcoString, args: &[Expr], line: u32) -> Result<(), GenError> {
        if let Some(builtin) = builtins::builtin_class(class) {
            if builtin.constructor_arity != args.len() {
                return Err(GenError::ArityMismatch {
                    name: class.clone(),
                    expected: builtin.constructor_arity,
                    actual: args.len(),
                    line,
                });
            }
            for arg in args {
                self.expr(arg, line)?;
            }
            let helper = match class.as_str() {
                "Array" => Helper::ArrayNew,
                "List" => Helper::ListNew,
                _ => Helper::MapNew,
            };
            call(&mut self.sink, helper);
            return Ok(());
        }

        let info = self.cx.classes.get(class).ok_or_else(|| GenError::UnknownClass {
            class: class.clone(),
            line,
        })?;
        let tmp = self.alloc_local();
        self.sink
            .i32_const(layout::object_box_size(info.fields.len() as u32) as i32);
        call(&mut self.sink, Helper::Alloc);
        self.sink.op_u32(op::LOCAL_SET, tmp);
        self.sink.op_u32(op::LOCAL_GET, tmp);
        self.sink.i32_const(info.tag);
        self.sink.i32_store(0);
        // Fields start as zero integer boxes so reads never see a null.
        for field_index in 0..info.fields.len() as u32 {
            self.sink.op_u32(op::LOCAL_GET, tmp);
            self.sink.i32_const(0);
            call(&mut self.sink, Helper::BoxInt);
            self.sink.i32_store(layout::field_offset(field_index));
        }
        match self.cx.resolve_method(class, "init") {
            Some(init) => {
                if init.arity != args.len() {
                    return Err(GenError::ArityMismatch {
                        name: class.clone(),
                        expected: init.arity,
                        actual: args.len(),
                        line,
                    });
                }
                self.sink.op_u32(op::LOCAL_GET, tmp);
                for arg in args {
                    self.expr(arg, line)?;
                }
                self.sink.op_u32(op::CALL, init.index);
                self.sink.op(op::DROP);
            }
            None if !args.is_empty() => {
                return Err(GenError::ArityMismatch {
                    name: class.clone(),
                    expected: 0,
                    actual: args.len(),
                    line,
                });
            }
            None => {}
        }
        self.sink.op_u32(op::LOCAL_GET, tmp);
        Ok(())
    }

    fn call_expr(
        &mut self,
        receiver: Option<&Expr>,
        method: &EcoString,
        args: &[Expr],
        line: u32,
    ) -> Result<(), GenError> {
        // Host-namespace calls, unless a binding shadows the namespace name.
        if let Some(Expr::Identifier(ns)) = receiver {
            if imports::is_host_namespace(ns)
                && self.lookup(ns).is_none()
                && self.cx.field_offset(&self.class.name, ns).is_none()
            {
                return self.host_call(ns, method, args, line);
            }
        }

        let class = self.receiver_class(receiver, method, line)?;
        if builtins::builtin_class(&class).is_some() {
            return self.builtin_call(&class, method, receiver, args, line);
        }

        let target = self.cx.resolve_method(&class, method).ok_or_else(|| {
            GenError::UnknownMethod {
                class: class.clone(),
                method: method.clone(),
                line,
            }
        })?;
        if target.arity != args.len() {
            return Err(GenError::ArityMismatch {
                name: method.clone(),
                expected: target.arity,
                actual: args.len(),
                line,
            });
        }
        match receiver {
            None => self.sink.op_u32(op::LOCAL_GET, 0),
            Some(receiver) => self.expr(receiver, line)?,
        }
        for arg in args {
            self.expr(arg, line)?;
        }
        self.sink.op_u32(op::CALL, target.index);
        Ok(())
    }

    fn host_call(
        &mut self,
        namespace: &EcoString,
        name: &EcoString,
        args: &[Expr],
        line: u32,
    ) -> Result<(), GenError> {
        let import = imports::lookup(namespace, name).ok_or_else(|| {
            GenError::UnknownHostFunction {
                namespace: namespace.clone(),
                name: name.clone(),
                line,
            }
        })?;
        if import.params.len() != args.len() {
            return Err(GenError::ArityMismatch {
                name: name.clone(),
                expected: import.params.len(),
                actual: args.len(),
                line,
            });
        }
        for (arg, param) in args.iter().zip(import.params) {
            self.expr(arg, line)?;
            match param {
                HostParam::RawInt => call(&mut self.sink, Helper::UnboxInt),
                HostParam::Real => call(&mut self.sink, Helper::UnboxReal),
                HostParam::Boxed => {}
            }
        }
        let index = imports::function_index(namespace, name).expect("import exists");
        self.sink.op_u32(op::CALL, index);
        match import.result {
            HostResult::None => {
                self.sink.i32_const(0);
                call(&mut self.sink, Helper::BoxInt);
            }
            HostResult::RawInt => call(&mut self.sink, Helper::BoxInt),
            HostResult::RawBool => call(&mut self.sink, Helper::BoxBool),
            HostResult::Real => call(&mut self.sink, Helper::BoxReal),
            HostResult::Boxed => {}
        }
        Ok(())
    }

    fn builtin_call(
        &mut self,
        class: &str,
        method: &EcoString,
        receiver: Option<&Expr>,
        args: &[Expr],
        line: u32,
    ) -> Result<(), GenError> {
        let Some((helper, arity)) = builtin_helper(class, method) else {
            return Err(GenError::UnknownMethod {
                class: class.into(),
                method: method.clone(),
                line,
            });
        };
        if arity != args.len() {
            return Err(GenError::ArityMismatch {
                name: method.clone(),
                expected: arity,
                actual: args.len(),
                line,
            });
        }
        match receiver {
            None => self.sink.op_u32(op::LOCAL_GET, 0),
            Some(receiver) => self.expr(receiver, line)?,
        }
        for arg in args {
            self.expr(arg, line)?;
        }
        call(&mut self.sink, helper);
        Ok(())
    }

    /// The statically known class of a call or field-access receiver.
    fn receiver_class(
        &self,
        receiver: Option<&Expr>,
        context: &str,
        line: u32,
    ) -> Result<EcoString, GenError> {
        match receiver {
            None | Some(Expr::This) => Ok(self.class.name.clone()),
            Some(Expr::New { class, .. }) => Ok(class.clone()),
            Some(Expr::Identifier(name)) => self
                .lookup(name)
                .and_then(|slot| slot.hint.clone())
                .ok_or_else(|| GenError::UnresolvableReceiver {
                    name: context.into(),
                    line,
                }),
            Some(_) => Err(GenError::UnresolvableReceiver {
                name: context.into(),
                line,
            }),
        }
    }
}

fn call(sink: &mut InstrSink, helper: Helper) {
    sink.op_u32(op::CALL, helper.index());
}

fn binary_helper(op: BinaryOp) -> Helper {
    match op {
        BinaryOp::Add => Helper::Add,
        BinaryOp::Sub => Helper::Sub,
        BinaryOp::Mul => Helper::Mul,
        BinaryOp::Div => Helper::Div,
        BinaryOp::Mod => Helper::Mod,
        BinaryOp::Lt => Helper::Lt,
        BinaryOp::Le => Helper::Le,
        BinaryOp::Gt => Helper::Gt,
        BinaryOp::Ge => Helper::Ge,
        BinaryOp::Eq => Helper::Eq,
        BinaryOp::Ne => Helper::Ne,
        BinaryOp::And => Helper::And,
        BinaryOp::Or => Helper::Or,
    }
}

/// Routes a builtin-class method to its runtime helper.
fn builtin_helper(class: &str, method: &str) -> Option<(Helper, usize)> {
    let helper = match (class, method) {
        ("Array", "get") => (Helper::ArrayGet, 1),
        ("Array", "set") => (Helper::ArraySet, 2),
        ("Array", "length") => (Helper::ArrayLen, 0),
        ("List", "append") => (Helper::ListAppend, 1),
        ("List", "get") => (Helper::ListGet, 1),
        ("List", "length") => (Helper::ListLen, 0),
        ("Map", "get") => (Helper::MapGet, 1),
        ("Map", "set") => (Helper::MapSet, 2),
        ("Map", "contains") => (Helper::MapContains, 1),
        _ => return None,
    };
    Some(helper)
}

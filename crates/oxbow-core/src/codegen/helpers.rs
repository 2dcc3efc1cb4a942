// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Module-internal runtime helper functions.
//!
//! Every generated module carries the same fixed set of helpers right after
//! the imports: the bump allocator, boxing/unboxing, tag-dispatching
//! arithmetic and comparison, and the array/list/map builtins. Arithmetic
//! keeps int/int in the integer domain and promotes anything else to real.
//! Collection `get` never traps on a missing entry; it yields a fresh zero
//! integer box instead. Helpers rely on linear memory being zeroed: the
//! allocator never reuses space, so fresh allocations need no clearing.

use super::encoder::{op, InstrSink, ValType};
use super::imports;
use super::layout;

/// The helpers, in function-index order after the imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Helper {
    Alloc,
    BoxInt,
    BoxBool,
    BoxReal,
    UnboxInt,
    UnboxReal,
    Truthy,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Not,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    KeyEq,
    ArrayNew,
    ArrayGet,
    ArraySet,
    ArrayLen,
    ListNew,
    ListAppend,
    ListGet,
    ListLen,
    MapNew,
    MapSet,
    MapGet,
    MapContains,
    IndexGet,
    IndexSet,
}

impl Helper {
    pub(crate) const ALL: [Helper; 37] = [
        Helper::Alloc,
        Helper::BoxInt,
        Helper::BoxBool,
        Helper::BoxReal,
        Helper::UnboxInt,
        Helper::UnboxReal,
        Helper::Truthy,
        Helper::Add,
        Helper::Sub,
        Helper::Mul,
        Helper::Div,
        Helper::Mod,
        Helper::Neg,
        Helper::Not,
        Helper::Lt,
        Helper::Le,
        Helper::Gt,
        Helper::Ge,
        Helper::Eq,
        Helper::Ne,
        Helper::And,
        Helper::Or,
        Helper::KeyEq,
        Helper::ArrayNew,
        Helper::ArrayGet,
        Helper::ArraySet,
        Helper::ArrayLen,
        Helper::ListNew,
        Helper::ListAppend,
        Helper::ListGet,
        Helper::ListLen,
        Helper::MapNew,
        Helper::MapSet,
        Helper::MapGet,
        Helper::MapContains,
        Helper::IndexGet,
        Helper::IndexSet,
    ];

    /// The helper's wasm function index.
    pub(crate) fn index(self) -> u32 {
        let position = Self::ALL
            .iter()
            .position(|h| *h == self)
            .expect("helper listed in ALL");
        imports::import_count() + position as u32
    }

    pub(crate) fn params(self) -> &'static [ValType] {
        use ValType::{F64, I32};
        match self {
            Helper::Alloc
            | Helper::BoxInt
            | Helper::BoxBool
            | Helper::UnboxInt
            | Helper::UnboxReal
            | Helper::Truthy
            | Helper::Neg
            | Helper::Not
            | Helper::ArrayNew
            | Helper::ArrayLen
            | Helper::ListLen => &[I32],
            Helper::BoxReal => &[F64],
            Helper::ListNew | Helper::MapNew => &[],
            Helper::Add
            | Helper::Sub
            | Helper::Mul
            | Helper::Div
            | Helper::Mod
            | Helper::Lt
            | Helper::Le
            | Helper::Gt
            | Helper::Ge
            | Helper::Eq
            | Helper::Ne
            | Helper::And
            | Helper::Or
            | Helper::KeyEq
            | Helper::ArrayGet
            | Helper::ListAppend
            | Helper::ListGet
            | Helper::MapGet
            | Helper::MapContains
            | Helper::IndexGet => &[I32, I32],
            Helper::ArraySet | Helper::MapSet | Helper::IndexSet => &[I32, I32, I32],
        }
    }

    pub(crate) fn results(self) -> &'static [ValType] {
        match self {
            Helper::UnboxReal => &[ValType::F64],
            _ => &[ValType::I32],
        }
    }

    /// Emits the helper's finished code-section entry.
    pub(crate) fn emit(self) -> Vec<u8> {
        match self {
            Helper::Alloc => emit_alloc(),
            Helper::BoxInt => emit_box_scalar(layout::TAG_INT),
            Helper::BoxBool => emit_box_scalar(layout::TAG_BOOL),
            Helper::BoxReal => emit_box_real(),
            Helper::UnboxInt => emit_payload_load(),
            Helper::UnboxReal => emit_unbox_real(),
            Helper::Truthy => emit_payload_load(),
            Helper::Add => emit_arith(op::I32_ADD, op::F64_ADD),
            Helper::Sub => emit_arith(op::I32_SUB, op::F64_SUB),
            Helper::Mul => emit_arith(op::I32_MUL, op::F64_MUL),
            Helper::Div => emit_arith(op::I32_DIV_S, op::F64_DIV),
            Helper::Mod => emit_mod(),
            Helper::Neg => emit_neg(),
            Helper::Not => emit_not(),
            Helper::Lt => emit_compare(op::I32_LT_S, op::F64_LT),
            Helper::Le => emit_compare(op::I32_LE_S, op::F64_LE),
            Helper::Gt => emit_compare(op::I32_GT_S, op::F64_GT),
            Helper::Ge => emit_compare(op::I32_GE_S, op::F64_GE),
            Helper::Eq => emit_compare(op::I32_EQ, op::F64_EQ),
            Helper::Ne => emit_compare(op::I32_NE, op::F64_NE),
            Helper::And => emit_logic(op::I32_AND),
            Helper::Or => emit_logic(op::I32_OR),
            Helper::KeyEq => emit_key_eq(),
            Helper::ArrayNew => emit_array_new(),
            Helper::ArrayGet => emit_array_get(),
            Helper::ArraySet => emit_array_set(),
            Helper::ArrayLen => emit_array_len(),
            Helper::ListNew => emit_aggregate_new(layout::TAG_LIST),
            Helper::ListAppend => emit_list_append(),
            Helper::ListGet => emit_list_get(),
            Helper::ListLen => emit_list_len(),
            Helper::MapNew => emit_aggregate_new(layout::TAG_MAP),
            Helper::MapSet => emit_map_set(),
            Helper::MapGet => emit_map_get(),
            Helper::MapContains => emit_map_contains(),
            Helper::IndexGet => emit_index_get(),
            Helper::IndexSet => emit_index_set(),
        }
    }
}

fn call(s: &mut InstrSink, helper: Helper) {
    s.op_u32(op::CALL, helper.index());
}

fn local_get(s: &mut InstrSink, index: u32) {
    s.op_u32(op::LOCAL_GET, index);
}

fn local_set(s: &mut InstrSink, index: u32) {
    s.op_u32(op::LOCAL_SET, index);
}

/// Loads the tag word of the box whose address is local `index`.
fn load_tag(s: &mut InstrSink, index: u32) {
    local_get(s, index);
    s.i32_load(0);
}

/// Loads the scalar payload word of the box at local `index`.
fn load_payload(s: &mut InstrSink, index: u32) {
    local_get(s, index);
    s.i32_load(layout::PAYLOAD_OFFSET);
}

/// `(size) -> address`; rounds the size up to word alignment and bumps the
/// allocator word.
fn emit_alloc() -> Vec<u8> {
    let mut s = InstrSink::new();
    // size = (size + 3) & -4
    local_get(&mut s, 0);
    s.i32_const(3);
    s.op(op::I32_ADD);
    s.i32_const(-4);
    s.op(op::I32_AND);
    local_set(&mut s, 0);
    // ptr = *HEAP_PTR
    s.i32_const(layout::HEAP_PTR_ADDR as i32);
    s.i32_load(0);
    local_set(&mut s, 1);
    // *HEAP_PTR = ptr + size
    s.i32_const(layout::HEAP_PTR_ADDR as i32);
    local_get(&mut s, 1);
    local_get(&mut s, 0);
    s.op(op::I32_ADD);
    s.i32_store(0);
    local_get(&mut s, 1);
    s.finish(&[(1, ValType::I32)])
}

/// `(value) -> box` for int/bool tags.
fn emit_box_scalar(tag: i32) -> Vec<u8> {
    let mut s = InstrSink::new();
    s.i32_const(layout::SCALAR_BOX_SIZE as i32);
    call(&mut s, Helper::Alloc);
    local_set(&mut s, 1);
    local_get(&mut s, 1);
    s.i32_const(tag);
    s.i32_store(0);
    local_get(&mut s, 1);
    local_get(&mut s, 0);
    s.i32_store(layout::PAYLOAD_OFFSET);
    local_get(&mut s, 1);
    s.finish(&[(1, ValType::I32)])
}

fn emit_box_real() -> Vec<u8> {
    let mut s = InstrSink::new();
    s.i32_const(layout::REAL_BOX_SIZE as i32);
    call(&mut s, Helper::Alloc);
    local_set(&mut s, 1);
    local_get(&mut s, 1);
    s.i32_const(layout::TAG_REAL);
    s.i32_store(0);
    local_get(&mut s, 1);
    local_get(&mut s, 0);
    s.f64_store(layout::REAL_PAYLOAD_OFFSET);
    local_get(&mut s, 1);
    s.finish(&[(1, ValType::I32)])
}

/// Shared body of `UnboxInt` and `Truthy`: the scalar payload word.
fn emit_payload_load() -> Vec<u8> {
    let mut s = InstrSink::new();
    load_payload(&mut s, 0);
    s.finish(&[])
}

/// `(box) -> f64`; promotes int/bool payloads.
fn emit_unbox_real() -> Vec<u8> {
    let mut s = InstrSink::new();
    load_tag(&mut s, 0);
    s.i32_const(layout::TAG_REAL);
    s.op(op::I32_EQ);
    s.open_typed(op::IF, ValType::F64);
    local_get(&mut s, 0);
    s.f64_load(layout::REAL_PAYLOAD_OFFSET);
    s.op(op::ELSE);
    load_payload(&mut s, 0);
    s.op(op::F64_CONVERT_I32_S);
    s.op(op::END);
    s.finish(&[])
}

/// Pushes `1` when both operand boxes are integers (tag 0).
fn both_int_test(s: &mut InstrSink) {
    load_tag(s, 0);
    load_tag(s, 1);
    s.op(op::I32_OR);
    s.op(op::I32_EQZ);
}

fn real_operands(s: &mut InstrSink) {
    local_get(s, 0);
    call(s, Helper::UnboxReal);
    local_get(s, 1);
    call(s, Helper::UnboxReal);
}

/// `(box, box) -> box`; int/int stays int, otherwise promoted to real.
fn emit_arith(int_op: u8, real_op: u8) -> Vec<u8> {
    let mut s = InstrSink::new();
    both_int_test(&mut s);
    s.open_typed(op::IF, ValType::I32);
    load_payload(&mut s, 0);
    load_payload(&mut s, 1);
    s.op(int_op);
    call(&mut s, Helper::BoxInt);
    s.op(op::ELSE);
    real_operands(&mut s);
    s.op(real_op);
    call(&mut s, Helper::BoxReal);
    s.op(op::END);
    s.finish(&[])
}

/// Real remainder has no opcode: `a - trunc(a / b) * b`.
fn emit_mod() -> Vec<u8> {
    let mut s = InstrSink::new();
    both_int_test(&mut s);
    s.open_typed(op::IF, ValType::I32);
    load_payload(&mut s, 0);
    load_payload(&mut s, 1);
    s.op(op::I32_REM_S);
    call(&mut s, Helper::BoxInt);
    s.op(op::ELSE);
    local_get(&mut s, 0);
    call(&mut s, Helper::UnboxReal);
    local_set(&mut s, 2);
    local_get(&mut s, 1);
    call(&mut s, Helper::UnboxReal);
    local_set(&mut s, 3);
    local_get(&mut s, 2);
    local_get(&mut s, 2);
    local_get(&mut s, 3);
    s.op(op::F64_DIV);
    s.op(op::F64_TRUNC);
    local_get(&mut s, 3);
    s.op(op::F64_MUL);
    s.op(op::F64_SUB);
    call(&mut s, Helper::BoxReal);
    s.op(op::END);
    s.finish(&[(2, ValType::F64)])
}

fn emit_neg() -> Vec<u8> {
    let mut s = InstrSink::new();
    load_tag(&mut s, 0);
    s.op(op::I32_EQZ);
    s.open_typed(op::IF, ValType::I32);
    s.i32_const(0);
    load_payload(&mut s, 0);
    s.op(op::I32_SUB);
    call(&mut s, Helper::BoxInt);
    s.op(op::ELSE);
    local_get(&mut s, 0);
    call(&mut s, Helper::UnboxReal);
    s.op(op::F64_NEG);
    call(&mut s, Helper::BoxReal);
    s.op(op::END);
    s.finish(&[])
}

fn emit_not() -> Vec<u8> {
    let mut s = InstrSink::new();
    load_payload(&mut s, 0);
    s.op(op::I32_EQZ);
    call(&mut s, Helper::BoxBool);
    s.finish(&[])
}

/// `(box, box) -> bool box` comparison with the arithmetic promotion rule.
fn emit_compare(int_op: u8, real_op: u8) -> Vec<u8> {
    let mut s = InstrSink::new();
    both_int_test(&mut s);
    s.open_typed(op::IF, ValType::I32);
    load_payload(&mut s, 0);
    load_payload(&mut s, 1);
    s.op(int_op);
    s.op(op::ELSE);
    real_operands(&mut s);
    s.op(real_op);
    s.op(op::END);
    call(&mut s, Helper::BoxBool);
    s.finish(&[])
}

/// `(box, box) -> bool box` on payload truthiness.
fn emit_logic(bit_op: u8) -> Vec<u8> {
    let mut s = InstrSink::new();
    load_payload(&mut s, 0);
    s.i32_const(0);
    s.op(op::I32_NE);
    load_payload(&mut s, 1);
    s.i32_const(0);
    s.op(op::I32_NE);
    s.op(bit_op);
    call(&mut s, Helper::BoxBool);
    s.finish(&[])
}

/// `(box, box) -> raw i32` key equality for map lookups. Interned string
/// boxes compare by address; numeric keys by payload.
fn emit_key_eq() -> Vec<u8> {
    let mut s = InstrSink::new();
    local_get(&mut s, 0);
    local_get(&mut s, 1);
    s.op(op::I32_EQ);
    s.open_typed(op::IF, ValType::I32);
    s.i32_const(1);
    s.op(op::ELSE);
    load_tag(&mut s, 0);
    load_tag(&mut s, 1);
    s.op(op::I32_NE);
    s.open_typed(op::IF, ValType::I32);
    s.i32_const(0);
    s.op(op::ELSE);
    load_tag(&mut s, 0);
    s.i32_const(layout::TAG_REAL);
    s.op(op::I32_EQ);
    s.open_typed(op::IF, ValType::I32);
    local_get(&mut s, 0);
    s.f64_load(layout::REAL_PAYLOAD_OFFSET);
    local_get(&mut s, 1);
    s.f64_load(layout::REAL_PAYLOAD_OFFSET);
    s.op(op::F64_EQ);
    s.op(op::ELSE);
    load_payload(&mut s, 0);
    load_payload(&mut s, 1);
    s.op(op::I32_EQ);
    s.op(op::END);
    s.op(op::END);
    s.op(op::END);
    s.finish(&[])
}

/// `(length box) -> array box` with a separate zeroed data buffer.
fn emit_array_new() -> Vec<u8> {
    let mut s = InstrSink::new();
    // locals: 1 = length, 2 = array box
    local_get(&mut s, 0);
    call(&mut s, Helper::UnboxInt);
    local_set(&mut s, 1);
    s.i32_const(layout::ARRAY_BOX_SIZE as i32);
    call(&mut s, Helper::Alloc);
    local_set(&mut s, 2);
    local_get(&mut s, 2);
    s.i32_const(layout::TAG_ARRAY);
    s.i32_store(0);
    local_get(&mut s, 2);
    local_get(&mut s, 1);
    s.i32_store(layout::ARRAY_LEN_OFFSET);
    local_get(&mut s, 2);
    s.i32_const(layout::ELEM_TAG_BOXED);
    s.i32_store(layout::ARRAY_ELEM_TAG_OFFSET);
    local_get(&mut s, 2);
    local_get(&mut s, 1);
    s.i32_const(layout::ARRAY_ELEM_SIZE as i32);
    s.op(op::I32_MUL);
    call(&mut s, Helper::Alloc);
    s.i32_store(layout::ARRAY_DATA_OFFSET);
    local_get(&mut s, 2);
    s.i32_const(layout::ARRAY_ELEM_SIZE as i32);
    s.i32_store(layout::ARRAY_ELEM_SIZE_OFFSET);
    local_get(&mut s, 2);
    s.finish(&[(2, ValType::I32)])
}

/// Pushes the address of element `index_box` of the array in local 0.
fn array_cell_address(s: &mut InstrSink) {
    local_get(s, 0);
    s.i32_load(layout::ARRAY_DATA_OFFSET);
    local_get(s, 1);
    call(s, Helper::UnboxInt);
    s.i32_const(layout::ARRAY_ELEM_SIZE as i32);
    s.op(op::I32_MUL);
    s.op(op::I32_ADD);
}

/// Turns a possibly-null box address in local `index` into a real box.
fn null_to_zero_box(s: &mut InstrSink, index: u32) {
    local_get(s, index);
    s.op(op::I32_EQZ);
    s.open_typed(op::IF, ValType::I32);
    s.i32_const(0);
    call(s, Helper::BoxInt);
    s.op(op::ELSE);
    local_get(s, index);
    s.op(op::END);
}

fn emit_array_get() -> Vec<u8> {
    let mut s = InstrSink::new();
    array_cell_address(&mut s);
    s.i32_load(0);
    local_set(&mut s, 2);
    null_to_zero_box(&mut s, 2);
    s.finish(&[(1, ValType::I32)])
}

fn emit_array_set() -> Vec<u8> {
    let mut s = InstrSink::new();
    array_cell_address(&mut s);
    local_get(&mut s, 2);
    s.i32_store(0);
    local_get(&mut s, 2);
    s.finish(&[])
}

fn emit_array_len() -> Vec<u8> {
    let mut s = InstrSink::new();
    local_get(&mut s, 0);
    s.i32_load(layout::ARRAY_LEN_OFFSET);
    call(&mut s, Helper::BoxInt);
    s.finish(&[])
}

/// `() -> box` for the head-pointer aggregates; the head starts null
/// because fresh memory is zero.
fn emit_aggregate_new(tag: i32) -> Vec<u8> {
    let mut s = InstrSink::new();
    s.i32_const(layout::LIST_BOX_SIZE as i32);
    call(&mut s, Helper::Alloc);
    local_set(&mut s, 0);
    local_get(&mut s, 0);
    s.i32_const(tag);
    s.i32_store(0);
    local_get(&mut s, 0);
    s.finish(&[(1, ValType::I32)])
}

/// `(list box, value box) -> value box`; walks to the tail cell.
fn emit_list_append() -> Vec<u8> {
    let mut s = InstrSink::new();
    // locals: 2 = new cell, 3 = cursor
    s.i32_const(layout::LIST_CELL_SIZE as i32);
    call(&mut s, Helper::Alloc);
    local_set(&mut s, 2);
    local_get(&mut s, 2);
    local_get(&mut s, 1);
    s.i32_store(layout::LIST_CELL_VALUE_OFFSET);
    local_get(&mut s, 0);
    s.i32_load(layout::LIST_HEAD_OFFSET);
    s.op(op::I32_EQZ);
    s.open(op::IF);
    local_get(&mut s, 0);
    local_get(&mut s, 2);
    s.i32_store(layout::LIST_HEAD_OFFSET);
    s.op(op::ELSE);
    local_get(&mut s, 0);
    s.i32_load(layout::LIST_HEAD_OFFSET);
    local_set(&mut s, 3);
    s.open(op::BLOCK);
    s.open(op::LOOP);
    local_get(&mut s, 3);
    s.i32_load(layout::LIST_CELL_NEXT_OFFSET);
    s.op(op::I32_EQZ);
    s.op_u32(op::BR_IF, 1);
    local_get(&mut s, 3);
    s.i32_load(layout::LIST_CELL_NEXT_OFFSET);
    local_set(&mut s, 3);
    s.op_u32(op::BR, 0);
    s.op(op::END);
    s.op(op::END);
    local_get(&mut s, 3);
    local_get(&mut s, 2);
    s.i32_store(layout::LIST_CELL_NEXT_OFFSET);
    s.op(op::END);
    local_get(&mut s, 1);
    s.finish(&[(2, ValType::I32)])
}

/// `(list box, index box) -> value box`; missing entries yield a zero box.
fn emit_list_get() -> Vec<u8> {
    let mut s = InstrSink::new();
    // locals: 2 = remaining index, 3 = cursor, 4 = value
    local_get(&mut s, 1);
    call(&mut s, Helper::UnboxInt);
    local_set(&mut s, 2);
    local_get(&mut s, 0);
    s.i32_load(layout::LIST_HEAD_OFFSET);
    local_set(&mut s, 3);
    s.open(op::BLOCK);
    s.open(op::LOOP);
    local_get(&mut s, 3);
    s.op(op::I32_EQZ);
    s.op_u32(op::BR_IF, 1);
    local_get(&mut s, 2);
    s.op(op::I32_EQZ);
    s.open(op::IF);
    local_get(&mut s, 3);
    s.i32_load(layout::LIST_CELL_VALUE_OFFSET);
    local_set(&mut s, 4);
    s.op_u32(op::BR, 2);
    s.op(op::END);
    local_get(&mut s, 2);
    s.i32_const(1);
    s.op(op::I32_SUB);
    local_set(&mut s, 2);
    local_get(&mut s, 3);
    s.i32_load(layout::LIST_CELL_NEXT_OFFSET);
    local_set(&mut s, 3);
    s.op_u32(op::BR, 0);
    s.op(op::END);
    s.op(op::END);
    null_to_zero_box(&mut s, 4);
    s.finish(&[(3, ValType::I32)])
}

fn emit_list_len() -> Vec<u8> {
    let mut s = InstrSink::new();
    // locals: 1 = cursor, 2 = count
    local_get(&mut s, 0);
    s.i32_load(layout::LIST_HEAD_OFFSET);
    local_set(&mut s, 1);
    s.open(op::BLOCK);
    s.open(op::LOOP);
    local_get(&mut s, 1);
    s.op(op::I32_EQZ);
    s.op_u32(op::BR_IF, 1);
    local_get(&mut s, 2);
    s.i32_const(1);
    s.op(op::I32_ADD);
    local_set(&mut s, 2);
    local_get(&mut s, 1);
    s.i32_load(layout::LIST_CELL_NEXT_OFFSET);
    local_set(&mut s, 1);
    s.op_u32(op::BR, 0);
    s.op(op::END);
    s.op(op::END);
    local_get(&mut s, 2);
    call(&mut s, Helper::BoxInt);
    s.finish(&[(2, ValType::I32)])
}

/// `(map box, key box, value box) -> value box`; prepends, so the newest
/// node for a key shadows older ones.
fn emit_map_set() -> Vec<u8> {
    let mut s = InstrSink::new();
    // locals: 3 = node
    s.i32_const(layout::MAP_NODE_SIZE as i32);
    call(&mut s, Helper::Alloc);
    local_set(&mut s, 3);
    local_get(&mut s, 3);
    local_get(&mut s, 1);
    s.i32_store(layout::MAP_NODE_KEY_OFFSET);
    local_get(&mut s, 3);
    local_get(&mut s, 2);
    s.i32_store(layout::MAP_NODE_VALUE_OFFSET);
    // tag pair: key tag in the high half-word, value tag in the low
    local_get(&mut s, 3);
    local_get(&mut s, 1);
    s.i32_load(0);
    s.i32_const(16);
    s.op(op::I32_SHL);
    local_get(&mut s, 2);
    s.i32_load(0);
    s.op(op::I32_OR);
    s.i32_store(layout::MAP_NODE_TAGS_OFFSET);
    local_get(&mut s, 3);
    local_get(&mut s, 0);
    s.i32_load(layout::MAP_HEAD_OFFSET);
    s.i32_store(layout::MAP_NODE_NEXT_OFFSET);
    local_get(&mut s, 0);
    local_get(&mut s, 3);
    s.i32_store(layout::MAP_HEAD_OFFSET);
    local_get(&mut s, 2);
    s.finish(&[(1, ValType::I32)])
}

/// `(map box, key box) -> value box`; missing keys yield a zero box.
fn emit_map_get() -> Vec<u8> {
    let mut s = InstrSink::new();
    // locals: 2 = node, 3 = value
    local_get(&mut s, 0);
    s.i32_load(layout::MAP_HEAD_OFFSET);
    local_set(&mut s, 2);
    s.open(op::BLOCK);
    s.open(op::LOOP);
    local_get(&mut s, 2);
    s.op(op::I32_EQZ);
    s.op_u32(op::BR_IF, 1);
    local_get(&mut s, 2);
    s.i32_load(layout::MAP_NODE_KEY_OFFSET);
    local_get(&mut s, 1);
    call(&mut s, Helper::KeyEq);
    s.open(op::IF);
    local_get(&mut s, 2);
    s.i32_load(layout::MAP_NODE_VALUE_OFFSET);
    local_set(&mut s, 3);
    s.op_u32(op::BR, 2);
    s.op(op::END);
    local_get(&mut s, 2);
    s.i32_load(layout::MAP_NODE_NEXT_OFFSET);
    local_set(&mut s, 2);
    s.op_u32(op::BR, 0);
    s.op(op::END);
    s.op(op::END);
    null_to_zero_box(&mut s, 3);
    s.finish(&[(2, ValType::I32)])
}

fn emit_map_contains() -> Vec<u8> {
    let mut s = InstrSink::new();
    // locals: 2 = node, 3 = found
    local_get(&mut s, 0);
    s.i32_load(layout::MAP_HEAD_OFFSET);
    local_set(&mut s, 2);
    s.open(op::BLOCK);
    s.open(op::LOOP);
    local_get(&mut s, 2);
    s.op(op::I32_EQZ);
    s.op_u32(op::BR_IF, 1);
    local_get(&mut s, 2);
    s.i32_load(layout::MAP_NODE_KEY_OFFSET);
    local_get(&mut s, 1);
    call(&mut s, Helper::KeyEq);
    s.open(op::IF);
    s.i32_const(1);
    local_set(&mut s, 3);
    s.op_u32(op::BR, 2);
    s.op(op::END);
    local_get(&mut s, 2);
    s.i32_load(layout::MAP_NODE_NEXT_OFFSET);
    local_set(&mut s, 2);
    s.op_u32(op::BR, 0);
    s.op(op::END);
    s.op(op::END);
    local_get(&mut s, 3);
    call(&mut s, Helper::BoxBool);
    s.finish(&[(2, ValType::I32)])
}

/// `(box, index box) -> box` dispatching on the receiver's tag.
fn emit_index_get() -> Vec<u8> {
    let mut s = InstrSink::new();
    load_tag(&mut s, 0);
    s.i32_const(layout::TAG_ARRAY);
    s.op(op::I32_EQ);
    s.open_typed(op::IF, ValType::I32);
    local_get(&mut s, 0);
    local_get(&mut s, 1);
    call(&mut s, Helper::ArrayGet);
    s.op(op::ELSE);
    load_tag(&mut s, 0);
    s.i32_const(layout::TAG_LIST);
    s.op(op::I32_EQ);
    s.open_typed(op::IF, ValType::I32);
    local_get(&mut s, 0);
    local_get(&mut s, 1);
    call(&mut s, Helper::ListGet);
    s.op(op::ELSE);
    local_get(&mut s, 0);
    local_get(&mut s, 1);
    call(&mut s, Helper::MapGet);
    s.op(op::END);
    s.op(op::END);
    s.finish(&[])
}

/// `(box, index box, value box) -> value box`; arrays and maps are
/// writable through indexing, anything else traps.
fn emit_index_set() -> Vec<u8> {
    let mut s = InstrSink::new();
    load_tag(&mut s, 0);
    s.i32_const(layout::TAG_ARRAY);
    s.op(op::I32_EQ);
    s.open_typed(op::IF, ValType::I32);
    local_get(&mut s, 0);
    local_get(&mut s, 1);
    local_get(&mut s, 2);
    call(&mut s, Helper::ArraySet);
    s.op(op::ELSE);
    load_tag(&mut s, 0);
    s.i32_const(layout::TAG_MAP);
    s.op(op::I32_EQ);
    s.open_typed(op::IF, ValType::I32);
    local_get(&mut s, 0);
    local_get(&mut s, 1);
    local_get(&mut s, 2);
    call(&mut s, Helper::MapSet);
    s.op(op::ELSE);
    s.op(op::UNREACHABLE);
    s.op(op::END);
    s.op(op::END);
    s.finish(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_the_imports() {
        assert_eq!(Helper::Alloc.index(), imports::import_count());
        assert_eq!(
            Helper::IndexSet.index(),
            imports::import_count() + Helper::ALL.len() as u32 - 1
        );
    }

    #[test]
    fn every_helper_emits_a_terminated_body() {
        for helper in Helper::ALL {
            let body = helper.emit();
            assert!(body.len() > 2, "{helper:?} body too small");
            assert!(body.ends_with(&[op::END]), "{helper:?} missing end");
        }
    }

    #[test]
    fn signatures_are_consistent() {
        assert_eq!(Helper::BoxReal.params(), &[ValType::F64]);
        assert_eq!(Helper::UnboxReal.results(), &[ValType::F64]);
        assert_eq!(Helper::MapSet.params().len(), 3);
        assert_eq!(Helper::ListNew.params().len(), 0);
    }
}

// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Low-level wasm binary writing: LEB128 integers, vectors, sections and
//! the handful of opcodes the generator emits.
//!
//! Everything here appends to plain `Vec<u8>` buffers; the module assembler
//! in `codegen` stitches the section payloads together in the order the
//! format requires.

/// A wasm value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValType {
    I32,
    F64,
}

impl ValType {
    /// The binary encoding of the type.
    #[must_use]
    pub const fn byte(self) -> u8 {
        match self {
            Self::I32 => 0x7F,
            Self::F64 => 0x7C,
        }
    }
}

/// Section identifiers, in the order sections must appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SectionId {
    Type = 1,
    Import = 2,
    Function = 3,
    Memory = 5,
    Export = 7,
    Code = 10,
    Data = 11,
}

/// The fixed 8-byte module prefix: magic `\0asm` plus version 1.
pub const MODULE_PREFIX: [u8; 8] = [0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];

/// Appends an unsigned LEB128 integer.
pub fn write_u32(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

/// Appends a signed LEB128 integer.
pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    write_i64(out, i64::from(value));
}

/// Appends a signed LEB128 integer (64-bit form).
pub fn write_i64(out: &mut Vec<u8>, mut value: i64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        let sign_clear = byte & 0x40 == 0;
        if (value == 0 && sign_clear) || (value == -1 && !sign_clear) {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

/// Appends a little-endian IEEE 754 double.
pub fn write_f64(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Appends a length-prefixed UTF-8 name.
pub fn write_name(out: &mut Vec<u8>, name: &str) {
    write_u32(out, name.len() as u32);
    out.extend_from_slice(name.as_bytes());
}

/// Appends a length-prefixed byte blob.
pub fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

/// Appends a whole section: id, payload size, payload.
///
/// Empty payloads are skipped entirely so the module never carries vacuous
/// sections.
pub fn write_section(out: &mut Vec<u8>, id: SectionId, payload: &[u8]) {
    if payload.is_empty() {
        return;
    }
    out.push(id as u8);
    write_bytes(out, payload);
}

/// Encodes a function type: `0x60`, param vec, result vec.
pub fn write_func_type(out: &mut Vec<u8>, params: &[ValType], results: &[ValType]) {
    out.push(0x60);
    write_u32(out, params.len() as u32);
    for p in params {
        out.push(p.byte());
    }
    write_u32(out, results.len() as u32);
    for r in results {
        out.push(r.byte());
    }
}

/// Opcodes used by the generator.
pub mod op {
    pub const UNREACHABLE: u8 = 0x00;
    pub const BLOCK: u8 = 0x02;
    pub const LOOP: u8 = 0x03;
    pub const IF: u8 = 0x04;
    pub const ELSE: u8 = 0x05;
    pub const END: u8 = 0x0B;
    pub const BR: u8 = 0x0C;
    pub const BR_IF: u8 = 0x0D;
    pub const RETURN: u8 = 0x0F;
    pub const CALL: u8 = 0x10;
    pub const DROP: u8 = 0x1A;
    pub const LOCAL_GET: u8 = 0x20;
    pub const LOCAL_SET: u8 = 0x21;
    pub const LOCAL_TEE: u8 = 0x22;
    pub const I32_LOAD: u8 = 0x28;
    pub const F64_LOAD: u8 = 0x2B;
    pub const I32_STORE: u8 = 0x36;
    pub const F64_STORE: u8 = 0x39;
    pub const I32_CONST: u8 = 0x41;
    pub const F64_CONST: u8 = 0x44;
    pub const I32_EQZ: u8 = 0x45;
    pub const I32_EQ: u8 = 0x46;
    pub const I32_NE: u8 = 0x47;
    pub const I32_LT_S: u8 = 0x48;
    pub const I32_GT_S: u8 = 0x4A;
    pub const I32_LE_S: u8 = 0x4C;
    pub const I32_GE_S: u8 = 0x4E;
    pub const F64_EQ: u8 = 0x61;
    pub const F64_NE: u8 = 0x62;
    pub const F64_LT: u8 = 0x63;
    pub const F64_GT: u8 = 0x64;
    pub const F64_LE: u8 = 0x65;
    pub const F64_GE: u8 = 0x66;
    pub const I32_ADD: u8 = 0x6A;
    pub const I32_SUB: u8 = 0x6B;
    pub const I32_MUL: u8 = 0x6C;
    pub const I32_DIV_S: u8 = 0x6D;
    pub const I32_REM_S: u8 = 0x6F;
    pub const I32_AND: u8 = 0x71;
    pub const I32_OR: u8 = 0x72;
    pub const I32_XOR: u8 = 0x73;
    pub const I32_SHL: u8 = 0x74;
    pub const F64_TRUNC: u8 = 0x9D;
    pub const F64_NEG: u8 = 0x9A;
    pub const F64_ADD: u8 = 0xA0;
    pub const F64_SUB: u8 = 0xA1;
    pub const F64_MUL: u8 = 0xA2;
    pub const F64_DIV: u8 = 0xA3;
    pub const F64_CONVERT_I32_S: u8 = 0xB7;

    /// Block type byte for blocks that yield nothing.
    pub const BLOCKTYPE_EMPTY: u8 = 0x40;
}

/// A small helper for emitting one function body: locals declaration plus
/// instruction stream, with the trailing `end` and size prefix applied on
/// [`InstrSink::finish`].
#[derive(Debug, Default)]
pub struct InstrSink {
    code: Vec<u8>,
}

impl InstrSink {
    /// Creates an empty instruction sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a bare opcode.
    pub fn op(&mut self, opcode: u8) {
        self.code.push(opcode);
    }

    /// Appends an opcode with one u32 immediate.
    pub fn op_u32(&mut self, opcode: u8, value: u32) {
        self.code.push(opcode);
        write_u32(&mut self.code, value);
    }

    /// `i32.const value`
    pub fn i32_const(&mut self, value: i32) {
        self.code.push(op::I32_CONST);
        write_i32(&mut self.code, value);
    }

    /// `f64.const value`
    pub fn f64_const(&mut self, value: f64) {
        self.code.push(op::F64_CONST);
        write_f64(&mut self.code, value);
    }

    /// `i32.load` with alignment 2 and the given byte offset.
    pub fn i32_load(&mut self, offset: u32) {
        self.code.push(op::I32_LOAD);
        write_u32(&mut self.code, 2);
        write_u32(&mut self.code, offset);
    }

    /// `i32.store` with alignment 2 and the given byte offset.
    pub fn i32_store(&mut self, offset: u32) {
        self.code.push(op::I32_STORE);
        write_u32(&mut self.code, 2);
        write_u32(&mut self.code, offset);
    }

    /// `f64.load` with alignment 2 (4-byte) and the given byte offset.
    pub fn f64_load(&mut self, offset: u32) {
        self.code.push(op::F64_LOAD);
        write_u32(&mut self.code, 2);
        write_u32(&mut self.code, offset);
    }

    /// `f64.store` with alignment 2 (4-byte) and the given byte offset.
    pub fn f64_store(&mut self, offset: u32) {
        self.code.push(op::F64_STORE);
        write_u32(&mut self.code, 2);
        write_u32(&mut self.code, offset);
    }

    /// Opens a block/loop/if with an empty block type.
    pub fn open(&mut self, opcode: u8) {
        self.code.push(opcode);
        self.code.push(op::BLOCKTYPE_EMPTY);
    }

    /// Opens a block/loop/if yielding one value.
    pub fn open_typed(&mut self, opcode: u8, result: ValType) {
        self.code.push(opcode);
        self.code.push(result.byte());
    }

    /// Finishes the body: prepends the locals vector, appends `end`, and
    /// returns the size-prefixed code entry.
    #[must_use]
    pub fn finish(mut self, locals: &[(u32, ValType)]) -> Vec<u8> {
        let mut body = Vec::new();
        write_u32(&mut body, locals.len() as u32);
        for (count, ty) in locals {
            write_u32(&mut body, *count);
            body.push(ty.byte());
        }
        body.append(&mut self.code);
        body.push(op::END);

        let mut entry = Vec::new();
        write_bytes(&mut entry, &body);
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uleb_known_encodings() {
        let mut out = Vec::new();
        write_u32(&mut out, 0);
        write_u32(&mut out, 127);
        write_u32(&mut out, 128);
        write_u32(&mut out, 624_485);
        assert_eq!(out, vec![0x00, 0x7F, 0x80, 0x01, 0xE5, 0x8E, 0x26]);
    }

    #[test]
    fn sleb_known_encodings() {
        let mut out = Vec::new();
        write_i32(&mut out, -1);
        assert_eq!(out, vec![0x7F]);

        let mut out = Vec::new();
        write_i32(&mut out, -123_456);
        assert_eq!(out, vec![0xC0, 0xBB, 0x78]);

        let mut out = Vec::new();
        write_i32(&mut out, 64);
        assert_eq!(out, vec![0xC0, 0x00]);
    }

    #[test]
    fn empty_sections_are_omitted() {
        let mut out = Vec::new();
        write_section(&mut out, SectionId::Type, &[]);
        assert!(out.is_empty());

        write_section(&mut out, SectionId::Type, &[0x01]);
        assert_eq!(out, vec![1, 1, 0x01]);
    }

    #[test]
    fn func_type_encoding() {
        let mut out = Vec::new();
        write_func_type(&mut out, &[ValType::I32, ValType::F64], &[ValType::I32]);
        assert_eq!(out, vec![0x60, 2, 0x7F, 0x7C, 1, 0x7F]);
    }

    #[test]
    fn sink_finish_wraps_body_with_locals_and_end() {
        let mut sink = InstrSink::new();
        sink.i32_const(1);
        let entry = sink.finish(&[(2, ValType::I32)]);
        // size, locals vec (1 group: 2 x i32), i32.const 1, end
        assert_eq!(entry, vec![6, 1, 2, 0x7F, 0x41, 0x01, 0x0B]);
    }
}

// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The linear-memory value model.
//!
//! Every runtime value is a boxed cell in linear memory, referenced by its
//! 32-bit address. A box starts with a one-word type tag followed by the
//! payload:
//!
//! | tag | kind    | layout after the tag word                          |
//! |-----|---------|----------------------------------------------------|
//! | 0   | integer | i32 value                                          |
//! | 1   | boolean | i32 0/1                                            |
//! | 2   | real    | f64 value (at offset 8 for alignment)              |
//! | 3   | string  | i32 byte length, then raw UTF-8 bytes              |
//! | 4   | array   | i32 length, i32 element tag, i32 data ptr, i32 element size |
//! | 5   | list    | i32 head-cell ptr; cell = i32 value, i32 next      |
//! | 6   | map     | i32 head-node ptr; node = i32 key, i32 value, i32 tag pair, i32 next |
//!
//! Array element cells hold box addresses (element size 4, element tag
//! [`ELEM_TAG_BOXED`]); the data buffer is a separate allocation the data
//! pointer refers to. List cell values and map node keys/values are box
//! addresses too; a map node's tag-pair word packs the key tag in the high
//! half-word and the value tag in the low one. A null (0) head pointer is
//! the empty list/map.
//!
//! Objects of user classes use tags starting at [`FIRST_CLASS_TAG`]; their
//! payload is one address word per field, in declaration order with
//! inherited fields first.
//!
//! Allocation is a bump pointer stored in the word at [`HEAP_PTR_ADDR`],
//! initialised by the data section to [`HEAP_BASE`]. There is no
//! reclamation; the allocator lives for the module instance.

/// Address of the bump-allocator pointer word.
pub const HEAP_PTR_ADDR: u32 = 4;

/// First usable heap address; everything below is reserved.
pub const HEAP_BASE: u32 = 16;

/// Type tag of boxed integers.
pub const TAG_INT: i32 = 0;
/// Type tag of boxed booleans.
pub const TAG_BOOL: i32 = 1;
/// Type tag of boxed reals.
pub const TAG_REAL: i32 = 2;
/// Type tag of boxed strings.
pub const TAG_STRING: i32 = 3;
/// Type tag of boxed arrays.
pub const TAG_ARRAY: i32 = 4;
/// Type tag of boxed lists.
pub const TAG_LIST: i32 = 5;
/// Type tag of boxed maps.
pub const TAG_MAP: i32 = 6;

/// First tag assigned to user classes, in declaration order.
pub const FIRST_CLASS_TAG: i32 = 16;

/// Element-tag value meaning "cells are box addresses".
pub const ELEM_TAG_BOXED: i32 = -1;

/// Byte offset of the scalar payload word in int/bool boxes.
pub const PAYLOAD_OFFSET: u32 = 4;
/// Byte size of an int or bool box.
pub const SCALAR_BOX_SIZE: u32 = 8;

/// Byte offset of the f64 payload in real boxes (kept 8-aligned).
pub const REAL_PAYLOAD_OFFSET: u32 = 8;
/// Byte size of a real box.
pub const REAL_BOX_SIZE: u32 = 16;

/// Byte offset of the length word in string boxes.
pub const STRING_LEN_OFFSET: u32 = 4;
/// Byte offset of the first content byte in string boxes.
pub const STRING_BYTES_OFFSET: u32 = 8;

/// Array box field offsets and size.
pub const ARRAY_LEN_OFFSET: u32 = 4;
pub const ARRAY_ELEM_TAG_OFFSET: u32 = 8;
pub const ARRAY_DATA_OFFSET: u32 = 12;
pub const ARRAY_ELEM_SIZE_OFFSET: u32 = 16;
pub const ARRAY_BOX_SIZE: u32 = 20;
/// Byte size of one array element cell (a box address).
pub const ARRAY_ELEM_SIZE: u32 = 4;

/// List box: one head pointer after the tag.
pub const LIST_HEAD_OFFSET: u32 = 4;
pub const LIST_BOX_SIZE: u32 = 8;
/// List cell field offsets and size.
pub const LIST_CELL_VALUE_OFFSET: u32 = 0;
pub const LIST_CELL_NEXT_OFFSET: u32 = 4;
pub const LIST_CELL_SIZE: u32 = 8;

/// Map box: one head pointer after the tag.
pub const MAP_HEAD_OFFSET: u32 = 4;
pub const MAP_BOX_SIZE: u32 = 8;
/// Map node field offsets and size.
pub const MAP_NODE_KEY_OFFSET: u32 = 0;
pub const MAP_NODE_VALUE_OFFSET: u32 = 4;
pub const MAP_NODE_TAGS_OFFSET: u32 = 8;
pub const MAP_NODE_NEXT_OFFSET: u32 = 12;
pub const MAP_NODE_SIZE: u32 = 16;

/// Size in bytes of an object box for a class with `field_count` fields.
#[must_use]
pub const fn object_box_size(field_count: u32) -> u32 {
    4 + field_count * 4
}

/// Byte offset of field number `index` inside an object box.
#[must_use]
pub const fn field_offset(index: u32) -> u32 {
    4 + index * 4
}

/// Size in bytes of a string box holding `byte_len` content bytes,
/// rounded up to word alignment.
#[must_use]
pub const fn string_box_size(byte_len: u32) -> u32 {
    (STRING_BYTES_OFFSET + byte_len + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_base_clears_the_allocator_word() {
        assert!(HEAP_BASE > HEAP_PTR_ADDR + 4);
    }

    #[test]
    fn class_tags_do_not_collide_with_builtins() {
        assert!(FIRST_CLASS_TAG > TAG_MAP);
    }

    #[test]
    fn object_layout() {
        assert_eq!(object_box_size(0), 4);
        assert_eq!(object_box_size(3), 16);
        assert_eq!(field_offset(0), 4);
        assert_eq!(field_offset(2), 12);
    }

    #[test]
    fn string_boxes_stay_word_aligned() {
        assert_eq!(string_box_size(0), 8);
        assert_eq!(string_box_size(1), 12);
        assert_eq!(string_box_size(4), 12);
        assert_eq!(string_box_size(5), 16);
    }

    #[test]
    fn aggregate_offsets_are_contiguous() {
        assert_eq!(ARRAY_ELEM_SIZE_OFFSET + 4, ARRAY_BOX_SIZE);
        assert_eq!(MAP_NODE_NEXT_OFFSET + 4, MAP_NODE_SIZE);
        assert_eq!(LIST_CELL_NEXT_OFFSET + 4, LIST_CELL_SIZE);
    }
}

// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Binary wasm module generation.
//!
//! The generator lowers an analysed (usually optimised) program straight to
//! the wasm binary format with no intermediate representation. A module is
//! assembled from four function groups in a fixed index order: the host
//! imports, the module-internal runtime helpers, one function per user
//! method (named `Class.method`, taking `this` plus the declared
//! parameters), and finally an exported `Main` wrapper that constructs the
//! `Main` object, runs `Main.Main` and unboxes an integer exit value.
//!
//! All user-level values live in linear memory as tagged boxes (see
//! [`layout`]); every user function parameter and result is an `i32` box
//! address. String literals are interned into the data segment, which also
//! seeds the bump-allocator word so the first runtime allocation lands just
//! past the static data.

mod encoder;
mod func;
mod helpers;
pub mod imports;
pub mod layout;

use std::collections::HashMap;

use ecow::EcoString;
use miette::Diagnostic;
use thiserror::Error;

use crate::ast::{ClassDecl, Expr, Literal, Program, Stmt};

use encoder::{op, write_bytes, write_func_type, write_i32, write_name, write_section,
    write_u32, InstrSink, SectionId, ValType, MODULE_PREFIX};
use helpers::Helper;

/// Linear memory size in 64 KiB pages. There is no `memory.grow`; programs
/// that bump-allocate past this trap in the runtime helpers.
const MEMORY_PAGES: u32 = 16;

/// A fatal code generation failure.
///
/// Generation is all-or-nothing: the first error aborts and no module bytes
/// are produced. Semantic analysis reports most of these conditions ahead
/// of time as diagnostics; the generator still refuses to emit ill-formed
/// code when it is run over an unclean program.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum GenError {
    #[error("program has no `Main` class with a zero-argument `Main` method")]
    MissingMain,

    #[error("unknown class `{class}` on line {line}")]
    UnknownClass { class: EcoString, line: u32 },

    #[error("class `{class}` has no method `{method}` (line {line})")]
    UnknownMethod {
        class: EcoString,
        method: EcoString,
        line: u32,
    },

    #[error("class `{class}` has no field `{field}` (line {line})")]
    UnknownField {
        class: EcoString,
        field: EcoString,
        line: u32,
    },

    #[error("unknown variable `{name}` on line {line}")]
    UnknownVariable { name: EcoString, line: u32 },

    #[error("cannot determine the receiver class for `{name}` on line {line}")]
    UnresolvableReceiver { name: EcoString, line: u32 },

    #[error("`{namespace}.{name}` is not a host function (line {line})")]
    UnknownHostFunction {
        namespace: EcoString,
        name: EcoString,
        line: u32,
    },

    #[error("`{name}` expects {expected} argument(s) but got {actual} (line {line})")]
    ArityMismatch {
        name: EcoString,
        expected: usize,
        actual: usize,
        line: u32,
    },

    #[error("integer literal {value} does not fit the 32-bit runtime (line {line})")]
    IntegerOverflow { value: i64, line: u32 },

    #[error("`break` outside of a loop on line {line}")]
    BreakOutsideLoop { line: u32 },

    #[error("inheritance cycle through class `{class}` (line {line})")]
    InheritanceCycle { class: EcoString, line: u32 },
}

/// Layout facts about one user class.
pub(crate) struct ClassInfo {
    pub name: EcoString,
    /// Runtime type tag, assigned from [`layout::FIRST_CLASS_TAG`] in
    /// declaration order.
    pub tag: i32,
    pub superclass: Option<EcoString>,
    /// All fields in box order: inherited fields first (root class
    /// outermost), own fields after.
    pub fields: Vec<EcoString>,
}

/// A compiled user method: its function index and declared parameter count
/// (excluding `this`).
#[derive(Debug, Clone, Copy)]
pub(crate) struct FuncRef {
    pub index: u32,
    pub arity: usize,
}

/// Module-wide tables shared by every method emitter.
pub(crate) struct ModuleCx {
    pub classes: HashMap<EcoString, ClassInfo>,
    pub functions: HashMap<(EcoString, EcoString), FuncRef>,
    /// Interned string literal box addresses.
    pub strings: HashMap<EcoString, u32>,
}

impl ModuleCx {
    /// Resolves a method through the superclass chain.
    pub(crate) fn resolve_method(&self, class: &str, method: &str) -> Option<FuncRef> {
        let mut current = class;
        // The chain cannot be longer than the class list; this also bounds
        // walks over cyclic inheritance, which fails class-table
        // construction before any method is emitted.
        for _ in 0..=self.classes.len() {
            if let Some(func) = self.functions.get(&(current.into(), method.into())) {
                return Some(*func);
            }
            current = self.classes.get(current)?.superclass.as_deref()?;
        }
        None
    }

    /// The byte offset of a field within a class box, if the class declares
    /// or inherits it.
    pub(crate) fn field_offset(&self, class: &str, field: &str) -> Option<u32> {
        let info = self.classes.get(class)?;
        let index = info.fields.iter().position(|f| f == field)?;
        Some(layout::field_offset(index as u32))
    }
}

/// Compiles a program to a complete wasm binary module.
///
/// The input is expected to have passed semantic analysis; conditions the
/// analyser only warns about (or that survive optimisation) still surface
/// here as [`GenError`]s rather than malformed bytes.
pub fn generate(program: &Program) -> Result<Vec<u8>, GenError> {
    let cx = build_context(program)?;

    let mut code_entries: Vec<Vec<u8>> = Vec::new();
    let mut func_types: Vec<(Vec<ValType>, Vec<ValType>)> = Vec::new();
    for helper in Helper::ALL {
        code_entries.push(helper.emit());
        func_types.push((helper.params().to_vec(), helper.results().to_vec()));
    }
    for class in &program.classes {
        let info = &cx.classes[&class.name];
        for method in &class.methods {
            let emitter = func::FuncEmitter::new(&cx, info, method);
            code_entries.push(emitter.emit(method)?);
            func_types.push((vec![ValType::I32; method.params.len() + 1], vec![ValType::I32]));
        }
    }
    code_entries.push(emit_main_wrapper(program, &cx)?);
    func_types.push((Vec::new(), vec![ValType::I32]));
    let wrapper_index = imports::import_count() + code_entries.len() as u32 - 1;

    let statics = build_statics(&cx);

    let mut types = TypeTable::default();
    let import_type_indices: Vec<u32> = imports::HOST_IMPORTS
        .iter()
        .map(|import| {
            let params: Vec<ValType> = import.params.iter().map(|p| p.val_type()).collect();
            types.intern(params, import.result.val_types().to_vec())
        })
        .collect();
    let defined_type_indices: Vec<u32> = func_types
        .into_iter()
        .map(|(params, results)| types.intern(params, results))
        .collect();

    let mut module = MODULE_PREFIX.to_vec();

    let mut payload = Vec::new();
    write_u32(&mut payload, types.entries.len() as u32);
    for (params, results) in &types.entries {
        write_func_type(&mut payload, params, results);
    }
    write_section(&mut module, SectionId::Type, &payload);

    payload.clear();
    write_u32(&mut payload, imports::import_count());
    for (import, type_index) in imports::HOST_IMPORTS.iter().zip(&import_type_indices) {
        write_name(&mut payload, import.module);
        write_name(&mut payload, import.name);
        payload.push(0x00); // function import
        write_u32(&mut payload, *type_index);
    }
    write_section(&mut module, SectionId::Import, &payload);

    payload.clear();
    write_u32(&mut payload, defined_type_indices.len() as u32);
    for type_index in &defined_type_indices {
        write_u32(&mut payload, *type_index);
    }
    write_section(&mut module, SectionId::Function, &payload);

    payload.clear();
    write_u32(&mut payload, 1);
    payload.push(0x00); // min only
    write_u32(&mut payload, MEMORY_PAGES);
    write_section(&mut module, SectionId::Memory, &payload);

    payload.clear();
    write_u32(&mut payload, 2);
    write_name(&mut payload, "Main");
    payload.push(0x00); // function export
    write_u32(&mut payload, wrapper_index);
    write_name(&mut payload, "memory");
    payload.push(0x02); // memory export
    write_u32(&mut payload, 0);
    write_section(&mut module, SectionId::Export, &payload);

    payload.clear();
    write_u32(&mut payload, code_entries.len() as u32);
    for entry in &code_entries {
        payload.extend_from_slice(entry);
    }
    write_section(&mut module, SectionId::Code, &payload);

    payload.clear();
    write_u32(&mut payload, 1);
    payload.push(0x00); // active segment, memory 0
    payload.push(op::I32_CONST);
    write_i32(&mut payload, layout::HEAP_PTR_ADDR as i32);
    payload.push(op::END);
    write_bytes(&mut payload, &statics);
    write_section(&mut module, SectionId::Data, &payload);

    tracing::debug!(
        classes = program.classes.len(),
        functions = defined_type_indices.len(),
        module_bytes = module.len(),
        "generated wasm module"
    );
    Ok(module)
}

/// Builds the class table, function index table and string pool.
fn build_context(program: &Program) -> Result<ModuleCx, GenError> {
    let by_name: HashMap<&str, &ClassDecl> = program
        .classes
        .iter()
        .map(|class| (class.name.as_str(), class))
        .collect();

    let mut classes = HashMap::new();
    for (position, class) in program.classes.iter().enumerate() {
        classes.insert(
            class.name.clone(),
            ClassInfo {
                name: class.name.clone(),
                tag: layout::FIRST_CLASS_TAG + position as i32,
                superclass: class.superclass.clone(),
                fields: flattened_fields(class, &by_name)?,
            },
        );
    }

    let mut functions = HashMap::new();
    let mut index = imports::import_count() + Helper::ALL.len() as u32;
    for class in &program.classes {
        for method in &class.methods {
            functions.insert(
                (class.name.clone(), method.name.clone()),
                FuncRef {
                    index,
                    arity: method.params.len(),
                },
            );
            index += 1;
        }
    }

    Ok(ModuleCx {
        classes,
        functions,
        strings: intern_strings(program),
    })
}

/// The field list of a class with all inherited fields flattened in,
/// root-most superclass first.
fn flattened_fields(
    class: &ClassDecl,
    by_name: &HashMap<&str, &ClassDecl>,
) -> Result<Vec<EcoString>, GenError> {
    let mut chain = vec![class];
    let mut current = class;
    while let Some(superclass) = &current.superclass {
        let parent = by_name.get(superclass.as_str()).ok_or_else(|| {
            GenError::UnknownClass {
                class: superclass.clone(),
                line: current.line,
            }
        })?;
        if chain.iter().any(|c| c.name == parent.name) {
            return Err(GenError::InheritanceCycle {
                class: class.name.clone(),
                line: class.line,
            });
        }
        chain.push(parent);
        current = parent;
    }
    let mut fields = Vec::new();
    for class in chain.iter().rev() {
        for field in &class.fields {
            // A redeclared name aliases the inherited slot.
            if !fields.contains(&field.name) {
                fields.push(field.name.clone());
            }
        }
    }
    Ok(fields)
}

/// Assigns every distinct string literal a static box address, in first
/// appearance order starting at the heap base.
fn intern_strings(program: &Program) -> HashMap<EcoString, u32> {
    let mut strings = HashMap::new();
    let mut next = layout::HEAP_BASE;
    let mut visit = |expr: &Expr| {
        if let Expr::Literal(Literal::Str(value)) = expr {
            if !strings.contains_key(value) {
                strings.insert(value.clone(), next);
                next += layout::string_box_size(value.len() as u32);
            }
        }
    };
    for class in &program.classes {
        for method in &class.methods {
            for stmt in &method.body {
                walk_stmt_exprs(stmt, &mut |expr| visit(expr));
            }
        }
    }
    strings
}

fn walk_stmt_exprs(stmt: &Stmt, visit: &mut dyn FnMut(&Expr)) {
    match stmt {
        Stmt::VarDecl { init, .. } => {
            if let Some(init) = init {
                walk_expr(init, visit);
            }
        }
        Stmt::Assign { target, value, .. } => {
            walk_expr(target, visit);
            walk_expr(value, visit);
        }
        Stmt::If { arms, else_body, .. } => {
            for arm in arms {
                walk_expr(&arm.cond, visit);
                for stmt in &arm.body {
                    walk_stmt_exprs(stmt, visit);
                }
            }
            for stmt in else_body.iter().flatten() {
                walk_stmt_exprs(stmt, visit);
            }
        }
        Stmt::While { cond, body, .. } => {
            walk_expr(cond, visit);
            for stmt in body {
                walk_stmt_exprs(stmt, visit);
            }
        }
        Stmt::Loop { body, .. } => {
            for stmt in body {
                walk_stmt_exprs(stmt, visit);
            }
        }
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                walk_expr(value, visit);
            }
        }
        Stmt::Break { .. } => {}
        Stmt::Expr { expr, .. } => walk_expr(expr, visit),
    }
}

fn walk_expr(expr: &Expr, visit: &mut dyn FnMut(&Expr)) {
    visit(expr);
    match expr {
        Expr::Literal(_) | Expr::Identifier(_) | Expr::This => {}
        Expr::New { args, .. } => {
            for arg in args {
                walk_expr(arg, visit);
            }
        }
        Expr::Call { receiver, args, .. } => {
            if let Some(receiver) = receiver {
                walk_expr(receiver, visit);
            }
            for arg in args {
                walk_expr(arg, visit);
            }
        }
        Expr::FieldAccess { receiver, .. } => walk_expr(receiver, visit),
        Expr::IndexAccess { receiver, index } => {
            walk_expr(receiver, visit);
            walk_expr(index, visit);
        }
        Expr::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, visit);
            walk_expr(rhs, visit);
        }
        Expr::Unary { operand, .. } => walk_expr(operand, visit),
    }
}

/// Builds the static data image placed at [`layout::HEAP_PTR_ADDR`]: the
/// bump-allocator seed word, padding up to the heap base, then every
/// interned string box.
fn build_statics(cx: &ModuleCx) -> Vec<u8> {
    // Bytes are laid out relative to address HEAP_PTR_ADDR.
    let mut bytes = vec![0u8; (layout::HEAP_BASE - layout::HEAP_PTR_ADDR) as usize];

    // Recover packing order from the assigned addresses.
    let mut ordered: Vec<(&EcoString, u32)> =
        cx.strings.iter().map(|(s, addr)| (s, *addr)).collect();
    ordered.sort_by_key(|(_, addr)| *addr);

    for (value, address) in ordered {
        let start = bytes.len();
        debug_assert_eq!(address, layout::HEAP_PTR_ADDR + start as u32);
        bytes.extend_from_slice(&layout::TAG_STRING.to_le_bytes());
        bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
        bytes.extend_from_slice(value.as_bytes());
        // Pad to the word-aligned box size.
        bytes.resize(start + layout::string_box_size(value.len() as u32) as usize, 0);
    }

    let heap_start = layout::HEAP_PTR_ADDR + bytes.len() as u32;
    bytes[..4].copy_from_slice(&heap_start.to_le_bytes());
    bytes
}

/// Emits the exported `Main` wrapper: constructs a `Main` object, runs its
/// zero-argument `init` if one exists, calls `Main.Main` and unboxes the
/// result when it is an integer (anything else exits with `0`).
fn emit_main_wrapper(program: &Program, cx: &ModuleCx) -> Result<Vec<u8>, GenError> {
    let info = cx.classes.get("Main").ok_or(GenError::MissingMain)?;
    let main = cx
        .resolve_method("Main", "Main")
        .filter(|func| func.arity == 0)
        .ok_or(GenError::MissingMain)?;

    let mut s = InstrSink::new();
    s.i32_const(layout::object_box_size(info.fields.len() as u32) as i32);
    s.op_u32(op::CALL, Helper::Alloc.index());
    s.op_u32(op::LOCAL_SET, 0);
    s.op_u32(op::LOCAL_GET, 0);
    s.i32_const(info.tag);
    s.i32_store(0);
    for field_index in 0..info.fields.len() as u32 {
        s.op_u32(op::LOCAL_GET, 0);
        s.i32_const(0);
        s.op_u32(op::CALL, Helper::BoxInt.index());
        s.i32_store(layout::field_offset(field_index));
    }
    if let Some(init) = cx.resolve_method("Main", "init") {
        if init.arity != 0 {
            let line = program
                .classes
                .iter()
                .find(|class| class.name == "Main")
                .map_or(0, |class| class.line);
            return Err(GenError::ArityMismatch {
                name: "init".into(),
                expected: 0,
                actual: init.arity,
                line,
            });
        }
        s.op_u32(op::LOCAL_GET, 0);
        s.op_u32(op::CALL, init.index);
        s.op(op::DROP);
    }
    s.op_u32(op::LOCAL_GET, 0);
    s.op_u32(op::CALL, main.index);
    s.op_u32(op::LOCAL_SET, 1);
    // Unbox integer results; any other tag exits with 0.
    s.op_u32(op::LOCAL_GET, 1);
    s.i32_load(0);
    s.op(op::I32_EQZ);
    s.open_typed(op::IF, ValType::I32);
    s.op_u32(op::LOCAL_GET, 1);
    s.i32_load(layout::PAYLOAD_OFFSET);
    s.op(op::ELSE);
    s.i32_const(0);
    s.op(op::END);
    Ok(s.finish(&[(2, ValType::I32)]))
}

/// Interns function types and hands out their section indices.
#[derive(Default)]
struct TypeTable {
    entries: Vec<(Vec<ValType>, Vec<ValType>)>,
}

impl TypeTable {
    fn intern(&mut self, params: Vec<ValType>, results: Vec<ValType>) -> u32 {
        let entry = (params, results);
        if let Some(index) = self.entries.iter().position(|e| *e == entry) {
            return index as u32;
        }
        self.entries.push(entry);
        self.entries.len() as u32 - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_analysis::{lex, parse};

    fn compile(source: &str) -> Result<Vec<u8>, GenError> {
        let program = parse(lex(source).expect("lexes")).expect("parses");
        generate(&program)
    }

    const HELLO: &str = r#"
class Main is
  method Main() is
    io.PrintInteger(42)
    return 0
  end
end
"#;

    #[test]
    fn module_carries_wasm_prefix_and_exports() {
        let module = compile(HELLO).expect("generates");
        assert_eq!(&module[..8], &MODULE_PREFIX);
        // Export entries: name then kind byte (0x00 func, 0x02 memory).
        let has = |needle: &[u8]| module.windows(needle.len()).any(|w| w == needle);
        assert!(has(b"\x04Main\x00"));
        assert!(has(b"\x06memory\x02"));
    }

    #[test]
    fn missing_main_is_an_error() {
        let err = compile("class Helper is\n  method go() => 1\nend\n").unwrap_err();
        assert_eq!(err, GenError::MissingMain);

        // A Main class whose Main method takes parameters does not count.
        let err = compile("class Main is\n  method Main(x) => x\nend\n").unwrap_err();
        assert_eq!(err, GenError::MissingMain);
    }

    #[test]
    fn unknown_host_function_is_an_error() {
        let err = compile(
            "class Main is\n  method Main() is\n    io.Blargh(1)\n  end\nend\n",
        )
        .unwrap_err();
        assert!(matches!(err, GenError::UnknownHostFunction { line: 3, .. }));
    }

    #[test]
    fn oversized_integer_literal_is_an_error() {
        let err = compile(
            "class Main is\n  method Main() => 4294967296\nend\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GenError::IntegerOverflow {
                value: 4_294_967_296,
                ..
            }
        ));
    }

    #[test]
    fn string_literals_intern_to_packed_static_boxes() {
        let program = parse(
            lex(
                "class Main is\n  method Main() is\n    io.PrintString(\"hi\")\n    io.PrintString(\"hi\")\n    io.PrintString(\"longer one\")\n  end\nend\n",
            )
            .expect("lexes"),
        )
        .expect("parses");
        let cx = build_context(&program).expect("context builds");

        assert_eq!(cx.strings.len(), 2);
        assert_eq!(cx.strings["hi"], layout::HEAP_BASE);
        assert_eq!(
            cx.strings["longer one"],
            layout::HEAP_BASE + layout::string_box_size(2)
        );

        let statics = build_statics(&cx);
        let heap_start = u32::from_le_bytes(statics[..4].try_into().unwrap());
        assert_eq!(
            heap_start,
            layout::HEAP_BASE + layout::string_box_size(2) + layout::string_box_size(10)
        );
        // "hi" box: tag 3, length 2, bytes.
        let hi = (layout::HEAP_BASE - layout::HEAP_PTR_ADDR) as usize;
        assert_eq!(&statics[hi..hi + 4], &layout::TAG_STRING.to_le_bytes());
        assert_eq!(&statics[hi + 4..hi + 8], &2u32.to_le_bytes());
        assert_eq!(&statics[hi + 8..hi + 10], b"hi");
    }

    #[test]
    fn inherited_fields_come_first_in_the_box() {
        let program = parse(
            lex(
                "class Base is\n  var a\n  var b\nend\nclass Kid extends Base is\n  var c\nend\nclass Main is\n  method Main() => 0\nend\n",
            )
            .expect("lexes"),
        )
        .expect("parses");
        let cx = build_context(&program).expect("context builds");
        assert_eq!(cx.classes["Kid"].fields, ["a", "b", "c"]);
        assert_eq!(cx.field_offset("Kid", "a"), Some(layout::field_offset(0)));
        assert_eq!(cx.field_offset("Kid", "c"), Some(layout::field_offset(2)));
        assert_eq!(cx.field_offset("Base", "c"), None);
    }

    #[test]
    fn inheritance_cycle_is_an_error() {
        let err = compile(
            "class A extends B is\nend\nclass B extends A is\nend\nclass Main is\n  method Main() => 0\nend\n",
        )
        .unwrap_err();
        assert!(matches!(err, GenError::InheritanceCycle { .. }));
    }

    #[test]
    fn break_outside_a_loop_is_an_error() {
        let err = compile(
            "class Main is\n  method Main() is\n    break\n  end\nend\n",
        )
        .unwrap_err();
        assert_eq!(err, GenError::BreakOutsideLoop { line: 3 });
    }

    #[test]
    fn full_feature_program_generates() {
        let source = r#"
class Point is
  var x
  var y
  method init(px, py) is
    x := px
    y := py
  end
  method norm() => x * x + y * y
end

class Main is
  method Main() is
    var p := new Point(3, 4)
    var total := 0
    var items := new List()
    items.append("first")
    var i := 0
    while i < 5 loop
      total := total + p.norm()
      i := i + 1
    end
    var lookup := new Map()
    lookup["k"] := total
    if lookup.contains("k") then
      io.PrintInteger(lookup["k"])
    else
      io.PrintLine()
    end
    loop
      break
    end
    return total
  end
end
"#;
        let module = compile(source).expect("generates");
        assert_eq!(&module[..8], &MODULE_PREFIX);
        // Type, import, function, memory, export, code and data sections
        // all present, in order.
        let mut offset = 8;
        let mut seen = Vec::new();
        while offset < module.len() {
            seen.push(module[offset]);
            offset += 1;
            let mut size = 0u32;
            let mut shift = 0;
            loop {
                let byte = module[offset];
                offset += 1;
                size |= u32::from(byte & 0x7F) << shift;
                shift += 7;
                if byte & 0x80 == 0 {
                    break;
                }
            }
            offset += size as usize;
        }
        assert_eq!(seen, [1, 2, 3, 5, 7, 10, 11]);
    }
}

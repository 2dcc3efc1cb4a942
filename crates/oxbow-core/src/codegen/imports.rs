// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The host import surface.
//!
//! Generated modules import every host function up front, in the fixed
//! order of [`HOST_IMPORTS`], so an import's position in the table is also
//! its wasm function index. The semantic analyser uses the same table to
//! check calls on the `io`/`math`/`screen`/`time` namespaces before code
//! generation ever runs.
//!
//! Scalar parameters and results cross the boundary raw (`i32`/`f64`); the
//! aggregate printers and the string producers work on box addresses (see
//! the layout module), which is what [`HostParam::Boxed`] and
//! [`HostResult::Boxed`] mark. The emitter unboxes/boxes around each call
//! accordingly.

use super::encoder::ValType;

/// How one host parameter is marshalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostParam {
    /// Raw `i32` payload (integers and booleans).
    RawInt,
    /// Raw `f64` payload.
    Real,
    /// Box address into linear memory.
    Boxed,
}

impl HostParam {
    pub(crate) const fn val_type(self) -> ValType {
        match self {
            Self::RawInt | Self::Boxed => ValType::I32,
            Self::Real => ValType::F64,
        }
    }
}

/// How one host result is marshalled back into a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostResult {
    None,
    RawInt,
    RawBool,
    Real,
    /// The host already returns a box address (it allocates through the
    /// bump-pointer word like the module does).
    Boxed,
}

impl HostResult {
    pub(crate) fn val_types(self) -> &'static [ValType] {
        match self {
            Self::None => &[],
            Self::RawInt | Self::RawBool | Self::Boxed => &[ValType::I32],
            Self::Real => &[ValType::F64],
        }
    }
}

/// One imported host function.
#[derive(Debug, Clone, Copy)]
pub struct HostImport {
    /// Import module name, e.g. `io`.
    pub module: &'static str,
    /// Import field name, e.g. `PrintInteger`.
    pub name: &'static str,
    pub params: &'static [HostParam],
    pub result: HostResult,
}

use HostParam::{Boxed, RawInt, Real};

/// Every host function, in import order.
pub const HOST_IMPORTS: &[HostImport] = &[
    // io
    HostImport { module: "io", name: "PrintInteger", params: &[RawInt], result: HostResult::None },
    HostImport { module: "io", name: "PrintReal", params: &[Real], result: HostResult::None },
    HostImport { module: "io", name: "PrintBool", params: &[RawInt], result: HostResult::None },
    HostImport { module: "io", name: "PrintString", params: &[Boxed], result: HostResult::None },
    HostImport { module: "io", name: "PrintArray", params: &[Boxed], result: HostResult::None },
    HostImport { module: "io", name: "PrintList", params: &[Boxed], result: HostResult::None },
    HostImport { module: "io", name: "PrintMap", params: &[Boxed], result: HostResult::None },
    HostImport { module: "io", name: "PrintLine", params: &[], result: HostResult::None },
    HostImport { module: "io", name: "Read", params: &[], result: HostResult::Boxed },
    HostImport { module: "io", name: "ReadLine", params: &[], result: HostResult::Boxed },
    HostImport { module: "io", name: "ReadInteger", params: &[], result: HostResult::RawInt },
    HostImport { module: "io", name: "ReadReal", params: &[], result: HostResult::Real },
    HostImport { module: "io", name: "ReadBool", params: &[], result: HostResult::RawBool },
    HostImport { module: "io", name: "FormatInteger", params: &[RawInt], result: HostResult::Boxed },
    HostImport { module: "io", name: "FormatReal", params: &[Real], result: HostResult::Boxed },
    HostImport { module: "io", name: "FormatBool", params: &[RawInt], result: HostResult::Boxed },
    // math
    HostImport { module: "math", name: "Cos", params: &[Real], result: HostResult::Real },
    HostImport { module: "math", name: "Sin", params: &[Real], result: HostResult::Real },
    HostImport { module: "math", name: "Tan", params: &[Real], result: HostResult::Real },
    HostImport { module: "math", name: "Acos", params: &[Real], result: HostResult::Real },
    HostImport { module: "math", name: "Asin", params: &[Real], result: HostResult::Real },
    HostImport { module: "math", name: "Atan", params: &[Real], result: HostResult::Real },
    HostImport { module: "math", name: "Atan2", params: &[Real, Real], result: HostResult::Real },
    HostImport { module: "math", name: "Exp", params: &[Real], result: HostResult::Real },
    HostImport { module: "math", name: "Log", params: &[Real], result: HostResult::Real },
    HostImport { module: "math", name: "Sqrt", params: &[Real], result: HostResult::Real },
    HostImport { module: "math", name: "Pow", params: &[Real, Real], result: HostResult::Real },
    HostImport { module: "math", name: "Random", params: &[], result: HostResult::Real },
    // screen
    HostImport { module: "screen", name: "Width", params: &[], result: HostResult::RawInt },
    HostImport { module: "screen", name: "Height", params: &[], result: HostResult::RawInt },
    // time
    HostImport { module: "time", name: "Sleep", params: &[RawInt], result: HostResult::None },
    HostImport { module: "time", name: "PerfCounter", params: &[], result: HostResult::Real },
    HostImport { module: "time", name: "Unix", params: &[], result: HostResult::Real },
];

/// Whether `name` is one of the host namespaces.
#[must_use]
pub fn is_host_namespace(name: &str) -> bool {
    matches!(name, "io" | "math" | "screen" | "time")
}

/// Looks up a host function by namespace and name.
#[must_use]
pub fn lookup(module: &str, name: &str) -> Option<&'static HostImport> {
    HOST_IMPORTS
        .iter()
        .find(|import| import.module == module && import.name == name)
}

/// The wasm function index of a host function.
#[must_use]
pub fn function_index(module: &str, name: &str) -> Option<u32> {
    HOST_IMPORTS
        .iter()
        .position(|import| import.module == module && import.name == name)
        .map(|index| index as u32)
}

/// Number of imported functions; the first module-defined function gets
/// this index.
#[must_use]
pub fn import_count() -> u32 {
    HOST_IMPORTS.len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_no_duplicates() {
        for (i, a) in HOST_IMPORTS.iter().enumerate() {
            for b in &HOST_IMPORTS[i + 1..] {
                assert!(
                    !(a.module == b.module && a.name == b.name),
                    "duplicate import {}.{}",
                    a.module,
                    a.name
                );
            }
        }
    }

    #[test]
    fn lookup_matches_index() {
        let import = lookup("math", "Atan2").unwrap();
        assert_eq!(import.params.len(), 2);
        assert_eq!(function_index("io", "PrintInteger"), Some(0));
        assert_eq!(function_index("nope", "Missing"), None);
    }

    #[test]
    fn namespaces_are_recognised() {
        assert!(is_host_namespace("io"));
        assert!(is_host_namespace("time"));
        assert!(!is_host_namespace("console"));
    }

    #[test]
    fn aggregate_printers_take_box_addresses() {
        assert_eq!(lookup("io", "PrintArray").unwrap().params, &[Boxed]);
        assert_eq!(lookup("io", "PrintInteger").unwrap().params, &[RawInt]);
        assert_eq!(lookup("io", "FormatReal").unwrap().result, HostResult::Boxed);
    }
}

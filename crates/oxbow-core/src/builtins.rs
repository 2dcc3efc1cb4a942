// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The built-in constructible classes: `Array`, `List` and `Map`.
//!
//! Their constructor and method arities are checked by the semantic
//! analyser and their call sites are lowered to module-internal helper
//! functions by the code generator, so both stages consult this one table.

/// One method on a built-in class.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinMethod {
    pub name: &'static str,
    pub arity: usize,
}

/// One built-in class: constructor arity plus its method set.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinClass {
    pub name: &'static str,
    pub constructor_arity: usize,
    pub methods: &'static [BuiltinMethod],
}

/// All built-in classes.
pub const BUILTIN_CLASSES: &[BuiltinClass] = &[
    BuiltinClass {
        name: "Array",
        constructor_arity: 1,
        methods: &[
            BuiltinMethod { name: "get", arity: 1 },
            BuiltinMethod { name: "set", arity: 2 },
            BuiltinMethod { name: "length", arity: 0 },
        ],
    },
    BuiltinClass {
        name: "List",
        constructor_arity: 0,
        methods: &[
            BuiltinMethod { name: "append", arity: 1 },
            BuiltinMethod { name: "get", arity: 1 },
            BuiltinMethod { name: "length", arity: 0 },
        ],
    },
    BuiltinClass {
        name: "Map",
        constructor_arity: 0,
        methods: &[
            BuiltinMethod { name: "get", arity: 1 },
            BuiltinMethod { name: "set", arity: 2 },
            BuiltinMethod { name: "contains", arity: 1 },
        ],
    },
];

/// Looks up a built-in class by name.
#[must_use]
pub fn builtin_class(name: &str) -> Option<&'static BuiltinClass> {
    BUILTIN_CLASSES.iter().find(|class| class.name == name)
}

/// Looks up a method on a built-in class.
#[must_use]
pub fn builtin_method(class: &str, method: &str) -> Option<&'static BuiltinMethod> {
    builtin_class(class)?.methods.iter().find(|m| m.name == method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_takes_a_size() {
        assert_eq!(builtin_class("Array").unwrap().constructor_arity, 1);
        assert_eq!(builtin_class("List").unwrap().constructor_arity, 0);
        assert!(builtin_class("Set").is_none());
    }

    #[test]
    fn method_lookup() {
        assert_eq!(builtin_method("Map", "set").unwrap().arity, 2);
        assert!(builtin_method("Array", "append").is_none());
    }
}

// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Lexical scope tracking for semantic analysis.
//!
//! Scopes form a stack: one level for method parameters, one per nested
//! block (`if` arms, loop bodies). Each binding records whether it was ever
//! read so that popping a level can report unused locals.

use std::collections::HashMap;

use ecow::EcoString;

/// What introduced a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// A method parameter.
    Parameter,
    /// A `var` statement.
    Local,
}

/// A named binding in some scope level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: EcoString,
    pub kind: BindingKind,
    /// Line of the defining token.
    pub line: u32,
    /// Set once the binding is read.
    pub used: bool,
    /// Class name when the binding is known to hold `new C(..)`;
    /// cleared on reassignment to anything unrecognised.
    pub class_hint: Option<EcoString>,
}

/// A stack of scope levels searched innermost-first.
#[derive(Debug, Default)]
pub struct Scope {
    levels: Vec<HashMap<EcoString, Binding>>,
}

impl Scope {
    /// Creates an empty scope stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a nested scope level.
    pub fn push(&mut self) {
        self.levels.push(HashMap::new());
    }

    /// Leaves the innermost level, returning its bindings for unused-local
    /// reporting.
    pub fn pop(&mut self) -> Vec<Binding> {
        self.levels
            .pop()
            .map(|level| {
                let mut bindings: Vec<Binding> = level.into_values().collect();
                bindings.sort_by_key(|b| b.line);
                bindings
            })
            .unwrap_or_default()
    }

    /// Defines a binding in the innermost level. Returns the previous
    /// binding if the name was already defined *in that level*.
    pub fn define(&mut self, name: &EcoString, kind: BindingKind, line: u32) -> Option<Binding> {
        let binding = Binding {
            name: name.clone(),
            kind,
            line,
            used: false,
            class_hint: None,
        };
        self.levels
            .last_mut()
            .expect("define called with no open scope")
            .insert(name.clone(), binding)
    }

    /// Returns `true` if `name` resolves in any level.
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.levels.iter().any(|level| level.contains_key(name))
    }

    /// Marks a binding as read and returns its class hint, if any.
    pub fn mark_used(&mut self, name: &str) -> Option<EcoString> {
        for level in self.levels.iter_mut().rev() {
            if let Some(binding) = level.get_mut(name) {
                binding.used = true;
                return binding.class_hint.clone();
            }
        }
        None
    }

    /// Records (or clears) the class hint of an existing binding.
    pub fn set_class_hint(&mut self, name: &str, hint: Option<EcoString>) {
        for level in self.levels.iter_mut().rev() {
            if let Some(binding) = level.get_mut(name) {
                binding.class_hint = hint;
                return;
            }
        }
    }

    /// Looks up the class hint without marking the binding used.
    #[must_use]
    pub fn class_hint(&self, name: &str) -> Option<EcoString> {
        for level in self.levels.iter().rev() {
            if let Some(binding) = level.get(name) {
                return binding.class_hint.clone();
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_levels_shadow_outer() {
        let mut scope = Scope::new();
        scope.push();
        scope.define(&"x".into(), BindingKind::Parameter, 1);
        scope.push();
        scope.define(&"x".into(), BindingKind::Local, 2);
        assert!(scope.is_defined("x"));
        let popped = scope.pop();
        assert_eq!(popped.len(), 1);
        assert_eq!(popped[0].kind, BindingKind::Local);
        assert!(scope.is_defined("x"));
    }

    #[test]
    fn mark_used_survives_in_popped_bindings() {
        let mut scope = Scope::new();
        scope.push();
        scope.define(&"a".into(), BindingKind::Local, 1);
        scope.define(&"b".into(), BindingKind::Local, 2);
        scope.mark_used("a");
        let popped = scope.pop();
        let a = popped.iter().find(|b| b.name == "a").unwrap();
        let b = popped.iter().find(|b| b.name == "b").unwrap();
        assert!(a.used);
        assert!(!b.used);
    }

    #[test]
    fn class_hints_round_trip() {
        let mut scope = Scope::new();
        scope.push();
        scope.define(&"p".into(), BindingKind::Local, 1);
        scope.set_class_hint("p", Some("Point".into()));
        assert_eq!(scope.class_hint("p").as_deref(), Some("Point"));
        assert_eq!(scope.mark_used("p").as_deref(), Some("Point"));
        scope.set_class_hint("p", None);
        assert_eq!(scope.class_hint("p"), None);
    }

    #[test]
    fn redefinition_in_same_level_returns_previous() {
        let mut scope = Scope::new();
        scope.push();
        assert!(scope.define(&"x".into(), BindingKind::Local, 1).is_none());
        assert!(scope.define(&"x".into(), BindingKind::Local, 2).is_some());
    }
}

// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the Oxbow lexer.
//!
//! Verified invariants over generated inputs:
//!
//! 1. **No panics** — arbitrary input either lexes or returns a `LexError`
//! 2. **Round trip** — concatenated lexemes of a valid program preserve all
//!    its non-whitespace, non-comment characters in order
//! 3. **Eof terminal** — a successful lex ends with exactly one `Eof`
//! 4. **Spans are ordered** — token spans are non-overlapping and ascending
//! 5. **Determinism** — lexing twice yields identical sequences

use proptest::prelude::*;

use super::lexer::lex;

/// Fragments that always lex cleanly, used to assemble valid programs.
const VALID_FRAGMENTS: &[&str] = &[
    "42",
    "-7",
    "3.14",
    "3.",
    ".5",
    "\"hello\\n\"",
    "true",
    "false",
    "this",
    "counter",
    "x",
    "+",
    "-",
    "*",
    "/",
    "%",
    "(",
    ")",
    "[",
    "]",
    ":=",
    "=>",
    "==",
    "!=",
    "<=",
    ">=",
    "class",
    "method",
    "end",
    "var",
    "new",
];

fn valid_program() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(VALID_FRAGMENTS), 0..40)
        .prop_map(|fragments| fragments.join(" "))
}

proptest! {
    #[test]
    fn lexer_never_panics(input in "\\PC{0,400}") {
        let _result = lex(&input);
    }

    #[test]
    fn lexemes_round_trip_nonwhitespace(source in valid_program()) {
        let tokens = lex(&source).expect("valid fragments lex");
        let rebuilt: String = tokens.iter().map(super::Token::lexeme).collect();
        let wanted: String = source.chars().filter(|c| !c.is_whitespace()).collect();
        prop_assert_eq!(rebuilt, wanted);
    }

    #[test]
    fn single_trailing_eof(source in valid_program()) {
        let tokens = lex(&source).expect("valid fragments lex");
        prop_assert_eq!(tokens.iter().filter(|t| t.kind().is_eof()).count(), 1);
        prop_assert!(tokens.last().expect("nonempty").kind().is_eof());
    }

    #[test]
    fn spans_are_ascending_and_disjoint(source in valid_program()) {
        let tokens = lex(&source).expect("valid fragments lex");
        for pair in tokens.windows(2) {
            prop_assert!(pair[0].span().end() <= pair[1].span().start());
        }
    }

    #[test]
    fn lexing_is_deterministic(input in "\\PC{0,400}") {
        let first = lex(&input);
        let second = lex(&input);
        prop_assert_eq!(first, second);
    }
}

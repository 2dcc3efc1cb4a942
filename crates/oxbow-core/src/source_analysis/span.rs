// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Byte-offset source spans.
//!
//! Tokens, errors and recovered optimisation-step locations all use `Span`
//! to point back into the original source text. Spans are half-open byte
//! ranges (`start..end`).

use std::ops::Range;

use serde::Serialize;

/// A half-open byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    start: u32,
    end: u32,
}

impl Span {
    /// Creates a span from start and end byte offsets.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Creates an empty span at a single offset.
    #[must_use]
    pub const fn point(offset: u32) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Start byte offset.
    #[must_use]
    pub const fn start(self) -> u32 {
        self.start
    }

    /// End byte offset (exclusive).
    #[must_use]
    pub const fn end(self) -> u32 {
        self.end
    }

    /// Length in bytes.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.end - self.start
    }

    /// Returns `true` if the span covers no bytes.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// The smallest span covering both `self` and `other`.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            start: if self.start < other.start {
                self.start
            } else {
                other.start
            },
            end: if self.end > other.end {
                self.end
            } else {
                other.end
            },
        }
    }

    /// Converts to a `Range<usize>` for slicing source text.
    #[must_use]
    pub const fn as_range(self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Slices the span out of the given source text.
    ///
    /// Returns an empty string when the span is out of bounds, which can
    /// happen for synthetic spans on optimiser-produced nodes.
    #[must_use]
    pub fn slice(self, source: &str) -> &str {
        source.get(self.as_range()).unwrap_or("")
    }
}

impl From<Range<usize>> for Span {
    #[allow(clippy::cast_possible_truncation)] // sources over 4 GiB unsupported
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start as u32, range.end as u32)
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        (span.start as usize, span.len() as usize).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_and_len() {
        let span = Span::new(3, 9);
        assert_eq!(span.start(), 3);
        assert_eq!(span.end(), 9);
        assert_eq!(span.len(), 6);
        assert!(!span.is_empty());
        assert!(Span::point(5).is_empty());
    }

    #[test]
    fn merge_is_covering() {
        let merged = Span::new(4, 7).merge(Span::new(1, 5));
        assert_eq!(merged, Span::new(1, 7));
    }

    #[test]
    fn slice_handles_out_of_bounds() {
        assert_eq!(Span::new(2, 5).slice("abcdef"), "cde");
        assert_eq!(Span::new(4, 99).slice("abc"), "");
    }
}

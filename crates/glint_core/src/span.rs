//! Source location spans.
//!
//! Compact 8-byte byte-offset ranges. Besides the usual containment
//! queries, spans know how to shift themselves by a signed length delta,
//! which is the primitive behind member-level partial reanalysis: when a
//! member grows or shrinks, every span after it moves by the same delta.

use std::fmt;

/// Source location span.
///
/// Layout: 8 bytes total
/// - start: u32 - byte offset from file start
/// - end: u32 - byte offset (exclusive)
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(C)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Dummy span for diagnostics without a source position.
    pub const DUMMY: Span = Span { start: 0, end: 0 };

    /// Create a new span.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    /// Zero-length span at the given offset.
    #[inline]
    pub const fn empty_at(offset: u32) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

    /// Length of the span in bytes.
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Check if span is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if an offset is within this span.
    #[inline]
    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Check if another span is fully contained within this span.
    #[inline]
    pub fn contains_span(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Check if two spans share at least one byte.
    ///
    /// Spans are half-open, so `[0, 10)` and `[10, 20)` are adjacent,
    /// not overlapping. A zero-length caret strictly inside a range
    /// still counts.
    #[inline]
    pub fn intersects(&self, other: Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Shift the span by a signed byte delta, clamped to `[0, bound]`.
    ///
    /// A span pushed entirely past `bound` degenerates to a zero-length
    /// marker at `bound`; a span pushed below zero clamps at zero.
    #[must_use]
    pub fn shift(self, delta: i64, bound: u32) -> Span {
        let shift_offset = |offset: u32| -> u32 {
            let moved = i64::from(offset).saturating_add(delta);
            let clamped = moved.clamp(0, i64::from(bound));
            u32::try_from(clamped).unwrap_or(bound)
        };

        let start = shift_offset(self.start);
        let end = shift_offset(self.end).max(start);
        Span { start, end }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start as usize..span.end as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_span_basics() {
        let span = Span::new(10, 50);
        assert_eq!(span.len(), 40);
        assert!(!span.is_empty());
        assert!(span.contains(10));
        assert!(span.contains(49));
        assert!(!span.contains(50));
        assert!(span.contains_span(Span::new(20, 30)));
        assert!(!span.contains_span(Span::new(20, 60)));
    }

    #[test]
    fn test_span_intersects() {
        assert!(Span::new(0, 10).intersects(Span::new(5, 15)));
        // Adjacent half-open spans share no byte.
        assert!(!Span::new(0, 10).intersects(Span::new(10, 20)));
        assert!(!Span::new(0, 10).intersects(Span::new(11, 20)));
        // Zero-length caret strictly inside a range.
        assert!(Span::new(5, 5).intersects(Span::new(0, 10)));
    }

    #[test]
    fn test_shift_positive() {
        let span = Span::new(50, 80).shift(5, 200);
        assert_eq!(span, Span::new(55, 85));
    }

    #[test]
    fn test_shift_negative() {
        let span = Span::new(50, 80).shift(-10, 200);
        assert_eq!(span, Span::new(40, 70));
    }

    #[test]
    fn test_shift_clamps_below_zero() {
        let span = Span::new(5, 20).shift(-10, 200);
        assert_eq!(span, Span::new(0, 10));
    }

    #[test]
    fn test_shift_past_end_degenerates() {
        let span = Span::new(90, 100).shift(50, 120);
        assert_eq!(span, Span::new(120, 120));
        assert!(span.is_empty());
    }

    #[test]
    fn test_shift_partially_past_end() {
        let span = Span::new(90, 130).shift(20, 120);
        assert_eq!(span, Span::new(110, 120));
    }
}

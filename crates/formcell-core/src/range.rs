#![forbid(unsafe_code)]

//! One-dimensional ranges.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed interval `[minimum, maximum]` along one axis.
///
/// The ordering `minimum <= maximum` is enforced on construction: reversed
/// ends are swapped. Deserialization goes through the same path.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RangeEnds")]
pub struct Range {
    minimum: f32,
    maximum: f32,
}

/// Wire form of [`Range`], ends in any order.
#[derive(Deserialize)]
struct RangeEnds {
    minimum: f32,
    maximum: f32,
}

impl From<RangeEnds> for Range {
    fn from(ends: RangeEnds) -> Self {
        Range::new(ends.minimum, ends.maximum)
    }
}

impl Range {
    /// Create a range from two ends in any order.
    #[inline]
    pub fn new(a: f32, b: f32) -> Self {
        if a > b {
            Self {
                minimum: b,
                maximum: a,
            }
        } else {
            Self {
                minimum: a,
                maximum: b,
            }
        }
    }

    /// A degenerate range holding a single value.
    #[inline]
    pub const fn point(value: f32) -> Self {
        Self {
            minimum: value,
            maximum: value,
        }
    }

    #[inline]
    pub const fn minimum(&self) -> f32 {
        self.minimum
    }

    #[inline]
    pub const fn maximum(&self) -> f32 {
        self.maximum
    }

    /// `maximum - minimum`. Never negative.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.maximum - self.minimum
    }

    /// Midpoint.
    #[inline]
    pub fn center(&self) -> f32 {
        self.minimum + self.delta() * 0.5
    }

    /// Check whether the range has zero extent.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.delta() == 0.0
    }

    /// Check whether `value` lies inside the range (both ends inclusive).
    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.minimum && value <= self.maximum
    }

    /// Clamp `value` into the range.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.max(self.minimum).min(self.maximum)
    }

    /// Wrap `value` into `[minimum, maximum)`.
    ///
    /// A degenerate range wraps everything onto its minimum.
    pub fn wrap(&self, value: f32) -> f32 {
        let delta = self.delta();
        if delta == 0.0 {
            return self.minimum;
        }
        self.minimum + (value - self.minimum).rem_euclid(delta)
    }

    /// Linear interpolation: `t = 0` is the minimum, `t = 1` the maximum.
    #[inline]
    pub fn lerp(&self, t: f32) -> f32 {
        self.minimum + self.delta() * t
    }

    /// Inverse of [`lerp`](Self::lerp). A degenerate range maps everything
    /// to `0.0`.
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        let delta = self.delta();
        if delta == 0.0 {
            0.0
        } else {
            (value - self.minimum) / delta
        }
    }

    /// Map `value` from this range onto the same relative position in
    /// `target`.
    #[inline]
    pub fn map(&self, value: f32, target: &Range) -> f32 {
        target.lerp(self.normalize(value))
    }

    /// Scale the extent by `factor`, keeping the minimum fixed.
    ///
    /// A negative factor flips the range to the other side of the minimum.
    pub fn scale(&self, factor: f32) -> Range {
        Range::new(self.minimum, self.minimum + self.delta() * factor)
    }

    /// Translate by `offset`.
    #[inline]
    pub fn shift(&self, offset: f32) -> Range {
        Range {
            minimum: self.minimum + offset,
            maximum: self.maximum + offset,
        }
    }

    /// Shift `inner` by the smallest amount that places it inside this
    /// range.
    ///
    /// If `inner` is wider than this range it is aligned to the minimum and
    /// overhangs the maximum.
    pub fn fit(&self, inner: &Range) -> Range {
        if inner.delta() >= self.delta() {
            return inner.shift(self.minimum - inner.minimum);
        }
        if inner.minimum < self.minimum {
            inner.shift(self.minimum - inner.minimum)
        } else if inner.maximum > self.maximum {
            inner.shift(self.maximum - inner.maximum)
        } else {
            *inner
        }
    }

    /// Check whether the interiors of two ranges intersect.
    ///
    /// Ranges that merely touch at an end do not overlap, and a degenerate
    /// range overlaps nothing.
    #[inline]
    pub fn overlaps(&self, other: &Range) -> bool {
        self.intersection(other).is_some()
    }

    /// Overlapping part of two ranges, or `None` if they do not overlap.
    pub fn intersection(&self, other: &Range) -> Option<Range> {
        let minimum = self.minimum.max(other.minimum);
        let maximum = self.maximum.min(other.maximum);
        if minimum < maximum {
            Some(Range { minimum, maximum })
        } else {
            None
        }
    }

    /// Smallest range containing both.
    pub fn union(&self, other: &Range) -> Range {
        Range {
            minimum: self.minimum.min(other.minimum),
            maximum: self.maximum.max(other.maximum),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.minimum, self.maximum)
    }
}

//! Alpha/Beta coordinate pairs along one axis.

use crate::coordinate::Coordinate;
use crate::rule::Rule;
use formcell_core::{Edge, Range};

/// The two ends of a cell along one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    alpha: Coordinate,
    beta: Coordinate,
}

impl Boundary {
    pub fn new(alpha: Rule, beta: Rule) -> Self {
        Self {
            alpha: Coordinate::new(alpha),
            beta: Coordinate::new(beta),
        }
    }

    #[inline]
    pub fn alpha(&self) -> &Coordinate {
        &self.alpha
    }

    #[inline]
    pub fn beta(&self) -> &Coordinate {
        &self.beta
    }

    #[inline]
    pub fn coordinate(&self, edge: Edge) -> &Coordinate {
        match edge {
            Edge::Alpha => &self.alpha,
            Edge::Beta => &self.beta,
        }
    }

    pub(crate) fn coordinate_mut(&mut self, edge: Edge) -> &mut Coordinate {
        match edge {
            Edge::Alpha => &mut self.alpha,
            Edge::Beta => &mut self.beta,
        }
    }

    /// Both coordinates, Alpha first.
    pub fn iter(&self) -> impl Iterator<Item = (Edge, &Coordinate)> {
        [(Edge::Alpha, &self.alpha), (Edge::Beta, &self.beta)].into_iter()
    }

    /// Signed `beta - alpha` in the parent's frame, once both ends are
    /// resolved. Negative for an inverted boundary.
    pub fn relative_extent(&self) -> Option<f32> {
        Some(self.beta.relative_value()? - self.alpha.relative_value()?)
    }

    /// Signed `beta - alpha` in the root frame.
    pub fn absolute_extent(&self) -> Option<f32> {
        Some(self.beta.absolute_value()? - self.alpha.absolute_value()?)
    }

    /// Covered interval in the parent's frame, once both ends are resolved.
    pub fn relative_range(&self) -> Option<Range> {
        Some(Range::new(
            self.alpha.relative_value()?,
            self.beta.relative_value()?,
        ))
    }

    /// Covered interval in the root frame, once both ends are resolved.
    pub fn absolute_range(&self) -> Option<Range> {
        Some(Range::new(
            self.alpha.absolute_value()?,
            self.beta.absolute_value()?,
        ))
    }

    /// Whether the resolved Beta lies below the resolved Alpha.
    ///
    /// Ends are never reordered: an inverted boundary keeps a negative
    /// [`relative_extent`](Self::relative_extent), while its
    /// [`Range`] views cover the same interval with ordered ends.
    pub fn is_inverted(&self) -> bool {
        matches!(
            (self.alpha.relative_value(), self.beta.relative_value()),
            (Some(alpha), Some(beta)) if beta < alpha
        )
    }
}

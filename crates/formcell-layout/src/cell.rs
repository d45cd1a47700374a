//! Cell tree nodes.

use crate::boundary::Boundary;
use crate::coordinate::Coordinate;
use crate::rule::Rule;
use formcell_core::{Axis, Edge};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arena handle of a cell. Slots are recycled after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(u32);

impl CellId {
    #[must_use]
    pub const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// The four rules a cell is created with.
///
/// Assembling these is the job of whatever builder sits in front of the
/// engine; the engine only wires them.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRules {
    pub x_alpha: Rule,
    pub x_beta: Rule,
    pub y_alpha: Rule,
    pub y_beta: Rule,
}

impl CellRules {
    pub fn new(x_alpha: Rule, x_beta: Rule, y_alpha: Rule, y_beta: Rule) -> Self {
        Self {
            x_alpha,
            x_beta,
            y_alpha,
            y_beta,
        }
    }

    /// Fixed rectangle `(x, y, width, height)` in the parent's frame.
    pub fn fixed(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(
            Rule::pixels(x),
            Rule::pixels(x + width),
            Rule::pixels(y),
            Rule::pixels(y + height),
        )
    }

    /// Replace the two rules of one axis.
    #[must_use]
    pub fn with_axis(mut self, axis: Axis, alpha: Rule, beta: Rule) -> Self {
        match axis {
            Axis::X => {
                self.x_alpha = alpha;
                self.x_beta = beta;
            }
            Axis::Y => {
                self.y_alpha = alpha;
                self.y_beta = beta;
            }
        }
        self
    }
}

/// A node of the layout tree: two boundaries plus tree links.
#[derive(Debug, Clone)]
pub struct Cell {
    pub(crate) parent: Option<CellId>,
    pub(crate) children: Vec<CellId>,
    x: Boundary,
    y: Boundary,
}

impl Cell {
    pub(crate) fn new(rules: CellRules) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            x: Boundary::new(rules.x_alpha, rules.x_beta),
            y: Boundary::new(rules.y_alpha, rules.y_beta),
        }
    }

    #[inline]
    pub fn parent(&self) -> Option<CellId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[CellId] {
        &self.children
    }

    #[inline]
    pub fn x_boundary(&self) -> &Boundary {
        &self.x
    }

    #[inline]
    pub fn y_boundary(&self) -> &Boundary {
        &self.y
    }

    #[inline]
    pub fn boundary(&self, axis: Axis) -> &Boundary {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }

    pub(crate) fn boundary_mut(&mut self, axis: Axis) -> &mut Boundary {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
        }
    }

    #[inline]
    pub fn coordinate(&self, axis: Axis, edge: Edge) -> &Coordinate {
        self.boundary(axis).coordinate(edge)
    }

    pub(crate) fn coordinate_mut(&mut self, axis: Axis, edge: Edge) -> &mut Coordinate {
        self.boundary_mut(axis).coordinate_mut(edge)
    }
}

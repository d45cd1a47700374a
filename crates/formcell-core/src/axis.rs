#![forbid(unsafe_code)]

//! Axis and edge selectors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two layout dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Horizontal.
    X,
    /// Vertical.
    Y,
}

impl Axis {
    /// Both axes, X first.
    pub const ALL: [Axis; 2] = [Axis::X, Axis::Y];

    /// Dense index (X = 0, Y = 1).
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }

    /// The other axis.
    #[inline]
    pub const fn cross(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("x"),
            Axis::Y => f.write_str("y"),
        }
    }
}

/// One end of a boundary.
///
/// `Alpha` is the minimum end (left/top), `Beta` the maximum end
/// (right/bottom).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Alpha,
    Beta,
}

impl Edge {
    /// Both edges, Alpha first.
    pub const ALL: [Edge; 2] = [Edge::Alpha, Edge::Beta];

    /// Dense index (Alpha = 0, Beta = 1).
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Edge::Alpha => 0,
            Edge::Beta => 1,
        }
    }

    /// The opposite end.
    #[inline]
    pub const fn opposite(self) -> Edge {
        match self {
            Edge::Alpha => Edge::Beta,
            Edge::Beta => Edge::Alpha,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Alpha => f.write_str("alpha"),
            Edge::Beta => f.write_str("beta"),
        }
    }
}

//! Scalar coordinate nodes.
//!
//! A [`Coordinate`] is one edge of a cell along one axis. It owns the rule
//! that produces its *relative* value (in the parent's local frame) and a
//! *tare* (the parent's absolute Alpha on the same axis). The *absolute*
//! value is derived: present iff both tare and relative are present, and
//! then equal to their sum.

use crate::cell::CellId;
use crate::dep_graph::NodeId;
use crate::rule::Rule;
use bitflags::bitflags;
use formcell_core::{Axis, Edge};
use std::fmt;

// ============================================================================
// CoordRef
// ============================================================================

/// Stable identifier of a coordinate: which cell, which axis, which end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordRef {
    pub cell: CellId,
    pub axis: Axis,
    pub edge: Edge,
}

impl CoordRef {
    #[inline]
    pub const fn new(cell: CellId, axis: Axis, edge: Edge) -> Self {
        Self { cell, axis, edge }
    }

    #[inline]
    pub const fn alpha(cell: CellId, axis: Axis) -> Self {
        Self::new(cell, axis, Edge::Alpha)
    }

    #[inline]
    pub const fn beta(cell: CellId, axis: Axis) -> Self {
        Self::new(cell, axis, Edge::Beta)
    }

    /// The four coordinates of a cell, in graph order.
    pub fn all_of(cell: CellId) -> [CoordRef; 4] {
        [
            Self::alpha(cell, Axis::X),
            Self::beta(cell, Axis::X),
            Self::alpha(cell, Axis::Y),
            Self::beta(cell, Axis::Y),
        ]
    }

    /// Dependency-graph node for this coordinate: four consecutive slots
    /// per cell.
    #[inline]
    pub fn node(self) -> NodeId {
        let slot = self.axis.index() * 2 + self.edge.index();
        NodeId::from_raw(self.cell.raw() * 4 + slot as u32)
    }

    /// Inverse of [`node`](Self::node).
    pub fn from_node(node: NodeId) -> Self {
        let raw = node.raw();
        let slot = raw % 4;
        let axis = if slot < 2 { Axis::X } else { Axis::Y };
        let edge = if slot % 2 == 0 { Edge::Alpha } else { Edge::Beta };
        Self::new(CellId::from_raw(raw / 4), axis, edge)
    }
}

impl fmt::Display for CoordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.cell, self.axis, self.edge)
    }
}

// ============================================================================
// Changes
// ============================================================================

bitflags! {
    /// Which parts of a coordinate actually changed in one mutation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Changes: u8 {
        const TARE        = 0b0001;
        const RELATIVE    = 0b0010;
        const ABSOLUTE    = 0b0100;
        const CALCULATION = 0b1000;
    }
}

// ============================================================================
// Coordinate
// ============================================================================

/// One edge of a cell along one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    rule: Rule,
    tare: Option<f32>,
    relative: Option<f32>,
    absolute: Option<f32>,
}

impl Coordinate {
    /// A fresh, unresolved coordinate driven by `rule`.
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            tare: None,
            relative: None,
            absolute: None,
        }
    }

    /// The rule currently producing the relative value.
    #[inline]
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    #[inline]
    pub fn tare(&self) -> Option<f32> {
        self.tare
    }

    /// Value in the parent's local frame, if resolved.
    #[inline]
    pub fn relative_value(&self) -> Option<f32> {
        self.relative
    }

    /// Value in the root frame, if both tare and relative are resolved.
    #[inline]
    pub fn absolute_value(&self) -> Option<f32> {
        self.absolute
    }

    /// Relative value of a coordinate the driver has already resolved.
    ///
    /// # Panics
    ///
    /// Panics if the value is absent: that means a dependent was evaluated
    /// out of order.
    #[track_caller]
    pub fn resolved_relative(&self) -> f32 {
        match self.relative {
            Some(value) => value,
            None => panic!("relative value read before it was resolved"),
        }
    }

    /// Absolute counterpart of [`resolved_relative`](Self::resolved_relative).
    ///
    /// # Panics
    ///
    /// Panics if the tare or the relative value is absent.
    #[track_caller]
    pub fn resolved_absolute(&self) -> f32 {
        match self.absolute {
            Some(value) => value,
            None => panic!("absolute value read before tare and relative value were resolved"),
        }
    }

    pub(crate) fn set_tare(&mut self, tare: Option<f32>) -> Changes {
        if self.tare == tare {
            return Changes::empty();
        }
        self.tare = tare;
        Changes::TARE | self.refresh_absolute()
    }

    pub(crate) fn set_relative(&mut self, relative: Option<f32>) -> Changes {
        if self.relative == relative {
            return Changes::empty();
        }
        self.relative = relative;
        Changes::RELATIVE | self.refresh_absolute()
    }

    pub(crate) fn set_rule(&mut self, rule: Rule) -> Changes {
        self.rule = rule;
        Changes::CALCULATION
    }

    fn refresh_absolute(&mut self) -> Changes {
        let absolute = match (self.tare, self.relative) {
            (Some(tare), Some(relative)) => Some(tare + relative),
            _ => None,
        };
        if absolute == self.absolute {
            Changes::empty()
        } else {
            self.absolute = absolute;
            Changes::ABSOLUTE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_mapping_round_trips() {
        let cell = CellId::from_raw(5);
        for coord in CoordRef::all_of(cell) {
            assert_eq!(CoordRef::from_node(coord.node()), coord);
        }
        assert_eq!(CoordRef::alpha(cell, Axis::X).node().raw(), 20);
        assert_eq!(CoordRef::beta(cell, Axis::Y).node().raw(), 23);
    }

    #[test]
    fn absolute_requires_both_parts() {
        let mut c = Coordinate::new(Rule::pixels(10.0));
        assert_eq!(c.absolute_value(), None);

        let changes = c.set_relative(Some(10.0));
        assert_eq!(changes, Changes::RELATIVE);
        assert_eq!(c.absolute_value(), None);

        let changes = c.set_tare(Some(5.0));
        assert_eq!(changes, Changes::TARE | Changes::ABSOLUTE);
        assert_eq!(c.absolute_value(), Some(15.0));

        let changes = c.set_tare(None);
        assert_eq!(changes, Changes::TARE | Changes::ABSOLUTE);
        assert_eq!(c.absolute_value(), None);
    }

    #[test]
    fn unchanged_values_report_nothing() {
        let mut c = Coordinate::new(Rule::pixels(1.0));
        assert!(c.set_tare(None).is_empty());
        assert!(c.set_relative(None).is_empty());
        c.set_tare(Some(2.0));
        assert!(c.set_tare(Some(2.0)).is_empty());
    }

    #[test]
    fn tare_change_moves_absolute() {
        let mut c = Coordinate::new(Rule::pixels(0.0));
        c.set_tare(Some(0.0));
        c.set_relative(Some(3.0));
        assert_eq!(c.set_relative(Some(3.0)), Changes::empty());
        assert_eq!(c.set_tare(Some(1.0)), Changes::TARE | Changes::ABSOLUTE);
        assert_eq!(c.resolved_absolute(), 4.0);
    }

    #[test]
    fn set_rule_reports_calculation_only() {
        let mut c = Coordinate::new(Rule::pixels(1.0));
        c.set_relative(Some(1.0));
        assert_eq!(c.set_rule(Rule::pixels(2.0)), Changes::CALCULATION);
        // Swapping the rule does not recompute.
        assert_eq!(c.relative_value(), Some(1.0));
    }

    #[test]
    #[should_panic(expected = "relative value read before it was resolved")]
    fn resolved_relative_panics_when_absent() {
        Coordinate::new(Rule::pixels(1.0)).resolved_relative();
    }

    #[test]
    #[should_panic(expected = "absolute value read before")]
    fn resolved_absolute_panics_without_tare() {
        let mut c = Coordinate::new(Rule::pixels(1.0));
        c.set_relative(Some(1.0));
        c.resolved_absolute();
    }
}

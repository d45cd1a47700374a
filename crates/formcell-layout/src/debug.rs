#![forbid(unsafe_code)]

//! Layout introspection.
//!
//! - [`LayoutSnapshot`]: a serializable copy of every cell's tree links,
//!   rules and resolved values, for fixtures and diffing.
//! - [`to_dot`]: the coordinate prerequisite graph in Graphviz DOT format,
//!   one cluster per cell.
//!
//! # Usage
//!
//! ```ignore
//! let snapshot = LayoutSnapshot::capture(&layout);
//! println!("{}", serde_json::to_string_pretty(&snapshot)?);
//! std::fs::write("layout.dot", to_dot(&layout))?;
//! ```

use crate::boundary::Boundary;
use crate::cell::CellId;
use crate::coordinate::{CoordRef, Coordinate};
use crate::layout::CellLayout;
use formcell_core::{Axis, Edge};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One coordinate's rule and values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSnapshot {
    /// The rule, in its display form.
    pub rule: String,
    pub tare: Option<f32>,
    pub relative: Option<f32>,
    pub absolute: Option<f32>,
}

impl CoordinateSnapshot {
    fn of(coordinate: &Coordinate) -> Self {
        Self {
            rule: coordinate.rule().to_string(),
            tare: coordinate.tare(),
            relative: coordinate.relative_value(),
            absolute: coordinate.absolute_value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundarySnapshot {
    pub alpha: CoordinateSnapshot,
    pub beta: CoordinateSnapshot,
}

impl BoundarySnapshot {
    fn of(boundary: &Boundary) -> Self {
        Self {
            alpha: CoordinateSnapshot::of(boundary.alpha()),
            beta: CoordinateSnapshot::of(boundary.beta()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub id: CellId,
    pub parent: Option<CellId>,
    pub children: Vec<CellId>,
    pub x: BoundarySnapshot,
    pub y: BoundarySnapshot,
}

/// Every live cell, in ascending id order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub cells: Vec<CellSnapshot>,
}

impl LayoutSnapshot {
    #[must_use]
    pub fn capture(layout: &CellLayout) -> Self {
        let cells = layout
            .cells()
            .map(|(id, cell)| CellSnapshot {
                id,
                parent: cell.parent(),
                children: cell.children().to_vec(),
                x: BoundarySnapshot::of(cell.boundary(Axis::X)),
                y: BoundarySnapshot::of(cell.boundary(Axis::Y)),
            })
            .collect();
        Self { cells }
    }

    #[must_use]
    pub fn cell(&self, id: CellId) -> Option<&CellSnapshot> {
        self.cells.iter().find(|c| c.id == id)
    }
}

/// Export the prerequisite graph as Graphviz DOT.
///
/// Edges point from a coordinate to the coordinates its rule reads.
/// Unresolved coordinates are drawn grey.
pub fn to_dot(layout: &CellLayout) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "digraph Formcell {{");
    let _ = writeln!(s, "  rankdir=LR;");
    let _ = writeln!(s, "  node [shape=box, fontsize=10];");

    for (id, cell) in layout.cells() {
        let _ = writeln!(s, "  subgraph cluster_{} {{", id.raw());
        let _ = writeln!(s, "    label=\"{id}\";");
        for axis in Axis::ALL {
            for edge in Edge::ALL {
                let coord = CoordRef::new(id, axis, edge);
                let c = cell.coordinate(axis, edge);
                let value = c
                    .relative_value()
                    .map_or_else(|| "?".to_string(), |v| v.to_string());
                let color = if c.relative_value().is_some() {
                    "black"
                } else {
                    "grey"
                };
                let _ = writeln!(
                    s,
                    "    \"{coord}\" [label=\"{axis}.{edge}\\n{}\\n= {value}\", color=\"{color}\"];",
                    escape(&c.rule().to_string()),
                );
            }
        }
        let _ = writeln!(s, "  }}");
    }

    for (id, _) in layout.cells() {
        for coord in CoordRef::all_of(id) {
            for &prereq in layout.graph().dependencies(coord.node()) {
                let _ = writeln!(s, "  \"{coord}\" -> \"{}\";", CoordRef::from_node(prereq));
            }
        }
    }

    let _ = writeln!(s, "}}");
    s
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

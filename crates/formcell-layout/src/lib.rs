#![forbid(unsafe_code)]

//! Formula-driven cell layout.
//!
//! Every edge of a cell's bounding box is a [`Rule`] over other edges: a
//! constant, a share of the parent, the extent of the children, a snap to
//! the previous sibling, or arithmetic over those. [`CellLayout`] keeps the
//! cells in an arena, tracks which coordinates each rule reads, and
//! recomputes only what a mutation can affect.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`rule`] | rule variants and the [`RuleScope`] they evaluate against |
//! | [`coordinate`] | one edge: rule, tare, relative and absolute value |
//! | [`boundary`] / [`cell`] | Alpha/Beta pairs and the tree nodes owning them |
//! | [`dep_graph`] | prerequisite edges, dirty tracking, topological order |
//! | [`layout`] | the evaluation driver |
//! | [`events`] | change notifications |
//! | [`debug`] | snapshots and Graphviz export |

pub mod boundary;
pub mod cell;
pub mod config;
pub mod coordinate;
pub mod debug;
pub mod dep_graph;
pub mod error;
pub mod events;
pub mod layout;
pub mod rule;

pub use boundary::Boundary;
pub use cell::{Cell, CellId, CellRules};
pub use config::LayoutConfig;
pub use coordinate::{Changes, CoordRef, Coordinate};
pub use debug::{LayoutSnapshot, to_dot};
pub use error::{LayoutError, Result};
pub use events::{LayoutEvent, SubscriptionId};
pub use formcell_core::{Axis, Edge, Range};
pub use layout::{CellLayout, EvalStats};
pub use rule::{Adjacency, Composite, Op, Rule, RuleScope, TreeDependence};

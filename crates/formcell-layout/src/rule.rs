//! Calculation rules.
//!
//! A [`Rule`] is a pure function from the current tree state to a scalar,
//! evaluated on behalf of one *owner* coordinate. Rules never hold
//! references into the tree: they resolve parent, siblings and children
//! through a [`RuleScope`] at evaluation time, and name the coordinates they
//! read through [`Rule::prerequisites`] so the driver can order evaluation.
//!
//! # Try semantics
//!
//! [`Rule::try_compute`] returns `None` as soon as anything it needs is
//! unresolved (no parent, no previous sibling, a prerequisite without a
//! relative value). Absence propagates; it is never an error.
//! [`Rule::compute`] is the asserting variant for callers that already know
//! the prerequisites are resolved.
//!
//! # Variants
//!
//! | Rule | Value | Reads |
//! |------|-------|-------|
//! | `Pixels(v)` | `v` | nothing |
//! | `Composite` | left fold of terms with ops | union of terms |
//! | `PercentOfParent(p)` | `p / 100 · parent delta` | parent α, β |
//! | `SizeOfParent` | parent delta | parent α, β |
//! | `SizeOfChildren` | max child β | every child β |
//! | `AdjacentToPrevious` | previous sibling's opposite edge (+ offset) | that edge (+ offset) |
//! | `SideOfPrevious` | previous sibling's named edge (+ offset) | that edge (+ offset) |
//! | `Fallback` | preferred, else fallback | both |

use crate::cell::CellId;
use crate::coordinate::CoordRef;
use bitflags::bitflags;
use formcell_core::Edge;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// RuleScope
// ============================================================================

/// Read-only view of the cell tree used to evaluate rules.
pub trait RuleScope {
    /// Parent of `cell`, if attached.
    fn parent(&self, cell: CellId) -> Option<CellId>;

    /// Ordered children of `cell`.
    fn children(&self, cell: CellId) -> &[CellId];

    /// Sibling immediately before `cell` in its parent's child list.
    fn previous_sibling(&self, cell: CellId) -> Option<CellId> {
        let parent = self.parent(cell)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|&c| c == cell)?;
        index.checked_sub(1).map(|i| siblings[i])
    }

    /// Current relative value of `coord`.
    fn relative_value(&self, coord: CoordRef) -> Option<f32>;
}

// ============================================================================
// Operators and helpers
// ============================================================================

/// Binary operator joining two composite terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Op {
    /// Apply the operator. Division by zero is unresolved.
    pub fn apply(self, lhs: f32, rhs: f32) -> Option<f32> {
        match self {
            Op::Add => Some(lhs + rhs),
            Op::Subtract => Some(lhs - rhs),
            Op::Multiply => Some(lhs * rhs),
            Op::Divide if rhs == 0.0 => None,
            Op::Divide => Some(lhs / rhs),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Subtract => "-",
            Op::Multiply => "*",
            Op::Divide => "/",
        }
    }
}

/// Which edge of the previous sibling an adjacency rule snaps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjacency {
    /// Place this edge at the previous sibling's Beta (lay out forward).
    AlphaToOtherBeta,
    /// Place this edge at the previous sibling's Alpha (lay out backward).
    BetaToOtherAlpha,
}

impl Adjacency {
    /// Edge of the previous sibling that is read.
    #[inline]
    pub const fn target_edge(self) -> Edge {
        match self {
            Adjacency::AlphaToOtherBeta => Edge::Beta,
            Adjacency::BetaToOtherAlpha => Edge::Alpha,
        }
    }
}

bitflags! {
    /// Tree relations a rule's prerequisite set depends on.
    ///
    /// A rule with any of these flags must be rewired whenever the
    /// corresponding relation of its owner changes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TreeDependence: u8 {
        const PARENT   = 0b001;
        const SIBLINGS = 0b010;
        const CHILDREN = 0b100;
    }
}

// ============================================================================
// Composite
// ============================================================================

/// Ordered arithmetic over nested rules.
///
/// Terms are folded strictly left to right in insertion order:
/// `[a, b, c]` with `[+, -]` is `(a + b) - c`. There is always exactly one
/// operator fewer than terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    terms: Vec<Rule>,
    ops: Vec<Op>,
}

impl Composite {
    /// Start a composite from its first term.
    pub fn new(first: Rule) -> Self {
        Self {
            terms: vec![first],
            ops: Vec::new(),
        }
    }

    /// Append `term`, joined to everything before it by `op`.
    #[must_use]
    pub fn then(mut self, op: Op, term: Rule) -> Self {
        self.ops.push(op);
        self.terms.push(term);
        self
    }

    #[must_use]
    pub fn add(self, term: Rule) -> Self {
        self.then(Op::Add, term)
    }

    #[must_use]
    pub fn subtract(self, term: Rule) -> Self {
        self.then(Op::Subtract, term)
    }

    #[must_use]
    pub fn multiply(self, term: Rule) -> Self {
        self.then(Op::Multiply, term)
    }

    #[must_use]
    pub fn divide(self, term: Rule) -> Self {
        self.then(Op::Divide, term)
    }

    pub fn terms(&self) -> &[Rule] {
        &self.terms
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Short-circuiting fold: the first unresolved term (or division by
    /// zero) makes the whole composite unresolved.
    fn try_compute<S: RuleScope + ?Sized>(&self, scope: &S, owner: CoordRef) -> Option<f32> {
        let (first, rest) = self.terms.split_first()?;
        let mut acc = first.try_compute(scope, owner)?;
        for (op, term) in self.ops.iter().zip(rest) {
            let value = term.try_compute(scope, owner)?;
            acc = op.apply(acc, value)?;
        }
        Some(acc)
    }
}

impl From<Composite> for Rule {
    fn from(composite: Composite) -> Self {
        Rule::Composite(composite)
    }
}

// ============================================================================
// Rule
// ============================================================================

/// How a coordinate's relative value is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// A fixed value.
    Pixels(f32),
    /// Ordered arithmetic over nested rules.
    Composite(Composite),
    /// Percentage (0–100) of the parent's relative extent on the same axis.
    PercentOfParent(f32),
    /// The parent's relative extent on the same axis.
    SizeOfParent,
    /// Largest Beta relative value among the children, same axis.
    SizeOfChildren,
    /// Snap to the previous sibling's edge selected by `adjacency`.
    AdjacentToPrevious {
        adjacency: Adjacency,
        offset: Option<Box<Rule>>,
    },
    /// Snap to the previous sibling's `side` edge.
    SideOfPrevious {
        side: Edge,
        offset: Option<Box<Rule>>,
    },
    /// `preferred` when it resolves, otherwise `fallback`.
    Fallback {
        preferred: Box<Rule>,
        fallback: Box<Rule>,
    },
}

impl Rule {
    pub fn pixels(value: f32) -> Self {
        Rule::Pixels(value)
    }

    pub fn percent_of_parent(percent: f32) -> Self {
        Rule::PercentOfParent(percent)
    }

    pub fn size_of_parent() -> Self {
        Rule::SizeOfParent
    }

    pub fn size_of_children() -> Self {
        Rule::SizeOfChildren
    }

    pub fn adjacent_to_previous(adjacency: Adjacency) -> Self {
        Rule::AdjacentToPrevious {
            adjacency,
            offset: None,
        }
    }

    pub fn side_of_previous(side: Edge) -> Self {
        Rule::SideOfPrevious { side, offset: None }
    }

    /// Add `offset` to this rule.
    ///
    /// Sibling rules store it as their own offset (replacing any previous
    /// one); every other rule becomes a `self + offset` composite.
    #[must_use]
    pub fn offset_by(self, offset: Rule) -> Self {
        match self {
            Rule::AdjacentToPrevious { adjacency, .. } => Rule::AdjacentToPrevious {
                adjacency,
                offset: Some(Box::new(offset)),
            },
            Rule::SideOfPrevious { side, .. } => Rule::SideOfPrevious {
                side,
                offset: Some(Box::new(offset)),
            },
            other => Composite::new(other).add(offset).into(),
        }
    }

    /// Use `fallback` whenever this rule is unresolved.
    #[must_use]
    pub fn or(self, fallback: Rule) -> Self {
        Rule::Fallback {
            preferred: Box::new(self),
            fallback: Box::new(fallback),
        }
    }

    /// Evaluate for `owner`, or `None` if anything needed is unresolved.
    pub fn try_compute<S: RuleScope + ?Sized>(&self, scope: &S, owner: CoordRef) -> Option<f32> {
        match self {
            Rule::Pixels(value) => Some(*value),
            Rule::Composite(composite) => composite.try_compute(scope, owner),
            Rule::PercentOfParent(percent) => {
                parent_extent(scope, owner).map(|extent| percent / 100.0 * extent)
            }
            Rule::SizeOfParent => parent_extent(scope, owner),
            Rule::SizeOfChildren => {
                let children = scope.children(owner.cell);
                let mut widest: Option<f32> = None;
                for &child in children {
                    let beta = scope.relative_value(CoordRef::beta(child, owner.axis))?;
                    widest = Some(widest.map_or(beta, |w| w.max(beta)));
                }
                widest
            }
            Rule::AdjacentToPrevious { adjacency, offset } => {
                previous_edge(scope, owner, adjacency.target_edge(), offset.as_deref())
            }
            Rule::SideOfPrevious { side, offset } => {
                previous_edge(scope, owner, *side, offset.as_deref())
            }
            Rule::Fallback {
                preferred,
                fallback,
            } => preferred
                .try_compute(scope, owner)
                .or_else(|| fallback.try_compute(scope, owner)),
        }
    }

    /// Evaluate for `owner`, asserting that the result is resolved.
    ///
    /// # Panics
    ///
    /// Panics if [`try_compute`](Self::try_compute) returns `None`; that
    /// signals an evaluation-order bug in the caller.
    #[track_caller]
    pub fn compute<S: RuleScope + ?Sized>(&self, scope: &S, owner: CoordRef) -> f32 {
        match self.try_compute(scope, owner) {
            Some(value) => value,
            None => panic!("rule `{self}` for {owner} evaluated before its prerequisites resolved"),
        }
    }

    /// Coordinates this rule reads when evaluated for `owner`, deduplicated
    /// in first-seen order.
    pub fn prerequisites<S: RuleScope + ?Sized>(&self, scope: &S, owner: CoordRef) -> Vec<CoordRef> {
        let mut out = Vec::new();
        self.collect_prerequisites(scope, owner, &mut out);
        let mut unique = Vec::with_capacity(out.len());
        for coord in out {
            if !unique.contains(&coord) {
                unique.push(coord);
            }
        }
        unique
    }

    fn collect_prerequisites<S: RuleScope + ?Sized>(
        &self,
        scope: &S,
        owner: CoordRef,
        out: &mut Vec<CoordRef>,
    ) {
        match self {
            Rule::Pixels(_) => {}
            Rule::Composite(composite) => {
                for term in composite.terms() {
                    term.collect_prerequisites(scope, owner, out);
                }
            }
            Rule::PercentOfParent(_) | Rule::SizeOfParent => {
                if let Some(parent) = scope.parent(owner.cell) {
                    out.push(CoordRef::alpha(parent, owner.axis));
                    out.push(CoordRef::beta(parent, owner.axis));
                }
            }
            Rule::SizeOfChildren => {
                out.extend(
                    scope
                        .children(owner.cell)
                        .iter()
                        .map(|&child| CoordRef::beta(child, owner.axis)),
                );
            }
            Rule::AdjacentToPrevious { adjacency, offset } => {
                if let Some(previous) = scope.previous_sibling(owner.cell) {
                    out.push(CoordRef::new(previous, owner.axis, adjacency.target_edge()));
                }
                if let Some(offset) = offset {
                    offset.collect_prerequisites(scope, owner, out);
                }
            }
            Rule::SideOfPrevious { side, offset } => {
                if let Some(previous) = scope.previous_sibling(owner.cell) {
                    out.push(CoordRef::new(previous, owner.axis, *side));
                }
                if let Some(offset) = offset {
                    offset.collect_prerequisites(scope, owner, out);
                }
            }
            // Both branches, always: only one drives the value at any time,
            // but either may become the active one.
            Rule::Fallback {
                preferred,
                fallback,
            } => {
                preferred.collect_prerequisites(scope, owner, out);
                fallback.collect_prerequisites(scope, owner, out);
            }
        }
    }

    /// Tree relations whose change can alter [`prerequisites`](Self::prerequisites).
    pub fn tree_dependence(&self) -> TreeDependence {
        match self {
            Rule::Pixels(_) => TreeDependence::empty(),
            Rule::Composite(composite) => composite
                .terms()
                .iter()
                .fold(TreeDependence::empty(), |acc, t| acc | t.tree_dependence()),
            Rule::PercentOfParent(_) | Rule::SizeOfParent => TreeDependence::PARENT,
            Rule::SizeOfChildren => TreeDependence::CHILDREN,
            Rule::AdjacentToPrevious { offset, .. } | Rule::SideOfPrevious { offset, .. } => {
                TreeDependence::SIBLINGS
                    | offset
                        .as_deref()
                        .map_or(TreeDependence::empty(), Rule::tree_dependence)
            }
            Rule::Fallback {
                preferred,
                fallback,
            } => preferred.tree_dependence() | fallback.tree_dependence(),
        }
    }
}

/// Signed relative extent of the owner's parent on the owner's axis.
/// An inverted parent yields a negative size.
fn parent_extent<S: RuleScope + ?Sized>(scope: &S, owner: CoordRef) -> Option<f32> {
    let parent = scope.parent(owner.cell)?;
    let alpha = scope.relative_value(CoordRef::alpha(parent, owner.axis))?;
    let beta = scope.relative_value(CoordRef::beta(parent, owner.axis))?;
    Some(beta - alpha)
}

fn previous_edge<S: RuleScope + ?Sized>(
    scope: &S,
    owner: CoordRef,
    edge: Edge,
    offset: Option<&Rule>,
) -> Option<f32> {
    let previous = scope.previous_sibling(owner.cell)?;
    let base = scope.relative_value(CoordRef::new(previous, owner.axis, edge))?;
    match offset {
        Some(offset) => Some(base + offset.try_compute(scope, owner)?),
        None => Some(base),
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Pixels(value) => write!(f, "{value}px"),
            Rule::Composite(composite) => {
                let (first, rest) = match composite.terms.split_first() {
                    Some(split) => split,
                    None => return f.write_str("()"),
                };
                write!(f, "({first}")?;
                for (op, term) in composite.ops.iter().zip(rest) {
                    write!(f, " {} {term}", op.symbol())?;
                }
                f.write_str(")")
            }
            Rule::PercentOfParent(percent) => write!(f, "{percent}%"),
            Rule::SizeOfParent => f.write_str("parent"),
            Rule::SizeOfChildren => f.write_str("children"),
            Rule::AdjacentToPrevious { adjacency, offset } => {
                write!(f, "prev.{}", adjacency.target_edge())?;
                offset_suffix(f, offset.as_deref())
            }
            Rule::SideOfPrevious { side, offset } => {
                write!(f, "prev.{side}")?;
                offset_suffix(f, offset.as_deref())
            }
            Rule::Fallback {
                preferred,
                fallback,
            } => write!(f, "{preferred} ?? {fallback}"),
        }
    }
}

fn offset_suffix(f: &mut fmt::Formatter<'_>, offset: Option<&Rule>) -> fmt::Result {
    match offset {
        Some(offset) => write!(f, " + {offset}"),
        None => Ok(()),
    }
}

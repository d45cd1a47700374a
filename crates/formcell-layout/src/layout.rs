#![forbid(unsafe_code)]

//! Evaluation driver: the cell arena, its prerequisite graph and the
//! incremental recomputation loop.
//!
//! # Key Invariants
//!
//! 1. Every live coordinate has a graph node whose forward edges are exactly
//!    `rule.prerequisites(..)` for the current tree shape.
//! 2. The graph is acyclic. Any mutation that would close a cycle is
//!    rejected and leaves the layout as it was.
//! 3. A child's four tares equal its parent's Alpha absolute value on the
//!    same axis. A root's tares come from [`LayoutConfig::root_origin`] or
//!    [`CellLayout::seed_root`]; a detached cell's tares are absent.
//! 4. After [`CellLayout::evaluate`], the layout is identical to what a
//!    full recomputation of every coordinate would produce.
//!
//! # Incremental Passes
//!
//! Mutations only mark coordinates dirty. `evaluate` expands the dirty
//! seeds to their transitive dependents, orders them prerequisites-first,
//! and recomputes a coordinate only if it is a seed or one of its
//! prerequisites changed relative value earlier in the same pass. Rules
//! read relative values only, so tare and absolute changes never dirty a
//! dependent; they are pushed down the tree directly instead.
//!
//! # Force-Full Fallback
//!
//! [`LayoutConfig::force_full`] (or `FORMCELL_FULL_EVAL=1` through
//! [`LayoutConfig::from_env`]) seeds every coordinate on each pass.

use crate::cell::{Cell, CellId, CellRules};
use crate::config::LayoutConfig;
use crate::coordinate::{Changes, CoordRef, Coordinate};
use crate::debug::LayoutSnapshot;
use crate::dep_graph::{DepGraph, NodeId};
use crate::error::{LayoutError, Result};
use crate::events::{LayoutEvent, Subscribers, SubscriptionId};
use crate::rule::{Rule, RuleScope, TreeDependence};
use formcell_core::{Axis, Edge, Range};
use rustc_hash::FxHashSet;
use std::fmt;

// ============================================================================
// EvalStats
// ============================================================================

/// Counters for one [`CellLayout::evaluate`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// Coordinates whose rule was run.
    pub recomputed: usize,
    /// Dirty coordinates skipped because no prerequisite changed.
    pub skipped: usize,
    /// Recomputed coordinates that came out unresolved.
    pub unresolved: usize,
    /// Size of the dirty closure.
    pub total: usize,
}

impl EvalStats {
    /// Fraction of the dirty closure that was skipped (0.0 – 1.0).
    pub fn skip_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.skipped as f64 / self.total as f64
        }
    }
}

// ============================================================================
// CellLayout
// ============================================================================

/// Arena of cells plus the machinery that keeps their coordinates current.
///
/// # Examples
///
/// ```
/// use formcell_layout::{CellLayout, CellRules, Rule};
/// use formcell_layout::rule::Adjacency;
/// use formcell_core::Axis;
///
/// let mut layout = CellLayout::new();
/// let root = layout.create_cell(None, None, CellRules::fixed(0.0, 0.0, 400.0, 300.0))?;
/// let left = layout.create_cell(Some(root), None, CellRules::fixed(10.0, 0.0, 50.0, 20.0))?;
/// let right = layout.create_cell(
///     Some(root),
///     None,
///     CellRules::fixed(0.0, 0.0, 0.0, 20.0).with_axis(
///         Axis::X,
///         Rule::adjacent_to_previous(Adjacency::AlphaToOtherBeta),
///         Rule::percent_of_parent(100.0),
///     ),
/// )?;
/// layout.evaluate()?;
///
/// let range = layout.relative_range(right, Axis::X).unwrap();
/// assert_eq!(range.minimum(), 60.0);
/// assert_eq!(range.maximum(), 400.0);
/// # let _ = left;
/// # Ok::<(), formcell_layout::LayoutError>(())
/// ```
pub struct CellLayout {
    cells: Vec<Option<Cell>>,
    /// Freed arena slots, reused last-in first-out.
    free: Vec<CellId>,
    graph: DepGraph,
    subscribers: Subscribers,
    config: LayoutConfig,
    stats: EvalStats,
}

impl CellLayout {
    /// Empty layout with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::default())
    }

    #[must_use]
    pub fn with_config(config: LayoutConfig) -> Self {
        Self {
            cells: Vec::with_capacity(config.cell_capacity),
            free: Vec::new(),
            graph: DepGraph::with_capacity(config.cell_capacity * 4),
            subscribers: Subscribers::new(),
            config,
            stats: EvalStats::default(),
        }
    }

    /// Layout configured from the environment. See [`LayoutConfig::from_env`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_config(LayoutConfig::from_env())
    }

    // ── Configuration ────────────────────────────────────────────────

    #[must_use]
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn set_force_full(&mut self, force: bool) {
        self.config.force_full = force;
    }

    /// Counters from the most recent [`evaluate`](Self::evaluate).
    #[must_use]
    pub fn stats(&self) -> EvalStats {
        self.stats
    }

    #[must_use]
    pub fn graph(&self) -> &DepGraph {
        &self.graph
    }

    /// Serializable copy of every live cell's rules and values.
    #[must_use]
    pub fn snapshot(&self) -> LayoutSnapshot {
        LayoutSnapshot::capture(self)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register a change handler. See [`crate::events`].
    pub fn subscribe(&mut self, handler: impl FnMut(&LayoutEvent) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    fn publish(&mut self, event: LayoutEvent) {
        self.subscribers.publish(&event);
    }

    fn publish_all(&mut self, events: Vec<LayoutEvent>) {
        for event in events {
            self.subscribers.publish(&event);
        }
    }

    // ── Read access ──────────────────────────────────────────────────

    /// Number of live cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.iter().filter(|slot| slot.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, cell: CellId) -> bool {
        self.cell(cell).is_some()
    }

    #[must_use]
    pub fn cell(&self, cell: CellId) -> Option<&Cell> {
        self.cells.get(cell.index()).and_then(Option::as_ref)
    }

    /// Live cells in ascending id order.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|cell| (CellId::from_raw(i as u32), cell)))
    }

    /// Cells without a parent, in ascending id order.
    pub fn roots(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells()
            .filter(|(_, cell)| cell.parent().is_none())
            .map(|(id, _)| id)
    }

    #[must_use]
    pub fn parent(&self, cell: CellId) -> Option<CellId> {
        self.cell(cell).and_then(Cell::parent)
    }

    /// Ordered children; empty for an unknown cell.
    #[must_use]
    pub fn children(&self, cell: CellId) -> &[CellId] {
        self.cell(cell).map(Cell::children).unwrap_or(&[])
    }

    #[must_use]
    pub fn previous_sibling(&self, cell: CellId) -> Option<CellId> {
        RuleScope::previous_sibling(self, cell)
    }

    /// Whether `cell` lies in the subtree rooted at `ancestor` (inclusive).
    #[must_use]
    pub fn is_within(&self, cell: CellId, ancestor: CellId) -> bool {
        let mut current = Some(cell);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.parent(c);
        }
        false
    }

    #[must_use]
    pub fn coordinate(&self, coord: CoordRef) -> Option<&Coordinate> {
        self.cell(coord.cell)
            .map(|cell| cell.coordinate(coord.axis, coord.edge))
    }

    #[must_use]
    pub fn relative_value(&self, coord: CoordRef) -> Option<f32> {
        self.coordinate(coord).and_then(Coordinate::relative_value)
    }

    #[must_use]
    pub fn absolute_value(&self, coord: CoordRef) -> Option<f32> {
        self.coordinate(coord).and_then(Coordinate::absolute_value)
    }

    #[must_use]
    pub fn relative_range(&self, cell: CellId, axis: Axis) -> Option<Range> {
        self.cell(cell)?.boundary(axis).relative_range()
    }

    #[must_use]
    pub fn absolute_range(&self, cell: CellId, axis: Axis) -> Option<Range> {
        self.cell(cell)?.boundary(axis).absolute_range()
    }

    /// Signed `beta - alpha` on `axis`; negative for an inverted boundary.
    #[must_use]
    pub fn relative_extent(&self, cell: CellId, axis: Axis) -> Option<f32> {
        self.cell(cell)?.boundary(axis).relative_extent()
    }

    /// Whether `coord` waits for the next [`evaluate`](Self::evaluate).
    #[must_use]
    pub fn is_dirty(&self, coord: CoordRef) -> bool {
        self.graph.is_dirty(coord.node()) || self.graph.pending().contains(&coord.node())
    }

    fn require(&self, cell: CellId) -> Result<&Cell> {
        self.cell(cell).ok_or(LayoutError::UnknownCell { cell })
    }

    fn cell_mut(&mut self, cell: CellId) -> Result<&mut Cell> {
        self.cells
            .get_mut(cell.index())
            .and_then(Option::as_mut)
            .ok_or(LayoutError::UnknownCell { cell })
    }

    // ── Structure ────────────────────────────────────────────────────

    /// Create a cell from four rules, optionally attached under `parent`
    /// at `index` (appended when `None`).
    ///
    /// A cell created without a parent is a root and gets its tares from
    /// [`LayoutConfig::root_origin`]. All four coordinates start dirty.
    pub fn create_cell(
        &mut self,
        parent: Option<CellId>,
        index: Option<usize>,
        rules: CellRules,
    ) -> Result<CellId> {
        if let Some(parent) = parent {
            let len = self.require(parent)?.children().len();
            check_index(parent, index, len)?;
        }

        let id = match self.free.pop() {
            Some(id) => {
                self.cells[id.index()] = Some(Cell::new(rules));
                id
            }
            None => {
                let id = CellId::from_raw(self.cells.len() as u32);
                self.cells.push(Some(Cell::new(rules)));
                id
            }
        };
        for coord in CoordRef::all_of(id) {
            self.graph.ensure_node(coord.node());
        }

        let mut tree_events = vec![LayoutEvent::CellCreated { cell: id }];
        if let Some(parent) = parent {
            self.link(id, parent, index);
            let affected = self.family_coords(id, &[parent]);
            let edge_events = match self.rewire(&affected) {
                Ok(events) => events,
                Err(err) => {
                    self.unlink(id);
                    self.release(id);
                    return Err(err);
                }
            };
            tree_events.push(LayoutEvent::ParentChanged {
                cell: id,
                old: None,
                new: Some(parent),
            });
            tree_events.push(LayoutEvent::ChildrenChanged { cell: parent });
            self.publish_all(tree_events);
            self.publish_all(edge_events);
        } else {
            let edge_events = match self.rewire(&CoordRef::all_of(id)) {
                Ok(events) => events,
                Err(err) => {
                    self.release(id);
                    return Err(err);
                }
            };
            self.publish_all(tree_events);
            self.publish_all(edge_events);
        }

        for coord in CoordRef::all_of(id) {
            self.graph.mark_dirty(coord.node());
        }
        let tares = self.inherited_tares(id);
        self.set_cell_tares(id, tares);
        tracing::debug!(cell = %id, parent = ?parent, "cell created");
        Ok(id)
    }

    /// Move `cell` under `parent` at `index` (appended when `None`).
    ///
    /// Fails with [`LayoutError::InvalidParent`] if `parent` is `cell` or one
    /// of its descendants. Reparenting within the same parent reorders.
    pub fn reparent(&mut self, cell: CellId, parent: CellId, index: Option<usize>) -> Result<()> {
        self.require(cell)?;
        let siblings = self.require(parent)?.children().len();
        if self.is_within(parent, cell) {
            return Err(LayoutError::InvalidParent { cell, parent });
        }
        let old_parent = self.parent(cell);
        let len = if old_parent == Some(parent) {
            siblings - 1
        } else {
            siblings
        };
        check_index(parent, index, len)?;

        let old_index = self.unlink(cell);
        self.link(cell, parent, index);

        let mut parents = vec![parent];
        parents.extend(old_parent.filter(|&old| old != parent));
        let affected = self.family_coords(cell, &parents);
        let edge_events = match self.rewire(&affected) {
            Ok(events) => events,
            Err(err) => {
                self.unlink(cell);
                if let (Some(old), Some(at)) = (old_parent, old_index) {
                    self.link(cell, old, Some(at));
                }
                return Err(err);
            }
        };

        let mut tree_events = vec![LayoutEvent::ParentChanged {
            cell,
            old: old_parent,
            new: Some(parent),
        }];
        if let Some(old) = old_parent.filter(|&old| old != parent) {
            tree_events.push(LayoutEvent::ChildrenChanged { cell: old });
        }
        tree_events.push(LayoutEvent::ChildrenChanged { cell: parent });
        self.publish_all(tree_events);
        self.publish_all(edge_events);

        let tares = self.inherited_tares(cell);
        self.set_cell_tares(cell, tares);
        tracing::debug!(cell = %cell, old = ?old_parent, new = %parent, "cell reparented");
        Ok(())
    }

    /// Detach `cell` from its parent, making it a root with absent tares.
    ///
    /// Detaching a root is a no-op. The subtree keeps its own structure;
    /// call [`seed_root`](Self::seed_root) to give it absolute values again.
    pub fn detach(&mut self, cell: CellId) -> Result<()> {
        if self.require(cell)?.parent().is_none() {
            return Ok(());
        }
        self.detach_inner(cell)?;
        self.set_cell_tares(cell, [None, None]);
        Ok(())
    }

    fn detach_inner(&mut self, cell: CellId) -> Result<()> {
        let Some(parent) = self.require(cell)?.parent() else {
            return Ok(());
        };
        let old_index = self.unlink(cell);
        let affected = self.family_coords(cell, &[parent]);
        let edge_events = match self.rewire(&affected) {
            Ok(events) => events,
            Err(err) => {
                self.link(cell, parent, old_index);
                return Err(err);
            }
        };
        self.publish_all(vec![
            LayoutEvent::ParentChanged {
                cell,
                old: Some(parent),
                new: None,
            },
            LayoutEvent::ChildrenChanged { cell: parent },
        ]);
        self.publish_all(edge_events);
        tracing::debug!(cell = %cell, parent = %parent, "cell detached");
        Ok(())
    }

    /// Remove `cell` and its whole subtree. Returns the removed ids,
    /// `cell` first.
    pub fn remove_cell(&mut self, cell: CellId) -> Result<Vec<CellId>> {
        self.detach_inner(cell)?;

        let mut removed = Vec::new();
        let mut stack = vec![cell];
        while let Some(current) = stack.pop() {
            removed.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        for &id in &removed {
            self.release(id);
            self.publish(LayoutEvent::CellRemoved { cell: id });
        }
        tracing::debug!(cell = %cell, count = removed.len(), "subtree removed");
        Ok(removed)
    }

    /// Give a root cell explicit tares.
    pub fn seed_root(&mut self, cell: CellId, x: f32, y: f32) -> Result<()> {
        if self.require(cell)?.parent().is_some() {
            return Err(LayoutError::NotRoot { cell });
        }
        self.set_cell_tares(cell, [Some(x), Some(y)]);
        Ok(())
    }

    /// Insert `cell` into `parent`'s children. Indices are pre-checked.
    fn link(&mut self, cell: CellId, parent: CellId, index: Option<usize>) {
        if let Ok(p) = self.cell_mut(parent) {
            let at = index.unwrap_or(p.children.len()).min(p.children.len());
            p.children.insert(at, cell);
        }
        if let Ok(c) = self.cell_mut(cell) {
            c.parent = Some(parent);
        }
    }

    /// Remove `cell` from its parent's children, returning its old index.
    fn unlink(&mut self, cell: CellId) -> Option<usize> {
        let parent = self.cell_mut(cell).ok()?.parent.take()?;
        let p = self.cell_mut(parent).ok()?;
        let at = p.children.iter().position(|&c| c == cell)?;
        p.children.remove(at);
        Some(at)
    }

    /// Drop a cell's slot and graph nodes. Tree links are left alone.
    fn release(&mut self, cell: CellId) {
        for coord in CoordRef::all_of(cell) {
            self.graph.remove_node(coord.node());
        }
        if let Some(slot) = self.cells.get_mut(cell.index())
            && slot.take().is_some()
        {
            self.free.push(cell);
        }
    }

    /// Coordinates whose prerequisites may have moved after `moved` changed
    /// position under `parents` (old and new).
    ///
    /// The moved cell rewires rules that read its parent or previous
    /// sibling, each parent rewires rules over its children, and every
    /// current child of a parent rewires rules over its previous sibling.
    fn family_coords(&self, moved: CellId, parents: &[CellId]) -> Vec<CoordRef> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        let mut take = |coords: Vec<CoordRef>| {
            out.extend(coords.into_iter().filter(|&coord| seen.insert(coord)));
        };
        take(self.coords_reading(moved, TreeDependence::PARENT | TreeDependence::SIBLINGS));
        for &parent in parents {
            take(self.coords_reading(parent, TreeDependence::CHILDREN));
            for &child in self.children(parent) {
                take(self.coords_reading(child, TreeDependence::SIBLINGS));
            }
        }
        out
    }

    /// Coordinates of `cell` whose rule depends on any of `relations`.
    fn coords_reading(&self, cell: CellId, relations: TreeDependence) -> Vec<CoordRef> {
        CoordRef::all_of(cell)
            .into_iter()
            .filter(|&coord| {
                self.coordinate(coord)
                    .is_some_and(|c| c.rule().tree_dependence().intersects(relations))
            })
            .collect()
    }

    // ── Rules ────────────────────────────────────────────────────────

    /// Replace the rule of `coord`.
    ///
    /// The new prerequisite set is checked for cycles first; on error the
    /// old rule stays. The coordinate is marked dirty but not recomputed.
    pub fn set_rule(&mut self, coord: CoordRef, rule: Rule) -> Result<()> {
        self.install_rule(coord, rule, LayoutEvent::CalculationChanged { coord })
    }

    /// Edit the rule of `coord` in place, e.g. to change a constant.
    pub fn modify_rule(&mut self, coord: CoordRef, edit: impl FnOnce(&mut Rule)) -> Result<()> {
        let mut rule = self
            .coordinate(coord)
            .ok_or(LayoutError::UnknownCell { cell: coord.cell })?
            .rule()
            .clone();
        edit(&mut rule);
        self.install_rule(coord, rule, LayoutEvent::Invalidated { coord })
    }

    fn install_rule(&mut self, coord: CoordRef, rule: Rule, event: LayoutEvent) -> Result<()> {
        self.require(coord.cell)?;
        let node = coord.node();
        let old: Vec<NodeId> = self.graph.dependencies(node).to_vec();
        let next: Vec<NodeId> = rule
            .prerequisites(&*self, coord)
            .into_iter()
            .map(CoordRef::node)
            .collect();
        if let Err(err) = self.graph.set_dependencies(node, &next) {
            let err = LayoutError::from(err);
            tracing::warn!(coord = %coord, rule = %rule, error = %err, "rule rejected");
            return Err(err);
        }

        tracing::trace!(coord = %coord, rule = %rule, "rule installed");
        self.cell_mut(coord.cell)?
            .coordinate_mut(coord.axis, coord.edge)
            .set_rule(rule);
        self.publish(event);
        let edge_events = edge_diff(coord, &old, &next);
        self.publish_all(edge_events);
        self.graph.mark_dirty(node);
        Ok(())
    }

    /// Recompute prerequisite edges for `coords` as one atomic step.
    ///
    /// On a cycle every touched edge list is restored. On success the edge
    /// events are returned for the caller to publish and every coordinate
    /// whose edges changed is marked dirty.
    fn rewire(&mut self, coords: &[CoordRef]) -> Result<Vec<LayoutEvent>> {
        let saved: Vec<Vec<NodeId>> = coords
            .iter()
            .map(|c| self.graph.dependencies(c.node()).to_vec())
            .collect();
        let plans: Vec<Vec<NodeId>> = coords
            .iter()
            .map(|&c| self.prerequisite_nodes(c))
            .collect();

        for (coord, next) in coords.iter().zip(&plans) {
            if let Err(err) = self.graph.set_dependencies(coord.node(), next) {
                self.restore_edges(coords, &saved);
                let err = LayoutError::from(err);
                tracing::warn!(error = %err, "structural change rejected");
                return Err(err);
            }
        }

        let mut events = Vec::new();
        for ((&coord, old), next) in coords.iter().zip(&saved).zip(&plans) {
            let diff = edge_diff(coord, old, next);
            if !diff.is_empty() {
                self.graph.mark_dirty(coord.node());
                events.extend(diff);
            }
        }
        Ok(events)
    }

    fn restore_edges(&mut self, coords: &[CoordRef], saved: &[Vec<NodeId>]) {
        for coord in coords {
            self.graph.clear_dependencies(coord.node());
        }
        for (coord, prereqs) in coords.iter().zip(saved) {
            let restored = self.graph.set_dependencies(coord.node(), prereqs);
            debug_assert!(restored.is_ok(), "a previously acyclic edge set closed a cycle");
        }
    }

    fn prerequisite_nodes(&self, coord: CoordRef) -> Vec<NodeId> {
        self.coordinate(coord).map_or_else(Vec::new, |c| {
            c.rule()
                .prerequisites(self, coord)
                .into_iter()
                .map(CoordRef::node)
                .collect()
        })
    }

    // ── Values ───────────────────────────────────────────────────────

    /// Run the rule of `coord` now and store the result.
    ///
    /// Dependents are marked dirty when the relative value changes, so the
    /// next [`evaluate`](Self::evaluate) brings them up to date.
    pub fn calculate(&mut self, coord: CoordRef) -> Result<Option<f32>> {
        self.require(coord.cell)?;
        let changes = self.recalculate(coord);
        if changes.contains(Changes::RELATIVE) {
            let dependents = self.graph.dependents(coord.node()).to_vec();
            for dependent in dependents {
                self.graph.mark_dirty(dependent);
            }
        }
        Ok(self.relative_value(coord))
    }

    fn recalculate(&mut self, coord: CoordRef) -> Changes {
        let Some(current) = self.coordinate(coord) else {
            return Changes::empty();
        };
        let value = current.rule().try_compute(&*self, coord);
        tracing::trace!(coord = %coord, value = ?value, "recalculated");
        self.write_coordinate(coord, |c| c.set_relative(value))
    }

    /// Bring every dirty coordinate and its dependents up to date.
    pub fn evaluate(&mut self) -> Result<EvalStats> {
        let _span = tracing::debug_span!(
            "formcell.evaluate",
            force_full = self.config.force_full,
            recomputed = tracing::field::Empty,
        )
        .entered();

        if self.config.force_full {
            self.graph.invalidate_all();
        }
        let seeds: FxHashSet<NodeId> = self.graph.pending().iter().copied().collect();
        let order = match self.graph.propagate() {
            Ok(order) => order,
            Err(err) => {
                for &seed in &seeds {
                    self.graph.mark_dirty(seed);
                }
                let err = LayoutError::from(err);
                tracing::warn!(error = %err, "evaluation aborted");
                return Err(err);
            }
        };

        let mut stats = EvalStats {
            total: order.len(),
            ..EvalStats::default()
        };
        let mut changed: FxHashSet<NodeId> = FxHashSet::default();
        let mut touched: FxHashSet<CellId> = FxHashSet::default();
        for node in order {
            let needed = seeds.contains(&node)
                || self
                    .graph
                    .dependencies(node)
                    .iter()
                    .any(|p| changed.contains(p));
            if needed {
                let coord = CoordRef::from_node(node);
                let changes = self.recalculate(coord);
                stats.recomputed += 1;
                if self.relative_value(coord).is_none() {
                    stats.unresolved += 1;
                }
                if changes.contains(Changes::RELATIVE) {
                    changed.insert(node);
                    touched.insert(coord.cell);
                }
            } else {
                stats.skipped += 1;
            }
            self.graph.clean(node);
        }

        let mut touched: Vec<CellId> = touched.into_iter().collect();
        touched.sort_unstable();
        for cell in touched {
            self.warn_inverted(cell);
        }

        tracing::Span::current().record("recomputed", stats.recomputed);
        tracing::debug!(
            recomputed = stats.recomputed,
            skipped = stats.skipped,
            unresolved = stats.unresolved,
            "evaluation pass complete"
        );
        self.stats = stats;
        Ok(stats)
    }

    fn warn_inverted(&self, cell: CellId) {
        let Some(c) = self.cell(cell) else {
            return;
        };
        for axis in Axis::ALL {
            let boundary = c.boundary(axis);
            if boundary.is_inverted() {
                tracing::warn!(
                    cell = %cell,
                    axis = %axis,
                    alpha = ?boundary.alpha().relative_value(),
                    beta = ?boundary.beta().relative_value(),
                    "inverted boundary"
                );
            }
        }
    }

    // ── Tares ────────────────────────────────────────────────────────

    /// Tares a cell should carry given its current position in the tree.
    fn inherited_tares(&self, cell: CellId) -> [Option<f32>; 2] {
        match self.parent(cell) {
            Some(parent) => Axis::ALL.map(|axis| self.absolute_value(CoordRef::alpha(parent, axis))),
            None => {
                let (x, y) = self.config.root_origin;
                [Some(x), Some(y)]
            }
        }
    }

    fn set_cell_tares(&mut self, cell: CellId, tares: [Option<f32>; 2]) {
        for axis in Axis::ALL {
            if self.set_axis_tare(cell, axis, tares[axis.index()]) {
                self.cascade_tare(cell, axis);
            }
        }
    }

    /// Set both tares of `cell` on `axis`. Returns whether its Alpha
    /// absolute moved.
    fn set_axis_tare(&mut self, cell: CellId, axis: Axis, tare: Option<f32>) -> bool {
        let mut moved = false;
        for edge in Edge::ALL {
            let changes = self.write_raw(CoordRef::new(cell, axis, edge), |c| c.set_tare(tare));
            moved |= edge == Edge::Alpha && changes.contains(Changes::ABSOLUTE);
        }
        moved
    }

    /// Push `origin`'s Alpha absolute on `axis` down to its children, and
    /// on through every descendant whose own Alpha absolute moves.
    fn cascade_tare(&mut self, origin: CellId, axis: Axis) {
        let mut stack = vec![origin];
        while let Some(parent) = stack.pop() {
            let tare = self.absolute_value(CoordRef::alpha(parent, axis));
            let children = self.children(parent).to_vec();
            for child in children {
                if self.set_axis_tare(child, axis, tare) {
                    stack.push(child);
                }
            }
        }
    }

    /// Apply `write` to a coordinate, publish what changed and cascade a
    /// moved Alpha absolute to the children.
    fn write_coordinate(
        &mut self,
        coord: CoordRef,
        write: impl FnOnce(&mut Coordinate) -> Changes,
    ) -> Changes {
        let changes = self.write_raw(coord, write);
        if coord.edge == Edge::Alpha && changes.contains(Changes::ABSOLUTE) {
            self.cascade_tare(coord.cell, coord.axis);
        }
        changes
    }

    fn write_raw(
        &mut self,
        coord: CoordRef,
        write: impl FnOnce(&mut Coordinate) -> Changes,
    ) -> Changes {
        let Ok(cell) = self.cell_mut(coord.cell) else {
            return Changes::empty();
        };
        let c = cell.coordinate_mut(coord.axis, coord.edge);
        let before = (c.tare(), c.relative_value(), c.absolute_value());
        let changes = write(c);
        let after = (c.tare(), c.relative_value(), c.absolute_value());

        if changes.contains(Changes::TARE) {
            self.publish(LayoutEvent::TareChanged {
                coord,
                old: before.0,
                new: after.0,
            });
        }
        if changes.contains(Changes::RELATIVE) {
            self.publish(LayoutEvent::RelativeValueChanged {
                coord,
                old: before.1,
                new: after.1,
            });
        }
        if changes.contains(Changes::ABSOLUTE) {
            self.publish(LayoutEvent::AbsoluteValueChanged {
                coord,
                old: before.2,
                new: after.2,
            });
        }
        changes
    }
}

fn check_index(parent: CellId, index: Option<usize>, len: usize) -> Result<()> {
    match index {
        Some(index) if index > len => Err(LayoutError::IndexOutOfRange { parent, index, len }),
        _ => Ok(()),
    }
}

fn edge_diff(dependent: CoordRef, old: &[NodeId], next: &[NodeId]) -> Vec<LayoutEvent> {
    let removed = old.iter().filter(|n| !next.contains(n)).map(|&n| {
        LayoutEvent::PrerequisiteRemoved {
            dependent,
            prerequisite: CoordRef::from_node(n),
        }
    });
    let added = next.iter().filter(|n| !old.contains(n)).map(|&n| {
        LayoutEvent::PrerequisiteAdded {
            dependent,
            prerequisite: CoordRef::from_node(n),
        }
    });
    removed.chain(added).collect()
}

impl RuleScope for CellLayout {
    fn parent(&self, cell: CellId) -> Option<CellId> {
        CellLayout::parent(self, cell)
    }

    fn children(&self, cell: CellId) -> &[CellId] {
        CellLayout::children(self, cell)
    }

    fn relative_value(&self, coord: CoordRef) -> Option<f32> {
        CellLayout::relative_value(self, coord)
    }
}

impl Default for CellLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CellLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellLayout")
            .field("cells", &self.len())
            .field("free_slots", &self.free.len())
            .field("edges", &self.graph.edge_count())
            .field("dirty", &self.graph.dirty_count())
            .field("subscribers", &self.subscribers.len())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish()
    }
}

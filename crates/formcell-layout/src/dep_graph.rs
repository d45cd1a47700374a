//! Prerequisite graph for incremental coordinate evaluation.
//!
//! # Design
//!
//! Every coordinate in the cell tree is a node. An edge `A → B` means
//! "A's rule reads B", i.e. B is a prerequisite of A. When B changes, A and
//! everything that transitively reads A must be recomputed, and B must be
//! recomputed before any of them.
//!
//! ## Data Structure: Per-Node Adjacency Lists
//!
//! Each node stores a liveness flag and a dirty flag inline. Edges are
//! stored in per-node `Vec<NodeId>` lists for both forward (prerequisites)
//! and reverse (dependents) directions.
//!
//! ### Complexity
//!
//! | Operation            | Time         | Space           |
//! |----------------------|--------------|-----------------|
//! | Ensure node          | O(1) amort.  | +2 bytes        |
//! | Mark dirty           | O(1)         | -               |
//! | Propagate + order    | O(k log k)   | O(k) heap       |
//! | Replace dependencies | O(V+E) cycle | +4 bytes/edge   |
//! | Remove node          | O(deg²)      | -               |
//!
//! Where k = dirty nodes + their transitive dependents.
//!
//! # Dirty Propagation
//!
//! Pending nodes are expanded by BFS over reverse edges. The resulting set
//! is the transitive closure of the seeds under the "is read by" relation.
//!
//! # Cycle Detection
//!
//! Cycles are bugs in the rule configuration. Before an edge `A → B` is
//! committed the graph checks that B cannot already reach A. Replacing a
//! node's whole prerequisite list checks every new edge first and commits
//! nothing if any of them would close a cycle.
//!
//! # Deterministic Ordering
//!
//! [`DepGraph::propagate`] returns the dirty set in topological order
//! (prerequisites first). Ties are broken by ascending `NodeId`, so the
//! same graph and the same seeds always produce the same order.

use rustc_hash::FxHashSet;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;

// ============================================================================
// NodeId
// ============================================================================

/// Lightweight handle into the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a NodeId from a raw u32 index.
    #[must_use]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw u32 index.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

// ============================================================================
// DepNode
// ============================================================================

/// Per-node liveness and dirty state.
#[derive(Clone, Copy)]
struct DepNode {
    /// False for a removed or never-used slot.
    live: bool,
    /// Marked since the node was last cleaned.
    dirty: bool,
}

impl DepNode {
    const DEAD: DepNode = DepNode {
        live: false,
        dirty: false,
    };

    const LIVE: DepNode = DepNode {
        live: true,
        dirty: false,
    };

    fn is_live(&self) -> bool {
        self.live
    }

    fn is_dirty(&self) -> bool {
        self.live && self.dirty
    }
}

// ============================================================================
// CycleError
// ============================================================================

/// Error returned when an edge would make a node reachable from itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    /// The dependent side of the offending edge.
    pub from: NodeId,
    /// The prerequisite side of the offending edge.
    pub to: NodeId,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dependency cycle detected: {} → {} would create a cycle",
            self.from, self.to
        )
    }
}

impl std::error::Error for CycleError {}

// ============================================================================
// DepGraph
// ============================================================================

/// Directed prerequisite graph with dirty tracking.
///
/// # Examples
///
/// ```
/// use formcell_layout::dep_graph::{DepGraph, NodeId};
///
/// let mut graph = DepGraph::new();
/// let width = NodeId::from_raw(0);
/// let right = NodeId::from_raw(1);
/// graph.ensure_node(width);
/// graph.ensure_node(right);
/// graph.add_edge(right, width).unwrap(); // right reads width
///
/// graph.mark_dirty(width);
/// let order = graph.propagate().unwrap();
/// assert_eq!(order, vec![width, right]);
/// ```
pub struct DepGraph {
    nodes: Vec<DepNode>,
    /// Forward adjacency: `fwd_adj[i]` = nodes that node `i` reads.
    fwd_adj: Vec<Vec<NodeId>>,
    /// Reverse adjacency: `rev_adj[i]` = nodes that read node `i`.
    rev_adj: Vec<Vec<NodeId>>,
    /// Dirty seeds not yet propagated.
    pending_dirty: Vec<NodeId>,
}

impl DepGraph {
    /// Create an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            fwd_adj: Vec::new(),
            rev_adj: Vec::new(),
            pending_dirty: Vec::new(),
        }
    }

    /// Create a graph with pre-allocated node capacity.
    #[must_use]
    pub fn with_capacity(node_cap: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(node_cap),
            fwd_adj: Vec::with_capacity(node_cap),
            rev_adj: Vec::with_capacity(node_cap),
            pending_dirty: Vec::new(),
        }
    }

    /// Make `id` a live node, growing the slot table if needed.
    ///
    /// A dead slot is revived with no edges. Calling this on a live node is
    /// a no-op.
    pub fn ensure_node(&mut self, id: NodeId) {
        let idx = id.index();
        if idx >= self.nodes.len() {
            self.nodes.resize(idx + 1, DepNode::DEAD);
            self.fwd_adj.resize_with(idx + 1, Vec::new);
            self.rev_adj.resize_with(idx + 1, Vec::new);
        }
        if !self.nodes[idx].is_live() {
            self.nodes[idx] = DepNode::LIVE;
            self.fwd_adj[idx].clear();
            self.rev_adj[idx].clear();
        }
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) {
        let idx = id.index();
        if idx >= self.nodes.len() || !self.nodes[idx].is_live() {
            return;
        }
        for prereq in std::mem::take(&mut self.fwd_adj[idx]) {
            self.rev_adj[prereq.index()].retain(|&d| d != id);
        }
        for dependent in std::mem::take(&mut self.rev_adj[idx]) {
            self.fwd_adj[dependent.index()].retain(|&p| p != id);
        }
        self.nodes[idx] = DepNode::DEAD;
        self.pending_dirty.retain(|&p| p != id);
    }

    /// Check whether `id` is a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id.index()).is_some_and(DepNode::is_live)
    }

    /// Total number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_live()).count()
    }

    /// Total number of edges (forward).
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.fwd_adj.iter().map(|v| v.len()).sum()
    }

    /// Add a single edge: `from` reads `to`.
    ///
    /// Adding an edge that already exists is a no-op. Returns
    /// `Err(CycleError)` if this would create a cycle.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), CycleError> {
        self.ensure_node(from);
        self.ensure_node(to);
        if self.fwd_adj[from.index()].contains(&to) {
            return Ok(());
        }
        if from == to || self.can_reach(to, from) {
            return Err(CycleError { from, to });
        }
        self.fwd_adj[from.index()].push(to);
        self.rev_adj[to.index()].push(from);
        Ok(())
    }

    /// Replace the full prerequisite list of `node`.
    ///
    /// Duplicates in `prerequisites` are collapsed, keeping first-seen order.
    /// Either every new edge is committed or, on `Err`, the graph is left
    /// unchanged.
    pub fn set_dependencies(
        &mut self,
        node: NodeId,
        prerequisites: &[NodeId],
    ) -> Result<(), CycleError> {
        self.ensure_node(node);

        let mut seen = FxHashSet::default();
        let mut next = Vec::with_capacity(prerequisites.len());
        for &prereq in prerequisites {
            if seen.insert(prereq) {
                next.push(prereq);
            }
        }

        // Reaching `node` ends the walk, so its current outgoing edges
        // cannot mask or fake a cycle.
        for &prereq in &next {
            if prereq == node || self.can_reach(prereq, node) {
                return Err(CycleError {
                    from: node,
                    to: prereq,
                });
            }
        }

        for &prereq in &next {
            self.ensure_node(prereq);
        }
        for old in std::mem::take(&mut self.fwd_adj[node.index()]) {
            self.rev_adj[old.index()].retain(|&d| d != node);
        }
        for &prereq in &next {
            self.rev_adj[prereq.index()].push(node);
        }
        self.fwd_adj[node.index()] = next;
        Ok(())
    }

    /// Remove every prerequisite of `node`.
    pub fn clear_dependencies(&mut self, node: NodeId) {
        if let Some(prereqs) = self.fwd_adj.get_mut(node.index()) {
            for old in std::mem::take(prereqs) {
                self.rev_adj[old.index()].retain(|&d| d != node);
            }
        }
    }

    /// Check if `from` can reach `to` via forward edges (DFS).
    fn can_reach(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            let idx = current.index();
            if idx >= self.nodes.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;

            if !self.nodes[idx].is_live() {
                continue;
            }
            for &dep in &self.fwd_adj[idx] {
                if !visited[dep.index()] {
                    stack.push(dep);
                }
            }
        }
        false
    }

    /// Mark a node dirty. It and its transitive dependents are collected by
    /// the next [`propagate`](Self::propagate) call.
    pub fn mark_dirty(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.index()) else {
            return;
        };
        if !node.is_live() {
            return;
        }
        node.dirty = true;
        self.pending_dirty.push(id);
    }

    /// Seeds marked dirty since the last propagation.
    #[must_use]
    pub fn pending(&self) -> &[NodeId] {
        &self.pending_dirty
    }

    /// Expand the pending seeds to all transitive dependents and return them
    /// in topological order, prerequisites first.
    ///
    /// Returns `Err(CycleError)` if the dirty region contains a cycle; the
    /// pending seeds are consumed either way.
    pub fn propagate(&mut self) -> Result<Vec<NodeId>, CycleError> {
        if self.pending_dirty.is_empty() {
            return Ok(Vec::new());
        }

        // BFS to find all transitive dependents.
        let mut in_set = vec![false; self.nodes.len()];
        let mut queue = VecDeque::new();
        for id in std::mem::take(&mut self.pending_dirty) {
            let idx = id.index();
            if idx < self.nodes.len() && self.nodes[idx].is_live() && !in_set[idx] {
                in_set[idx] = true;
                queue.push_back(id);
            }
        }

        let mut members = Vec::new();
        while let Some(current) = queue.pop_front() {
            let idx = current.index();
            self.nodes[idx].dirty = true;
            members.push(current);

            for &dependent in &self.rev_adj[idx] {
                let dep_idx = dependent.index();
                if self.nodes[dep_idx].is_live() && !in_set[dep_idx] {
                    in_set[dep_idx] = true;
                    queue.push_back(dependent);
                }
            }
        }

        self.topological_order(&members, &in_set)
    }

    /// Kahn's algorithm restricted to `members`.
    fn topological_order(
        &self,
        members: &[NodeId],
        in_set: &[bool],
    ) -> Result<Vec<NodeId>, CycleError> {
        let mut indegree = vec![0usize; self.nodes.len()];
        let mut ready = BinaryHeap::new();
        for &id in members {
            let count = self.fwd_adj[id.index()]
                .iter()
                .filter(|p| in_set[p.index()])
                .count();
            indegree[id.index()] = count;
            if count == 0 {
                ready.push(Reverse(id));
            }
        }

        let mut order = Vec::with_capacity(members.len());
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for &dependent in &self.rev_adj[id.index()] {
                let dep_idx = dependent.index();
                if !in_set[dep_idx] {
                    continue;
                }
                indegree[dep_idx] -= 1;
                if indegree[dep_idx] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() == members.len() {
            return Ok(order);
        }

        // Some member never became ready: it sits on a cycle.
        let stuck = members
            .iter()
            .copied()
            .filter(|id| indegree[id.index()] > 0)
            .min()
            .unwrap_or(members[0]);
        let to = self.fwd_adj[stuck.index()]
            .iter()
            .copied()
            .find(|p| in_set[p.index()] && indegree[p.index()] > 0)
            .unwrap_or(stuck);
        Err(CycleError { from: stuck, to })
    }

    /// Check if a node is currently dirty.
    #[must_use]
    pub fn is_dirty(&self, id: NodeId) -> bool {
        self.nodes.get(id.index()).is_some_and(DepNode::is_dirty)
    }

    /// Clean a single node (mark as not dirty).
    pub fn clean(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id.index())
            && node.is_live()
        {
            node.dirty = false;
        }
    }

    /// Clean every node and drop unpropagated seeds.
    pub fn clean_all(&mut self) {
        for node in &mut self.nodes {
            node.dirty = false;
        }
        self.pending_dirty.clear();
    }

    /// Count of currently dirty nodes.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_dirty()).count()
    }

    /// Prerequisites of a node (what it reads).
    #[must_use]
    pub fn dependencies(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(id.index()) {
            Some(node) if node.is_live() => &self.fwd_adj[id.index()],
            _ => &[],
        }
    }

    /// Dependents of a node (what reads it).
    #[must_use]
    pub fn dependents(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(id.index()) {
            Some(node) if node.is_live() => &self.rev_adj[id.index()],
            _ => &[],
        }
    }

    /// Queue every live node for recomputation.
    pub fn invalidate_all(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if node.is_live() {
                node.dirty = true;
                self.pending_dirty.push(NodeId(i as u32));
            }
        }
    }
}

impl Default for DepGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

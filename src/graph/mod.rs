//! Graph Service (spec §4.A): the control-flow graph, its reverse, the
//! dominator composite, and the pure queries built on top of them.
//!
//! All queries here are pure functions of whatever `ControlFlowGraph` they
//! are handed; the service caches nothing across CFG versions on its own —
//! callers (the orchestrator, the strategies) recompute derived state on
//! `cfg_changed`, per spec §4.F.

mod dominators;
mod io;

pub use dominators::{
    dominating_children, dominating_children_plus, dominator_composite, DominatorComposite,
};
pub use io::{read_adjacency_list, write_adjacency_list};

use crate::address::Address;
use hashbrown::{HashMap, HashSet};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::BTreeSet;

/// A directed graph over basic-block-start addresses. Used both for the
/// forward CFG and, with call edges omitted and return edges inserted, for
/// the reverse CFG (spec §3).
#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    graph: DiGraph<Address, ()>,
    index: HashMap<Address, NodeIndex>,
}

impl ControlFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from an adjacency map. Every address mentioned, as a
    /// source or a destination, becomes a node.
    pub fn from_adjacency<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (Address, Vec<Address>)>,
    {
        let mut cfg = Self::new();
        for (src, dsts) in edges {
            cfg.get_or_insert(src);
            for dst in dsts {
                cfg.add_edge(src, dst);
            }
        }
        cfg
    }

    pub fn get_or_insert(&mut self, addr: Address) -> NodeIndex {
        *self
            .index
            .entry(addr)
            .or_insert_with(|| self.graph.add_node(addr))
    }

    pub fn add_edge(&mut self, from: Address, to: Address) {
        let a = self.get_or_insert(from);
        let b = self.get_or_insert(to);
        if !self.graph.contains_edge(a, b) {
            self.graph.add_edge(a, b, ());
        }
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.index.contains_key(&addr)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = Address> + '_ {
        self.graph.node_indices().map(move |i| self.graph[i])
    }

    pub fn successors(&self, addr: Address) -> Vec<Address> {
        match self.index.get(&addr) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .map(|i| self.graph[i])
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn predecessors(&self, addr: Address) -> Vec<Address> {
        match self.index.get(&addr) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .map(|i| self.graph[i])
                .collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn node_index(&self, addr: Address) -> Option<NodeIndex> {
        self.index.get(&addr).copied()
    }

    pub(crate) fn inner(&self) -> &DiGraph<Address, ()> {
        &self.graph
    }

    /// BFS reachable-node count from `root` (spec §4.A `nodes_reachable`).
    pub fn nodes_reachable(&self, root: Address) -> usize {
        let Some(&start) = self.index.get(&root) else {
            return 0;
        };
        let mut seen = HashSet::new();
        let mut queue = std::collections::VecDeque::new();
        seen.insert(start);
        queue.push_back(start);
        while let Some(n) = queue.pop_front() {
            for succ in self.graph.neighbors_directed(n, Direction::Outgoing) {
                if seen.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }
        seen.len()
    }

    /// BFS reachable-edge count from `root`, counting each out-edge of every
    /// reached node once (mirrors the original `graph.edges_reachable`).
    pub fn edges_reachable(&self, root: Address) -> usize {
        let Some(&start) = self.index.get(&root) else {
            return 0;
        };
        let mut seen = HashSet::new();
        let mut queue = std::collections::VecDeque::new();
        seen.insert(start);
        queue.push_back(start);
        let mut count = 0usize;
        while let Some(n) = queue.pop_front() {
            for succ in self.graph.neighbors_directed(n, Direction::Outgoing) {
                count += 1;
                if seen.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }
        count
    }

    /// Uncovered nodes one edge away from some covered node (spec §4.A).
    /// Sentinels (negative addresses) are never treated as a jump-off point,
    /// matching the original `uncovered_neighbours`.
    pub fn uncovered_neighbours(&self, covered: &HashSet<Address>) -> HashSet<Address> {
        let mut result = HashSet::new();
        for &addr in covered.iter().filter(|&&a| a >= 0) {
            for dst in self.successors(addr) {
                if !covered.contains(&dst) {
                    result.insert(dst);
                }
            }
        }
        result
    }

    /// Unit-weight shortest path lengths from `addr`, over this graph alone.
    pub fn shortest_path_lengths_from(&self, addr: Address) -> HashMap<Address, usize> {
        let Some(&start) = self.index.get(&addr) else {
            return HashMap::new();
        };
        let mut dist = HashMap::new();
        let mut queue = std::collections::VecDeque::new();
        dist.insert(start, 0usize);
        queue.push_back(start);
        while let Some(n) = queue.pop_front() {
            let d = dist[&n];
            for succ in self.graph.neighbors_directed(n, Direction::Outgoing) {
                if !dist.contains_key(&succ) {
                    dist.insert(succ, d + 1);
                    queue.push_back(succ);
                }
            }
        }
        dist.into_iter().map(|(idx, d)| (self.graph[idx], d)).collect()
    }

    /// The enclosing basic-block start of `addr`: the greatest known node
    /// address `<= addr`. This is the only definition expressible without
    /// the out-of-scope ELF/instruction-range knowledge a real
    /// static-analysis backend has (see DESIGN.md open question #4); it is
    /// shared with `StaticAnalyzerAdapter::basic_block_at` so both stay
    /// consistent.
    pub fn basic_block_at(&self, addr: Address) -> Option<Address> {
        let starts: BTreeSet<Address> = self.nodes().filter(|&a| a >= 0).collect();
        starts.range(..=addr).next_back().copied()
    }

    /// Nodes with no outgoing edge at all — the CFG's exit points (spec
    /// §4.A `exit_points`). A node whose only successors are sentinels
    /// still counts as a real exit for dominator purposes in the original,
    /// since `EXTERNAL_RETURN_BLOCK` carries no further control flow of
    /// its own; callers that need that distinction can filter sentinels
    /// out of `successors()` themselves before calling this.
    pub fn exit_points(&self) -> HashSet<Address> {
        self.nodes().filter(|&a| self.successors(a).is_empty()).collect()
    }

    pub fn all_edges(&self) -> impl Iterator<Item = (Address, Address)> + '_ {
        self.graph
            .edge_references()
            .map(move |e| (self.graph[e.source()], self.graph[e.target()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> (ControlFlowGraph, ControlFlowGraph, HashSet<Address>) {
        // A(entry) -> B, A -> C, B -> D, C -> D(exit)
        let mut cfg = ControlFlowGraph::new();
        cfg.add_edge(1, 2);
        cfg.add_edge(1, 3);
        cfg.add_edge(2, 4);
        cfg.add_edge(3, 4);
        let mut rev = ControlFlowGraph::new();
        rev.add_edge(2, 1);
        rev.add_edge(3, 1);
        rev.add_edge(4, 2);
        rev.add_edge(4, 3);
        let mut exits = HashSet::new();
        exits.insert(4);
        (cfg, rev, exits)
    }

    #[test]
    fn nodes_reachable_counts_the_whole_diamond() {
        let (cfg, _, _) = diamond();
        assert_eq!(cfg.nodes_reachable(1), 4);
    }

    #[test]
    fn uncovered_neighbours_finds_one_hop_frontier() {
        let (cfg, _, _) = diamond();
        let mut covered = HashSet::new();
        covered.insert(1);
        let frontier = cfg.uncovered_neighbours(&covered);
        assert_eq!(frontier, [2, 3].into_iter().collect());
    }

    #[test]
    fn exit_points_are_nodes_with_no_successors() {
        let (cfg, _, _) = diamond();
        assert_eq!(cfg.exit_points(), [4].into_iter().collect());
    }

    #[test]
    fn basic_block_at_picks_nearest_preceding_start() {
        let mut cfg = ControlFlowGraph::new();
        cfg.add_edge(0x1000, 0x1010);
        assert_eq!(cfg.basic_block_at(0x1004), Some(0x1000));
        assert_eq!(cfg.basic_block_at(0x1010), Some(0x1010));
        assert_eq!(cfg.basic_block_at(0x0), None);
    }
}

//! Dominator composite (spec §4.A): the union of the pre-dominator tree
//! (computed on the forward CFG, rooted at the entry point) and the
//! post-dominator tree (computed on the reverse CFG, rooted at a virtual
//! super-exit wired to every exit point).

use super::ControlFlowGraph;
use crate::address::{Address, VIRTUAL_SUPER_EXIT};
use hashbrown::{HashMap, HashSet};
use petgraph::algo::dominators::simple_fast;
use std::collections::VecDeque;

/// A lightweight graph over the union of idom edges from both dominator
/// trees. Every node that appears in either tree is present, even if it
/// turns out to have no successors (a "leaf").
#[derive(Debug, Clone, Default)]
pub struct DominatorComposite {
    successors: HashMap<Address, HashSet<Address>>,
    predecessors: HashMap<Address, HashSet<Address>>,
}

impl DominatorComposite {
    pub fn nodes(&self) -> impl Iterator<Item = Address> + '_ {
        self.successors.keys().copied()
    }

    pub fn successors(&self, addr: Address) -> HashSet<Address> {
        self.successors.get(&addr).cloned().unwrap_or_default()
    }

    pub fn predecessors(&self, addr: Address) -> HashSet<Address> {
        self.predecessors.get(&addr).cloned().unwrap_or_default()
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.successors.contains_key(&addr)
    }

    /// Composite leaves: nodes with no successors in either dominator tree.
    /// These are the "dominating children" of spec §4.A / §9.
    pub fn leaves(&self) -> HashSet<Address> {
        self.successors
            .iter()
            .filter(|(_, succs)| succs.is_empty())
            .map(|(&addr, _)| addr)
            .collect()
    }

    /// BFS-reachable set from `addr` within this composite alone.
    pub fn reachable_from(&self, addr: Address) -> HashSet<Address> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(addr);
        queue.push_back(addr);
        while let Some(n) = queue.pop_front() {
            for succ in self.successors(n) {
                if seen.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }
        seen
    }
}

fn insert_edge(
    successors: &mut HashMap<Address, HashSet<Address>>,
    predecessors: &mut HashMap<Address, HashSet<Address>>,
    from: Address,
    to: Address,
) {
    successors.entry(from).or_default().insert(to);
    successors.entry(to).or_default();
    predecessors.entry(to).or_default().insert(from);
    predecessors.entry(from).or_default();
}

fn pre_dominator_edges(cfg: &ControlFlowGraph, entry: Address) -> Vec<(Address, Address)> {
    let Some(root) = cfg.node_index(entry) else {
        return Vec::new();
    };
    let doms = simple_fast(cfg.inner(), root);
    let mut edges = Vec::new();
    for node in cfg.inner().node_indices() {
        if node == root {
            continue;
        }
        if let Some(idom) = doms.immediate_dominator(node) {
            edges.push((cfg.inner()[idom], cfg.inner()[node]));
        }
    }
    edges
}

/// Computed on the reverse CFG with a virtual node wired to every exit
/// point, exactly as the original `graph.post_dominator_graph` does. The
/// virtual node, and the edges it introduces, are discarded before
/// returning: it never appears in the composite (DESIGN.md decision #5).
fn post_dominator_edges(
    reverse_cfg: &ControlFlowGraph,
    exit_points: &HashSet<Address>,
) -> Vec<(Address, Address)> {
    let mut graph = reverse_cfg.inner().clone();
    let virt = graph.add_node(VIRTUAL_SUPER_EXIT);
    for &exit in exit_points {
        if let Some(idx) = reverse_cfg.node_index(exit) {
            graph.add_edge(virt, idx, ());
        }
    }
    let doms = simple_fast(&graph, virt);
    let mut edges = Vec::new();
    for node in graph.node_indices() {
        if node == virt {
            continue;
        }
        if let Some(idom) = doms.immediate_dominator(node) {
            if idom == virt {
                continue;
            }
            edges.push((graph[idom], graph[node]));
        }
    }
    edges
}

pub fn dominator_composite(
    cfg: &ControlFlowGraph,
    reverse_cfg: &ControlFlowGraph,
    entry: Address,
    exit_points: &HashSet<Address>,
) -> DominatorComposite {
    let mut successors = HashMap::new();
    let mut predecessors = HashMap::new();
    for (a, b) in pre_dominator_edges(cfg, entry) {
        insert_edge(&mut successors, &mut predecessors, a, b);
    }
    for (a, b) in post_dominator_edges(reverse_cfg, exit_points) {
        insert_edge(&mut successors, &mut predecessors, a, b);
    }
    DominatorComposite {
        successors,
        predecessors,
    }
}

/// "Dominating children": the composite's leaves.
pub fn dominating_children(composite: &DominatorComposite) -> HashSet<Address> {
    composite.leaves()
}

/// "Dominating children plus": leaves, plus any block that dominates none
/// of its own CFG successors — join points and loop back-edge sources,
/// which the plain leaf set misses but which are still useful rotation
/// targets (spec §9, `DominatorChildPlus`/`DominatorChildPlusNearPath`).
pub fn dominating_children_plus(
    cfg: &ControlFlowGraph,
    composite: &DominatorComposite,
) -> HashSet<Address> {
    let mut result = composite.leaves();
    for node in composite.nodes() {
        let reachable = composite.reachable_from(node);
        let successors = cfg.successors(node);
        if !successors.is_empty() && successors.iter().any(|s| !reachable.contains(s)) {
            result.insert(node);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> (ControlFlowGraph, ControlFlowGraph, HashSet<Address>) {
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
    fn composite_contains_every_diamond_node() {
        let (cfg, rev, exits) = diamond();
        let composite = dominator_composite(&cfg, &rev, 1, &exits);
        let nodes: HashSet<Address> = composite.nodes().collect();
        assert_eq!(nodes, [1, 2, 3, 4].into_iter().collect());
    }

    #[test]
    fn leaves_exclude_the_entry_and_exit_idoms() {
        let (cfg, rev, exits) = diamond();
        let composite = dominator_composite(&cfg, &rev, 1, &exits);
        let leaves = dominating_children(&composite);
        // 1 pre-dominates everything, 4 post-dominates 2 and 3: neither is a leaf.
        assert!(!leaves.contains(&1));
        assert!(leaves.contains(&2) || leaves.contains(&3) || leaves.contains(&4));
    }

    #[test]
    fn dominating_children_plus_is_a_superset_of_leaves() {
        let (cfg, rev, exits) = diamond();
        let composite = dominator_composite(&cfg, &rev, 1, &exits);
        let leaves = dominating_children(&composite);
        let plus = dominating_children_plus(&cfg, &composite);
        assert!(leaves.is_subset(&plus));
    }

    /// 1 -> {2, 3}, 2 -> {4, 5}, 3 -> 4. Node 2 has two CFG successors: 5 is
    /// composite-reachable from 2, 4 is not. A node qualifies for "plus" the
    /// moment *any* successor is composite-unreachable, not only when *all*
    /// of them are (spec prose; original `get_dominating_childs_plus`
    /// `break`s on the first such successor). 2 has exactly one of each kind,
    /// so `.all` and `.any` disagree on it.
    fn fork_with_a_dead_end() -> (ControlFlowGraph, ControlFlowGraph, HashSet<Address>) {
        let mut cfg = ControlFlowGraph::new();
        cfg.add_edge(1, 2);
        cfg.add_edge(1, 3);
        cfg.add_edge(2, 4);
        cfg.add_edge(2, 5);
        cfg.add_edge(3, 4);
        let mut rev = ControlFlowGraph::new();
        rev.add_edge(2, 1);
        rev.add_edge(3, 1);
        rev.add_edge(4, 2);
        rev.add_edge(5, 2);
        rev.add_edge(4, 3);
        let mut exits = HashSet::new();
        exits.insert(4);
        exits.insert(5);
        (cfg, rev, exits)
    }

    #[test]
    fn dominating_children_plus_catches_a_node_with_one_unreachable_successor() {
        let (cfg, rev, exits) = fork_with_a_dead_end();
        let composite = dominator_composite(&cfg, &rev, 1, &exits);
        let leaves = dominating_children(&composite);
        assert!(!leaves.contains(&2), "2 is not a composite leaf, it has successor 5");
        let plus = dominating_children_plus(&cfg, &composite);
        assert!(
            plus.contains(&2),
            "2 has a CFG successor (4) unreachable from it in the composite, so `.any` must catch it"
        );
    }
}

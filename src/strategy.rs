//! Breakpoint Strategies (spec §4.F). Grounded directly on the original
//! `breakpoint_strategies/*.py` hierarchy: one trait
//! (`breakpoint_strategies/BreakpointStrategy.py`) and seven concrete
//! implementations, each named and behaving after its Python counterpart.

use crate::address::Address;
use crate::error::{FuzzerError, Result};
use crate::graph::{
    dominating_children, dominating_children_plus, dominator_composite, ControlFlowGraph,
    DominatorComposite,
};
use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::Rng;
use hashbrown::hash_map::Entry;

pub trait BreakpointStrategy {
    /// Called once at startup and again every time the CFG is rebuilt
    /// (spec §4.F: "each strategy recomputes its derived state ... lazily
    /// on next query" — implementations here recompute eagerly on the
    /// call instead, since the derived state is cheap relative to a CFG
    /// rebuild and this keeps `get_breakpoint_address` allocation-free).
    fn cfg_changed(
        &mut self,
        entry_point: Address,
        cfg: &ControlFlowGraph,
        exit_points: &hashbrown::HashSet<Address>,
        reverse_cfg: &ControlFlowGraph,
    );

    fn get_breakpoint_address(
        &mut self,
        covered_nodes: &hashbrown::HashSet<Address>,
        active_breakpoints: &hashbrown::HashSet<Address>,
        baseline_input: &[u8],
        rng: &mut StdRng,
    ) -> Option<Address>;

    fn mark_dominated_nodes(&self) -> bool {
        true
    }

    fn coverage_guided(&self) -> bool {
        true
    }

    fn report_address_reached(&mut self, _current_input: &[u8], _address: Address) {}
}

fn uniform_choice(candidates: &[Address], rng: &mut StdRng) -> Option<Address> {
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.gen_range(0..candidates.len())])
}

fn weighted_choice(candidates: &[(Address, f64)], rng: &mut StdRng) -> Option<Address> {
    let total: f64 = candidates.iter().map(|(_, w)| w).sum();
    if candidates.is_empty() || total <= 0.0 {
        return None;
    }
    let draw = rng.gen_range(0.0..total);
    let mut acc = 0.0;
    for &(addr, w) in candidates {
        acc += w;
        if draw < acc {
            return Some(addr);
        }
    }
    candidates.last().map(|&(addr, _)| addr)
}

/// No coverage feedback whatsoever: used as a baseline to measure how much
/// the breakpoint-driven feedback loop contributes over blind fuzzing.
#[derive(Default)]
pub struct BlackboxStrategy;

impl BreakpointStrategy for BlackboxStrategy {
    fn cfg_changed(
        &mut self,
        _entry_point: Address,
        _cfg: &ControlFlowGraph,
        _exit_points: &hashbrown::HashSet<Address>,
        _reverse_cfg: &ControlFlowGraph,
    ) {
    }

    fn get_breakpoint_address(
        &mut self,
        _covered_nodes: &hashbrown::HashSet<Address>,
        _active_breakpoints: &hashbrown::HashSet<Address>,
        _baseline_input: &[u8],
        _rng: &mut StdRng,
    ) -> Option<Address> {
        None
    }

    fn coverage_guided(&self) -> bool {
        false
    }
}

/// Uniform random pick over every CFG node not yet covered or bound to an
/// active breakpoint.
#[derive(Default)]
pub struct RandomBasicBlockStrategy {
    all_nodes: Vec<Address>,
    mark_dominated: bool,
}

impl RandomBasicBlockStrategy {
    pub fn new() -> Self {
        Self {
            all_nodes: Vec::new(),
            mark_dominated: true,
        }
    }

    /// Constructor for `RandomBasicBlockNoDomStrategy`, which is otherwise
    /// identical (spec §4.F.3: "measuring raw dominator propagation").
    pub fn new_no_dom() -> Self {
        Self {
            all_nodes: Vec::new(),
            mark_dominated: false,
        }
    }
}

impl BreakpointStrategy for RandomBasicBlockStrategy {
    fn cfg_changed(
        &mut self,
        _entry_point: Address,
        cfg: &ControlFlowGraph,
        _exit_points: &hashbrown::HashSet<Address>,
        _reverse_cfg: &ControlFlowGraph,
    ) {
        self.all_nodes = cfg.nodes().collect();
    }

    fn get_breakpoint_address(
        &mut self,
        covered_nodes: &hashbrown::HashSet<Address>,
        active_breakpoints: &hashbrown::HashSet<Address>,
        _baseline_input: &[u8],
        rng: &mut StdRng,
    ) -> Option<Address> {
        let candidates: Vec<Address> = self
            .all_nodes
            .iter()
            .copied()
            .filter(|a| !covered_nodes.contains(a) && !active_breakpoints.contains(a))
            .collect();
        uniform_choice(&candidates, rng)
    }

    fn mark_dominated_nodes(&self) -> bool {
        self.mark_dominated
    }
}

fn composite_and_exits(
    cfg: &ControlFlowGraph,
    reverse_cfg: &ControlFlowGraph,
    entry_point: Address,
    exit_points: &hashbrown::HashSet<Address>,
) -> DominatorComposite {
    dominator_composite(cfg, reverse_cfg, entry_point, exit_points)
}

/// Uniform random pick restricted to the dominator composite's leaves.
#[derive(Default)]
pub struct DominatorChildStrategy {
    candidates: Vec<Address>,
}

impl BreakpointStrategy for DominatorChildStrategy {
    fn cfg_changed(
        &mut self,
        entry_point: Address,
        cfg: &ControlFlowGraph,
        exit_points: &hashbrown::HashSet<Address>,
        reverse_cfg: &ControlFlowGraph,
    ) {
        let composite = composite_and_exits(cfg, reverse_cfg, entry_point, exit_points);
        self.candidates = dominating_children(&composite).into_iter().collect();
    }

    fn get_breakpoint_address(
        &mut self,
        covered_nodes: &hashbrown::HashSet<Address>,
        active_breakpoints: &hashbrown::HashSet<Address>,
        _baseline_input: &[u8],
        rng: &mut StdRng,
    ) -> Option<Address> {
        let candidates: Vec<Address> = self
            .candidates
            .iter()
            .copied()
            .filter(|a| !covered_nodes.contains(a) && !active_breakpoints.contains(a))
            .collect();
        uniform_choice(&candidates, rng)
    }
}

/// Same as `DominatorChild`, over the extended pool `dominating_children_plus`.
#[derive(Default)]
pub struct DominatorChildPlusStrategy {
    candidates: Vec<Address>,
}

impl BreakpointStrategy for DominatorChildPlusStrategy {
    fn cfg_changed(
        &mut self,
        entry_point: Address,
        cfg: &ControlFlowGraph,
        exit_points: &hashbrown::HashSet<Address>,
        reverse_cfg: &ControlFlowGraph,
    ) {
        let composite = composite_and_exits(cfg, reverse_cfg, entry_point, exit_points);
        self.candidates = dominating_children_plus(cfg, &composite).into_iter().collect();
    }

    fn get_breakpoint_address(
        &mut self,
        covered_nodes: &hashbrown::HashSet<Address>,
        active_breakpoints: &hashbrown::HashSet<Address>,
        _baseline_input: &[u8],
        rng: &mut StdRng,
    ) -> Option<Address> {
        let candidates: Vec<Address> = self
            .candidates
            .iter()
            .copied()
            .filter(|a| !covered_nodes.contains(a) && !active_breakpoints.contains(a))
            .collect();
        uniform_choice(&candidates, rng)
    }
}

const PAGERANK_DAMPING: f64 = 0.85;
const PAGERANK_TOLERANCE: f64 = 1e-6;
const PAGERANK_MAX_ITERATIONS: u32 = 100;

/// Power-iteration PageRank (spec §9 Design Notes: damping 0.85, tolerance
/// 1e-6, 100-iteration cap; raises `AnalyzerUnavailable` on non-convergence
/// so the caller can fall back to uniform weights). Dangling nodes (no
/// out-edges) redistribute their mass uniformly, as networkx's
/// implementation does.
pub fn pagerank(cfg: &ControlFlowGraph) -> Result<HashMap<Address, f64>> {
    let nodes: Vec<Address> = cfg.nodes().collect();
    let n = nodes.len();
    if n == 0 {
        return Ok(HashMap::new());
    }
    let index: HashMap<Address, usize> = nodes.iter().enumerate().map(|(i, &a)| (a, i)).collect();
    let out_degree: Vec<usize> = nodes.iter().map(|&a| cfg.successors(a).len()).collect();

    let mut rank = vec![1.0 / n as f64; n];
    for iteration in 0..PAGERANK_MAX_ITERATIONS {
        let dangling_mass: f64 = (0..n)
            .filter(|&i| out_degree[i] == 0)
            .map(|i| rank[i])
            .sum();
        let mut next = vec![(1.0 - PAGERANK_DAMPING) / n as f64; n];
        for i in 0..n {
            next[i] += PAGERANK_DAMPING * dangling_mass / n as f64;
        }
        for (i, &addr) in nodes.iter().enumerate() {
            if out_degree[i] == 0 {
                continue;
            }
            let share = PAGERANK_DAMPING * rank[i] / out_degree[i] as f64;
            for succ in cfg.successors(addr) {
                if let Some(&j) = index.get(&succ) {
                    next[j] += share;
                }
            }
        }
        let delta: f64 = rank
            .iter()
            .zip(next.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        rank = next;
        if delta < PAGERANK_TOLERANCE {
            return Ok(nodes.into_iter().zip(rank).collect());
        }
        let _ = iteration;
    }
    Err(FuzzerError::AnalyzerUnavailable {
        fails: PAGERANK_MAX_ITERATIONS,
    })
}

/// Weighted random pick over all nodes, weight = PageRank score. Falls back
/// to a uniform vector if PageRank fails to converge, rather than
/// propagating the error up through `cfg_changed` (which has no `Result`
/// return in this trait, mirroring the original's unconditional call).
#[derive(Default)]
pub struct PageRankStrategy {
    all_nodes: Vec<Address>,
    rank: HashMap<Address, f64>,
}

impl BreakpointStrategy for PageRankStrategy {
    fn cfg_changed(
        &mut self,
        _entry_point: Address,
        cfg: &ControlFlowGraph,
        _exit_points: &hashbrown::HashSet<Address>,
        _reverse_cfg: &ControlFlowGraph,
    ) {
        self.all_nodes = cfg.nodes().collect();
        self.rank = match pagerank(cfg) {
            Ok(rank) => rank,
            Err(_) => {
                log::warn!("PageRank failed to converge; falling back to uniform weights");
                let uniform = 1.0 / self.all_nodes.len().max(1) as f64;
                self.all_nodes.iter().map(|&a| (a, uniform)).collect()
            }
        };
    }

    fn get_breakpoint_address(
        &mut self,
        covered_nodes: &hashbrown::HashSet<Address>,
        active_breakpoints: &hashbrown::HashSet<Address>,
        _baseline_input: &[u8],
        rng: &mut StdRng,
    ) -> Option<Address> {
        let candidates: Vec<(Address, f64)> = self
            .all_nodes
            .iter()
            .copied()
            .filter(|a| !covered_nodes.contains(a) && !active_breakpoints.contains(a))
            .map(|a| (a, *self.rank.get(&a).unwrap_or(&0.0)))
            .collect();
        weighted_choice(&candidates, rng)
    }
}

/// `DominatorChildPlus`, further biased toward candidates close (by unit
/// shortest-path distance on the forward-and-reverse CFG) to addresses that
/// the current input has already reached.
#[derive(Default)]
pub struct DominatorChildPlusNearPathStrategy {
    cfg: ControlFlowGraph,
    reverse_cfg: ControlFlowGraph,
    candidates: Vec<Address>,
    /// Per-input accumulated inverse path lengths from every address that
    /// input reached, keyed by the exact input bytes (spec §4.F.7).
    input_weights: HashMap<Vec<u8>, HashMap<Address, f64>>,
}

impl BreakpointStrategy for DominatorChildPlusNearPathStrategy {
    fn cfg_changed(
        &mut self,
        entry_point: Address,
        cfg: &ControlFlowGraph,
        exit_points: &hashbrown::HashSet<Address>,
        reverse_cfg: &ControlFlowGraph,
    ) {
        self.cfg = cfg.clone();
        self.reverse_cfg = reverse_cfg.clone();
        let composite = composite_and_exits(cfg, reverse_cfg, entry_point, exit_points);
        self.candidates = dominating_children_plus(cfg, &composite).into_iter().collect();
    }

    fn get_breakpoint_address(
        &mut self,
        covered_nodes: &hashbrown::HashSet<Address>,
        active_breakpoints: &hashbrown::HashSet<Address>,
        baseline_input: &[u8],
        rng: &mut StdRng,
    ) -> Option<Address> {
        let mut candidates: Vec<Address> = self
            .candidates
            .iter()
            .copied()
            .filter(|a| !covered_nodes.contains(a) && !active_breakpoints.contains(a))
            .collect();
        // Deterministic tie-break order (spec §4.F.7).
        candidates.sort_unstable();
        if candidates.is_empty() {
            return None;
        }

        if let Some(weights) = self.input_weights.get(baseline_input) {
            let weighted: Vec<(Address, f64)> = candidates
                .iter()
                .copied()
                .filter_map(|a| weights.get(&a).map(|&w| (a, w)))
                .collect();
            if !weighted.is_empty() {
                return weighted_choice(&weighted, rng);
            }
        }
        uniform_choice(&candidates, rng)
    }

    fn report_address_reached(&mut self, current_input: &[u8], address: Address) {
        let mut lengths = self.cfg.shortest_path_lengths_from(address);
        if self.reverse_cfg.contains(address) {
            for (node, dist) in self.reverse_cfg.shortest_path_lengths_from(address) {
                lengths.entry(node).or_insert(dist);
            }
        }
        let entry = match self.input_weights.entry(current_input.to_vec()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(HashMap::new()),
        };
        for (node, dist) in lengths {
            if dist == 0 {
                continue;
            }
            *entry.entry(node).or_insert(0.0) += 1.0 / dist as f64;
        }
    }
}

/// Builds the configured strategy by name (spec §6 `[fuzzer] strategy`).
pub fn by_name(name: &str) -> Result<Box<dyn BreakpointStrategy>> {
    match name {
        "Blackbox" => Ok(Box::new(BlackboxStrategy)),
        "RandomBasicBlock" => Ok(Box::new(RandomBasicBlockStrategy::new())),
        "RandomBasicBlockNoDom" => Ok(Box::new(RandomBasicBlockStrategy::new_no_dom())),
        "DominatorChild" => Ok(Box::new(DominatorChildStrategy::default())),
        "DominatorChildPlus" => Ok(Box::new(DominatorChildPlusStrategy::default())),
        "PageRank" => Ok(Box::new(PageRankStrategy::default())),
        "DominatorChildPlusNearPath" => {
            Ok(Box::new(DominatorChildPlusNearPathStrategy::default()))
        }
        other => Err(FuzzerError::Config(format!("unknown strategy: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn diamond() -> (ControlFlowGraph, ControlFlowGraph, hashbrown::HashSet<Address>) {
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
        let mut exits = hashbrown::HashSet::new();
        exits.insert(4);
        (cfg, rev, exits)
    }

    #[test]
    fn blackbox_never_places_breakpoints_and_is_not_coverage_guided() {
        let mut s = BlackboxStrategy;
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            s.get_breakpoint_address(
                &hashbrown::HashSet::new(),
                &hashbrown::HashSet::new(),
                b"",
                &mut rng
            ),
            None
        );
        assert!(!s.coverage_guided());
    }

    #[test]
    fn random_basic_block_excludes_covered_and_active() {
        let (cfg, rev, exits) = diamond();
        let mut s = RandomBasicBlockStrategy::new();
        s.cfg_changed(1, &cfg, &exits, &rev);
        let mut covered = hashbrown::HashSet::new();
        covered.insert(1);
        covered.insert(2);
        let mut active = hashbrown::HashSet::new();
        active.insert(3);
        let mut rng = StdRng::seed_from_u64(1);
        let choice = s.get_breakpoint_address(&covered, &active, b"", &mut rng);
        assert_eq!(choice, Some(4));
    }

    #[test]
    fn dominator_child_no_dom_reports_unmarked_dominance() {
        let plain = RandomBasicBlockStrategy::new();
        let no_dom = RandomBasicBlockStrategy::new_no_dom();
        assert!(plain.mark_dominated_nodes());
        assert!(!no_dom.mark_dominated_nodes());
    }

    #[test]
    fn pagerank_sums_to_roughly_one() {
        let (cfg, _, _) = diamond();
        let rank = pagerank(&cfg).unwrap();
        let total: f64 = rank.values().sum();
        assert!((total - 1.0).abs() < 1e-3, "total was {total}");
    }

    #[test]
    fn near_path_strategy_prefers_candidates_close_to_reached_addresses() {
        let (cfg, rev, exits) = diamond();
        let mut s = DominatorChildPlusNearPathStrategy::default();
        s.cfg_changed(1, &cfg, &exits, &rev);
        s.report_address_reached(b"input-a", 2);
        assert!(s.input_weights.contains_key(&b"input-a".to_vec()));
    }

    #[test]
    fn by_name_rejects_unknown_strategies() {
        assert!(by_name("NotAStrategy").is_err());
        assert!(by_name("PageRank").is_ok());
    }
}

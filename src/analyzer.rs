//! Static Analyzer Adapter (spec §4.B): owns the current CFG, tracks edges
//! discovered at runtime that the static recovery missed, and rebuilds the
//! graph on demand. Grounded on the original `ghidra/Ghidra.py` adapter,
//! which plays the same role against a live Ghidra headless-analyzer
//! process; here the only concrete backend is file-based, since the real
//! analyzer process is out of scope (spec §1).

use crate::address::Address;
use crate::error::{FuzzerError, Result};
use crate::graph::ControlFlowGraph;
use hashbrown::HashSet;
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// An edge the debugger observed (by single-stepping through an unresolved
/// branch, spec §4.F) that the current CFG does not contain yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CFGUpdateCandidate {
    pub from: Address,
    pub to: Address,
}

/// Where `StaticAnalyzerAdapter` gets a CFG from. The only production
/// implementation is `FileCfgBackend`; tests substitute an in-memory one.
pub trait CfgBackend {
    /// Returns the function name and its graph.
    fn load(&self) -> Result<(String, ControlFlowGraph)>;
}

/// Reads a pre-existing CFG file, in the format written by `graph::io`. The
/// original analyzer this stands in for regenerates the file itself by
/// re-running headless Ghidra analysis on an updated binary image; the
/// debugger-driven protocol this crate implements instead resolves unknown
/// edges by single-instruction stepping, so the file on disk is only ever
/// rewritten by the orchestrator's CFG-update sub-protocol, never by this
/// adapter directly.
pub struct FileCfgBackend {
    path: PathBuf,
}

impl FileCfgBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CfgBackend for FileCfgBackend {
    fn load(&self) -> Result<(String, ControlFlowGraph)> {
        crate::graph::read_adjacency_list(&self.path)
    }
}

/// Consecutive rebuild failures before CFG updates are permanently disabled
/// for the rest of the run (spec §4.B, §7 `AnalyzerUnavailable`).
pub const MAX_ANALYSIS_FAILS: u32 = 1;

pub struct StaticAnalyzerAdapter {
    backend: Box<dyn CfgBackend + Send>,
    function_name: String,
    cfg: ControlFlowGraph,
    reverse_cfg: ControlFlowGraph,
    /// Runtime-observed edges not yet folded into `cfg`.
    candidates: HashSet<CFGUpdateCandidate>,
    consecutive_fails: u32,
    disabled: bool,
    max_fails: u32,
}

fn reverse_of(cfg: &ControlFlowGraph) -> ControlFlowGraph {
    let mut rev = ControlFlowGraph::new();
    for node in cfg.nodes() {
        rev.get_or_insert(node);
    }
    for (src, dst) in cfg.all_edges() {
        rev.add_edge(dst, src);
    }
    rev
}

impl StaticAnalyzerAdapter {
    pub fn new(backend: Box<dyn CfgBackend + Send>, max_fails: u32) -> Result<Self> {
        let (function_name, cfg) = backend.load()?;
        let reverse_cfg = reverse_of(&cfg);
        Ok(Self {
            backend,
            function_name,
            cfg,
            reverse_cfg,
            candidates: HashSet::new(),
            consecutive_fails: 0,
            disabled: false,
            max_fails,
        })
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn cfg(&self) -> &ControlFlowGraph {
        &self.cfg
    }

    pub fn reverse_cfg(&self) -> &ControlFlowGraph {
        &self.reverse_cfg
    }

    pub fn basic_block_at(&self, addr: Address) -> Option<Address> {
        self.cfg.basic_block_at(addr)
    }

    /// Records a runtime-observed branch the CFG does not contain yet. A
    /// no-op once `from -> to` is already part of the graph.
    pub fn record_candidate(&mut self, from: Address, to: Address) {
        if self.cfg.successors(from).contains(&to) {
            return;
        }
        self.candidates.insert(CFGUpdateCandidate { from, to });
    }

    pub fn pending_candidates(&self) -> impl Iterator<Item = &CFGUpdateCandidate> {
        self.candidates.iter()
    }

    pub fn has_pending_candidates(&self) -> bool {
        !self.candidates.is_empty()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Re-reads the backend and, on success, clears every pending candidate
    /// that the new graph accounts for and resets the failure counter. On
    /// failure, increments it and raises `AnalyzerUnavailable` once the
    /// threshold is crossed, permanently disabling further updates.
    pub fn update(&mut self) -> Result<bool> {
        if self.disabled {
            return Ok(false);
        }
        match self.backend.load() {
            Ok((name, cfg)) => {
                self.function_name = name;
                self.reverse_cfg = reverse_of(&cfg);
                self.candidates
                    .retain(|c| !cfg.successors(c.from).contains(&c.to));
                self.cfg = cfg;
                self.consecutive_fails = 0;
                debug!(
                    "CFG updated: {} nodes, {} edges, {} candidates remain",
                    self.cfg.node_count(),
                    self.cfg.edge_count(),
                    self.candidates.len()
                );
                Ok(true)
            }
            Err(e) => {
                self.consecutive_fails += 1;
                warn!(
                    "CFG rebuild failed ({}/{}): {e}",
                    self.consecutive_fails, self.max_fails
                );
                if self.consecutive_fails >= self.max_fails {
                    self.disabled = true;
                    return Err(FuzzerError::AnalyzerUnavailable {
                        fails: self.consecutive_fails,
                    });
                }
                Ok(false)
            }
        }
    }
}

/// In-memory backend, one graph forever — used by tests that do not need
/// the CFG file round-trip.
pub struct StaticCfgBackend {
    name: String,
    cfg: ControlFlowGraph,
}

impl StaticCfgBackend {
    pub fn new(name: impl Into<String>, cfg: ControlFlowGraph) -> Self {
        Self {
            name: name.into(),
            cfg,
        }
    }
}

impl CfgBackend for StaticCfgBackend {
    fn load(&self) -> Result<(String, ControlFlowGraph)> {
        Ok((self.name.clone(), self.cfg.clone()))
    }
}

/// Backend that fails every load, for exercising the disable threshold.
pub struct FailingCfgBackend;

impl CfgBackend for FailingCfgBackend {
    fn load(&self) -> Result<(String, ControlFlowGraph)> {
        Err(FuzzerError::Parse("simulated analyzer failure".into()))
    }
}

#[allow(dead_code)]
fn _assert_path_type(_p: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> ControlFlowGraph {
        let mut cfg = ControlFlowGraph::new();
        cfg.add_edge(1, 2);
        cfg.add_edge(1, 3);
        cfg.add_edge(2, 4);
        cfg.add_edge(3, 4);
        cfg
    }

    #[test]
    fn reverse_cfg_is_built_on_construction() {
        let backend = Box::new(StaticCfgBackend::new("f", diamond()));
        let adapter = StaticAnalyzerAdapter::new(backend, 10).unwrap();
        assert_eq!(adapter.reverse_cfg().successors(4), [2, 3].into_iter().collect::<HashSet<_>>());
    }

    #[test]
    fn candidate_resolved_by_a_later_update_is_dropped() {
        let backend = Box::new(StaticCfgBackend::new("f", diamond()));
        let mut adapter = StaticAnalyzerAdapter::new(backend, 10).unwrap();
        adapter.record_candidate(4, 99);
        assert!(adapter.has_pending_candidates());

        let mut updated = diamond();
        updated.add_edge(4, 99);
        let backend2 = Box::new(StaticCfgBackend::new("f", updated));
        adapter.backend = backend2;
        adapter.update().unwrap();
        assert!(!adapter.has_pending_candidates());
    }

    #[test]
    fn disables_after_max_fails() {
        let backend = Box::new(FailingCfgBackend);
        // construction itself fails, so build from a good backend then swap.
        let good = Box::new(StaticCfgBackend::new("f", diamond()));
        let mut adapter = StaticAnalyzerAdapter::new(good, 2).unwrap();
        adapter.backend = backend;
        assert!(adapter.update().is_ok());
        assert!(adapter.update().is_err());
        assert!(adapter.is_disabled());
    }
}

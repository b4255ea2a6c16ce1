//! Fuzzing Orchestrator (spec §4.G): the state machine tying every other
//! adapter together. Grounded on `GDBFuzzer.py` in full — `start_fuzzing`'s
//! dispatch loop, `on_input_request`/`on_breakpoint_hit`/`on_crash`/
//! `on_timeout`, `set_breakpoints`/`rotate_breakpoints`, and
//! `run_update_cfg`/`fuzzer_stats_cfg_update` all have a direct counterpart
//! below, and the teacher's own `fuzzer.rs` supplied the closures-over-state
//! control-flow shape this is written in.

use crate::address::{format_address, Address, COVERED_SET_SENTINELS};
use crate::analyzer::StaticAnalyzerAdapter;
use crate::corpus::{Corpus, Mutator};
use crate::crash::{fingerprint_frames, CrashWriter};
use crate::debugger::{BreakpointId, DebuggerAdapter, StopEvent};
use crate::error::{FuzzerError, Result};
use crate::graph::DominatorComposite;
use crate::stats::{now_epoch, FuzzerStats, StatsWriter};
use crate::strategy::BreakpointStrategy;
use crate::transport::SutTransport;
use hashbrown::{HashMap, HashSet};
use log::{info, warn};
use rand::rngs::StdRng;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Attaching,
    Running,
    AwaitingInput,
    HandlingStop,
    RotatingBreakpoints,
    UpdatingCFG,
    RestartingSUT,
    Terminated,
}

/// Why a single-SUT-instance session ended, driving the orchestrator's
/// outer loop decision of whether to restart the SUT, run a CFG update
/// round, or stop entirely (spec §4.G).
#[derive(Debug)]
pub enum SessionEnd {
    GlobalTimeoutReached,
    CfgUpdateRequired,
    SutCrashed,
    SutExited,
    SutTimedOut,
    CommError(String),
}

pub struct OrchestratorConfig {
    pub entry_point: Address,
    pub max_breakpoints: usize,
    pub until_rotate_breakpoints: u64,
    pub single_run_timeout: Duration,
    pub software_breakpoint_addresses: HashSet<Address>,
    /// If true, an interrupt landing on a `software_breakpoint_addresses`
    /// entry ends the session as a crash instead of simply being recorded
    /// as covered (spec §6 `consider_sw_breakpoint_as_error`).
    pub consider_sw_breakpoint_as_error: bool,
    pub cfg_update_interval: Duration,
}

pub struct Orchestrator<M: Mutator> {
    config: OrchestratorConfig,
    state: OrchestratorState,
    analyzer: StaticAnalyzerAdapter,
    strategy: Box<dyn BreakpointStrategy>,
    corpus: Corpus<M>,
    stats: FuzzerStats,
    stats_writer: StatsWriter,
    crash_writer: CrashWriter,
    rng: StdRng,

    covered_nodes: HashSet<Address>,
    breakpoints: HashMap<BreakpointId, Address>,
    dominator_composite: DominatorComposite,
    exit_points: HashSet<Address>,
    inputs_until_rotate: u64,
    last_stat_write: u64,
}

impl<M: Mutator> Orchestrator<M> {
    pub fn new(
        config: OrchestratorConfig,
        analyzer: StaticAnalyzerAdapter,
        mut strategy: Box<dyn BreakpointStrategy>,
        corpus: Corpus<M>,
        stats: FuzzerStats,
        stats_writer: StatsWriter,
        crash_writer: CrashWriter,
        rng: StdRng,
    ) -> Self {
        let mut covered_nodes: HashSet<Address> = COVERED_SET_SENTINELS.into_iter().collect();
        covered_nodes.insert(config.entry_point);
        let until_rotate = config.until_rotate_breakpoints;
        let exit_points = analyzer.cfg().exit_points();
        let dominator_composite = crate::graph::dominator_composite(
            analyzer.cfg(),
            analyzer.reverse_cfg(),
            config.entry_point,
            &exit_points,
        );
        strategy.cfg_changed(
            config.entry_point,
            analyzer.cfg(),
            &exit_points,
            analyzer.reverse_cfg(),
        );
        Self {
            config,
            state: OrchestratorState::Terminated,
            analyzer,
            strategy,
            corpus,
            stats,
            stats_writer,
            crash_writer,
            rng,
            covered_nodes,
            breakpoints: HashMap::new(),
            dominator_composite,
            exit_points,
            inputs_until_rotate: until_rotate,
            last_stat_write: 0,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn stats(&self) -> &FuzzerStats {
        &self.stats
    }

    pub fn covered_nodes(&self) -> &HashSet<Address> {
        &self.covered_nodes
    }

    fn refresh_dominator_state(&mut self) {
        self.exit_points = self.analyzer.cfg().exit_points();
        self.dominator_composite = crate::graph::dominator_composite(
            self.analyzer.cfg(),
            self.analyzer.reverse_cfg(),
            self.config.entry_point,
            &self.exit_points,
        );
        self.strategy.cfg_changed(
            self.config.entry_point,
            self.analyzer.cfg(),
            &self.exit_points,
            self.analyzer.reverse_cfg(),
        );
    }

    fn maybe_write_stats(&mut self) -> Result<()> {
        let now = self.stats.runtime_secs();
        if now > self.last_stat_write + 60 {
            self.last_stat_write = now;
            let corpus_state = self
                .corpus
                .entries()
                .iter()
                .map(|e| {
                    format!(
                        "{:?}, depth={}, hit_blocks={}, num_fuzzed={}, children={}, weight={}, burn_in={}",
                        e.path, e.depth, e.hit_blocks, e.num_fuzzed, e.num_children, e.weight, e.burn_in
                    )
                })
                .collect();
            self.stats_writer.write_fuzzer_stats(&mut self.stats, corpus_state)?;
        }
        Ok(())
    }

    fn set_breakpoints<D: DebuggerAdapter>(&mut self, debugger: &mut D) -> Result<()> {
        while self.breakpoints.len() < self.config.max_breakpoints {
            let baseline = self.corpus.baseline().map(|b| b.to_vec()).unwrap_or_default();
            let active: HashSet<Address> = self.breakpoints.values().copied().collect();
            let addr = match self.strategy.get_breakpoint_address(
                &self.covered_nodes,
                &active,
                &baseline,
                &mut self.rng,
            ) {
                Some(addr) => addr,
                None => break,
            };
            let id = debugger.set_breakpoint(addr)?;
            self.breakpoints.insert(id, addr);
        }
        Ok(())
    }

    fn rotate_breakpoints<D: DebuggerAdapter>(&mut self, debugger: &mut D) -> Result<()> {
        self.state = OrchestratorState::RotatingBreakpoints;
        debugger.interrupt()?;
        match debugger.wait_for_stop(Duration::from_secs(30))? {
            StopEvent::Interrupt(_) | StopEvent::Crashed { .. } => {}
            other => {
                return Err(FuzzerError::Debugger(format!(
                    "expected interrupt stop while rotating breakpoints, got {other:?}"
                )))
            }
        }
        for id in self.breakpoints.keys().copied().collect::<Vec<_>>() {
            debugger.remove_breakpoint(id)?;
        }
        self.breakpoints.clear();
        self.set_breakpoints(debugger)?;
        debugger.continue_execution()?;
        Ok(())
    }

    /// Marks `address` covered, recording stats/corpus/strategy effects,
    /// then recurses on every composite-dominating predecessor if the
    /// active strategy requests it (spec §4.F `mark_dominated_nodes`). The
    /// dominator of the entry point is the entry point itself, so recursion
    /// always terminates there at the latest.
    fn report_address_reached(&mut self, current_input: &[u8], address: Address) {
        if self.covered_nodes.contains(&address) {
            return;
        }
        if !self.analyzer.cfg().contains(address) {
            warn!("reached node not in CFG: {}", format_address(address));
            return;
        }
        self.covered_nodes.insert(address);
        self.stats.coverage += 1;
        let _ = self
            .stats_writer
            .append_coverage_data(self.stats.runtime_secs(), address);

        if self.strategy.coverage_guided() {
            self.corpus
                .report_address_reached(current_input, address, self.stats.runtime_secs());
        }
        self.strategy.report_address_reached(current_input, address);

        if self.strategy.mark_dominated_nodes() {
            for predecessor in self.dominator_composite.predecessors(address) {
                self.report_address_reached(current_input, predecessor);
            }
        }
    }

    fn on_input_request<D: DebuggerAdapter, T: SutTransport>(
        &mut self,
        debugger: &mut D,
        transport: &mut T,
    ) -> Result<Vec<u8>> {
        self.inputs_until_rotate = self.inputs_until_rotate.saturating_sub(1);
        if self.inputs_until_rotate == 0 {
            self.inputs_until_rotate = self.config.until_rotate_breakpoints;
            info!("redistributing {} breakpoint(s)", self.config.max_breakpoints);
            self.corpus.choose_new_baseline();
            self.rotate_breakpoints(debugger)?;
        }
        self.stats.runs += 1;
        self.maybe_write_stats()?;

        let input = self.corpus.generate_input();
        transport.send_input(&input)?;
        Ok(input)
    }

    fn on_breakpoint_hit<D: DebuggerAdapter>(
        &mut self,
        debugger: &mut D,
        bp_id: BreakpointId,
        current_input: &[u8],
    ) -> Result<()> {
        let Some(&addr) = self.breakpoints.get(&bp_id) else {
            return Ok(());
        };
        info!("breakpoint at {} hit", format_address(addr));
        self.stats.breakpoint_interruptions += 1;
        self.report_address_reached(current_input, addr);

        debugger.remove_breakpoint(bp_id)?;
        self.breakpoints.remove(&bp_id);
        self.set_breakpoints(debugger)?;
        // Spec §4.G: a breakpoint hit resets the rotation countdown to its
        // ceiling, same as a fresh `rotate_breakpoints` call would.
        self.inputs_until_rotate = self.config.until_rotate_breakpoints;
        Ok(())
    }

    /// The breakpoint id currently bound to `addr`, if any.
    fn breakpoint_id_at(&self, addr: Address) -> Option<BreakpointId> {
        self.breakpoints
            .iter()
            .find(|(_, &bound)| bound == addr)
            .map(|(&id, _)| id)
    }

    /// `Interrupt` dispatch rule (spec §4.C/§4.G, DESIGN.md decision #3):
    /// first drain `additional_hits` — every address in there that is bound
    /// to an active breakpoint is handled exactly like a `BreakpointHit`.
    /// Then the interrupt's own PC is mapped to its enclosing basic block.
    /// If that block is one of the configured software breakpoint
    /// addresses, the sentinel/known-error check wins regardless of the BP
    /// table: `consider_sw_breakpoint_as_error` decides crash vs plain
    /// coverage. Only once that check has passed does a BP-table match get
    /// treated as a hit; anything left over is an untargeted interrupt,
    /// which spec §4.G treats as a crash, not a no-op (`GDBFuzzer.py:270-274`
    /// logs a warning and immediately calls `on_crash`).
    /// Returns `true` when the interrupt should end the session as a crash.
    fn on_interrupt<D: DebuggerAdapter>(
        &mut self,
        debugger: &mut D,
        pc: Address,
        current_input: &[u8],
    ) -> Result<bool> {
        for addr in debugger.drain_additional_hits() {
            if let Some(bp_id) = self.breakpoint_id_at(addr) {
                self.on_breakpoint_hit(debugger, bp_id, current_input)?;
            }
        }

        let block = self.analyzer.basic_block_at(pc).unwrap_or(pc);
        if self.config.software_breakpoint_addresses.contains(&block) {
            if self.config.consider_sw_breakpoint_as_error {
                self.on_crash(debugger, current_input)?;
                return Ok(true);
            }
            self.report_address_reached(current_input, block);
            return Ok(false);
        }
        if let Some(bp_id) = self.breakpoint_id_at(block) {
            self.on_breakpoint_hit(debugger, bp_id, current_input)?;
            return Ok(false);
        }
        warn!("interrupt at untargeted pc {}, treating as a crash", format_address(pc));
        self.on_crash(debugger, current_input)?;
        Ok(true)
    }

    fn on_crash<D: DebuggerAdapter>(&mut self, debugger: &mut D, current_input: &[u8]) -> Result<()> {
        warn!("SUT crash detected");
        self.stats.crashes += 1;
        let frames = collect_stack_frames(debugger);
        let fingerprint = match frames {
            Some(frames) if !frames.is_empty() => {
                fingerprint_frames(frames.iter().map(String::as_str))
            }
            _ => random_fallback_id(&mut self.rng),
        };
        self.crash_writer.write_crash(current_input, &fingerprint)?;
        Ok(())
    }

    fn on_timeout<D: DebuggerAdapter>(&mut self, debugger: &mut D, current_input: &[u8]) -> Result<()> {
        self.stats.timeouts += 1;
        let _ = debugger.interrupt();
        let frames = collect_stack_frames(debugger);
        let fingerprint = match frames {
            Some(frames) if !frames.is_empty() => {
                fingerprint_frames(frames.iter().map(String::as_str))
            }
            _ => fingerprint_frames(
                String::from_utf8_lossy(current_input)
                    .split_whitespace(),
            ),
        };
        self.crash_writer.write_timeout(current_input, &fingerprint)?;
        Ok(())
    }

    fn cfg_update_due(&self) -> bool {
        self.analyzer.has_pending_candidates()
            && now_epoch().saturating_sub(self.stats.last_cfg_update_timestamp())
                > self.config.cfg_update_interval.as_secs()
    }

    /// Runs one SUT instance from a fresh attach until it stops needing
    /// this session (global timeout, a CFG update becoming due, or the SUT
    /// itself crashing/exiting/timing out/losing its transport).
    pub fn run_session<D: DebuggerAdapter, T: SutTransport>(
        &mut self,
        debugger: &mut D,
        transport: &mut T,
        stop_time: Instant,
    ) -> Result<SessionEnd> {
        self.state = OrchestratorState::Attaching;
        debugger.connect()?;
        let _ = debugger.wait_for_stop(self.config.single_run_timeout);
        self.set_breakpoints(debugger)?;
        debugger.continue_execution()?;
        self.state = OrchestratorState::Running;

        let mut current_input: Vec<u8> = Vec::new();
        let mut awaiting_continue = false;

        loop {
            if Instant::now() >= stop_time {
                return Ok(SessionEnd::GlobalTimeoutReached);
            }
            if !awaiting_continue {
                debugger.continue_execution()?;
            }
            awaiting_continue = false;
            let event = debugger.wait_for_stop(self.config.single_run_timeout)?;
            self.state = OrchestratorState::HandlingStop;

            match event {
                StopEvent::InputRequest => {
                    current_input = self.on_input_request(debugger, transport)?;
                    awaiting_continue = true;
                    if self.cfg_update_due() {
                        return Ok(SessionEnd::CfgUpdateRequired);
                    }
                    self.state = OrchestratorState::AwaitingInput;
                }
                StopEvent::BreakpointHit(bp_id, _addr) => {
                    self.on_breakpoint_hit(debugger, bp_id, &current_input)?;
                }
                StopEvent::Interrupt(pc) => {
                    if self.on_interrupt(debugger, pc, &current_input)? {
                        return Ok(SessionEnd::SutCrashed);
                    }
                }
                StopEvent::StepDone(_) => {
                    // Only expected during the CFG-update sub-protocol,
                    // driven outside this loop.
                }
                StopEvent::TimedOut => {
                    self.on_timeout(debugger, &current_input)?;
                    return Ok(SessionEnd::SutTimedOut);
                }
                StopEvent::Crashed { .. } => {
                    self.on_crash(debugger, &current_input)?;
                    return Ok(SessionEnd::SutCrashed);
                }
                StopEvent::Exited { .. } => {
                    self.on_crash(debugger, &current_input)?;
                    return Ok(SessionEnd::SutExited);
                }
                StopEvent::CommError(reason) => {
                    return Ok(SessionEnd::CommError(reason));
                }
                StopEvent::StoppedNoReason(reason) => {
                    warn!("unexpected stop with no recognised reason: {reason}");
                    self.on_crash(debugger, &current_input)?;
                    return Ok(SessionEnd::SutCrashed);
                }
            }
        }
    }

    /// The CFG-update sub-protocol (spec §4.F): for every runtime-observed
    /// edge the static CFG is missing, resolve it by single-instruction
    /// stepping from the call site, fold the result into the CFG file, and
    /// reload. On success, every derived-state cache (dominator composite,
    /// exit points, strategy candidate pools) is refreshed.
    pub fn run_cfg_update_round<D: DebuggerAdapter>(
        &mut self,
        debugger: &mut D,
        cfg_path: &std::path::Path,
    ) -> Result<()> {
        self.state = OrchestratorState::UpdatingCFG;
        let candidates: Vec<_> = self.analyzer.pending_candidates().copied().collect();
        let mut discovered = Vec::new();
        for candidate in &candidates {
            debugger.set_breakpoint(candidate.from)?;
            debugger.continue_execution()?;
            let _ = debugger.wait_for_stop(self.config.single_run_timeout)?;
            let resolved = debugger.step_instruction()?;
            discovered.push((candidate.from, resolved));
        }

        let (name, mut cfg) = crate::graph::read_adjacency_list(cfg_path)?;
        for (from, to) in discovered {
            cfg.add_edge(from, to);
        }
        crate::graph::write_adjacency_list(cfg_path, &name, &cfg)?;

        self.analyzer.update()?;
        self.refresh_dominator_state();
        self.stats.record_cfg_update(
            self.analyzer.cfg().nodes_reachable(self.config.entry_point),
            self.analyzer.cfg().edges_reachable(self.config.entry_point),
        );
        Ok(())
    }
}

fn collect_stack_frames<D: DebuggerAdapter>(debugger: &mut D) -> Option<Vec<String>> {
    debugger
        .read_pc()
        .ok()
        .map(|pc| vec![format_address(pc)])
}

fn random_fallback_id(rng: &mut StdRng) -> String {
    use rand::Rng;
    format!("{:016x}", rng.gen::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::StaticCfgBackend;
    use crate::corpus::{default_mutator, Corpus};
    use crate::crash::CrashWriter;
    use crate::debugger::mock::MockDebugger;
    use crate::graph::ControlFlowGraph;
    use crate::stats::{FuzzerStats, StatsWriter};
    use crate::strategy::BlackboxStrategy;
    use crate::transport::mock::MockTransport;
    use rand::SeedableRng;

    fn diamond() -> ControlFlowGraph {
        let mut cfg = ControlFlowGraph::new();
        cfg.add_edge(1, 2);
        cfg.add_edge(1, 3);
        cfg.add_edge(2, 4);
        cfg.add_edge(3, 4);
        cfg
    }

    fn orchestrator(dir: &std::path::Path) -> Orchestrator<crate::corpus::HavocMutator> {
        let backend = Box::new(StaticCfgBackend::new("f", diamond()));
        let analyzer = StaticAnalyzerAdapter::new(backend, 10).unwrap();
        let strategy = Box::new(BlackboxStrategy);
        let corpus = Corpus::new(dir.join("corpus"), 64, default_mutator(Some(1)), StdRng::seed_from_u64(2))
            .unwrap();
        let stats = FuzzerStats::new("run.ini");
        let stats_writer = StatsWriter::new(dir);
        let crash_writer = CrashWriter::new(dir.join("crashes")).unwrap();
        let config = OrchestratorConfig {
            entry_point: 1,
            max_breakpoints: 2,
            until_rotate_breakpoints: 20_000,
            single_run_timeout: Duration::from_millis(10),
            software_breakpoint_addresses: HashSet::new(),
            consider_sw_breakpoint_as_error: false,
            cfg_update_interval: Duration::from_secs(60),
        };
        Orchestrator::new(
            config,
            analyzer,
            strategy,
            corpus,
            stats,
            stats_writer,
            crash_writer,
            StdRng::seed_from_u64(3),
        )
    }

    #[test]
    fn report_address_reached_marks_dominating_predecessors() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path());
        // Blackbox doesn't mark_dominated_nodes by default-true trait method.
        orch.report_address_reached(b"seed", 4);
        assert!(orch.covered_nodes().contains(&4));
        assert!(orch.covered_nodes().contains(&2) || orch.covered_nodes().contains(&3));
    }

    #[test]
    fn report_address_reached_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path());
        orch.report_address_reached(b"seed", 2);
        let coverage_after_first = orch.stats().coverage;
        orch.report_address_reached(b"seed", 2);
        assert_eq!(orch.stats().coverage, coverage_after_first);
    }

    fn orchestrator_with_sw_error(dir: &std::path::Path) -> Orchestrator<crate::corpus::HavocMutator> {
        let backend = Box::new(StaticCfgBackend::new("f", diamond()));
        let analyzer = StaticAnalyzerAdapter::new(backend, 10).unwrap();
        let strategy = Box::new(BlackboxStrategy);
        let corpus = Corpus::new(dir.join("corpus"), 64, default_mutator(Some(1)), StdRng::seed_from_u64(2))
            .unwrap();
        let stats = FuzzerStats::new("run.ini");
        let stats_writer = StatsWriter::new(dir);
        let crash_writer = CrashWriter::new(dir.join("crashes")).unwrap();
        let mut software_breakpoint_addresses = HashSet::new();
        software_breakpoint_addresses.insert(4);
        let config = OrchestratorConfig {
            entry_point: 1,
            max_breakpoints: 2,
            until_rotate_breakpoints: 20_000,
            single_run_timeout: Duration::from_millis(10),
            software_breakpoint_addresses,
            consider_sw_breakpoint_as_error: true,
            cfg_update_interval: Duration::from_secs(60),
        };
        Orchestrator::new(
            config,
            analyzer,
            strategy,
            corpus,
            stats,
            stats_writer,
            crash_writer,
            StdRng::seed_from_u64(3),
        )
    }

    #[test]
    fn interrupt_on_a_software_breakpoint_ends_the_session_as_a_crash_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator_with_sw_error(dir.path());
        let mut debugger = MockDebugger::new();
        let mut transport = MockTransport::new();
        debugger.push_stop(StopEvent::StoppedNoReason("init".into()));
        debugger.pc = 4;
        debugger.push_stop(StopEvent::Interrupt(4));
        let end = orch
            .run_session(&mut debugger, &mut transport, Instant::now() + Duration::from_secs(5))
            .unwrap();
        assert!(matches!(end, SessionEnd::SutCrashed));
        assert_eq!(orch.stats().crashes, 1);
    }

    #[test]
    fn untargeted_interrupt_ends_the_session_as_a_crash() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path());
        let mut debugger = MockDebugger::new();
        let ended = orch.on_interrupt(&mut debugger, 2, b"seed").unwrap();
        assert!(ended, "an interrupt matching neither the BP table nor a software breakpoint is a crash");
        assert_eq!(orch.stats().crashes, 1);
    }

    #[test]
    fn interrupt_drains_additional_hits_as_breakpoint_hits() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path());
        orch.breakpoints.insert(1, 2);
        let mut debugger = MockDebugger::new();
        debugger.push_additional_hit(2);
        let ended = orch.on_interrupt(&mut debugger, 999, b"seed").unwrap();
        assert!(!ended);
        assert!(orch.covered_nodes().contains(&2));
    }

    #[test]
    fn sw_breakpoint_check_takes_precedence_over_the_bp_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator_with_sw_error(dir.path());
        orch.breakpoints.insert(1, 4);
        let mut debugger = MockDebugger::new();
        let ended = orch.on_interrupt(&mut debugger, 4, b"seed").unwrap();
        assert!(
            ended,
            "4 is both an active BP and a configured software breakpoint; the sw-error check must win"
        );
        assert_eq!(orch.stats().crashes, 1);
    }

    #[test]
    fn breakpoint_hit_resets_the_rotation_countdown_to_its_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path());
        orch.inputs_until_rotate = 1;
        orch.breakpoints.insert(1, 2);
        let mut debugger = MockDebugger::new();
        orch.on_breakpoint_hit(&mut debugger, 1, b"seed").unwrap();
        assert_eq!(orch.inputs_until_rotate, orch.config.until_rotate_breakpoints);
    }

    #[test]
    fn a_crash_stop_event_ends_the_session_and_records_a_crash() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path());
        let mut debugger = MockDebugger::new();
        let mut transport = MockTransport::new();
        debugger.push_stop(StopEvent::StoppedNoReason("init".into()));
        debugger.push_stop(StopEvent::Crashed {
            signal: "SIGSEGV".into(),
            pc: 4,
        });
        let end = orch
            .run_session(&mut debugger, &mut transport, Instant::now() + Duration::from_secs(5))
            .unwrap();
        assert!(matches!(end, SessionEnd::SutCrashed));
        assert_eq!(orch.stats().crashes, 1);
    }

    #[test]
    fn an_input_request_sends_generated_input_through_transport() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path());
        let mut debugger = MockDebugger::new();
        let mut transport = MockTransport::new();
        debugger.push_stop(StopEvent::StoppedNoReason("init".into()));
        debugger.push_stop(StopEvent::InputRequest);
        debugger.push_stop(StopEvent::Exited { code: 0 });
        let end = orch
            .run_session(&mut debugger, &mut transport, Instant::now() + Duration::from_secs(5))
            .unwrap();
        assert!(matches!(end, SessionEnd::SutExited));
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(orch.stats().runs, 1);
    }
}

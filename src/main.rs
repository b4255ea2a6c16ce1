//! Binary entry point: `bpfuzz --config <path> [--seed N] [--time SECS]`.
//!
//! This wires together every component this crate owns end to end — config,
//! the static analyzer, a breakpoint strategy, the corpus, and stats/crash
//! persistence — and constructs a ready-to-drive `Orchestrator`. Actually
//! running a session additionally needs a `DebuggerAdapter` talking the
//! real GDB/MI wire protocol and a `SutTransport` reaching the concrete SUT
//! (serial, TCP, USB, ...); both are external collaborators this crate
//! specifies only as traits, so this binary builds and validates the
//! pipeline, writes the initial run artifacts, and hands the orchestrator
//! off — an embedder supplying the two live adapters drives it the rest of
//! the way via `Orchestrator::run_session`/`run_cfg_update_round`.

use bpfuzz::analyzer::{FileCfgBackend, StaticAnalyzerAdapter, MAX_ANALYSIS_FAILS};
use bpfuzz::cli::Cli;
use bpfuzz::config::FuzzerConfig;
use bpfuzz::corpus::{self, Corpus};
use bpfuzz::crash::CrashWriter;
use bpfuzz::error::{FuzzerError, Result};
use bpfuzz::orchestrator::{Orchestrator, OrchestratorConfig};
use bpfuzz::stats::{FuzzerStats, StatsWriter};
use bpfuzz::strategy;
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = FuzzerConfig::load(&cli.config)?;

    let cfg_path = config
        .target
        .cfg_path
        .as_ref()
        .ok_or_else(|| FuzzerError::Config("[target] cfg_path is required".into()))?;
    let backend = Box::new(FileCfgBackend::new(cfg_path));
    let analyzer = StaticAnalyzerAdapter::new(backend, MAX_ANALYSIS_FAILS.min(config.fuzzer.max_analysis_fails))?;
    info!(
        "loaded CFG for {}: {} blocks, {} edges",
        analyzer.function_name(),
        analyzer.cfg().node_count(),
        analyzer.cfg().edge_count()
    );

    let strategy = strategy::by_name(&config.fuzzer.strategy)?;
    info!("breakpoint strategy: {}", config.fuzzer.strategy);

    let rng_seed = cli.seed.unwrap_or_else(|| rand::random());
    let mut corpus = Corpus::new(
        &config.corpus.output_path,
        config.corpus.max_input_length,
        corpus::default_mutator(Some(rng_seed)),
        StdRng::seed_from_u64(rng_seed),
    )?;
    if let Some(seeds_path) = &config.corpus.seeds_path {
        corpus.add_seeds(Path::new(seeds_path))?;
    }
    corpus.ensure_nonempty();
    info!("corpus: {} entries (seed {rng_seed})", corpus.len());

    let mut stats = FuzzerStats::new(cli.config.display().to_string());
    let stats_writer = StatsWriter::new(&config.corpus.output_path);
    let crash_writer = CrashWriter::new(format!("{}/crashes", config.corpus.output_path))?;

    let corpus_state: Vec<String> = corpus
        .entries()
        .iter()
        .map(|e| e.path.display().to_string())
        .collect();
    stats_writer.write_fuzzer_stats(&mut stats, corpus_state)?;

    let orchestrator_config = OrchestratorConfig {
        entry_point: config.fuzzer.entry_point,
        max_breakpoints: config.fuzzer.max_breakpoints,
        until_rotate_breakpoints: config.fuzzer.until_rotate_breakpoints,
        single_run_timeout: config.fuzzer.single_run_timeout,
        software_breakpoint_addresses: config
            .debugger
            .software_breakpoint_addresses
            .iter()
            .copied()
            .collect(),
        consider_sw_breakpoint_as_error: config.debugger.consider_sw_breakpoint_as_error,
        cfg_update_interval: Duration::from_secs(60),
    };

    let orchestrator = Orchestrator::new(
        orchestrator_config,
        analyzer,
        strategy,
        corpus,
        stats,
        stats_writer,
        crash_writer,
        StdRng::seed_from_u64(rng_seed),
    );

    info!(
        "orchestrator ready at entry point {}; run_name={:?}; connect a DebuggerAdapter and \
         SutTransport to this crate's Orchestrator::run_session to start fuzzing {}",
        bpfuzz::address::format_address(config.fuzzer.entry_point),
        config.fuzzer.run_name,
        config.target.binary_path.as_deref().unwrap_or("<unspecified binary>"),
    );
    info!("{} covered nodes seeded before the first run", orchestrator.covered_nodes().len());
    let runtime_budget = cli
        .time
        .map(Duration::from_secs)
        .or(config.fuzzer.total_runtime);
    match runtime_budget {
        Some(budget) => info!("time budget: {}s (enforced by the embedder's session loop)", budget.as_secs()),
        None => info!("no time budget set; the embedder's session loop runs until the SUT stops reporting input requests"),
    }

    Ok(())
}

//! Run statistics and their on-disk artifacts (spec §4.G, §6). Grounded on
//! the original `FuzzerStats.py` plus `GDBFuzzer.write_fuzzer_stats` /
//! `write_coverage_data`.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfgUpdateRecord {
    pub timestamp: u64,
    pub total_basic_blocks: usize,
    pub total_edges: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzerStats {
    pub start_time_epoch: u64,
    pub end_time_epoch: u64,
    pub start_time: String,
    pub runtime: u64,
    pub coverage: u64,
    pub crashes: u64,
    pub timeouts: u64,
    pub breakpoint_interruptions: u64,
    pub runs: u64,
    pub runs_per_sec: f64,
    pub cfg_updates: Vec<CfgUpdateRecord>,
    pub config_file_path: String,
    pub corpus_state: Vec<String>,
}

pub fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl FuzzerStats {
    pub fn new(config_file_path: impl Into<String>) -> Self {
        let start = now_epoch();
        Self {
            start_time_epoch: start,
            end_time_epoch: 0,
            start_time: humantime_like(start),
            runtime: 0,
            coverage: 0,
            crashes: 0,
            timeouts: 0,
            breakpoint_interruptions: 0,
            runs: 0,
            runs_per_sec: 0.0,
            cfg_updates: Vec::new(),
            config_file_path: config_file_path.into(),
            corpus_state: Vec::new(),
        }
    }

    pub fn record_cfg_update(&mut self, total_basic_blocks: usize, total_edges: usize) {
        self.cfg_updates.push(CfgUpdateRecord {
            timestamp: now_epoch(),
            total_basic_blocks,
            total_edges,
        });
    }

    pub fn last_cfg_update_timestamp(&self) -> u64 {
        self.cfg_updates
            .last()
            .map(|u| u.timestamp)
            .unwrap_or(self.start_time_epoch)
    }

    fn refresh_runtime(&mut self) {
        let now = now_epoch();
        self.runtime = now.saturating_sub(self.start_time_epoch);
        if self.runtime > 1 {
            self.runs_per_sec = self.runs as f64 / self.runtime as f64;
        }
    }

    pub fn finish(&mut self) {
        self.end_time_epoch = now_epoch();
        self.refresh_runtime();
    }

    pub fn runtime_secs(&self) -> u64 {
        now_epoch().saturating_sub(self.start_time_epoch)
    }
}

/// Poor man's `time.strftime` equivalent: a sortable, human-legible epoch
/// stamp without pulling in a date/time crate the rest of the stack
/// doesn't otherwise need.
fn humantime_like(epoch_secs: u64) -> String {
    format!("epoch:{epoch_secs}")
}

pub struct StatsWriter {
    output_dir: PathBuf,
}

impl StatsWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn write_fuzzer_stats(
        &self,
        stats: &mut FuzzerStats,
        corpus_state: Vec<String>,
    ) -> Result<()> {
        stats.refresh_runtime();
        stats.corpus_state = corpus_state;
        let path = self.output_dir.join("fuzzer_stats");
        let json = serde_json::to_string_pretty(stats)
            .map_err(|e| crate::error::FuzzerError::Parse(e.to_string()))?;
        std::fs::File::create(path)?.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Appends a `<runtime> <hex_addr>` line to both `plot_data` and
    /// `coverage_data` (spec §6 Outputs lists them as two distinct
    /// artifacts in the same format, written incrementally).
    pub fn append_coverage_data(&self, runtime_secs: u64, address: crate::address::Address) -> Result<()> {
        let line = format!("{runtime_secs} {}\n", crate::address::format_address(address));
        for name in ["plot_data", "coverage_data"] {
            let mut f = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.output_dir.join(name))?;
            f.write_all(line.as_bytes())?;
        }
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

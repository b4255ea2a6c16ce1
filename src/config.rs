//! INI-sectioned run configuration (spec §6). Mirrors the original
//! `ConfigParser`-based config files almost section-for-section, via the
//! `configparser` crate — the direct Rust analogue of Python's
//! `configparser` the original implementation builds its whole
//! configuration surface on.

use crate::address::{parse_address, Address};
use crate::error::{FuzzerError, Result};
use configparser::ini::Ini;
use std::path::Path;
use std::time::Duration;

/// `[fuzzer]` section.
#[derive(Debug, Clone)]
pub struct FuzzerSection {
    pub entry_point: Address,
    pub strategy: String,
    pub coverage_guided: bool,
    pub max_analysis_fails: u32,
    pub should_do_cfg_updates: bool,
    pub run_name: Option<String>,
    pub max_breakpoints: usize,
    pub until_rotate_breakpoints: u64,
    pub single_run_timeout: Duration,
    pub total_runtime: Option<Duration>,
}

/// `[debugger]` section.
#[derive(Debug, Clone)]
pub struct DebuggerSection {
    pub gdb_path: String,
    pub gdb_server_address: String,
    pub software_breakpoint_addresses: Vec<Address>,
    pub consider_sw_breakpoint_as_error: bool,
    pub timeout_seconds: Duration,
}

/// How the SUT process is reached. Stored and validated but otherwise
/// unconsumed by this crate: selecting and driving the concrete adapter for
/// each mode is the out-of-scope job of the embedder's `DebuggerAdapter`/
/// `SutTransport` pair (DESIGN.md decision #8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    Hardware,
    Qemu,
    SutRunsOnHost,
}

impl std::str::FromStr for TargetMode {
    type Err = FuzzerError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "Hardware" => Ok(Self::Hardware),
            "QEMU" => Ok(Self::Qemu),
            "SUTRunsOnHost" => Ok(Self::SutRunsOnHost),
            other => Err(FuzzerError::Config(format!(
                "target.target_mode: expected Hardware, QEMU, or SUTRunsOnHost, got {other:?}"
            ))),
        }
    }
}

/// `[target]` section.
#[derive(Debug, Clone)]
pub struct TargetSection {
    pub cfg_path: Option<String>,
    pub binary_path: Option<String>,
    pub target_args: Vec<String>,
    pub target_mode: TargetMode,
    /// Symbol names whose bodies the static analyzer should exclude from CFG
    /// construction. That analyzer is itself out of scope (spec §1); this
    /// crate only carries the list through so it can be handed to whatever
    /// produces the CFG file `cfg_path` points at.
    pub ignore_functions: Vec<String>,
}

/// `[corpus]` section.
#[derive(Debug, Clone)]
pub struct CorpusSection {
    pub seeds_path: Option<String>,
    pub output_path: String,
    pub max_input_length: usize,
}

#[derive(Debug, Clone)]
pub struct FuzzerConfig {
    pub fuzzer: FuzzerSection,
    pub debugger: DebuggerSection,
    pub target: TargetSection,
    pub corpus: CorpusSection,
}

fn get(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.get(section, key)
}

fn require(ini: &Ini, section: &str, key: &str) -> Result<String> {
    get(ini, section, key)
        .ok_or_else(|| FuzzerError::Config(format!("missing [{section}] {key}")))
}

fn parse_bool(section: &str, key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(FuzzerError::Config(format!(
            "[{section}] {key}: not a boolean: {other:?}"
        ))),
    }
}

fn parse_addr(section: &str, key: &str, raw: &str) -> Result<Address> {
    parse_address(raw)
        .ok_or_else(|| FuzzerError::Config(format!("[{section}] {key}: bad address: {raw:?}")))
}

impl FuzzerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut ini = Ini::new();
        ini.load(path.as_ref())
            .map_err(|e| FuzzerError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self> {
        let raw_entry = require(ini, "fuzzer", "entry_point")?;
        // Forced even, matching Thumb-mode bit-0 stripping (DESIGN.md #6).
        let entry_point = parse_addr("fuzzer", "entry_point", &raw_entry)? & !1;

        let coverage_guided = match get(ini, "fuzzer", "coverage_guided") {
            Some(raw) => parse_bool("fuzzer", "coverage_guided", &raw)?,
            None => true,
        };
        let max_analysis_fails = match get(ini, "fuzzer", "max_analysis_fails") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| FuzzerError::Config("fuzzer.max_analysis_fails: not a u32".into()))?,
            None => 1,
        };
        let should_do_cfg_updates = match get(ini, "fuzzer", "should_do_cfg_updates") {
            Some(raw) => parse_bool("fuzzer", "should_do_cfg_updates", &raw)?,
            None => true,
        };

        let max_breakpoints = match get(ini, "fuzzer", "max_breakpoints") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| FuzzerError::Config("fuzzer.max_breakpoints: not a usize".into()))?,
            None => 1,
        };
        let until_rotate_breakpoints = match get(ini, "fuzzer", "until_rotate_breakpoints") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                FuzzerError::Config("fuzzer.until_rotate_breakpoints: not a u64".into())
            })?,
            None => 20_000,
        };
        let single_run_timeout = Duration::from_secs(match get(ini, "fuzzer", "single_run_timeout")
        {
            Some(raw) => raw.trim().parse().map_err(|_| {
                FuzzerError::Config("fuzzer.single_run_timeout: not a u64".into())
            })?,
            None => 5,
        });
        let total_runtime = get(ini, "fuzzer", "total_runtime")
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| FuzzerError::Config("fuzzer.total_runtime: not a u64".into()))
            })
            .transpose()?;

        let fuzzer = FuzzerSection {
            entry_point,
            strategy: require(ini, "fuzzer", "strategy")?,
            coverage_guided,
            max_analysis_fails,
            should_do_cfg_updates,
            run_name: get(ini, "fuzzer", "run_name"),
            max_breakpoints,
            until_rotate_breakpoints,
            single_run_timeout,
            total_runtime,
        };

        let software_breakpoint_addresses = get(ini, "debugger", "software_breakpoint_addresses")
            .map(|raw| {
                raw.split_whitespace()
                    .map(|tok| parse_addr("debugger", "software_breakpoint_addresses", tok))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        let timeout_seconds = match get(ini, "debugger", "timeout_seconds") {
            Some(raw) => Duration::from_secs(raw.trim().parse().map_err(|_| {
                FuzzerError::Config("debugger.timeout_seconds: not a u64".into())
            })?),
            None => Duration::from_secs(5),
        };
        let consider_sw_breakpoint_as_error =
            match get(ini, "debugger", "consider_sw_breakpoint_as_error") {
                Some(raw) => parse_bool("debugger", "consider_sw_breakpoint_as_error", &raw)?,
                None => false,
            };
        let debugger = DebuggerSection {
            gdb_path: get(ini, "debugger", "gdb_path").unwrap_or_else(|| "gdb-multiarch".into()),
            gdb_server_address: require(ini, "debugger", "gdb_server_address")?,
            software_breakpoint_addresses,
            consider_sw_breakpoint_as_error,
            timeout_seconds,
        };

        let target_args = get(ini, "target", "target_args")
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let target_mode = match get(ini, "target", "target_mode") {
            Some(raw) => raw.parse()?,
            None => TargetMode::Hardware,
        };
        let ignore_functions = get(ini, "target", "ignore_functions")
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let target = TargetSection {
            cfg_path: get(ini, "target", "cfg_path"),
            binary_path: get(ini, "target", "binary_path"),
            target_args,
            target_mode,
            ignore_functions,
        };

        let corpus = CorpusSection {
            seeds_path: get(ini, "corpus", "seeds_path"),
            output_path: get(ini, "corpus", "output_path").unwrap_or_else(|| "corpus".into()),
            max_input_length: match get(ini, "corpus", "max_input_length") {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    FuzzerError::Config("corpus.max_input_length: not a usize".into())
                })?,
                None => 4096,
            },
        };

        Ok(FuzzerConfig {
            fuzzer,
            debugger,
            target,
            corpus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_ini(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_a_minimal_config_with_defaults() {
        let f = write_ini(
            "[fuzzer]\n\
             entry_point = 0x1001\n\
             strategy = DominatorChild\n\
             [debugger]\n\
             gdb_server_address = localhost:1234\n",
        );
        let cfg = FuzzerConfig::load(f.path()).unwrap();
        assert_eq!(cfg.fuzzer.entry_point, 0x1000); // forced even
        assert_eq!(cfg.fuzzer.strategy, "DominatorChild");
        assert!(cfg.fuzzer.coverage_guided);
        assert_eq!(cfg.debugger.gdb_path, "gdb-multiarch");
        assert_eq!(cfg.corpus.max_input_length, 4096);
        assert_eq!(cfg.fuzzer.until_rotate_breakpoints, 20_000);
        assert_eq!(cfg.fuzzer.max_breakpoints, 1);
        assert!(cfg.fuzzer.total_runtime.is_none());
        assert_eq!(cfg.target.target_mode, TargetMode::Hardware);
        assert!(cfg.target.ignore_functions.is_empty());
    }

    #[test]
    fn parses_target_mode_and_ignore_functions() {
        let f = write_ini(
            "[fuzzer]\n\
             entry_point = 0x1000\n\
             strategy = Blackbox\n\
             [debugger]\n\
             gdb_server_address = localhost:1234\n\
             [target]\n\
             target_mode = QEMU\n\
             ignore_functions = memcpy memset strlen\n",
        );
        let cfg = FuzzerConfig::load(f.path()).unwrap();
        assert_eq!(cfg.target.target_mode, TargetMode::Qemu);
        assert_eq!(
            cfg.target.ignore_functions,
            vec!["memcpy", "memset", "strlen"]
        );
    }

    #[test]
    fn rejects_unknown_target_mode() {
        let f = write_ini(
            "[fuzzer]\n\
             entry_point = 0x1000\n\
             strategy = Blackbox\n\
             [debugger]\n\
             gdb_server_address = localhost:1234\n\
             [target]\n\
             target_mode = Simulator\n",
        );
        assert!(FuzzerConfig::load(f.path()).is_err());
    }

    #[test]
    fn parses_rotation_and_runtime_overrides() {
        let f = write_ini(
            "[fuzzer]\n\
             entry_point = 0x1000\n\
             strategy = Blackbox\n\
             max_breakpoints = 12\n\
             until_rotate_breakpoints = 500\n\
             single_run_timeout = 3\n\
             total_runtime = 3600\n\
             [debugger]\n\
             gdb_server_address = localhost:1234\n",
        );
        let cfg = FuzzerConfig::load(f.path()).unwrap();
        assert_eq!(cfg.fuzzer.max_breakpoints, 12);
        assert_eq!(cfg.fuzzer.until_rotate_breakpoints, 500);
        assert_eq!(cfg.fuzzer.single_run_timeout, Duration::from_secs(3));
        assert_eq!(cfg.fuzzer.total_runtime, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_missing_required_keys() {
        let f = write_ini("[fuzzer]\nstrategy = Blackbox\n");
        assert!(FuzzerConfig::load(f.path()).is_err());
    }

    #[test]
    fn parses_software_breakpoint_address_list() {
        let f = write_ini(
            "[fuzzer]\n\
             entry_point = 0x1000\n\
             strategy = Blackbox\n\
             [debugger]\n\
             gdb_server_address = localhost:1234\n\
             software_breakpoint_addresses = 0x2000 0x2010\n",
        );
        let cfg = FuzzerConfig::load(f.path()).unwrap();
        assert_eq!(
            cfg.debugger.software_breakpoint_addresses,
            vec![0x2000, 0x2010]
        );
    }
}

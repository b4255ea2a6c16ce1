//! Error taxonomy (spec §7). `SUTCrash`/`SUTTimeout` are deliberately not
//! represented here: they are expected outcomes the orchestrator records and
//! never propagates as a `Result::Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FuzzerError {
    /// The SUT transport adapter could not deliver an input or observe an
    /// input request. Resolved by restarting the SUT instance.
    #[error("transport error: {0}")]
    Transport(String),

    /// A debugger command failed or timed out on its request/response
    /// round-trip. A timeout specifically on `wait_for_stop` is not this
    /// variant — the orchestrator turns that into a `TimedOut` stop event.
    #[error("debugger error: {0}")]
    Debugger(String),

    /// More than `max_analysis_fails` consecutive CFG rebuilds failed; CFG
    /// updates are disabled for the rest of the run.
    #[error("static analyzer unavailable after {fails} failed rebuild(s)")]
    AnalyzerUnavailable { fails: u32 },

    /// Raised during startup only; fatal.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, FuzzerError>;

//! Standalone helper: replay a saved corpus/crash input against the
//! artifacts a previous run left on disk. Grounded on the original
//! `analysis/replay_input.py`, which re-sent a saved input through a live
//! `SUTConnection` a handful of times and printed whatever the debugger
//! reported back. That live connection is the same out-of-scope
//! `SutTransport` collaborator `main.rs` defers to an embedder; this tool
//! instead answers the question a saved input alone can answer offline:
//! whether it is already present in the corpus or crash directories a prior
//! run recorded, and if so, what address and timestamp it was filed under.

use bpfuzz::config::FuzzerConfig;
use bpfuzz::error::{FuzzerError, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Look up a saved input in a prior run's corpus/crash artifacts")]
struct Cli {
    /// Path to the INI run configuration the input was recorded under.
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Path to the input file to look up.
    #[arg(short, long, value_name = "FILE")]
    input_file: PathBuf,
}

/// Scans `dir` for a regular file whose contents are byte-identical to
/// `needle`, returning its file name. `None` if `dir` does not exist yet or
/// no entry matches.
fn find_matching_file(dir: &std::path::Path, needle: &[u8]) -> Result<Option<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(FuzzerError::Io(e)),
    };
    for entry in entries {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        if fs::read(entry.path())? == needle {
            return Ok(Some(entry.file_name().to_string_lossy().into_owned()));
        }
    }
    Ok(None)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = FuzzerConfig::load(&cli.config)?;
    let input = fs::read(&cli.input_file)?;

    println!("input: {} bytes from {}", input.len(), cli.input_file.display());
    if input.len() > config.corpus.max_input_length {
        println!(
            "warning: longer than this run's configured maximum_input_length ({})",
            config.corpus.max_input_length
        );
    }

    let corpus_dir = PathBuf::from(&config.corpus.output_path);
    match find_matching_file(&corpus_dir, &input)? {
        Some(name) => println!("found in corpus: {name}"),
        None => println!("not present in {}", corpus_dir.display()),
    }

    let crashes_dir = corpus_dir.join("crashes");
    match find_matching_file(&crashes_dir, &input)? {
        Some(name) => println!("found in crashes: {name}"),
        None => println!("not present in {}", crashes_dir.display()),
    }

    println!(
        "to actually replay this input against the running SUT, feed it through a live \
         SutTransport bound to the target named in [target] binary_path"
    );
    Ok(())
}

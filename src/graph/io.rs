//! CFG file format (spec §6): a plain-text adjacency list, one line per
//! node, addresses in hexadecimal except for the symbolic sentinel tokens
//! (DESIGN.md decision #5). Read back by `StaticAnalyzerAdapter` at startup
//! and after every successful CFG-update round.

use super::ControlFlowGraph;
use crate::address::{format_address, parse_address};
use crate::error::{FuzzerError, Result};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

const HEADER: &str = "#Adjacency list in hexadecimal";

/// Writes `#Adjacency list in hexadecimal`, then the function name, then one
/// `src: dst dst ...` line per node (nodes with no successors get an empty
/// right-hand side, not an omitted line — so re-reading preserves isolated
/// nodes).
pub fn write_adjacency_list(
    path: impl AsRef<Path>,
    function_name: &str,
    cfg: &ControlFlowGraph,
) -> Result<()> {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');
    out.push_str(function_name);
    out.push('\n');
    for node in cfg.nodes() {
        let succs = cfg.successors(node);
        let rendered = succs
            .iter()
            .map(|&a| format_address(a))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!("{}: {}\n", format_address(node), rendered));
    }
    std::fs::File::create(path)?.write_all(out.as_bytes())?;
    Ok(())
}

/// Returns the function name and the parsed graph. Lines before the header
/// or malformed address tokens raise `FuzzerError::Parse`, matching the
/// original `Ghidra.read_cfg`'s strict format expectations.
pub fn read_adjacency_list(path: impl AsRef<Path>) -> Result<(String, ControlFlowGraph)> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut lines = reader.lines();
    let header = lines
        .next()
        .ok_or_else(|| FuzzerError::Parse("empty CFG file".into()))??;
    if header.trim() != HEADER {
        return Err(FuzzerError::Parse(format!(
            "unexpected CFG file header: {header:?}"
        )));
    }
    let function_name = lines
        .next()
        .ok_or_else(|| FuzzerError::Parse("CFG file missing function name line".into()))??;

    let mut cfg = ControlFlowGraph::new();
    for line in lines {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (src_tok, rest) = line
            .split_once(':')
            .ok_or_else(|| FuzzerError::Parse(format!("malformed CFG line: {line:?}")))?;
        let src = parse_address(src_tok)
            .ok_or_else(|| FuzzerError::Parse(format!("bad address token: {src_tok:?}")))?;
        cfg.get_or_insert(src);
        for dst_tok in rest.split_whitespace() {
            let dst = parse_address(dst_tok)
                .ok_or_else(|| FuzzerError::Parse(format!("bad address token: {dst_tok:?}")))?;
            cfg.add_edge(src, dst);
        }
    }
    Ok((function_name.trim().to_string(), cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::EXTERNAL_CALL_SITE;

    #[test]
    fn round_trips_a_small_graph_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("func.cfg");

        let mut cfg = ControlFlowGraph::new();
        cfg.add_edge(0x1000, 0x1010);
        cfg.add_edge(0x1000, EXTERNAL_CALL_SITE);
        cfg.get_or_insert(0x1010);

        write_adjacency_list(&path, "target_fn", &cfg).unwrap();
        let (name, read_back) = read_adjacency_list(&path).unwrap();

        assert_eq!(name, "target_fn");
        assert_eq!(read_back.node_count(), cfg.node_count());
        assert_eq!(read_back.edge_count(), cfg.edge_count());
        let mut succs = read_back.successors(0x1000);
        succs.sort();
        assert_eq!(succs, vec![EXTERNAL_CALL_SITE, 0x1010]);
    }

    #[test]
    fn rejects_a_missing_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.cfg");
        std::fs::write(&path, "not a cfg file\n").unwrap();
        assert!(read_adjacency_list(&path).is_err());
    }
}

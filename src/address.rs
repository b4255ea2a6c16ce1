//! The address space shared by every subsystem: basic-block starts, and the
//! handful of reserved sentinel values the CFG machinery treats specially.

use serde::{Deserialize, Serialize};

/// An unsigned-in-spirit integer identifying a basic-block start. Signed so
/// that the reserved sentinels below can share the same type, exactly as
/// the original implementation stores them alongside real addresses in its
/// covered-set.
pub type Address = i64;

/// Call targets outside the analysed function-closure.
pub const EXTERNAL_CALL_SITE: Address = -1;
/// The synthetic return block for an external call.
pub const EXTERNAL_RETURN_BLOCK: Address = -2;
/// Virtual super-exit, used only while computing post-dominators. Never
/// appears in a persisted CFG file or in the covered set.
pub const VIRTUAL_SUPER_EXIT: Address = -42;

/// Sentinels that seed `CoveredSet` alongside the entry point (spec §3).
pub const COVERED_SET_SENTINELS: [Address; 2] = [EXTERNAL_CALL_SITE, EXTERNAL_RETURN_BLOCK];

/// The symbolic token a sentinel round-trips through in a CFG file, instead
/// of a two's-complement hex string (spec §6: "implementations must be
/// self-consistent in both directions").
pub fn sentinel_token(addr: Address) -> Option<&'static str> {
    match addr {
        EXTERNAL_CALL_SITE => Some("EXTERNAL_CALL_SITE"),
        EXTERNAL_RETURN_BLOCK => Some("EXTERNAL_RETURN_BLOCK"),
        _ => None,
    }
}

pub fn address_from_token(token: &str) -> Option<Address> {
    match token {
        "EXTERNAL_CALL_SITE" => Some(EXTERNAL_CALL_SITE),
        "EXTERNAL_RETURN_BLOCK" => Some(EXTERNAL_RETURN_BLOCK),
        _ => None,
    }
}

/// Format an address the way CFG files and log lines do: hex for real
/// addresses, symbolic token for sentinels.
pub fn format_address(addr: Address) -> String {
    match sentinel_token(addr) {
        Some(tok) => tok.to_string(),
        None if addr >= 0 => format!("{addr:#x}"),
        None => format!("{addr}"),
    }
}

/// Parse an address written by [`format_address`], or a bare decimal/hex
/// literal as accepted in config files (spec §6: "decimal, hex, or symbol").
pub fn parse_address(s: &str) -> Option<Address> {
    let s = s.trim();
    if let Some(addr) = address_from_token(s) {
        return Some(addr);
    }
    if let Some(stripped) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return Address::from_str_radix(stripped, 16).ok();
    }
    s.parse::<Address>().ok()
}

/// Wire-friendly pair used all over the crate for covered-address logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressHit {
    pub address: Address,
    pub at_runtime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_and_parses_plain_addresses() {
        assert_eq!(format_address(0x1000), "0x1000");
        assert_eq!(parse_address("0x1000"), Some(0x1000));
        assert_eq!(parse_address("4096"), Some(4096));
    }

    #[test]
    fn round_trips_sentinels_symbolically() {
        for s in [EXTERNAL_CALL_SITE, EXTERNAL_RETURN_BLOCK] {
            let token = format_address(s);
            assert_eq!(parse_address(&token), Some(s));
        }
    }
}

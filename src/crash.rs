//! Crash and timeout persistence with stack-based deduplication (spec §4.G,
//! "Crash/timeout deduplication"). Grounded on the original
//! `GDBFuzzer.on_crash`/`on_timeout`/`write_crashing_input`: frames are
//! concatenated, truncated to 100 characters, filtered to alphanumerics,
//! and used as the file name so two crashes with the same stack never
//! produce a second file.

use log::info;
use std::path::{Path, PathBuf};

const FINGERPRINT_MAX_LEN: usize = 100;

/// Reduces a sequence of frame addresses (as GDB/MI prints them, e.g.
/// `"0x08001234"`) to the file-name-safe fingerprint the original computes
/// by string concatenation, truncation, then alnum filtering.
pub fn fingerprint_frames<'a>(frames: impl IntoIterator<Item = &'a str>) -> String {
    let mut joined = String::new();
    for frame in frames {
        joined.push(' ');
        joined.push_str(frame);
    }
    if joined.len() > FINGERPRINT_MAX_LEN {
        joined.truncate(FINGERPRINT_MAX_LEN);
    }
    joined.chars().filter(|c| c.is_alphanumeric()).collect()
}

pub struct CrashWriter {
    crashes_dir: PathBuf,
}

impl CrashWriter {
    pub fn new(crashes_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let crashes_dir = crashes_dir.into();
        std::fs::create_dir_all(&crashes_dir)?;
        Ok(Self { crashes_dir })
    }

    fn write_if_new(&self, filename: &str, content: &[u8]) -> std::io::Result<bool> {
        let path = self.crashes_dir.join(filename);
        if path.is_file() {
            info!("duplicate crash/timeout, not writing {filename}");
            return Ok(false);
        }
        std::fs::write(&path, content)?;
        info!("new crash/timeout recorded as {filename}");
        Ok(true)
    }

    /// `filename` is the fingerprint computed from the crashing stack
    /// trace, or a fallback identifier (e.g. a random id) when no
    /// stacktrace could be retrieved. Returns `true` if a new file was
    /// written, `false` on a deduplicated crash.
    pub fn write_crash(&self, current_input: &[u8], filename: &str) -> std::io::Result<bool> {
        self.write_if_new(filename, current_input)
    }

    /// Same as `write_crash`, but the persisted file name always carries
    /// the `timeout_` prefix so the two categories never collide on disk.
    pub fn write_timeout(&self, current_input: &[u8], filename: &str) -> std::io::Result<bool> {
        self.write_if_new(&format!("timeout_{filename}"), current_input)
    }

    pub fn dir(&self) -> &Path {
        &self.crashes_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_truncates_and_strips_punctuation() {
        let frames = vec!["0x08001234", "0x08005678", "0x0800abcd"];
        let fp = fingerprint_frames(frames);
        assert!(fp.len() <= FINGERPRINT_MAX_LEN);
        assert!(fp.chars().all(|c| c.is_alphanumeric()));
    }

    #[test]
    fn duplicate_crash_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CrashWriter::new(dir.path()).unwrap();
        assert!(writer.write_crash(b"input-a", "abc123").unwrap());
        assert!(!writer.write_crash(b"input-b", "abc123").unwrap());
    }

    #[test]
    fn timeouts_and_crashes_with_the_same_fingerprint_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CrashWriter::new(dir.path()).unwrap();
        assert!(writer.write_crash(b"input-a", "abc123").unwrap());
        assert!(writer.write_timeout(b"input-b", "abc123").unwrap());
    }
}

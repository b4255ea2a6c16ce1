//! Debugger Adapter (spec §4.C): the seam between the orchestrator and
//! whatever speaks the debug-protocol to the SUT. Grounded on the original
//! `gdb/GDB.py`, which wraps a `pygdbmi` session the same way this trait
//! wraps a concrete transport; the real GDB/MI client itself is out of
//! scope (spec §1) and left as an interface.

use crate::address::Address;
use std::time::Duration;

/// Opaque handle a `DebuggerAdapter` hands back for a breakpoint it set, so
/// the caller can remove exactly that one later without re-deriving it from
/// an address (two breakpoints can share an address across a CFG update).
pub type BreakpointId = u64;

/// Every way `wait_for_stop` can return, mirroring the tag set the original
/// `GDB.wait_for_stop` recognises in a GDB/MI `*stopped` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopEvent {
    /// The SUT is blocked waiting for fuzzer input.
    InputRequest,
    /// A breakpoint previously set via `set_breakpoint` fired.
    BreakpointHit(BreakpointId, Address),
    /// `interrupt()` delivered a stop; `Address` is the PC at the time.
    Interrupt(Address),
    /// `step_instruction()` completed; `Address` is the resulting PC.
    StepDone(Address),
    /// The SUT raised a signal consistent with memory corruption.
    Crashed { signal: String, pc: Address },
    /// The SUT process exited on its own.
    Exited { code: i32 },
    /// No stop was observed within the configured timeout.
    TimedOut,
    /// The transport link itself failed (not a SUT-level event).
    CommError(String),
    /// A stop record arrived that didn't match any recognised reason; the
    /// raw reason string is kept for diagnostics, as the original does by
    /// logging whatever MI record it didn't understand.
    StoppedNoReason(String),
}

/// The seam the orchestrator drives; implemented concretely by a live
/// GDB/MI session (out of scope here) and, for tests, by `MockDebugger`.
pub trait DebuggerAdapter {
    fn connect(&mut self) -> crate::error::Result<()>;
    fn disconnect(&mut self) -> crate::error::Result<()>;

    /// Sets a breakpoint at `addr`, returning an id to remove it by.
    fn set_breakpoint(&mut self, addr: Address) -> crate::error::Result<BreakpointId>;
    fn remove_breakpoint(&mut self, id: BreakpointId) -> crate::error::Result<()>;

    /// Resumes the SUT until the next stop.
    fn continue_execution(&mut self) -> crate::error::Result<()>;

    /// Asynchronously requests a stop (spec §4.C `Interrupt`), used to
    /// sample the PC on a coverage-guided, non-breakpoint-hit interval.
    fn interrupt(&mut self) -> crate::error::Result<()>;

    /// Blocks (up to `timeout`) for the next stop event.
    fn wait_for_stop(&mut self, timeout: Duration) -> crate::error::Result<StopEvent>;

    /// Single-steps one instruction, used by the CFG-update sub-protocol
    /// to resolve an unknown/indirect branch target (spec §4.F).
    fn step_instruction(&mut self) -> crate::error::Result<Address>;

    fn read_pc(&mut self) -> crate::error::Result<Address>;

    /// Drains the side-channel queue of extra hit PCs the adapter observed
    /// in multi-core or multi-message stop responses (spec §4.C). Called
    /// only while handling an `Interrupt`; empty otherwise.
    fn drain_additional_hits(&mut self) -> Vec<Address>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::error::{FuzzerError, Result};
    use std::collections::VecDeque;

    /// Deterministic double for orchestrator tests: a caller pre-loads the
    /// exact sequence of stop events it wants `wait_for_stop` to return.
    #[derive(Default)]
    pub struct MockDebugger {
        pub next_bp_id: BreakpointId,
        pub breakpoints: hashbrown::HashMap<BreakpointId, Address>,
        pub scripted_stops: VecDeque<StopEvent>,
        pub pc: Address,
        pub connected: bool,
        pub additional_hits: VecDeque<Address>,
    }

    impl MockDebugger {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_stop(&mut self, event: StopEvent) {
            self.scripted_stops.push_back(event);
        }

        pub fn push_additional_hit(&mut self, addr: Address) {
            self.additional_hits.push_back(addr);
        }
    }

    impl DebuggerAdapter for MockDebugger {
        fn connect(&mut self) -> Result<()> {
            self.connected = true;
            Ok(())
        }

        fn disconnect(&mut self) -> Result<()> {
            self.connected = false;
            Ok(())
        }

        fn set_breakpoint(&mut self, addr: Address) -> Result<BreakpointId> {
            self.next_bp_id += 1;
            self.breakpoints.insert(self.next_bp_id, addr);
            Ok(self.next_bp_id)
        }

        fn remove_breakpoint(&mut self, id: BreakpointId) -> Result<()> {
            self.breakpoints.remove(&id);
            Ok(())
        }

        fn continue_execution(&mut self) -> Result<()> {
            Ok(())
        }

        fn interrupt(&mut self) -> Result<()> {
            Ok(())
        }

        fn wait_for_stop(&mut self, _timeout: Duration) -> Result<StopEvent> {
            self.scripted_stops
                .pop_front()
                .ok_or_else(|| FuzzerError::Debugger("mock exhausted".into()))
        }

        fn step_instruction(&mut self) -> Result<Address> {
            self.pc += 1;
            Ok(self.pc)
        }

        fn read_pc(&mut self) -> Result<Address> {
            Ok(self.pc)
        }

        fn drain_additional_hits(&mut self) -> Vec<Address> {
            self.additional_hits.drain(..).collect()
        }
    }

    #[test]
    fn scripted_stops_are_returned_in_order() {
        let mut dbg = MockDebugger::new();
        dbg.push_stop(StopEvent::InputRequest);
        dbg.push_stop(StopEvent::BreakpointHit(1, 0x1000));
        assert_eq!(
            dbg.wait_for_stop(Duration::from_secs(1)).unwrap(),
            StopEvent::InputRequest
        );
        assert_eq!(
            dbg.wait_for_stop(Duration::from_secs(1)).unwrap(),
            StopEvent::BreakpointHit(1, 0x1000)
        );
    }
}

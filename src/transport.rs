//! SUT Transport Adapter (spec §4.D): delivers fuzzer-generated input to the
//! system under test and observes when it's ready for the next input.
//! Grounded on the original `connections/SUTConnection.py` hierarchy (serial,
//! TCP and stdin variants behind one interface); the concrete transports
//! themselves are out of scope here (spec §1), so only the trait and a test
//! double live in this crate.

use std::time::Duration;

pub trait SutTransport {
    /// Sends one input to the running SUT instance.
    fn send_input(&mut self, data: &[u8]) -> crate::error::Result<()>;

    /// Blocks (up to `timeout`) until the SUT signals it is ready for the
    /// next input, e.g. by hitting the breakpoint the original places at
    /// the start of the input-reading routine.
    fn wait_for_input_request(&mut self, timeout: Duration) -> crate::error::Result<bool>;

    /// Tears down and re-establishes the connection to a freshly restarted
    /// SUT instance, called by the orchestrator's `RestartingSUT` state.
    fn reset(&mut self) -> crate::error::Result<()>;
}

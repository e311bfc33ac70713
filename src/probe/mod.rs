pub mod checksum;
pub mod correlate;
pub mod icmp;
pub mod socket;
pub mod transport;

pub use transport::{IcmpTransport, Network, Probe, ProbeResult, await_response};

use std::sync::atomic::{AtomicU16, Ordering};

static SESSIONS_STARTED: AtomicU16 = AtomicU16::new(0);

/// Odd, so stepping by it visits all 65536 values before repeating
const IDENTIFIER_STRIDE: u16 = 0x9E37;

/// Pick the ICMP identifier for a new session.
///
/// Derived from the process id so concurrent processes rarely collide, and
/// from a per-process counter so sessions within one process never do (until
/// 65536 sessions have been started).
pub fn next_identifier() -> u16 {
    let pid = std::process::id() as u16;
    let n = SESSIONS_STARTED.fetch_add(1, Ordering::Relaxed);
    pid.wrapping_add(n.wrapping_mul(IDENTIFIER_STRIDE))
}

//! Connection id allocation.
//!
//! Connection ids end up in room membership sets in the shared store,
//! which outlive the relay process. A plain counter restarting at 1
//! after a crash would hand out ids that already sit in stale
//! membership sets, so the upper bits are randomized once per process.
//! Ids stay below 2^53 so browsers can hold them as plain numbers.

use std::sync::atomic::{AtomicU64, Ordering};

use watchparty_protocol::ConnectionId;

/// Bits of the per-process random prefix.
const PREFIX_BITS: u32 = 21;
/// Bits of the per-process counter.
const COUNTER_BITS: u32 = 32;

/// Hands out process-unique connection ids.
#[derive(Debug)]
pub struct ConnectionIdAllocator {
    prefix: u64,
    next: AtomicU64,
}

impl ConnectionIdAllocator {
    /// Creates an allocator with a fresh random prefix.
    pub fn new() -> Self {
        Self::with_prefix(rand::random::<u64>())
    }

    /// Creates an allocator with a fixed prefix (masked to 21 bits).
    pub fn with_prefix(prefix: u64) -> Self {
        Self {
            prefix: (prefix & ((1 << PREFIX_BITS) - 1)) << COUNTER_BITS,
            next: AtomicU64::new(1),
        }
    }

    /// Returns the next id.
    pub fn next_id(&self) -> ConnectionId {
        let n = self.next.fetch_add(1, Ordering::Relaxed) & ((1 << COUNTER_BITS) - 1);
        ConnectionId::new(self.prefix | n)
    }
}

impl Default for ConnectionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

//! Bounded, append-only log of failures for one retrieval.
//!
//! Shared between the wave tasks that append and the deadline governor that reads a
//! snapshot when it gives up, so it lives outside the orchestrator future.

use parking_lot::Mutex;
use std::sync::Arc;

use super::outcome::FailureEntry;

#[derive(Debug, Default)]
struct LedgerState {
    entries: Vec<FailureEntry>,
    omitted: usize,
}

/// Cheaply cloneable handle to a per-invocation failure log
#[derive(Debug, Clone)]
pub struct ErrorLedger {
    capacity: usize,
    state: Arc<Mutex<LedgerState>>,
}

impl ErrorLedger {
    /// Create a ledger holding at most `capacity` entries (never fewer than one)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Arc::new(Mutex::new(LedgerState::default())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a failure, evicting the oldest entry that is not its wave's latest
    pub fn record(&self, entry: FailureEntry) {
        let mut state = self.state.lock();
        if state.entries.len() >= self.capacity {
            let evict = state
                .entries
                .iter()
                .enumerate()
                .position(|(i, e)| {
                    e.wave == entry.wave || state.entries[i + 1..].iter().any(|later| later.wave == e.wave)
                })
                .unwrap_or(0);
            state.entries.remove(evict);
            state.omitted += 1;
        }
        state.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current entries and the number of evicted ones
    pub fn snapshot(&self) -> (Vec<FailureEntry>, usize) {
        let state = self.state.lock();
        (state.entries.clone(), state.omitted)
    }
}

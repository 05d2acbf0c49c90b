use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-ticket-id mutual exclusion for read-modify-write sequences.
///
/// Hands out one async mutex per id on demand; operations on different
/// tickets never contend. Map entries are pruned opportunistically once no
/// guard holds them, so the map tracks live contention rather than every
/// id ever seen.
#[derive(Default)]
pub struct TicketLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Held for the duration of one ticket operation.
pub struct TicketLockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl TicketLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: &str) -> TicketLockGuard {
        let mutex = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // Entries referenced only by the map are idle and safe to drop.
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        TicketLockGuard {
            _guard: mutex.lock_owned().await,
        }
    }
}

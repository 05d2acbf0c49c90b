//! In-memory ticket registry for single-node and test deployments.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::codec::{BincodeCodec, TicketCodec};
use super::{TicketRegistry, MAX_STORE_TTL_SECONDS};
use crate::ticket::Ticket;

struct Entry {
    /// Eviction deadline fixed at insert; updates and reads never move it.
    deadline: DateTime<Utc>,
    encoded: Vec<u8>,
}

pub struct MemoryTicketRegistry {
    codec: Arc<dyn TicketCodec>,
    entries: RwLock<HashMap<String, Entry>>,
}

impl Default for MemoryTicketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTicketRegistry {
    pub fn new() -> Self {
        Self::with_codec(Arc::new(BincodeCodec))
    }

    pub fn with_codec(codec: Arc<dyn TicketCodec>) -> Self {
        warn!("In-memory ticket registry selected: state is NOT durable and all tickets are lost on restart");
        Self {
            codec,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn store(&self, ticket: &Ticket, deadline: Option<DateTime<Utc>>) -> bool {
        let encoded = match self.codec.encode(ticket) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(ticket_id = %ticket.id(), error = %e, "Failed to encode ticket");
                return false;
            }
        };

        let now = Utc::now();
        let mut entries = self.write();
        let deadline = match deadline {
            Some(existing) => existing,
            None => {
                let ttl = ticket
                    .expiration_policy()
                    .store_ttl_seconds(&ticket.times(), now, MAX_STORE_TTL_SECONDS);
                if ttl == 0 {
                    // Already dead: evict immediately rather than store.
                    entries.remove(ticket.id());
                    return true;
                }
                now + Duration::seconds(ttl)
            }
        };
        entries.insert(ticket.id().to_string(), Entry { deadline, encoded });
        true
    }
}

#[async_trait]
impl TicketRegistry for MemoryTicketRegistry {
    async fn add(&self, ticket: &Ticket) -> bool {
        self.store(ticket, None)
    }

    async fn get(&self, id: &str) -> Option<Ticket> {
        let now = Utc::now();
        {
            let entries = self.read();
            let entry = entries.get(id)?;
            if entry.deadline > now {
                return match self.codec.decode(&entry.encoded) {
                    Ok(ticket) => Some(ticket),
                    Err(e) => {
                        warn!(ticket_id = %id, error = %e, "Failed to decode stored ticket");
                        None
                    }
                };
            }
        }
        // Past its deadline: evict on read.
        self.write().remove(id);
        None
    }

    async fn get_all(&self) -> Vec<Ticket> {
        let now = Utc::now();
        let entries = self.read();
        entries
            .values()
            .filter(|entry| entry.deadline > now)
            .filter_map(|entry| self.codec.decode(&entry.encoded).ok())
            .collect()
    }

    async fn update(&self, ticket: &Ticket) -> bool {
        // Keep the insert-time deadline; a fresh one only when the ticket
        // was never stored.
        let existing = self.read().get(ticket.id()).map(|entry| entry.deadline);
        self.store(ticket, existing)
    }

    async fn delete(&self, id: &str) -> bool {
        self.write().remove(id).is_some()
    }

    async fn delete_all(&self) -> usize {
        let mut entries = self.write();
        let count = entries.len();
        entries.clear();
        count
    }

    async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|id, entry| {
            if entry.deadline <= now {
                return false;
            }
            match self.codec.decode(&entry.encoded) {
                Ok(ticket) => {
                    let alive = !ticket.is_expired(now);
                    if !alive {
                        debug!(ticket_id = %id, "Sweeping expired ticket");
                    }
                    alive
                }
                Err(_) => false,
            }
        });
        before - entries.len()
    }
}

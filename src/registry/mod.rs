//! Durable/distributed key-value store of tickets keyed by id.
//!
//! Every backend encodes tickets through a pluggable [`codec::TicketCodec`]
//! before write and decodes after read, and derives the physical store's
//! TTL from the ticket's own expiration policy. Codec and transport
//! failures are logged here and surface to callers as a negative result —
//! by design, "ticket never existed" and "store unreachable" are
//! indistinguishable at this boundary.

pub mod cleaner;
pub mod codec;
pub mod memory;
pub mod redb;
pub mod redis;

use async_trait::async_trait;

use crate::ticket::Ticket;

/// Point-lookup key prefix for distributed backends. Bulk scans match
/// `CAS_TICKET:*` so they only ever touch ticket keys.
pub const KEY_PREFIX: &str = "CAS_TICKET";

/// Largest TTL any backend is asked to represent.
pub const MAX_STORE_TTL_SECONDS: i64 = i32::MAX as i64;

pub fn ticket_key(id: &str) -> String {
    format!("{KEY_PREFIX}:{id}")
}

pub fn scan_pattern() -> String {
    format!("{KEY_PREFIX}:*")
}

#[async_trait]
pub trait TicketRegistry: Send + Sync {
    /// Persist a ticket. Returns false when the write did not happen.
    async fn add(&self, ticket: &Ticket) -> bool;

    /// Fetch a ticket by id. `None` covers absent, evicted, undecodable,
    /// and unreachable alike.
    async fn get(&self, id: &str) -> Option<Ticket>;

    /// Best-effort bulk read; may be empty or partial under distributed
    /// backends.
    async fn get_all(&self) -> Vec<Ticket>;

    /// Re-persist a mutated ticket without touching the store's eviction
    /// deadline. Returns false when the write did not happen.
    async fn update(&self, ticket: &Ticket) -> bool;

    /// Remove a ticket. Returns true iff something was removed.
    async fn delete(&self, id: &str) -> bool;

    /// Remove every ticket, returning how many were removed.
    async fn delete_all(&self) -> usize;

    /// Drop entries the backend's own TTL machinery cannot evict (policy-
    /// dead or past their store deadline). Backends with an authoritative
    /// store TTL have nothing to do here.
    async fn sweep(&self) -> usize {
        0
    }
}

//! Durable embedded ticket registry backed by redb (ACID, MVCC,
//! crash-safe). Suited to single-node deployments that must survive a
//! restart without an external store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redb::{Database as RedbDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::codec::{BincodeCodec, TicketCodec};
use super::{TicketRegistry, MAX_STORE_TTL_SECONDS};
use crate::ticket::Ticket;

const TICKETS: TableDefinition<&str, &[u8]> = TableDefinition::new("tickets");

#[derive(Debug, Error)]
pub enum RedbRegistryError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
}

/// On-disk row: codec output plus the eviction deadline fixed at insert.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    deadline_ms: i64,
    encoded: Vec<u8>,
}

pub struct RedbTicketRegistry {
    codec: Arc<dyn TicketCodec>,
    db: RedbDatabase,
}

impl RedbTicketRegistry {
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, RedbRegistryError> {
        Self::open_with_codec(data_dir, Arc::new(BincodeCodec))
    }

    pub fn open_with_codec<P: AsRef<Path>>(
        data_dir: P,
        codec: Arc<dyn TicketCodec>,
    ) -> Result<Self, RedbRegistryError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("ticketd.redb");
        let db = RedbDatabase::create(db_path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TICKETS)?;
        }
        write_txn.commit()?;

        Ok(Self { codec, db })
    }

    fn put(&self, id: &str, entry: &StoredEntry) -> Result<(), RedbRegistryError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TICKETS)?;
            let data = bincode::serialize(entry)?;
            table.insert(id, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn fetch(&self, id: &str) -> Result<Option<StoredEntry>, RedbRegistryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TICKETS)?;
        match table.get(id)? {
            Some(data) => Ok(Some(bincode::deserialize(data.value())?)),
            None => Ok(None),
        }
    }

    fn remove(&self, id: &str) -> Result<bool, RedbRegistryError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(TICKETS)?;
            let removed = table.remove(id)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn remove_many(&self, ids: &[String]) -> Result<usize, RedbRegistryError> {
        let write_txn = self.db.begin_write()?;
        let mut removed = 0;
        {
            let mut table = write_txn.open_table(TICKETS)?;
            for id in ids {
                if table.remove(id.as_str())?.is_some() {
                    removed += 1;
                }
            }
        }
        write_txn.commit()?;
        Ok(removed)
    }

    fn all_entries(&self) -> Result<Vec<(String, StoredEntry)>, RedbRegistryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TICKETS)?;
        let mut entries = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            let entry: StoredEntry = bincode::deserialize(value.value())?;
            entries.push((key.value().to_string(), entry));
        }
        Ok(entries)
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
        let deadline_ms = match deadline {
            Some(existing) => existing.timestamp_millis(),
            None => {
                let ttl = ticket
                    .expiration_policy()
                    .store_ttl_seconds(&ticket.times(), now, MAX_STORE_TTL_SECONDS);
                if ttl == 0 {
                    // Already dead: evict immediately rather than store.
                    if let Err(e) = self.remove(ticket.id()) {
                        warn!(ticket_id = %ticket.id(), error = %e, "Failed to evict dead ticket");
                        return false;
                    }
                    return true;
                }
                (now + Duration::seconds(ttl)).timestamp_millis()
            }
        };

        let entry = StoredEntry {
            deadline_ms,
            encoded,
        };
        match self.put(ticket.id(), &entry) {
            Ok(()) => true,
            Err(e) => {
                warn!(ticket_id = %ticket.id(), error = %e, "Failed to write ticket");
                false
            }
        }
    }
}

#[async_trait]
impl TicketRegistry for RedbTicketRegistry {
    async fn add(&self, ticket: &Ticket) -> bool {
        self.store(ticket, None)
    }

    async fn get(&self, id: &str) -> Option<Ticket> {
        let entry = match self.fetch(id) {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(ticket_id = %id, error = %e, "Failed to read ticket");
                return None;
            }
        };
        if entry.deadline_ms <= Utc::now().timestamp_millis() {
            // Past its deadline: evict on read.
            if let Err(e) = self.remove(id) {
                warn!(ticket_id = %id, error = %e, "Failed to evict ticket past deadline");
            }
            return None;
        }
        match self.codec.decode(&entry.encoded) {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                warn!(ticket_id = %id, error = %e, "Failed to decode stored ticket");
                None
            }
        }
    }

    async fn get_all(&self) -> Vec<Ticket> {
        let entries = match self.all_entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to scan tickets");
                return Vec::new();
            }
        };
        let now_ms = Utc::now().timestamp_millis();
        entries
            .into_iter()
            .filter(|(_, entry)| entry.deadline_ms > now_ms)
            .filter_map(|(_, entry)| self.codec.decode(&entry.encoded).ok())
            .collect()
    }

    async fn update(&self, ticket: &Ticket) -> bool {
        // Keep the insert-time deadline; a fresh one only when the ticket
        // was never stored.
        let existing = match self.fetch(ticket.id()) {
            Ok(entry) => entry.and_then(|e| DateTime::from_timestamp_millis(e.deadline_ms)),
            Err(e) => {
                warn!(ticket_id = %ticket.id(), error = %e, "Failed to read ticket for update");
                return false;
            }
        };
        self.store(ticket, existing)
    }

    async fn delete(&self, id: &str) -> bool {
        match self.remove(id) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(ticket_id = %id, error = %e, "Failed to delete ticket");
                false
            }
        }
    }

    async fn delete_all(&self) -> usize {
        let ids: Vec<String> = match self.all_entries() {
            Ok(entries) => entries.into_iter().map(|(id, _)| id).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to scan tickets");
                return 0;
            }
        };
        match self.remove_many(&ids) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Failed to bulk-delete tickets");
                0
            }
        }
    }

    async fn sweep(&self) -> usize {
        let entries = match self.all_entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to scan tickets for sweep");
                return 0;
            }
        };

        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let dead: Vec<String> = entries
            .into_iter()
            .filter(|(_, entry)| {
                entry.deadline_ms <= now_ms
                    || match self.codec.decode(&entry.encoded) {
                        Ok(ticket) => ticket.is_expired(now),
                        Err(_) => true,
                    }
            })
            .map(|(id, _)| id)
            .collect();

        if dead.is_empty() {
            return 0;
        }
        for id in &dead {
            debug!(ticket_id = %id, "Sweeping expired ticket");
        }
        match self.remove_many(&dead) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Failed to sweep expired tickets");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;
    use crate::testutil::{make_st, make_tgt};

    fn setup_registry() -> (RedbTicketRegistry, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let registry = RedbTicketRegistry::open(temp_dir.path()).unwrap();
        (registry, temp_dir)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (registry, _temp) = setup_registry();
        let ticket = Ticket::Service(make_st("ST-1-abc", "TGT-1-abc", "https://app.example.org"));

        assert!(registry.add(&ticket).await);
        let fetched = registry.get("ST-1-abc").await.unwrap();
        match fetched {
            Ticket::Service(st) => {
                assert_eq!(st.granting_ticket_id, "TGT-1-abc");
                assert_eq!(st.service.original_url, "https://app.example.org");
            }
            Ticket::Granting(_) => panic!("wrong ticket kind"),
        }
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let registry = RedbTicketRegistry::open(temp_dir.path()).unwrap();
            assert!(
                registry
                    .add(&Ticket::Granting(make_tgt("TGT-1-abc", "alice")))
                    .await
            );
        }
        let registry = RedbTicketRegistry::open(temp_dir.path()).unwrap();
        assert!(registry.get("TGT-1-abc").await.is_some());
    }

    #[tokio::test]
    async fn test_dead_on_arrival_is_not_stored() {
        let (registry, _temp) = setup_registry();
        let mut tgt = make_tgt("TGT-1-abc", "alice");
        tgt.expiration_policy = crate::ticket::expiration::ExpirationPolicy::Hard {
            max_time_to_live_seconds: 10,
        };
        tgt.creation_time = Utc::now() - Duration::seconds(60);

        // Dead on arrival: evicted, not stored.
        assert!(registry.add(&Ticket::Granting(tgt)).await);
        assert!(registry.get("TGT-1-abc").await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_and_delete_all() {
        let (registry, _temp) = setup_registry();
        let mut dead = make_tgt("TGT-1-dead", "alice");
        dead.expired = true;
        registry.add(&Ticket::Granting(dead)).await;
        registry
            .add(&Ticket::Granting(make_tgt("TGT-2-live", "bob")))
            .await;

        assert_eq!(registry.sweep().await, 1);
        assert_eq!(registry.get_all().await.len(), 1);
        assert_eq!(registry.delete_all().await, 1);
    }
}

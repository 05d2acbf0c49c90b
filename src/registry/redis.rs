//! Redis-backed ticket registry for distributed deployments.
//!
//! The store's TTL is the eviction authority: inserts set an expiry from
//! the ticket's remaining lifetime, updates write with `KEEPTTL` so the
//! read/update path can neither shorten nor extend it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, warn};

use super::codec::{BincodeCodec, TicketCodec};
use super::{scan_pattern, ticket_key, TicketRegistry, MAX_STORE_TTL_SECONDS};
use crate::ticket::Ticket;

const SCAN_BATCH: usize = 100;

pub struct RedisTicketRegistry {
    codec: Arc<dyn TicketCodec>,
    manager: ConnectionManager,
}

impl RedisTicketRegistry {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        Self::connect_with_codec(url, Arc::new(BincodeCodec)).await
    }

    pub async fn connect_with_codec(
        url: &str,
        codec: Arc<dyn TicketCodec>,
    ) -> Result<Self, redis::RedisError> {
        info!(url = %url, "Connecting to Redis ticket registry");
        let client = Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        info!("Connected to Redis ticket registry");
        Ok(Self { codec, manager })
    }

    fn encode(&self, ticket: &Ticket) -> Option<Vec<u8>> {
        match self.codec.encode(ticket) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(ticket_id = %ticket.id(), error = %e, "Failed to encode ticket");
                None
            }
        }
    }

    fn decode(&self, id: &str, bytes: &[u8]) -> Option<Ticket> {
        match self.codec.decode(bytes) {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                warn!(ticket_id = %id, error = %e, "Failed to decode stored ticket");
                None
            }
        }
    }

    async fn scan_keys(&self) -> Result<Vec<String>, redis::RedisError> {
        let mut conn = self.manager.clone();
        let pattern = scan_pattern();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}

#[async_trait]
impl TicketRegistry for RedisTicketRegistry {
    async fn add(&self, ticket: &Ticket) -> bool {
        let Some(encoded) = self.encode(ticket) else {
            return false;
        };
        let key = ticket_key(ticket.id());
        let mut conn = self.manager.clone();

        let ttl = ticket.expiration_policy().store_ttl_seconds(
            &ticket.times(),
            Utc::now(),
            MAX_STORE_TTL_SECONDS,
        );
        let result: Result<(), _> = if ttl == 0 {
            // Already dead: evict immediately rather than store.
            redis::cmd("DEL").arg(&key).query_async(&mut conn).await
        } else {
            redis::cmd("SET")
                .arg(&key)
                .arg(encoded.as_slice())
                .arg("EX")
                .arg(ttl)
                .query_async(&mut conn)
                .await
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(ticket_id = %ticket.id(), error = %e, "Failed to write ticket to Redis");
                false
            }
        }
    }

    async fn get(&self, id: &str) -> Option<Ticket> {
        let mut conn = self.manager.clone();
        let bytes: Option<Vec<u8>> = match redis::cmd("GET")
            .arg(ticket_key(id))
            .query_async(&mut conn)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(ticket_id = %id, error = %e, "Failed to read ticket from Redis");
                return None;
            }
        };
        self.decode(id, &bytes?)
    }

    async fn get_all(&self) -> Vec<Ticket> {
        let keys = match self.scan_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to scan ticket keys");
                return Vec::new();
            }
        };

        let mut conn = self.manager.clone();
        let mut tickets = Vec::with_capacity(keys.len());
        for key in keys {
            let bytes: Option<Vec<u8>> =
                match redis::cmd("GET").arg(&key).query_async(&mut conn).await {
                    Ok(bytes) => bytes,
                    Err(_) => continue,
                };
            if let Some(bytes) = bytes {
                if let Some(ticket) = self.decode(&key, &bytes) {
                    tickets.push(ticket);
                }
            }
        }
        tickets
    }

    async fn update(&self, ticket: &Ticket) -> bool {
        let Some(encoded) = self.encode(ticket) else {
            return false;
        };
        let key = ticket_key(ticket.id());
        let mut conn = self.manager.clone();

        // XX + KEEPTTL: rewrite the value only if the entry is still live,
        // leaving the insert-time expiry untouched.
        let reply: Result<Option<String>, _> = redis::cmd("SET")
            .arg(&key)
            .arg(encoded.as_slice())
            .arg("XX")
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await;
        match reply {
            Ok(Some(_)) => true,
            // Entry evicted between read and write: fall back to a fresh add.
            Ok(None) => self.add(ticket).await,
            Err(e) => {
                warn!(ticket_id = %ticket.id(), error = %e, "Failed to update ticket in Redis");
                false
            }
        }
    }

    async fn delete(&self, id: &str) -> bool {
        let mut conn = self.manager.clone();
        match redis::cmd("DEL")
            .arg(ticket_key(id))
            .query_async::<_, u64>(&mut conn)
            .await
        {
            Ok(removed) => removed > 0,
            Err(e) => {
                warn!(ticket_id = %id, error = %e, "Failed to delete ticket from Redis");
                false
            }
        }
    }

    async fn delete_all(&self) -> usize {
        let keys = match self.scan_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to scan ticket keys");
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }

        let mut conn = self.manager.clone();
        match redis::cmd("DEL")
            .arg(&keys)
            .query_async::<_, u64>(&mut conn)
            .await
        {
            Ok(removed) => removed as usize,
            Err(e) => {
                warn!(error = %e, "Failed to bulk-delete tickets from Redis");
                0
            }
        }
    }
}

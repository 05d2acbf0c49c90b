//! Ticket model: the credentials the engine issues, chains, and revokes.
//!
//! Tickets are tagged enum variants rather than a class hierarchy; every
//! variant carries its own immutable expiration policy and an explicit
//! `expired` mark set by destroy/logout. A ticket is dead when either its
//! policy says so or it was explicitly marked.

pub mod expiration;
pub mod id;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authn::{Authentication, Principal};
use crate::services::Service;
use expiration::{ExpirationPolicy, TicketTimes};

/// Reserved id prefixes.
pub const TGT_PREFIX: &str = "TGT";
pub const ST_PREFIX: &str = "ST";
pub const PGT_PREFIX: &str = "PGT";
pub const PT_PREFIX: &str = "PT";
pub const LOGOUT_PREFIX: &str = "LR";

/// An established SSO session. Covers both root ticket-granting tickets and
/// proxy-granting tickets minted through delegation (`proxied_by` set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketGrantingTicket {
    /// Authentication established when this ticket was minted.
    pub authentication: Authentication,
    pub creation_time: DateTime<Utc>,
    pub expiration_policy: ExpirationPolicy,
    pub expired: bool,
    pub id: String,
    pub last_used_time: DateTime<Utc>,
    /// Authentications inherited through delegation, root first. Empty for
    /// a root ticket.
    pub prior_authentications: Vec<Authentication>,
    /// Service-ticket id this ticket was delegated from, if any.
    pub proxied_by: Option<String>,
    /// Service-ticket id → service, for single logout. Keys are unique;
    /// insertion order is irrelevant. Read-and-cleared atomically under the
    /// orchestrator's per-ticket lock.
    pub tracked_services: HashMap<String, Service>,
    pub use_count: u64,
}

impl TicketGrantingTicket {
    pub fn new(id: String, authentication: Authentication, policy: ExpirationPolicy) -> Self {
        let now = Utc::now();
        Self {
            authentication,
            creation_time: now,
            expiration_policy: policy,
            expired: false,
            id,
            last_used_time: now,
            prior_authentications: Vec::new(),
            proxied_by: None,
            tracked_services: HashMap::new(),
            use_count: 0,
        }
    }

    /// A proxy-granting ticket chained from a service ticket.
    pub fn delegated(
        id: String,
        authentication: Authentication,
        prior_authentications: Vec<Authentication>,
        proxied_by: String,
        policy: ExpirationPolicy,
    ) -> Self {
        let now = Utc::now();
        Self {
            authentication,
            creation_time: now,
            expiration_policy: policy,
            expired: false,
            id,
            last_used_time: now,
            prior_authentications,
            proxied_by: Some(proxied_by),
            tracked_services: HashMap::new(),
            use_count: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.proxied_by.is_none()
    }

    /// Full authentication chain, root first.
    pub fn authentication_chain(&self) -> Vec<Authentication> {
        let mut chain = self.prior_authentications.clone();
        chain.push(self.authentication.clone());
        chain
    }

    /// The principal this SSO session was originally established for.
    pub fn root_principal(&self) -> &Principal {
        self.prior_authentications
            .first()
            .map(|a| &a.principal)
            .unwrap_or(&self.authentication.principal)
    }

    pub fn times(&self) -> TicketTimes {
        TicketTimes {
            creation_time: self.creation_time,
            last_used_time: self.last_used_time,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expired || self.expiration_policy.is_expired(&self.times(), now)
    }
}

/// A single-service credential derived from a ticket-granting ticket.
/// Covers both service tickets and proxy tickets (`proxy` set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTicket {
    /// Copy of the parent's authentication chain taken at grant time, so
    /// validation and delegation need no second registry lookup.
    pub authentications: Vec<Authentication>,
    pub creation_time: DateTime<Utc>,
    pub expiration_policy: ExpirationPolicy,
    pub expired: bool,
    /// True when this ticket was issued alongside fresh credential
    /// verification rather than from an existing SSO session.
    pub from_new_login: bool,
    /// Weak back-reference to the parent ticket; chaining only, never
    /// followed for validation.
    pub granting_ticket_id: String,
    pub id: String,
    pub last_used_time: DateTime<Utc>,
    pub proxy: bool,
    /// The one service this ticket is valid for.
    pub service: Service,
    pub use_count: u64,
}

impl ServiceTicket {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        service: Service,
        granting_ticket_id: String,
        authentications: Vec<Authentication>,
        from_new_login: bool,
        proxy: bool,
        policy: ExpirationPolicy,
    ) -> Self {
        let now = Utc::now();
        Self {
            authentications,
            creation_time: now,
            expiration_policy: policy,
            expired: false,
            from_new_login,
            granting_ticket_id,
            id,
            last_used_time: now,
            proxy,
            service,
            use_count: 0,
        }
    }

    pub fn times(&self) -> TicketTimes {
        TicketTimes {
            creation_time: self.creation_time,
            last_used_time: self.last_used_time,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expired || self.expiration_policy.is_expired(&self.times(), now)
    }
}

/// Any ticket the registry can hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Ticket {
    Granting(TicketGrantingTicket),
    Service(ServiceTicket),
}

impl Ticket {
    pub fn id(&self) -> &str {
        match self {
            Ticket::Granting(tgt) => &tgt.id,
            Ticket::Service(st) => &st.id,
        }
    }

    pub fn expiration_policy(&self) -> &ExpirationPolicy {
        match self {
            Ticket::Granting(tgt) => &tgt.expiration_policy,
            Ticket::Service(st) => &st.expiration_policy,
        }
    }

    pub fn times(&self) -> TicketTimes {
        match self {
            Ticket::Granting(tgt) => tgt.times(),
            Ticket::Service(st) => st.times(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Ticket::Granting(tgt) => tgt.is_expired(now),
            Ticket::Service(st) => st.is_expired(now),
        }
    }
}

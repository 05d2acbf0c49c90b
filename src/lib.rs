//! ticketd - an SSO server's ticket lifecycle and single-logout engine
//!
//! This crate issues, validates, chains, and revokes the short-lived
//! unguessable tickets that stand in for an authenticated session:
//! - Prefixed ticket ids with a crypto-strong random component
//! - Sliding and hard expiration policies
//! - Pluggable ticket registry (in-memory, redb, Redis) with TTL eviction
//! - The ticket state machine: create / grant / validate / destroy / delegate
//! - Single logout with back-channel and front-channel notices
//! - REST API

pub mod api;
pub mod authn;
pub mod cas;
pub mod config;
pub mod logout;
pub mod registry;
pub mod services;
#[cfg(test)]
pub mod testutil;
pub mod ticket;

use cas::CentralAuthService;
use config::Config;

/// Shared application state
pub struct AppState {
    pub cas: CentralAuthService,
    pub config: Config,
}

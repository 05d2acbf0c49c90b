//! External authentication collaborators.
//!
//! Credential verification itself (LDAP, JDBC, MFA, ...) is not this
//! engine's concern; the orchestrator only needs the
//! [`AuthenticationManager`] seam. A small static implementation is
//! provided so the binary runs end-to-end without a real backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("credentials rejected for '{username}'")]
    Rejected { username: String },
    #[error("authentication backend unavailable: {0}")]
    Unavailable(String),
}

/// Raw credentials as presented by the protocol layer.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub password: String,
    pub username: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            username: username.into(),
        }
    }
}

/// A verified identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Resolved attributes (display name, mail, group memberships, ...);
    /// attribute resolution itself happens in the external backend.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    pub id: String,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            attributes: HashMap::new(),
            id: id.into(),
        }
    }
}

/// The result of a successful credential verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    pub authenticated_at: DateTime<Utc>,
    pub principal: Principal,
}

impl Authentication {
    pub fn new(principal: Principal) -> Self {
        Self {
            authenticated_at: Utc::now(),
            principal,
        }
    }
}

#[async_trait]
pub trait AuthenticationManager: Send + Sync {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Authentication, AuthenticationError>;
}

/// Fixed username/password table loaded from configuration.
///
/// A stand-in for real authentication backends; useful for demos and tests
/// only — passwords are compared in plain text and never persisted.
pub struct StaticAuthenticationManager {
    users: HashMap<String, String>,
}

impl StaticAuthenticationManager {
    pub fn new(users: HashMap<String, String>) -> Self {
        Self { users }
    }

    /// Parse a `"user:password,user2:password"` spec.
    pub fn from_spec(spec: &str) -> Self {
        let users = spec
            .split(',')
            .filter_map(|entry| {
                let entry = entry.trim();
                let (user, password) = entry.split_once(':')?;
                if user.is_empty() {
                    return None;
                }
                Some((user.to_string(), password.to_string()))
            })
            .collect();
        Self { users }
    }
}

#[async_trait]
impl AuthenticationManager for StaticAuthenticationManager {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Authentication, AuthenticationError> {
        match self.users.get(&credentials.username) {
            Some(password) if *password == credentials.password => {
                Ok(Authentication::new(Principal::new(&credentials.username)))
            }
            _ => Err(AuthenticationError::Rejected {
                username: credentials.username.clone(),
            }),
        }
    }
}

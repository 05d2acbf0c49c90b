//! Relying-party model: the logout-relevant facet of a service, plus the
//! externally-managed service registry the logout manager consults.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// A relying party as seen by the ticket engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    /// Set by the logout manager once a notice has been sent; a service is
    /// never notified twice for the same session.
    pub logged_out_already: bool,
    pub original_url: String,
}

impl Service {
    /// A service identified by its URL, the common case for CAS-style
    /// relying parties.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: url.clone(),
            logged_out_already: false,
            original_url: url,
        }
    }
}

/// How a registered service wants to be told about logout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutType {
    /// Server-to-server HTTP notification. The default for services with
    /// no registered preference.
    #[default]
    BackChannel,
    /// Browser-redirect-carried notification rendered by the caller.
    FrontChannel,
    /// Single logout disabled for this service.
    None,
}

/// Externally-configured metadata for an allowed relying party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredService {
    pub logout_type: LogoutType,
    /// Dedicated logout endpoint; falls back to the service's original URL
    /// when absent.
    pub logout_url: Option<String>,
    pub name: String,
    /// The service id this registration matches.
    pub service_id: String,
}

/// Lookup of registered-service metadata. Service registration and access
/// decisions live outside this engine; only the lookup is consumed here.
pub trait ServicesManager: Send + Sync {
    fn find_service_by(&self, service: &Service) -> Option<RegisteredService>;
}

/// Exact-id registry held in memory, populated from configuration.
#[derive(Default)]
pub struct InMemoryServicesManager {
    registrations: RwLock<HashMap<String, RegisteredService>>,
}

impl InMemoryServicesManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `"url=back,url2=front,url3=none"` spec.
    pub fn from_spec(spec: &str) -> Self {
        let manager = Self::new();
        for entry in spec.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (url, kind) = match entry.split_once('=') {
                Some(pair) => pair,
                None => (entry, "back"),
            };
            let logout_type = match kind {
                "front" => LogoutType::FrontChannel,
                "none" => LogoutType::None,
                _ => LogoutType::BackChannel,
            };
            manager.register(RegisteredService {
                logout_type,
                logout_url: None,
                name: url.to_string(),
                service_id: url.to_string(),
            });
        }
        manager
    }

    pub fn register(&self, registration: RegisteredService) {
        let mut registrations = match self.registrations.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        registrations.insert(registration.service_id.clone(), registration);
    }
}

impl ServicesManager for InMemoryServicesManager {
    fn find_service_by(&self, service: &Service) -> Option<RegisteredService> {
        let registrations = match self.registrations.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        registrations.get(&service.id).cloned()
    }
}

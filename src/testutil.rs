//! Shared test helpers — available to all `#[cfg(test)]` modules in the crate.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::authn::{Authentication, Principal, StaticAuthenticationManager};
use crate::cas::CentralAuthService;
use crate::logout::http::LogoutHttpClient;
use crate::logout::LogoutManager;
use crate::registry::memory::MemoryTicketRegistry;
use crate::services::{InMemoryServicesManager, Service};
use crate::ticket::expiration::ExpirationPolicy;
use crate::ticket::{ServiceTicket, TicketGrantingTicket};

/// An authentication for the given principal id.
pub fn make_authentication(principal: &str) -> Authentication {
    Authentication::new(Principal::new(principal))
}

/// A service identified by its URL.
pub fn make_service(url: &str) -> Service {
    Service::from_url(url)
}

/// A root ticket-granting ticket with a one-hour hard lifetime.
pub fn make_tgt(id: &str, principal: &str) -> TicketGrantingTicket {
    TicketGrantingTicket::new(
        id.to_string(),
        make_authentication(principal),
        ExpirationPolicy::Hard {
            max_time_to_live_seconds: 3600,
        },
    )
}

/// A service ticket with a one-hour hard lifetime.
pub fn make_st(id: &str, tgt_id: &str, url: &str) -> ServiceTicket {
    ServiceTicket::new(
        id.to_string(),
        make_service(url),
        tgt_id.to_string(),
        vec![make_authentication("alice")],
        false,
        false,
        ExpirationPolicy::Hard {
            max_time_to_live_seconds: 3600,
        },
    )
}

/// Records every dispatched logout message; URLs added via [`fail_for`]
/// simulate a transport failure.
///
/// [`fail_for`]: RecordingHttpClient::fail_for
#[derive(Default)]
pub struct RecordingHttpClient {
    failures: Mutex<HashSet<String>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, url: &str) {
        self.failures.lock().unwrap().insert(url.to_string());
    }

    /// Every `(url, message)` pair dispatched so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogoutHttpClient for RecordingHttpClient {
    async fn send_logout(&self, url: &str, message: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((url.to_string(), message.to_string()));
        !self.failures.lock().unwrap().contains(url)
    }
}

/// A fully wired orchestrator over an in-memory registry, with users
/// `alice:secret` and `bob:hunter2` and an empty services manager.
pub fn test_cas() -> (
    CentralAuthService,
    Arc<MemoryTicketRegistry>,
    Arc<RecordingHttpClient>,
) {
    let http = Arc::new(RecordingHttpClient::new());
    let (cas, registry) = test_cas_with(
        Arc::clone(&http),
        ExpirationPolicy::Sliding {
            max_time_to_live_seconds: 28_800,
            time_to_idle_seconds: 7_200,
        },
    );
    (cas, registry, http)
}

/// Like [`test_cas`], with an explicit HTTP client and TGT policy.
pub fn test_cas_with(
    http: Arc<RecordingHttpClient>,
    ticket_granting_policy: ExpirationPolicy,
) -> (CentralAuthService, Arc<MemoryTicketRegistry>) {
    let registry = Arc::new(MemoryTicketRegistry::new());
    let authn = Arc::new(StaticAuthenticationManager::from_spec(
        "alice:secret,bob:hunter2",
    ));
    let logout = LogoutManager::new(Arc::new(InMemoryServicesManager::new()), http, false, 4);
    let cas = CentralAuthService::new(
        Arc::clone(&registry) as Arc<dyn crate::registry::TicketRegistry>,
        authn,
        logout,
        ticket_granting_policy,
        ExpirationPolicy::Hard {
            max_time_to_live_seconds: 60,
        },
    );
    (cas, registry)
}

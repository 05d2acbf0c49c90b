//! Single-logout fan-out tests: per-service statuses, partial failure,
//! front-channel handling.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ticketd::authn::{Credentials, StaticAuthenticationManager};
use ticketd::cas::CentralAuthService;
use ticketd::logout::http::LogoutHttpClient;
use ticketd::logout::{LogoutManager, LogoutRequestStatus};
use ticketd::registry::memory::MemoryTicketRegistry;
use ticketd::registry::TicketRegistry;
use ticketd::services::{InMemoryServicesManager, LogoutType, RegisteredService, Service};
use ticketd::ticket::expiration::ExpirationPolicy;

/// Records dispatches; configured URLs simulate transport failures.
#[derive(Default)]
struct FlakyHttpClient {
    failures: Mutex<HashSet<String>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl FlakyHttpClient {
    fn fail_for(&self, url: &str) {
        self.failures.lock().unwrap().insert(url.to_string());
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogoutHttpClient for FlakyHttpClient {
    async fn send_logout(&self, url: &str, message: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((url.to_string(), message.to_string()));
        !self.failures.lock().unwrap().contains(url)
    }
}

fn build_cas(
    services: Arc<InMemoryServicesManager>,
    http: Arc<FlakyHttpClient>,
    slo_disabled: bool,
) -> (CentralAuthService, Arc<MemoryTicketRegistry>) {
    let registry = Arc::new(MemoryTicketRegistry::new());
    let logout_manager = LogoutManager::new(services, http, slo_disabled, 4);
    let cas = CentralAuthService::new(
        Arc::clone(&registry) as Arc<dyn TicketRegistry>,
        Arc::new(StaticAuthenticationManager::from_spec("alice:secret")),
        logout_manager,
        ExpirationPolicy::Hard {
            max_time_to_live_seconds: 3600,
        },
        ExpirationPolicy::Hard {
            max_time_to_live_seconds: 60,
        },
    );
    (cas, registry)
}

async fn session_with_services(
    cas: &CentralAuthService,
    urls: &[&str],
) -> (String, Vec<String>) {
    let tgt_id = cas
        .create_ticket_granting_ticket(&Credentials::new("alice", "secret"))
        .await
        .unwrap();
    let mut st_ids = Vec::new();
    for url in urls {
        let st_id = cas
            .grant_service_ticket(&tgt_id, &Service::from_url(*url), None)
            .await
            .unwrap();
        st_ids.push(st_id);
    }
    (tgt_id, st_ids)
}

#[tokio::test]
async fn test_partial_failure_reports_per_service_status() {
    let http = Arc::new(FlakyHttpClient::default());
    http.fail_for("https://b.example.org");
    let (cas, registry) = build_cas(
        Arc::new(InMemoryServicesManager::new()),
        Arc::clone(&http),
        false,
    );

    let (tgt_id, st_ids) = session_with_services(
        &cas,
        &[
            "https://a.example.org",
            "https://b.example.org",
            "https://c.example.org",
        ],
    )
    .await;

    let requests = cas.destroy_ticket_granting_ticket(&tgt_id).await.unwrap();
    assert_eq!(requests.len(), 3);

    let status_of = |url: &str| {
        requests
            .iter()
            .find(|r| r.service.id == url)
            .map(|r| r.status)
    };
    assert_eq!(
        status_of("https://a.example.org"),
        Some(LogoutRequestStatus::Success)
    );
    assert_eq!(
        status_of("https://b.example.org"),
        Some(LogoutRequestStatus::Failure)
    );
    assert_eq!(
        status_of("https://c.example.org"),
        Some(LogoutRequestStatus::Success)
    );

    // Each request correlates to the service ticket that bound the service.
    for request in &requests {
        assert!(st_ids.contains(&request.ticket_id));
    }

    // The session is gone regardless of the failed delivery.
    assert!(registry.get(&tgt_id).await.is_none());
}

#[tokio::test]
async fn test_logout_message_carries_the_service_ticket_id() {
    let http = Arc::new(FlakyHttpClient::default());
    let (cas, _registry) = build_cas(
        Arc::new(InMemoryServicesManager::new()),
        Arc::clone(&http),
        false,
    );

    let (tgt_id, st_ids) = session_with_services(&cas, &["https://a.example.org"]).await;
    cas.destroy_ticket_granting_ticket(&tgt_id).await.unwrap();

    let sent = http.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "https://a.example.org");
    assert!(sent[0].1.contains(&format!(
        "<samlp:SessionIndex>{}</samlp:SessionIndex>",
        st_ids[0]
    )));
    assert!(sent[0].1.starts_with("<samlp:LogoutRequest"));
}

#[tokio::test]
async fn test_front_channel_services_get_redirect_payloads() {
    let services = Arc::new(InMemoryServicesManager::new());
    services.register(RegisteredService {
        logout_type: LogoutType::FrontChannel,
        logout_url: None,
        name: "front".to_string(),
        service_id: "https://front.example.org".to_string(),
    });
    let http = Arc::new(FlakyHttpClient::default());
    let (cas, _registry) = build_cas(services, Arc::clone(&http), false);

    let (tgt_id, _) = session_with_services(
        &cas,
        &["https://front.example.org", "https://back.example.org"],
    )
    .await;

    let requests = cas.destroy_ticket_granting_ticket(&tgt_id).await.unwrap();
    assert_eq!(requests.len(), 2);

    let front = requests
        .iter()
        .find(|r| r.service.id == "https://front.example.org")
        .unwrap();
    assert_eq!(front.status, LogoutRequestStatus::NotAttempted);
    assert!(front.front_channel_message.is_some());

    let back = requests
        .iter()
        .find(|r| r.service.id == "https://back.example.org")
        .unwrap();
    assert_eq!(back.status, LogoutRequestStatus::Success);
    assert!(back.front_channel_message.is_none());

    // Only the unregistered (default back-channel) service was POSTed to.
    let sent = http.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "https://back.example.org");
}

#[tokio::test]
async fn test_disabled_slo_still_destroys_the_session() {
    let http = Arc::new(FlakyHttpClient::default());
    let (cas, registry) = build_cas(
        Arc::new(InMemoryServicesManager::new()),
        Arc::clone(&http),
        true,
    );

    let (tgt_id, _) = session_with_services(&cas, &["https://a.example.org"]).await;
    let requests = cas.destroy_ticket_granting_ticket(&tgt_id).await.unwrap();

    assert!(requests.is_empty());
    assert!(http.sent().is_empty());
    assert!(registry.get(&tgt_id).await.is_none());
}

#[tokio::test]
async fn test_services_with_logout_disabled_are_skipped() {
    let services = Arc::new(InMemoryServicesManager::new());
    services.register(RegisteredService {
        logout_type: LogoutType::None,
        logout_url: None,
        name: "silent".to_string(),
        service_id: "https://silent.example.org".to_string(),
    });
    let http = Arc::new(FlakyHttpClient::default());
    let (cas, _registry) = build_cas(services, Arc::clone(&http), false);

    let (tgt_id, _) = session_with_services(
        &cas,
        &["https://silent.example.org", "https://loud.example.org"],
    )
    .await;

    let requests = cas.destroy_ticket_granting_ticket(&tgt_id).await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].service.id, "https://loud.example.org");
}

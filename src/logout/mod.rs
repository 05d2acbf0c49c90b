//! Single logout: given a revoked ticket-granting ticket, determine every
//! service that consumed it and deliver termination notices, independent
//! of individual delivery failures.

pub mod http;
pub mod message;

use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::services::{LogoutType, Service, ServicesManager};
use crate::ticket::TicketGrantingTicket;
use http::LogoutHttpClient;
use message::LogoutMessageBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutRequestStatus {
    Failure,
    NotAttempted,
    Success,
}

/// One per-service logout attempt. Never persisted; returned to the caller
/// for audit logging and, for front-channel entries, client-side redirects.
#[derive(Debug, Clone, Serialize)]
pub struct LogoutRequest {
    /// Compressed message for front-channel services, carried back to the
    /// caller to embed in a redirect URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front_channel_message: Option<String>,
    pub service: Service,
    pub status: LogoutRequestStatus,
    pub ticket_id: String,
}

pub struct LogoutManager {
    concurrency: usize,
    disabled: bool,
    http_client: Arc<dyn LogoutHttpClient>,
    message_builder: LogoutMessageBuilder,
    services_manager: Arc<dyn ServicesManager>,
}

impl LogoutManager {
    pub fn new(
        services_manager: Arc<dyn ServicesManager>,
        http_client: Arc<dyn LogoutHttpClient>,
        disabled: bool,
        concurrency: usize,
    ) -> Self {
        Self {
            concurrency: concurrency.max(1),
            disabled,
            http_client,
            message_builder: LogoutMessageBuilder::new(),
            services_manager,
        }
    }

    /// Terminate the session: snapshot-and-clear the tracked services and
    /// mark the ticket expired in one critical section (the caller holds
    /// the ticket's lock), then fan out notices.
    ///
    /// A delivery failure only ever affects that one service's status; the
    /// returned list always covers every logout-capable service.
    pub async fn perform_logout(&self, tgt: &mut TicketGrantingTicket) -> Vec<LogoutRequest> {
        let tracked = std::mem::take(&mut tgt.tracked_services);
        tgt.expired = true;

        if self.disabled {
            debug!(ticket_id = %tgt.id, "Single logout disabled; session terminated without notices");
            return Vec::new();
        }

        let mut requests = Vec::new();
        let mut dispatches = Vec::new();
        for (ticket_id, mut service) in tracked {
            if service.logged_out_already {
                continue;
            }
            let registration = self.services_manager.find_service_by(&service);
            let logout_type = registration
                .as_ref()
                .map(|r| r.logout_type)
                .unwrap_or_default();
            match logout_type {
                LogoutType::None => {
                    debug!(service = %service.id, "Logout notices disabled for service");
                }
                LogoutType::BackChannel => {
                    let message = self.message_builder.build(&ticket_id, Utc::now());
                    let url = registration
                        .and_then(|r| r.logout_url)
                        .unwrap_or_else(|| service.original_url.clone());
                    service.logged_out_already = true;
                    dispatches.push((requests.len(), url, message));
                    requests.push(LogoutRequest {
                        front_channel_message: None,
                        service,
                        status: LogoutRequestStatus::NotAttempted,
                        ticket_id,
                    });
                }
                LogoutType::FrontChannel => {
                    let front_channel_message = match self
                        .message_builder
                        .build_front_channel(&ticket_id, Utc::now())
                    {
                        Ok(message) => Some(message),
                        Err(e) => {
                            warn!(ticket_id = %ticket_id, error = %e, "Failed to encode front-channel message");
                            None
                        }
                    };
                    requests.push(LogoutRequest {
                        front_channel_message,
                        service,
                        status: LogoutRequestStatus::NotAttempted,
                        ticket_id,
                    });
                }
            }
        }

        // Bounded fan-out; one dead relying party delays nobody else.
        let outcomes: Vec<(usize, bool)> = stream::iter(dispatches)
            .map(|(index, url, message)| {
                let client = Arc::clone(&self.http_client);
                async move { (index, client.send_logout(&url, &message).await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (index, delivered) in outcomes {
            let request = &mut requests[index];
            request.status = if delivered {
                LogoutRequestStatus::Success
            } else {
                LogoutRequestStatus::Failure
            };
            if delivered {
                debug!(
                    ticket_id = %request.ticket_id,
                    service = %request.service.id,
                    "Back-channel logout delivered"
                );
            } else {
                warn!(
                    ticket_id = %request.ticket_id,
                    service = %request.service.id,
                    url = %request.service.original_url,
                    "Back-channel logout failed"
                );
            }
        }

        requests
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::{InMemoryServicesManager, RegisteredService};
    use crate::testutil::{make_service, make_tgt, RecordingHttpClient};

    fn manager_with(
        services: Arc<InMemoryServicesManager>,
        http: Arc<RecordingHttpClient>,
        disabled: bool,
    ) -> LogoutManager {
        LogoutManager::new(services, http, disabled, 4)
    }

    fn tgt_tracking(urls: &[&str]) -> TicketGrantingTicket {
        let mut tgt = make_tgt("TGT-1-abc", "alice");
        for (i, url) in urls.iter().enumerate() {
            tgt.tracked_services
                .insert(format!("ST-{}-x", i + 1), make_service(url));
        }
        tgt
    }

    #[tokio::test]
    async fn test_logout_clears_and_expires_even_when_disabled() {
        let http = Arc::new(RecordingHttpClient::new());
        let manager = manager_with(Arc::new(InMemoryServicesManager::new()), http, true);
        let mut tgt = tgt_tracking(&["https://a.example.org"]);

        let requests = manager.perform_logout(&mut tgt).await;
        assert!(requests.is_empty());
        assert!(tgt.expired);
        assert!(tgt.tracked_services.is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_never_aborts_the_fanout() {
        let http = Arc::new(RecordingHttpClient::new());
        http.fail_for("https://b.example.org");
        let manager = manager_with(
            Arc::new(InMemoryServicesManager::new()),
            Arc::clone(&http),
            false,
        );
        let mut tgt = tgt_tracking(&[
            "https://a.example.org",
            "https://b.example.org",
            "https://c.example.org",
        ]);

        let requests = manager.perform_logout(&mut tgt).await;
        assert_eq!(requests.len(), 3);
        assert!(tgt.expired);
        assert!(tgt.tracked_services.is_empty());

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
        assert_eq!(http.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_back_channel_marks_service_logged_out() {
        let http = Arc::new(RecordingHttpClient::new());
        let manager = manager_with(
            Arc::new(InMemoryServicesManager::new()),
            Arc::clone(&http),
            false,
        );
        let mut tgt = tgt_tracking(&["https://a.example.org"]);

        let requests = manager.perform_logout(&mut tgt).await;
        assert!(requests[0].service.logged_out_already);

        let sent = http.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "https://a.example.org");
        assert!(sent[0].1.contains("<samlp:SessionIndex>ST-1-x</samlp:SessionIndex>"));
    }

    #[tokio::test]
    async fn test_already_logged_out_service_is_skipped() {
        let http = Arc::new(RecordingHttpClient::new());
        let manager = manager_with(
            Arc::new(InMemoryServicesManager::new()),
            Arc::clone(&http),
            false,
        );
        let mut tgt = tgt_tracking(&["https://a.example.org"]);
        for service in tgt.tracked_services.values_mut() {
            service.logged_out_already = true;
        }

        let requests = manager.perform_logout(&mut tgt).await;
        assert!(requests.is_empty());
        assert!(http.sent().is_empty());
    }

    #[tokio::test]
    async fn test_front_channel_and_none_registrations() {
        let services = Arc::new(InMemoryServicesManager::new());
        services.register(RegisteredService {
            logout_type: LogoutType::FrontChannel,
            logout_url: None,
            name: "front".to_string(),
            service_id: "https://front.example.org".to_string(),
        });
        services.register(RegisteredService {
            logout_type: LogoutType::None,
            logout_url: None,
            name: "silent".to_string(),
            service_id: "https://silent.example.org".to_string(),
        });

        let http = Arc::new(RecordingHttpClient::new());
        let manager = manager_with(services, Arc::clone(&http), false);
        let mut tgt = tgt_tracking(&["https://front.example.org", "https://silent.example.org"]);

        let requests = manager.perform_logout(&mut tgt).await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].service.id, "https://front.example.org");
        assert_eq!(requests[0].status, LogoutRequestStatus::NotAttempted);
        assert!(requests[0].front_channel_message.is_some());
        // Nothing goes over the back channel for either.
        assert!(http.sent().is_empty());
    }

    #[tokio::test]
    async fn test_registered_logout_url_overrides_service_url() {
        let services = Arc::new(InMemoryServicesManager::new());
        services.register(RegisteredService {
            logout_type: LogoutType::BackChannel,
            logout_url: Some("https://a.example.org/slo".to_string()),
            name: "app".to_string(),
            service_id: "https://a.example.org".to_string(),
        });

        let http = Arc::new(RecordingHttpClient::new());
        let manager = manager_with(services, Arc::clone(&http), false);
        let mut tgt = tgt_tracking(&["https://a.example.org"]);

        manager.perform_logout(&mut tgt).await;
        assert_eq!(http.sent()[0].0, "https://a.example.org/slo");
    }
}

//! The central ticket state machine: create, grant, validate, destroy,
//! delegate. A ticket only ever moves `VALID → EXPIRED`; everything else
//! is a lookup or a persisted mutation under that ticket's lock.

pub mod error;
pub mod locks;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::authn::{Authentication, AuthenticationManager, Credentials};
use crate::logout::{LogoutManager, LogoutRequest};
use crate::registry::TicketRegistry;
use crate::services::Service;
use crate::ticket::expiration::ExpirationPolicy;
use crate::ticket::id::TicketIdGenerator;
use crate::ticket::{
    ServiceTicket, Ticket, TicketGrantingTicket, PGT_PREFIX, PT_PREFIX, ST_PREFIX, TGT_PREFIX,
};
use error::{CasError, TicketCreationError, TicketValidationError};

/// The validated result of a service ticket: the authenticated principal
/// chain plus whether the ticket came from fresh credential verification.
#[derive(Debug, Clone, Serialize)]
pub struct Assertion {
    pub authentications: Vec<Authentication>,
    pub from_new_login: bool,
}

pub struct CentralAuthService {
    authentication_manager: Arc<dyn AuthenticationManager>,
    id_generator: TicketIdGenerator,
    locks: locks::TicketLocks,
    logout_manager: LogoutManager,
    registry: Arc<dyn TicketRegistry>,
    service_ticket_policy: ExpirationPolicy,
    ticket_granting_policy: ExpirationPolicy,
}

impl CentralAuthService {
    pub fn new(
        registry: Arc<dyn TicketRegistry>,
        authentication_manager: Arc<dyn AuthenticationManager>,
        logout_manager: LogoutManager,
        ticket_granting_policy: ExpirationPolicy,
        service_ticket_policy: ExpirationPolicy,
    ) -> Self {
        Self {
            authentication_manager,
            id_generator: TicketIdGenerator::new(),
            locks: locks::TicketLocks::new(),
            logout_manager,
            registry,
            service_ticket_policy,
            ticket_granting_policy,
        }
    }

    /// Verify credentials and establish a new SSO session.
    pub async fn create_ticket_granting_ticket(
        &self,
        credentials: &Credentials,
    ) -> Result<String, CasError> {
        if credentials.username.trim().is_empty() {
            return Err(CasError::InvalidRequest("credentials"));
        }

        let authentication = self
            .authentication_manager
            .authenticate(credentials)
            .await
            .map_err(TicketCreationError::Authentication)?;

        let id = self.id_generator.new_id(TGT_PREFIX);
        let tgt = TicketGrantingTicket::new(
            id.clone(),
            authentication,
            self.ticket_granting_policy.clone(),
        );
        if !self.registry.add(&Ticket::Granting(tgt)).await {
            return Err(TicketCreationError::Persistence(id).into());
        }

        info!(ticket_id = %id, username = %credentials.username, "Created ticket-granting ticket");
        Ok(id)
    }

    /// Issue a service ticket from an existing SSO session.
    ///
    /// When credentials are supplied they are re-verified and must resolve
    /// to the principal the session was established for; the resulting
    /// ticket is then marked as coming from a fresh login.
    pub async fn grant_service_ticket(
        &self,
        tgt_id: &str,
        service: &Service,
        credentials: Option<&Credentials>,
    ) -> Result<String, CasError> {
        if tgt_id.is_empty() {
            return Err(CasError::InvalidRequest("tgt_id"));
        }
        if service.id.is_empty() {
            return Err(CasError::InvalidRequest("service"));
        }

        let _lock = self.locks.lock(tgt_id).await;

        let mut tgt = self.require_granting_ticket(tgt_id).await?;

        let from_new_login = credentials.is_some();
        if let Some(credentials) = credentials {
            let authentication = self
                .authentication_manager
                .authenticate(credentials)
                .await
                .map_err(TicketCreationError::Authentication)?;
            let expected = &tgt.root_principal().id;
            if authentication.principal.id != *expected {
                return Err(TicketCreationError::PrincipalMismatch {
                    expected: expected.clone(),
                    presented: authentication.principal.id,
                }
                .into());
            }
        }

        let prefix = if tgt.is_root() { ST_PREFIX } else { PT_PREFIX };
        let id = self.id_generator.new_id(prefix);
        let st = ServiceTicket::new(
            id.clone(),
            service.clone(),
            tgt.id.clone(),
            tgt.authentication_chain(),
            from_new_login,
            !tgt.is_root(),
            self.service_ticket_policy.clone(),
        );

        tgt.tracked_services.insert(id.clone(), service.clone());
        tgt.use_count += 1;
        tgt.last_used_time = Utc::now();

        if !self.registry.add(&Ticket::Service(st)).await {
            return Err(TicketCreationError::Persistence(id).into());
        }
        if !self.registry.update(&Ticket::Granting(tgt)).await {
            return Err(TicketCreationError::Persistence(tgt_id.to_string()).into());
        }

        debug!(ticket_id = %id, tgt_id = %tgt_id, service = %service.id, "Granted service ticket");
        Ok(id)
    }

    /// Consume a service ticket on behalf of a service.
    ///
    /// Service tickets are single-use: a second validation fails even
    /// within the ticket's lifetime.
    pub async fn validate_service_ticket(
        &self,
        st_id: &str,
        service: &Service,
    ) -> Result<Assertion, CasError> {
        if st_id.is_empty() {
            return Err(CasError::InvalidRequest("st_id"));
        }
        if service.id.is_empty() {
            return Err(CasError::InvalidRequest("service"));
        }

        let _lock = self.locks.lock(st_id).await;

        let mut st = match self.registry.get(st_id).await {
            Some(Ticket::Service(st)) => st,
            Some(Ticket::Granting(_)) | None => return Err(CasError::not_found(st_id)),
        };

        if st.is_expired(Utc::now()) {
            self.registry.delete(st_id).await;
            return Err(CasError::validation(st_id, TicketValidationError::Expired));
        }
        if st.service.id != service.id {
            return Err(CasError::validation(
                st_id,
                TicketValidationError::ServiceMismatch {
                    expected: st.service.id.clone(),
                    presented: service.id.clone(),
                },
            ));
        }
        if st.use_count > 0 {
            return Err(CasError::validation(
                st_id,
                TicketValidationError::AlreadyConsumed,
            ));
        }

        st.use_count += 1;
        st.last_used_time = Utc::now();
        let assertion = Assertion {
            authentications: st.authentications.clone(),
            from_new_login: st.from_new_login,
        };
        self.registry.update(&Ticket::Service(st)).await;

        debug!(ticket_id = %st_id, service = %service.id, "Validated service ticket");
        Ok(assertion)
    }

    /// Terminate an SSO session and notify every service it touched.
    ///
    /// Idempotent: destroying an absent ticket is a no-op that returns no
    /// logout requests.
    pub async fn destroy_ticket_granting_ticket(
        &self,
        tgt_id: &str,
    ) -> Result<Vec<LogoutRequest>, CasError> {
        if tgt_id.is_empty() {
            return Err(CasError::InvalidRequest("tgt_id"));
        }

        let _lock = self.locks.lock(tgt_id).await;

        let mut tgt = match self.registry.get(tgt_id).await {
            Some(Ticket::Granting(tgt)) => tgt,
            Some(Ticket::Service(_)) => {
                warn!(ticket_id = %tgt_id, "Destroy requested for a non-granting ticket; ignoring");
                return Ok(Vec::new());
            }
            None => {
                debug!(ticket_id = %tgt_id, "Destroy requested for unknown ticket");
                return Ok(Vec::new());
            }
        };

        let requests = self.logout_manager.perform_logout(&mut tgt).await;
        self.registry.delete(tgt_id).await;

        info!(
            ticket_id = %tgt_id,
            services_notified = requests.len(),
            "Destroyed ticket-granting ticket"
        );
        Ok(requests)
    }

    /// Establish a delegated (proxy) SSO session from a service ticket.
    pub async fn delegate_ticket_granting_ticket(
        &self,
        st_id: &str,
        credentials: &Credentials,
    ) -> Result<String, CasError> {
        if st_id.is_empty() {
            return Err(CasError::InvalidRequest("st_id"));
        }
        if credentials.username.trim().is_empty() {
            return Err(CasError::InvalidRequest("credentials"));
        }

        let authentication = self
            .authentication_manager
            .authenticate(credentials)
            .await
            .map_err(TicketCreationError::Authentication)?;

        let st = match self.registry.get(st_id).await {
            Some(Ticket::Service(st)) => st,
            Some(Ticket::Granting(_)) | None => return Err(CasError::not_found(st_id)),
        };
        if st.is_expired(Utc::now()) {
            return Err(CasError::not_found(st_id));
        }

        let id = self.id_generator.new_id(PGT_PREFIX);
        let pgt = TicketGrantingTicket::delegated(
            id.clone(),
            authentication,
            st.authentications.clone(),
            st.id.clone(),
            self.ticket_granting_policy.clone(),
        );
        if !self.registry.add(&Ticket::Granting(pgt)).await {
            return Err(TicketCreationError::Persistence(id).into());
        }

        info!(ticket_id = %id, st_id = %st_id, "Delegated proxy-granting ticket");
        Ok(id)
    }

    /// Look up a live granting ticket, expiring it on discovery if its
    /// policy says so.
    async fn require_granting_ticket(
        &self,
        tgt_id: &str,
    ) -> Result<TicketGrantingTicket, CasError> {
        let tgt = match self.registry.get(tgt_id).await {
            Some(Ticket::Granting(tgt)) => tgt,
            Some(Ticket::Service(_)) | None => return Err(CasError::not_found(tgt_id)),
        };
        if tgt.is_expired(Utc::now()) {
            self.registry.delete(tgt_id).await;
            return Err(CasError::not_found(tgt_id));
        }
        Ok(tgt)
    }
}

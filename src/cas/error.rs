use thiserror::Error;

use crate::authn::AuthenticationError;

/// Why ticket issuance failed.
#[derive(Debug, Error)]
pub enum TicketCreationError {
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),
    /// Re-authentication during a grant resolved to a different principal
    /// than the one the SSO session was established for.
    #[error("principal '{presented}' does not match session principal '{expected}'")]
    PrincipalMismatch { expected: String, presented: String },
    #[error("failed to persist ticket {0}")]
    Persistence(String),
}

/// Why ticket validation failed.
#[derive(Debug, Error)]
pub enum TicketValidationError {
    #[error("ticket was already consumed")]
    AlreadyConsumed,
    #[error("ticket is expired")]
    Expired,
    #[error("ticket was granted for service '{expected}', not '{presented}'")]
    ServiceMismatch { expected: String, presented: String },
}

#[derive(Debug, Error)]
pub enum CasError {
    /// Missing or empty required parameter; a caller bug, never retried.
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("ticket creation failed: {0}")]
    TicketCreation(#[from] TicketCreationError),
    /// The id is absent, of the wrong kind, or was expired at lookup time.
    #[error("ticket '{id}' not found")]
    TicketNotFound { id: String },
    #[error("validation of ticket '{id}' failed: {source}")]
    TicketValidation {
        id: String,
        #[source]
        source: TicketValidationError,
    },
}

impl CasError {
    pub fn not_found(id: impl Into<String>) -> Self {
        CasError::TicketNotFound { id: id.into() }
    }

    pub fn validation(id: impl Into<String>, source: TicketValidationError) -> Self {
        CasError::TicketValidation {
            id: id.into(),
            source,
        }
    }
}

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::authn::Credentials;
use crate::cas::Assertion;
use crate::logout::LogoutRequest;
use crate::services::Service;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateTicketRequest {
    pub password: String,
    pub username: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GrantTicketRequest {
    #[serde(default)]
    pub password: Option<String>,
    pub service: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ValidateTicketRequest {
    pub service: String,
    pub ticket: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct DestroyTicketResponse {
    pub logout_requests: Vec<LogoutRequest>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_ticket_granting_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<JSend<TicketResponse>>), ApiError> {
    if req.username.trim().is_empty() {
        return Err(ApiError::bad_request("username is required"));
    }

    let credentials = Credentials::new(req.username, req.password);
    let id = state.cas.create_ticket_granting_ticket(&credentials).await?;

    Ok((StatusCode::CREATED, JSend::success(TicketResponse { id })))
}

pub async fn grant_service_ticket(
    State(state): State<Arc<AppState>>,
    Path(tgt_id): Path<String>,
    Json(req): Json<GrantTicketRequest>,
) -> Result<(StatusCode, Json<JSend<TicketResponse>>), ApiError> {
    if req.service.trim().is_empty() {
        return Err(ApiError::bad_request("service is required"));
    }

    // Credentials are optional; when present they request a fresh-login
    // service ticket and both halves must be supplied.
    let credentials = match (req.username, req.password) {
        (Some(username), Some(password)) => Some(Credentials::new(username, password)),
        (None, None) => None,
        _ => {
            return Err(ApiError::bad_request(
                "username and password must be supplied together",
            ))
        }
    };

    let service = Service::from_url(req.service);
    let id = state
        .cas
        .grant_service_ticket(&tgt_id, &service, credentials.as_ref())
        .await?;

    Ok((StatusCode::CREATED, JSend::success(TicketResponse { id })))
}

pub async fn validate_service_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateTicketRequest>,
) -> Result<Json<JSend<Assertion>>, ApiError> {
    if req.ticket.trim().is_empty() {
        return Err(ApiError::bad_request("ticket is required"));
    }
    if req.service.trim().is_empty() {
        return Err(ApiError::bad_request("service is required"));
    }

    let service = Service::from_url(req.service);
    let assertion = state
        .cas
        .validate_service_ticket(&req.ticket, &service)
        .await?;

    Ok(JSend::success(assertion))
}

pub async fn destroy_ticket_granting_ticket(
    State(state): State<Arc<AppState>>,
    Path(tgt_id): Path<String>,
) -> Result<Json<JSend<DestroyTicketResponse>>, ApiError> {
    let logout_requests = state.cas.destroy_ticket_granting_ticket(&tgt_id).await?;
    Ok(JSend::success(DestroyTicketResponse { logout_requests }))
}

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse { status: "ok" })
}

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/tickets", post(handlers::create_ticket_granting_ticket))
        .route(
            "/v1/tickets/:id",
            post(handlers::grant_service_ticket)
                .delete(handlers::destroy_ticket_granting_ticket),
        )
        .route("/v1/validate", post(handlers::validate_service_ticket))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

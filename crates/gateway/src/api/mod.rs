pub mod admin;
pub mod agent;
pub mod guard;
pub mod inbound;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// The visitor endpoint is public (the widget has no credentials of its
/// own); the agent endpoints enforce the bearer token via [`guard::AgentGuard`].
pub fn router() -> Router<AppState> {
    Router::new()
        // Visitor side
        .route("/v1/inbound", post(inbound::inbound))
        // Agent side (notification-surface button events)
        .route("/v1/agent/accept", post(agent::accept))
        .route("/v1/agent/end", post(agent::end))
        .route("/v1/agent/message", post(agent::message))
        // Admin
        .route("/admin/health", get(admin::health))
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

//! Agent-side endpoints — the notification surface posts button events
//! here.
//!
//! The `claim_id` in every payload may be the durable visitor id or a
//! legacy session id; the coordinator resolves it before acting.  A lost
//! claim race is a normal negative result (409), not a server error.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

use swb_domain::error::Error;

use crate::api::api_error;
use crate::api::guard::AgentGuard;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/agent/accept
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub claim_id: String,
    pub agent_id: String,
    pub agent_name: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub visitor_id: String,
    pub session_id: String,
    pub summary: String,
}

pub async fn accept(
    _guard: AgentGuard,
    State(state): State<AppState>,
    Json(body): Json<AcceptRequest>,
) -> impl IntoResponse {
    match state
        .coordinator
        .claim(&body.claim_id, &body.agent_id, &body.agent_name)
        .await
    {
        Ok(conn) => Json(AcceptResponse {
            visitor_id: conn.visitor_id,
            session_id: conn.session_id,
            summary: conn.summary,
        })
        .into_response(),
        Err(Error::AlreadyClaimed {
            agent_id,
            agent_name,
        }) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": "already claimed",
                "holder_id": agent_id,
                "holder_name": agent_name,
            })),
        )
            .into_response(),
        Err(Error::NotFound(msg)) => api_error(StatusCode::NOT_FOUND, msg),
        Err(e) => {
            tracing::error!(claim_id = %body.claim_id, error = %e, "claim failed");
            api_error(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/agent/end
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct EndRequest {
    pub claim_id: String,
}

pub async fn end(
    _guard: AgentGuard,
    State(state): State<AppState>,
    Json(body): Json<EndRequest>,
) -> impl IntoResponse {
    match state.coordinator.end_by_agent(&body.claim_id).await {
        Ok(duration_secs) => {
            Json(serde_json::json!({ "duration_secs": duration_secs })).into_response()
        }
        Err(Error::NotFound(msg)) => api_error(StatusCode::NOT_FOUND, msg),
        Err(e) => {
            tracing::error!(claim_id = %body.claim_id, error = %e, "end failed");
            api_error(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/agent/message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub claim_id: String,
    pub text: String,
}

pub async fn message(
    _guard: AgentGuard,
    State(state): State<AppState>,
    Json(body): Json<MessageRequest>,
) -> impl IntoResponse {
    match state
        .coordinator
        .relay_agent_message(&body.claim_id, &body.text)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(Error::NotFound(msg)) => api_error(StatusCode::NOT_FOUND, msg),
        Err(e) => {
            tracing::error!(claim_id = %body.claim_id, error = %e, "relay failed");
            api_error(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

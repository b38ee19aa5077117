//! Visitor inbound contract — the normalized envelope the chat-widget
//! connector posts.
//!
//! `POST /v1/inbound` accepts every visitor-side event (messages, offer
//! accept/decline, callback request, disconnect) and returns the turn's
//! outcome plus widget affordances.  This is the single entry point for
//! the visitor transport.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

use swb_coordinator::{InboundEvent, Lead, RequestOutcome};

use crate::api::api_error;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct InboundEnvelope {
    /// Transient id for this browser connection/tab.
    pub session_id: String,
    /// Durable visitor id, when the widget has one stored.
    #[serde(default)]
    pub visitor_id: Option<String>,
    #[serde(default = "d_message")]
    pub kind: EventKind,
    /// The message text (required for `kind = "message"`).
    #[serde(default)]
    pub text: Option<String>,
    /// Recent-transcript summary sent along with an accept.
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    AcceptHandoff,
    DeclineHandoff,
    RequestCallback,
    Disconnect,
}

fn d_message() -> EventKind {
    EventKind::Message
}

#[derive(Debug, Serialize)]
pub struct InboundResponse {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub offer_handoff: bool,
    pub after_hours: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead: Option<Lead>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/inbound
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn inbound(
    State(state): State<AppState>,
    Json(body): Json<InboundEnvelope>,
) -> impl IntoResponse {
    let event = match body.kind {
        EventKind::Message => match body.text {
            Some(text) => InboundEvent::Message { text },
            None => {
                return api_error(StatusCode::BAD_REQUEST, "kind \"message\" requires text");
            }
        },
        EventKind::AcceptHandoff => InboundEvent::AcceptHandoff {
            summary: body.summary.unwrap_or_default(),
        },
        EventKind::DeclineHandoff => InboundEvent::DeclineHandoff,
        EventKind::RequestCallback => InboundEvent::RequestCallback,
        EventKind::Disconnect => InboundEvent::Disconnect,
    };

    match state
        .orchestrator
        .handle_inbound(&body.session_id, body.visitor_id.as_deref(), event)
        .await
    {
        Ok(reply) => Json(InboundResponse {
            state: reply.state.to_string(),
            text: reply.text,
            offer_handoff: reply.offer_handoff,
            after_hours: reply.after_hours,
            handoff: reply.handoff.map(|o| match o {
                RequestOutcome::Requested => "requested",
                RequestOutcome::StillPending => "still_pending",
            }),
            lead: reply.lead,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(session = %body.session_id, error = %e, "inbound turn failed");
            api_error(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

use serde::Serialize;

/// Structured trace events emitted across all Switchboard crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    IdentityBound {
        session_id: String,
        visitor_id: String,
        superseded: Option<String>,
    },
    StateChanged {
        visitor_id: String,
        from: String,
        to: String,
    },
    StateRejected {
        visitor_id: String,
        from: String,
        to: String,
    },
    HandoffRequested {
        visitor_id: String,
        session_id: String,
    },
    HandoffStillPending {
        visitor_id: String,
        session_id: String,
    },
    ClaimWon {
        visitor_id: String,
        agent_id: String,
    },
    ClaimLost {
        visitor_id: String,
        agent_id: String,
        holder: String,
    },
    ConnectionEnded {
        visitor_id: String,
        reason: String,
        duration_secs: i64,
    },
    RequestTimedOut {
        visitor_id: String,
    },
    VisitorDisconnected {
        visitor_id: String,
        phase: String,
    },
    StoreFallback {
        op: String,
        error: String,
    },
    LeadCaptured {
        visitor_id: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "swb_event");
    }
}

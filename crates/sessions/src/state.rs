//! Conversation mode per visitor, behind a validated transition graph.
//!
//! Records are committed to the durable store (JSON under `convo:{id}`)
//! with the configured conversation TTL; when the store is unreachable the
//! fallback wrapper keeps them in-process.  The record is keyed by the
//! durable visitor identity, falling back to the transient session id for
//! visitors with no durable identity yet.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use swb_domain::error::{Error, Result};
use swb_domain::trace::TraceEvent;
use swb_store::KvStore;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The five mutually exclusive conversation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Default mode — every turn is evaluated for a handoff opportunity.
    SeekingHandoff,
    /// Actively collecting the four contact fields in fixed order.
    CallbackRequest,
    /// Rapport-building mode that offers a callback; not collecting yet.
    LeadCapture,
    /// No handoff evaluation (lead captured, cooldown active, or a prior
    /// live handoff concluded).
    NormalChat,
    /// An agent is bound; the automated responder is not invoked.
    HumanConnected,
}

impl ConversationState {
    pub const ALL: [ConversationState; 5] = [
        ConversationState::SeekingHandoff,
        ConversationState::CallbackRequest,
        ConversationState::LeadCapture,
        ConversationState::NormalChat,
        ConversationState::HumanConnected,
    ];
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SeekingHandoff => "seeking_handoff",
            Self::CallbackRequest => "callback_request",
            Self::LeadCapture => "lead_capture",
            Self::NormalChat => "normal_chat",
            Self::HumanConnected => "human_connected",
        };
        f.write_str(s)
    }
}

/// Check an edge against the legal transition graph.  No other
/// transitions are permitted, including self-transitions.
pub fn is_legal_transition(from: ConversationState, to: ConversationState) -> bool {
    use ConversationState::*;
    match (from, to) {
        // An agent claim may interrupt any mode.
        (_, HumanConnected) => true,
        (SeekingHandoff, LeadCapture) => true,
        (SeekingHandoff, CallbackRequest) => true,
        (LeadCapture, CallbackRequest) => true,
        (CallbackRequest, NormalChat) => true,
        (NormalChat, SeekingHandoff) => true,
        (HumanConnected, NormalChat) => true,
        _ => false,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-visitor conversation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub state: ConversationState,
    pub last_activity_at: DateTime<Utc>,
    /// Whether a handoff was already offered this episode.  Reset when a
    /// new episode starts (`NormalChat → SeekingHandoff`).
    #[serde(default)]
    pub handoff_offered: bool,
    /// Recorded at successful agent claim, never at connection end.
    #[serde(default)]
    pub last_live_handoff_at: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: ConversationState::SeekingHandoff,
            last_activity_at: now,
            handoff_offered: false,
            last_live_handoff_at: None,
        }
    }
}

fn convo_key(id: &str) -> String {
    format!("convo:{id}")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Loads, mutates, and persists conversation records.
pub struct ConversationStore {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl ConversationStore {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    async fn load(&self, id: &str) -> Result<Option<ConversationRecord>> {
        match self.kv.get(&convo_key(id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn persist(&self, id: &str, record: &ConversationRecord) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.kv.put(&convo_key(id), &raw, Some(self.ttl)).await
    }

    /// Fetch the record for a visitor, creating the default one on first
    /// contact.
    pub async fn get(&self, id: &str) -> Result<ConversationRecord> {
        if let Some(record) = self.load(id).await? {
            return Ok(record);
        }
        let record = ConversationRecord::new(Utc::now());
        self.persist(id, &record).await?;
        Ok(record)
    }

    /// Transition a visitor to `next`.
    ///
    /// Rejects edges outside the legal graph with `InvalidState` and
    /// leaves the stored record unchanged.  Entering `HumanConnected`
    /// stamps `last_live_handoff_at`; entering `SeekingHandoff` starts a
    /// new episode (clears `handoff_offered`).
    pub async fn set_state(&self, id: &str, next: ConversationState) -> Result<ConversationRecord> {
        let mut record = self.get(id).await?;
        let from = record.state;

        if !is_legal_transition(from, next) {
            TraceEvent::StateRejected {
                visitor_id: id.to_owned(),
                from: from.to_string(),
                to: next.to_string(),
            }
            .emit();
            return Err(Error::InvalidState {
                from: from.to_string(),
                to: next.to_string(),
            });
        }

        let now = Utc::now();
        record.state = next;
        record.last_activity_at = now;
        match next {
            ConversationState::HumanConnected => record.last_live_handoff_at = Some(now),
            ConversationState::SeekingHandoff => record.handoff_offered = false,
            _ => {}
        }

        self.persist(id, &record).await?;
        TraceEvent::StateChanged {
            visitor_id: id.to_owned(),
            from: from.to_string(),
            to: next.to_string(),
        }
        .emit();
        Ok(record)
    }

    /// Refresh `last_activity_at` without changing state.
    pub async fn touch(&self, id: &str) -> Result<()> {
        let mut record = self.get(id).await?;
        record.last_activity_at = Utc::now();
        self.persist(id, &record).await
    }

    /// Mark that a handoff was offered this episode.
    pub async fn mark_offered(&self, id: &str) -> Result<()> {
        let mut record = self.get(id).await?;
        record.handoff_offered = true;
        self.persist(id, &record).await
    }
}

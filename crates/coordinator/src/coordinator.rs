//! Agent assignment — pending requests, race-safe claims, reclamation.
//!
//! Per-visitor lifecycle: IDLE → WAITING (request published) → CONNECTED
//! (agent claimed) → IDLE (ended/timeout/reclaimed).  The one truly racy
//! operation is two agents accepting the same request at once; that races
//! through the store's atomic claim primitive, never a read-then-write.
//! Every other transition is serialized by the visitor's own message
//! stream.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use swb_domain::config::{HandoffConfig, StoreConfig};
use swb_domain::error::{Error, Result};
use swb_domain::trace::TraceEvent;
use swb_sessions::{ConversationState, ConversationStore, IdentityReconciler};
use swb_store::KvStore;

use crate::surface::{self, NotificationSurface};
use crate::timers::{TimerKind, TimerRegistry};
use crate::transport::{VisitorEvent, VisitorTransport};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A published handoff request nobody has claimed yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingHandoff {
    pub visitor_id: String,
    /// Updated in place when the visitor reloads while waiting.
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub summary: String,
    /// Opaque handle from the notification surface, used for in-place
    /// updates.
    pub notice: String,
}

/// The single live agent binding for a visitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConnection {
    pub visitor_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub connected_at: DateTime<Utc>,
    pub summary: String,
    pub notice: String,
    /// Routing target; follows the visitor to its newest session.
    pub session_id: String,
    /// Set when the visitor dropped while connected.  The record survives
    /// so a reconnect within the TTL window resumes with the same agent.
    #[serde(default)]
    pub pending_reclaim: bool,
}

/// Outcome of `request_handoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Requested,
    StillPending,
}

fn pending_key(visitor: &str) -> String {
    format!("pending:{visitor}")
}

fn conn_key(visitor: &str) -> String {
    format!("conn:{visitor}")
}

fn truncate_summary(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        s.chars().take(max).collect()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Coordinator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HandoffCoordinator {
    kv: Arc<dyn KvStore>,
    convo: Arc<ConversationStore>,
    ids: Arc<IdentityReconciler>,
    surface: Arc<dyn NotificationSurface>,
    transport: Arc<dyn VisitorTransport>,
    timers: Arc<TimerRegistry>,
    cfg: HandoffConfig,
    pending_ttl: Duration,
    connection_ttl: Duration,
}

impl HandoffCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kv: Arc<dyn KvStore>,
        convo: Arc<ConversationStore>,
        ids: Arc<IdentityReconciler>,
        surface: Arc<dyn NotificationSurface>,
        transport: Arc<dyn VisitorTransport>,
        timers: Arc<TimerRegistry>,
        cfg: HandoffConfig,
        store_cfg: &StoreConfig,
    ) -> Self {
        Self {
            kv,
            convo,
            ids,
            surface,
            transport,
            timers,
            cfg,
            pending_ttl: Duration::from_secs(store_cfg.pending_ttl_secs),
            connection_ttl: Duration::from_secs(store_cfg.connection_ttl_secs),
        }
    }

    // ── record access ────────────────────────────────────────────────

    pub async fn pending(&self, visitor: &str) -> Result<Option<PendingHandoff>> {
        match self.kv.get(&pending_key(visitor)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn connection(&self, visitor: &str) -> Result<Option<AgentConnection>> {
        match self.kv.get(&conn_key(visitor)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put_pending(&self, pending: &PendingHandoff) -> Result<()> {
        let raw = serde_json::to_string(pending)?;
        self.kv
            .put(&pending_key(&pending.visitor_id), &raw, Some(self.pending_ttl))
            .await
    }

    async fn put_connection(&self, conn: &AgentConnection) -> Result<()> {
        let raw = serde_json::to_string(conn)?;
        self.kv
            .put(&conn_key(&conn.visitor_id), &raw, Some(self.connection_ttl))
            .await
    }

    // ── requestHandoff ───────────────────────────────────────────────

    /// Publish a handoff request, or refresh the session pointer of the
    /// one already waiting (visitor reloaded mid-wait).  Never publishes
    /// a duplicate and never doubles the timers.
    pub async fn request_handoff(
        self: &Arc<Self>,
        visitor: &str,
        session: &str,
        summary: &str,
    ) -> Result<RequestOutcome> {
        if let Some(mut pending) = self.pending(visitor).await? {
            pending.session_id = session.to_owned();
            self.put_pending(&pending).await?;
            TraceEvent::HandoffStillPending {
                visitor_id: visitor.to_owned(),
                session_id: session.to_owned(),
            }
            .emit();
            return Ok(RequestOutcome::StillPending);
        }

        let summary = truncate_summary(summary, self.cfg.summary_max_chars);
        let notice = self.surface.publish(&surface::request_content(&summary)).await?;

        let pending = PendingHandoff {
            visitor_id: visitor.to_owned(),
            session_id: session.to_owned(),
            created_at: Utc::now(),
            summary,
            notice,
        };
        self.put_pending(&pending).await?;
        self.start_request_timers(visitor);

        TraceEvent::HandoffRequested {
            visitor_id: visitor.to_owned(),
            session_id: session.to_owned(),
        }
        .emit();
        Ok(RequestOutcome::Requested)
    }

    fn start_request_timers(self: &Arc<Self>, visitor: &str) {
        let timeout = Duration::from_millis(self.cfg.request_timeout_ms);
        let tick = Duration::from_millis(self.cfg.waiting_tick_ms);

        let this = self.clone();
        let v = visitor.to_owned();
        self.timers
            .start_once(visitor, TimerKind::HandoffTimeout, timeout, async move {
                if let Err(e) = this.reclaim_on_timeout(&v).await {
                    tracing::warn!(visitor = %v, error = %e, "timeout reclamation failed");
                }
            });

        let this = self.clone();
        let v = visitor.to_owned();
        self.timers
            .start_repeating(visitor, TimerKind::WaitingTick, tick, move || {
                let this = this.clone();
                let v = v.clone();
                async move {
                    this.waiting_tick(&v).await;
                }
            });
    }

    async fn waiting_tick(&self, visitor: &str) {
        let pending = match self.pending(visitor).await {
            Ok(Some(p)) => p,
            _ => return,
        };
        let waited = Utc::now()
            .signed_duration_since(pending.created_at)
            .num_seconds();
        if let Err(e) = self
            .surface
            .update(&pending.notice, &surface::waiting_content(&pending.summary, waited))
            .await
        {
            tracing::debug!(visitor, error = %e, "waiting update failed");
        }
        self.transport.emit(
            &pending.session_id,
            VisitorEvent::AgentWaiting {
                waiting_secs: waited,
            },
        );
    }

    // ── claim ────────────────────────────────────────────────────────

    /// Claim a waiting visitor for an agent.
    ///
    /// `claim_id` may be the visitor id or a stale session id — it is
    /// resolved first.  The check-and-create races through the store's
    /// claim primitive: of N simultaneous claims exactly one wins, the
    /// rest observe `AlreadyClaimed` naming the winner.
    pub async fn claim(
        self: &Arc<Self>,
        claim_id: &str,
        agent_id: &str,
        agent_name: &str,
    ) -> Result<AgentConnection> {
        let visitor = self.ids.resolve_or_self(claim_id).await?;

        if let Some(existing) = self.connection(&visitor).await? {
            TraceEvent::ClaimLost {
                visitor_id: visitor.clone(),
                agent_id: agent_id.to_owned(),
                holder: existing.agent_id.clone(),
            }
            .emit();
            return Err(Error::AlreadyClaimed {
                agent_id: existing.agent_id,
                agent_name: existing.agent_name,
            });
        }

        let pending = self
            .pending(&visitor)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no pending handoff for {visitor}")))?;

        let session = self
            .ids
            .current_session(&visitor)
            .await?
            .unwrap_or_else(|| pending.session_id.clone());

        let conn = AgentConnection {
            visitor_id: visitor.clone(),
            agent_id: agent_id.to_owned(),
            agent_name: agent_name.to_owned(),
            connected_at: Utc::now(),
            summary: pending.summary.clone(),
            notice: pending.notice.clone(),
            session_id: session,
            pending_reclaim: false,
        };
        let raw = serde_json::to_string(&conn)?;
        let created = self
            .kv
            .claim(&conn_key(&visitor), &raw, Some(self.connection_ttl))
            .await?;

        if !created {
            // Lost the race between our existence check and the write.
            let holder = self.connection(&visitor).await?;
            let (holder_id, holder_name) = holder
                .map(|c| (c.agent_id, c.agent_name))
                .unwrap_or_else(|| ("unknown".into(), "unknown".into()));
            TraceEvent::ClaimLost {
                visitor_id: visitor.clone(),
                agent_id: agent_id.to_owned(),
                holder: holder_id.clone(),
            }
            .emit();
            return Err(Error::AlreadyClaimed {
                agent_id: holder_id,
                agent_name: holder_name,
            });
        }

        self.kv.delete(&pending_key(&visitor)).await?;
        self.timers.cancel(&visitor, TimerKind::HandoffTimeout);
        self.timers.cancel(&visitor, TimerKind::WaitingTick);

        // Stamps last_live_handoff_at — the cooldown anchor is the claim,
        // not the end of the conversation.
        self.convo
            .set_state(&visitor, ConversationState::HumanConnected)
            .await?;

        self.start_connection_timers(&visitor);

        if let Err(e) = self
            .surface
            .update(
                &conn.notice,
                &surface::connected_content(&conn.agent_name, &conn.summary, 0),
            )
            .await
        {
            tracing::warn!(visitor = %visitor, error = %e, "connected update failed");
        }
        self.transport.emit(
            &conn.session_id,
            VisitorEvent::AgentConnected {
                agent_name: conn.agent_name.clone(),
            },
        );

        TraceEvent::ClaimWon {
            visitor_id: visitor,
            agent_id: agent_id.to_owned(),
        }
        .emit();
        Ok(conn)
    }

    fn start_connection_timers(self: &Arc<Self>, visitor: &str) {
        let inactivity = Duration::from_millis(self.cfg.inactivity_timeout_ms);
        let tick = Duration::from_millis(self.cfg.duration_tick_ms);

        let this = self.clone();
        let v = visitor.to_owned();
        self.timers
            .start_once(visitor, TimerKind::Inactivity, inactivity, async move {
                if let Err(e) = this.reclaim_on_inactivity(&v).await {
                    tracing::warn!(visitor = %v, error = %e, "inactivity reclamation failed");
                }
            });

        let this = self.clone();
        let v = visitor.to_owned();
        self.timers
            .start_repeating(visitor, TimerKind::DurationTick, tick, move || {
                let this = this.clone();
                let v = v.clone();
                async move {
                    this.duration_tick(&v).await;
                }
            });
    }

    async fn duration_tick(&self, visitor: &str) {
        let conn = match self.connection(visitor).await {
            Ok(Some(c)) => c,
            _ => return,
        };
        let connected = Utc::now()
            .signed_duration_since(conn.connected_at)
            .num_seconds();
        if let Err(e) = self
            .surface
            .update(
                &conn.notice,
                &surface::connected_content(&conn.agent_name, &conn.summary, connected),
            )
            .await
        {
            tracing::debug!(visitor, error = %e, "duration update failed");
        }
    }

    // ── endings ──────────────────────────────────────────────────────

    /// Agent explicitly ended the conversation.  Returns the elapsed
    /// connection duration in seconds.
    pub async fn end_by_agent(&self, claim_id: &str) -> Result<i64> {
        let visitor = self.ids.resolve_or_self(claim_id).await?;
        let conn = self
            .connection(&visitor)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no active connection for {visitor}")))?;
        self.finish_connection(&visitor, conn, "agent_ended", None)
            .await
    }

    /// Tear down a connection by any path: cancel every timer kind
    /// (except the caller's own, when invoked from a timer callback),
    /// remove the record, return to `NormalChat`, notify both sides.
    async fn finish_connection(
        &self,
        visitor: &str,
        conn: AgentConnection,
        reason: &str,
        own_timer: Option<TimerKind>,
    ) -> Result<i64> {
        let duration = Utc::now()
            .signed_duration_since(conn.connected_at)
            .num_seconds();

        self.timers.cancel_all_except(visitor, own_timer);
        self.kv.delete(&conn_key(visitor)).await?;
        self.convo
            .set_state(visitor, ConversationState::NormalChat)
            .await?;

        if let Err(e) = self
            .surface
            .update(
                &conn.notice,
                &surface::ended_content(&conn.agent_name, duration, reason),
            )
            .await
        {
            tracing::warn!(visitor, error = %e, "ended update failed");
        }

        let session = self
            .ids
            .current_session(visitor)
            .await?
            .unwrap_or(conn.session_id);
        self.transport.emit(
            &session,
            VisitorEvent::AgentDisconnected {
                reason: reason.to_owned(),
            },
        );

        TraceEvent::ConnectionEnded {
            visitor_id: visitor.to_owned(),
            reason: reason.to_owned(),
            duration_secs: duration,
        }
        .emit();
        Ok(duration)
    }

    // ── reclamation ──────────────────────────────────────────────────

    /// Fired by the handoff-timeout timer.  No-op unless the request is
    /// still waiting — a claim that landed first makes a late firing
    /// harmless.
    pub async fn reclaim_on_timeout(&self, visitor: &str) -> Result<()> {
        let Some(pending) = self.pending(visitor).await? else {
            return Ok(());
        };
        if self.connection(visitor).await?.is_some() {
            // Claimed while this callback was in flight.
            return Ok(());
        }

        self.kv.delete(&pending_key(visitor)).await?;
        self.timers
            .cancel_all_except(visitor, Some(TimerKind::HandoffTimeout));

        let record = self.convo.get(visitor).await?;
        if record.state != ConversationState::SeekingHandoff {
            if let Err(e) = self
                .convo
                .set_state(visitor, ConversationState::SeekingHandoff)
                .await
            {
                tracing::warn!(visitor, error = %e, "post-timeout transition failed");
            }
        }

        if let Err(e) = self
            .surface
            .update(&pending.notice, &surface::timeout_content(&pending.summary))
            .await
        {
            tracing::warn!(visitor, error = %e, "timeout update failed");
        }
        self.transport
            .emit(&pending.session_id, VisitorEvent::HandoffTimeout);

        TraceEvent::RequestTimedOut {
            visitor_id: visitor.to_owned(),
        }
        .emit();
        Ok(())
    }

    /// Fired by the inactivity timer.  No-op unless still connected.
    pub async fn reclaim_on_inactivity(&self, visitor: &str) -> Result<()> {
        let Some(conn) = self.connection(visitor).await? else {
            return Ok(());
        };
        self.finish_connection(visitor, conn, "inactivity", Some(TimerKind::Inactivity))
            .await?;
        Ok(())
    }

    // ── visitor-side events ──────────────────────────────────────────

    /// Visitor dropped (page closed, network died).  A waiting request
    /// keeps its timers — reconnecting is the expected case and the
    /// handoff timeout governs eventual cleanup.  A live connection is
    /// only marked; the record survives so the same visitor can resume
    /// with the same agent within the TTL window.
    pub async fn handle_visitor_disconnect(&self, visitor: &str) -> Result<()> {
        if self.pending(visitor).await?.is_some() {
            TraceEvent::VisitorDisconnected {
                visitor_id: visitor.to_owned(),
                phase: "waiting".into(),
            }
            .emit();
            return Ok(());
        }

        if let Some(mut conn) = self.connection(visitor).await? {
            conn.pending_reclaim = true;
            self.put_connection(&conn).await?;
            TraceEvent::VisitorDisconnected {
                visitor_id: visitor.to_owned(),
                phase: "connected".into(),
            }
            .emit();
        }
        Ok(())
    }

    /// An inbound message from a connected visitor: refresh activity,
    /// re-arm the inactivity timer, follow the session, and relay the
    /// text to the agent's thread.  Returns `false` when no connection
    /// exists (callers fall through to the automated path).
    pub async fn visitor_activity(
        self: &Arc<Self>,
        visitor: &str,
        session: &str,
        text: &str,
    ) -> Result<bool> {
        let Some(mut conn) = self.connection(visitor).await? else {
            return Ok(false);
        };

        if conn.session_id != session || conn.pending_reclaim {
            conn.session_id = session.to_owned();
            conn.pending_reclaim = false;
            self.put_connection(&conn).await?;
        }

        self.convo.touch(visitor).await?;

        let inactivity = Duration::from_millis(self.cfg.inactivity_timeout_ms);
        let this = self.clone();
        let v = visitor.to_owned();
        self.timers
            .start_once(visitor, TimerKind::Inactivity, inactivity, async move {
                if let Err(e) = this.reclaim_on_inactivity(&v).await {
                    tracing::warn!(visitor = %v, error = %e, "inactivity reclamation failed");
                }
            });

        if let Err(e) = self
            .surface
            .notify_thread(&conn.notice, &format!("Visitor: {text}"))
            .await
        {
            tracing::warn!(visitor, error = %e, "thread relay failed");
        }
        Ok(true)
    }

    /// Reconnect bookkeeping for a visitor who is waiting: follow the
    /// session pointer without re-publishing or re-notifying anything.
    pub async fn note_visitor_session(&self, visitor: &str, session: &str) -> Result<()> {
        if let Some(mut pending) = self.pending(visitor).await? {
            if pending.session_id != session {
                pending.session_id = session.to_owned();
                self.put_pending(&pending).await?;
            }
        }
        Ok(())
    }

    /// Relay an agent's message to the visitor's current session room.
    pub async fn relay_agent_message(&self, claim_id: &str, text: &str) -> Result<()> {
        let visitor = self.ids.resolve_or_self(claim_id).await?;
        let conn = self
            .connection(&visitor)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no active connection for {visitor}")))?;

        self.transport.emit(
            &conn.session_id,
            VisitorEvent::AgentMessage {
                agent_name: conn.agent_name,
                text: text.to_owned(),
            },
        );
        Ok(())
    }
}

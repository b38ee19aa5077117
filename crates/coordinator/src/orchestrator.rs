//! The orchestrator ties one visitor turn together: bind identity, route
//! around a live agent connection, consult the eligibility policy, call
//! the responder, and act on any markers in its output.

use std::sync::Arc;

use chrono::Utc;

use swb_domain::error::Result;
use swb_sessions::{ConversationState, ConversationStore, HandoffPolicy, IdentityReconciler};

use crate::coordinator::{HandoffCoordinator, RequestOutcome};
use crate::leads;
use crate::markers::{self, Lead};
use crate::responder::{Responder, ResponderContext};

/// Normalized visitor-side events the gateway feeds in.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A chat message typed by the visitor.
    Message { text: String },
    /// The visitor accepted the offered handoff; `summary` is the recent
    /// transcript assembled by the widget connector.
    AcceptHandoff { summary: String },
    /// The visitor declined the offered handoff.
    DeclineHandoff,
    /// The visitor asked to be called back.  Exempt from the cooldown.
    RequestCallback,
    /// The browser connection dropped.
    Disconnect,
}

/// What the gateway returns to the widget for one turn.
#[derive(Debug, Clone)]
pub struct TurnReply {
    /// Responder text with markers stripped; `None` for non-message
    /// events and while a human is connected.
    pub text: Option<String>,
    pub state: ConversationState,
    /// Widget affordance: render accept/decline buttons this turn.
    pub offer_handoff: bool,
    /// Widget affordance: outside the business-hours window.
    pub after_hours: bool,
    /// The lead captured this turn, if any.
    pub lead: Option<Lead>,
    /// Set when the turn published (or re-confirmed) a handoff request.
    pub handoff: Option<RequestOutcome>,
}

impl TurnReply {
    fn event(state: ConversationState, after_hours: bool) -> Self {
        Self {
            text: None,
            state,
            offer_handoff: false,
            after_hours,
            lead: None,
            handoff: None,
        }
    }
}

pub struct Orchestrator {
    convo: Arc<ConversationStore>,
    policy: Arc<HandoffPolicy>,
    ids: Arc<IdentityReconciler>,
    coordinator: Arc<HandoffCoordinator>,
    responder: Arc<dyn Responder>,
    leads_webhook: Option<String>,
}

impl Orchestrator {
    pub fn new(
        convo: Arc<ConversationStore>,
        policy: Arc<HandoffPolicy>,
        ids: Arc<IdentityReconciler>,
        coordinator: Arc<HandoffCoordinator>,
        responder: Arc<dyn Responder>,
        leads_webhook: Option<String>,
    ) -> Self {
        Self {
            convo,
            policy,
            ids,
            coordinator,
            responder,
            leads_webhook,
        }
    }

    /// Entry point for every inbound visitor event.
    ///
    /// Binds identity first when a durable visitor id is present; without
    /// one the session id acts as a degraded standalone identity.
    pub async fn handle_inbound(
        &self,
        session: &str,
        visitor: Option<&str>,
        event: InboundEvent,
    ) -> Result<TurnReply> {
        let id = match visitor {
            Some(v) => {
                self.ids.bind(session, v).await?;
                v.to_owned()
            }
            None => session.to_owned(),
        };

        match event {
            InboundEvent::Message { text } => self.handle_message(&id, session, &text).await,
            InboundEvent::AcceptHandoff { summary } => {
                self.accept_handoff(&id, session, &summary).await
            }
            InboundEvent::DeclineHandoff => self.decline_handoff(&id).await,
            InboundEvent::RequestCallback => self.request_callback(&id).await,
            InboundEvent::Disconnect => {
                self.coordinator.handle_visitor_disconnect(&id).await?;
                let record = self.convo.get(&id).await?;
                Ok(TurnReply::event(record.state, self.after_hours()))
            }
        }
    }

    fn after_hours(&self) -> bool {
        !self.policy.is_business_hours(Utc::now())
    }

    async fn handle_message(&self, id: &str, session: &str, text: &str) -> Result<TurnReply> {
        // A live agent connection short-circuits the automated path.
        if self.coordinator.visitor_activity(id, session, text).await? {
            return Ok(TurnReply::event(
                ConversationState::HumanConnected,
                self.after_hours(),
            ));
        }

        // Reconnect while waiting: follow the session, nothing re-sent.
        self.coordinator.note_visitor_session(id, session).await?;
        self.convo.touch(id).await?;

        let record = self.convo.get(id).await?;
        let offer = match record.state {
            // Evaluation is skipped entirely in the collecting modes.
            ConversationState::CallbackRequest | ConversationState::LeadCapture => false,
            _ => self.policy.can_offer_handoff(id).await?,
        };
        // The cooldown check may have woken the visitor into a new episode.
        let record = self.convo.get(id).await?;

        let business = self.policy.is_business_hours(Utc::now());
        let ctx = ResponderContext {
            visitor_id: id.to_owned(),
            session_id: session.to_owned(),
            message: text.to_owned(),
            offer_handoff: offer,
            business_hours: business,
        };
        let raw = self.responder.generate(record.state, &ctx).await?;

        let mut state = record.state;
        let mut lead = None;
        if state == ConversationState::CallbackRequest {
            if let Some(captured) = markers::extract_lead(&raw) {
                state = self
                    .convo
                    .set_state(id, ConversationState::NormalChat)
                    .await?
                    .state;
                leads::dispatch_lead(self.leads_webhook.as_deref(), id, &captured);
                lead = Some(captured);
            } else if markers::has_escape(&raw) {
                state = self
                    .convo
                    .set_state(id, ConversationState::NormalChat)
                    .await?
                    .state;
            }
        }

        if offer {
            self.convo.mark_offered(id).await?;
        }

        Ok(TurnReply {
            text: Some(markers::strip_markers(&raw)),
            state,
            offer_handoff: offer,
            after_hours: !business,
            lead,
            handoff: None,
        })
    }

    /// Accept publishes the pending request; the conversation stays in
    /// `SeekingHandoff` until an agent actually claims it.
    async fn accept_handoff(&self, id: &str, session: &str, summary: &str) -> Result<TurnReply> {
        let outcome = self.coordinator.request_handoff(id, session, summary).await?;
        let record = self.convo.get(id).await?;
        let mut reply = TurnReply::event(record.state, self.after_hours());
        reply.handoff = Some(outcome);
        Ok(reply)
    }

    async fn decline_handoff(&self, id: &str) -> Result<TurnReply> {
        let record = self.convo.get(id).await?;
        let state = if record.state == ConversationState::SeekingHandoff {
            self.convo
                .set_state(id, ConversationState::LeadCapture)
                .await?
                .state
        } else {
            tracing::debug!(visitor = id, state = %record.state, "decline outside an offer, ignoring");
            record.state
        };
        Ok(TurnReply::event(state, self.after_hours()))
    }

    /// The unconditional callback path.  From `NormalChat` it passes
    /// through `SeekingHandoff` first — both hops are legal edges — so a
    /// cooldown in progress never blocks leaving contact details.
    async fn request_callback(&self, id: &str) -> Result<TurnReply> {
        let record = self.convo.get(id).await?;
        let state = match record.state {
            ConversationState::SeekingHandoff | ConversationState::LeadCapture => {
                self.convo
                    .set_state(id, ConversationState::CallbackRequest)
                    .await?
                    .state
            }
            ConversationState::NormalChat => {
                self.convo
                    .set_state(id, ConversationState::SeekingHandoff)
                    .await?;
                self.convo
                    .set_state(id, ConversationState::CallbackRequest)
                    .await?
                    .state
            }
            other => other,
        };
        Ok(TurnReply::event(state, self.after_hours()))
    }
}

//! Human-handoff coordination for Switchboard.
//!
//! Owns the per-visitor handoff lifecycle (pending request → claimed
//! connection → reclamation), the four-kind timer registry, the outbound
//! collaborator clients (responder, notification surface), marker
//! scanning, and the orchestrator that ties a visitor turn together.

pub mod coordinator;
mod http;
pub mod leads;
pub mod markers;
pub mod orchestrator;
pub mod responder;
pub mod surface;
pub mod timers;
pub mod transport;

pub use coordinator::{AgentConnection, HandoffCoordinator, PendingHandoff, RequestOutcome};
pub use markers::Lead;
pub use orchestrator::{InboundEvent, Orchestrator, TurnReply};
pub use responder::{Responder, ResponderContext, RestResponderClient};
pub use surface::{NotificationSurface, RestSurfaceClient};
pub use timers::{TimerKind, TimerRegistry};
pub use transport::{RoomHub, VisitorEvent, VisitorTransport};

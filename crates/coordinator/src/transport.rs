//! Visitor transport — named events pushed toward the browser client.
//!
//! Delivery is best-effort/fire-and-forget from the coordinator's
//! perspective: events are scoped to a session room and dropped when
//! nobody is subscribed (the visitor navigated away).

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

/// Events the coordinator emits toward a visitor's session room.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisitorEvent {
    AgentConnected { agent_name: String },
    AgentDisconnected { reason: String },
    AgentMessage { agent_name: String, text: String },
    HandoffTimeout,
    AgentWaiting { waiting_secs: i64 },
}

/// Push channel toward the browser, scoped to a session room.
pub trait VisitorTransport: Send + Sync {
    fn emit(&self, session: &str, event: VisitorEvent);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-process room hub
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ROOM_BUFFER: usize = 64;

/// Broadcast-backed hub a push endpoint (SSE/WS) subscribes to per room.
pub struct RoomHub {
    rooms: Mutex<HashMap<String, broadcast::Sender<VisitorEvent>>>,
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomHub {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a session room, creating it on first use.
    pub fn subscribe(&self, session: &str) -> broadcast::Receiver<VisitorEvent> {
        let mut rooms = self.rooms.lock();
        rooms
            .entry(session.to_owned())
            .or_insert_with(|| broadcast::channel(ROOM_BUFFER).0)
            .subscribe()
    }

    /// Drop rooms with no live subscribers.
    pub fn prune(&self) {
        self.rooms.lock().retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl VisitorTransport for RoomHub {
    fn emit(&self, session: &str, event: VisitorEvent) {
        let rooms = self.rooms.lock();
        if let Some(tx) = rooms.get(session) {
            // A send error just means nobody is listening any more.
            let _ = tx.send(event);
        } else {
            tracing::debug!(session, "dropping visitor event for empty room");
        }
    }
}

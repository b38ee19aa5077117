use std::sync::Arc;

use swb_coordinator::{HandoffCoordinator, Orchestrator, RoomHub, TimerRegistry};
use swb_domain::config::Config;
use swb_sessions::{ConversationStore, HandoffPolicy, IdentityReconciler};
use swb_store::KvStore;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core** — config, the (fallback-wrapped) key-value store
/// - **Sessions** — conversation records, policy, identity reconciliation
/// - **Handoff** — coordinator, orchestrator, timers, visitor event hub
/// - **Security** — agent bearer-token hash (computed once at startup)
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub kv: Arc<dyn KvStore>,
    /// Whether a durable backend is configured (health reporting).
    pub durable_store: bool,

    // ── Sessions ──────────────────────────────────────────────────────
    pub convo: Arc<ConversationStore>,
    pub policy: Arc<HandoffPolicy>,
    pub ids: Arc<IdentityReconciler>,

    // ── Handoff ───────────────────────────────────────────────────────
    pub coordinator: Arc<HandoffCoordinator>,
    pub orchestrator: Arc<Orchestrator>,
    pub timers: Arc<TimerRegistry>,
    /// In-process room hub a push endpoint can subscribe to per session.
    pub hub: Arc<RoomHub>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the agent bearer token (read once at startup).
    /// `None` = dev mode (agent endpoints accessible without auth).
    pub agent_token_hash: Option<Vec<u8>>,
}

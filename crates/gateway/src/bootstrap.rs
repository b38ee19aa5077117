//! Gateway bootstrap — construct the full runtime from a loaded config.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use swb_coordinator::{
    HandoffCoordinator, NotificationSurface, Orchestrator, Responder, RestResponderClient,
    RestSurfaceClient, RoomHub, TimerRegistry, VisitorTransport,
};
use swb_domain::config::Config;
use swb_sessions::{ConversationStore, HandoffPolicy, IdentityReconciler};
use swb_store::{FallbackKv, KvStore, RestKvClient};

use crate::state::AppState;

/// Build the shared [`AppState`]: store, session services, coordinator,
/// orchestrator, and the startup-computed token hash.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Store (durable + in-process fallback) ─────────────────────────
    let primary: Option<Arc<dyn KvStore>> = match &config.store.base_url {
        Some(url) => {
            tracing::info!(url = %url, "durable store configured");
            Some(Arc::new(RestKvClient::new(&config.store)?))
        }
        None => {
            tracing::warn!(
                "no durable store configured — records will not survive a restart"
            );
            None
        }
    };
    let durable_store = primary.is_some();
    let kv: Arc<dyn KvStore> = Arc::new(FallbackKv::new(primary));

    // ── Session services ──────────────────────────────────────────────
    let convo = Arc::new(ConversationStore::new(
        kv.clone(),
        Duration::from_secs(config.store.conversation_ttl_secs),
    ));
    let policy = Arc::new(HandoffPolicy::new(
        convo.clone(),
        config.handoff.cooldown_secs,
        config.business_hours.clone(),
    ));
    let ids = Arc::new(IdentityReconciler::new(
        kv.clone(),
        Duration::from_secs(config.store.session_ttl_secs),
    ));

    // ── Handoff coordination ──────────────────────────────────────────
    let surface: Arc<dyn NotificationSurface> = Arc::new(RestSurfaceClient::new(&config.surface)?);
    let hub = Arc::new(RoomHub::new());
    let timers = Arc::new(TimerRegistry::new());
    let coordinator = Arc::new(HandoffCoordinator::new(
        kv.clone(),
        convo.clone(),
        ids.clone(),
        surface,
        hub.clone() as Arc<dyn VisitorTransport>,
        timers.clone(),
        config.handoff.clone(),
        &config.store,
    ));

    let responder: Arc<dyn Responder> = Arc::new(RestResponderClient::new(&config.responder)?);
    let orchestrator = Arc::new(Orchestrator::new(
        convo.clone(),
        policy.clone(),
        ids.clone(),
        coordinator.clone(),
        responder,
        config.leads.webhook_url.clone(),
    ));

    let agent_token_hash = read_token_hash(&config.server.agent_token_env);

    Ok(AppState {
        config,
        kv,
        durable_store,
        convo,
        policy,
        ids,
        coordinator,
        orchestrator,
        timers,
        hub,
        agent_token_hash,
    })
}

/// Read the bearer token from the configured env var and hash it once.
fn read_token_hash(env_var: &str) -> Option<Vec<u8>> {
    match std::env::var(env_var) {
        Ok(token) if !token.is_empty() => Some(Sha256::digest(token.as_bytes()).to_vec()),
        _ => {
            tracing::warn!(
                env_var,
                "agent token not set — agent endpoints accept unauthenticated requests"
            );
            None
        }
    }
}

//! Shared fixture for the coordinator integration tests: an isolated
//! in-process stack with recording doubles for the external surfaces.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use swb_coordinator::{
    HandoffCoordinator, NotificationSurface, TimerRegistry, VisitorEvent, VisitorTransport,
};
use swb_domain::config::{BusinessHoursConfig, HandoffConfig, StoreConfig};
use swb_domain::error::Result;
use swb_sessions::{ConversationStore, HandoffPolicy, IdentityReconciler};
use swb_store::MemoryKv;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Recording doubles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct RecordingSurface {
    pub published: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<(String, String)>>,
    pub threads: Mutex<Vec<(String, String)>>,
    counter: AtomicU32,
}

#[async_trait]
impl NotificationSurface for RecordingSurface {
    async fn publish(&self, content: &str) -> Result<String> {
        self.published.lock().push(content.to_owned());
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("m{n}"))
    }

    async fn update(&self, handle: &str, content: &str) -> Result<()> {
        self.updates
            .lock()
            .push((handle.to_owned(), content.to_owned()));
        Ok(())
    }

    async fn notify_thread(&self, handle: &str, content: &str) -> Result<()> {
        self.threads
            .lock()
            .push((handle.to_owned(), content.to_owned()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    pub events: Mutex<Vec<(String, VisitorEvent)>>,
}

impl RecordingTransport {
    /// Events delivered to one session room.
    pub fn for_session(&self, session: &str) -> Vec<VisitorEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(s, _)| s == session)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

impl VisitorTransport for RecordingTransport {
    fn emit(&self, session: &str, event: VisitorEvent) {
        self.events.lock().push((session.to_owned(), event));
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fixture
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Fixture {
    pub kv: Arc<MemoryKv>,
    pub convo: Arc<ConversationStore>,
    pub policy: Arc<HandoffPolicy>,
    pub ids: Arc<IdentityReconciler>,
    pub surface: Arc<RecordingSurface>,
    pub transport: Arc<RecordingTransport>,
    pub timers: Arc<TimerRegistry>,
    pub coordinator: Arc<HandoffCoordinator>,
}

/// Millisecond-scale timers so reclamation paths run inside a test.
pub fn fast_handoff_cfg() -> HandoffConfig {
    HandoffConfig {
        cooldown_secs: 3_600,
        request_timeout_ms: 80,
        inactivity_timeout_ms: 80,
        waiting_tick_ms: 20,
        duration_tick_ms: 20,
        summary_max_chars: 600,
    }
}

pub fn fixture() -> Fixture {
    fixture_with(fast_handoff_cfg())
}

pub fn fixture_with(cfg: HandoffConfig) -> Fixture {
    let kv: Arc<MemoryKv> = Arc::new(MemoryKv::new());
    let convo = Arc::new(ConversationStore::new(
        kv.clone(),
        Duration::from_secs(3_600),
    ));
    let policy = Arc::new(HandoffPolicy::new(
        convo.clone(),
        cfg.cooldown_secs,
        BusinessHoursConfig::default(),
    ));
    let ids = Arc::new(IdentityReconciler::new(
        kv.clone(),
        Duration::from_secs(86_400),
    ));
    let surface = Arc::new(RecordingSurface::default());
    let transport = Arc::new(RecordingTransport::default());
    let timers = Arc::new(TimerRegistry::new());

    let coordinator = Arc::new(HandoffCoordinator::new(
        kv.clone(),
        convo.clone(),
        ids.clone(),
        surface.clone(),
        transport.clone(),
        timers.clone(),
        cfg,
        &StoreConfig::default(),
    ));

    Fixture {
        kv,
        convo,
        policy,
        ids,
        surface,
        transport,
        timers,
        coordinator,
    }
}

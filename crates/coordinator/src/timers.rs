//! Per-visitor timer registry.
//!
//! Four independently cancellable kinds of deferred work per visitor.
//! Starting a timer of a given kind always aborts the existing one of
//! that kind, so at most one live timer of each kind exists per visitor.
//! The registry is a process-scoped object injected into the coordinator
//! (never ambient global state) so tests can run isolated instances;
//! `shutdown` is the explicit teardown.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// The four timer kinds tied to a visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Single-shot: a published request nobody claimed in time.
    HandoffTimeout,
    /// Single-shot: a connected visitor went silent; reset on every
    /// inbound visitor message.
    Inactivity,
    /// Repeating: in-place waiting-time updates while a request pends.
    WaitingTick,
    /// Repeating: in-place duration updates while a connection lives.
    DurationTick,
}

/// Process-scoped registry of per-visitor timers.
pub struct TimerRegistry {
    tasks: Mutex<HashMap<(String, TimerKind), JoinHandle<()>>>,
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, visitor: &str, kind: TimerKind, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        if let Some(previous) = tasks.insert((visitor.to_owned(), kind), handle) {
            previous.abort();
        }
    }

    /// Run `fut` once after `delay`.  Replaces any live timer of the same
    /// kind for this visitor.
    pub fn start_once<F>(&self, visitor: &str, kind: TimerKind, delay: Duration, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fut.await;
        });
        self.insert(visitor, kind, handle);
    }

    /// Run the future produced by `tick` every `period` until cancelled.
    /// The first tick fires after one full period.
    pub fn start_repeating<F, Fut>(&self, visitor: &str, kind: TimerKind, period: Duration, tick: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                tick().await;
            }
        });
        self.insert(visitor, kind, handle);
    }

    /// Abort one timer.  Returns `true` if a live timer was cancelled.
    pub fn cancel(&self, visitor: &str, kind: TimerKind) -> bool {
        match self.tasks.lock().remove(&(visitor.to_owned(), kind)) {
            Some(handle) => {
                let was_live = !handle.is_finished();
                handle.abort();
                was_live
            }
            None => false,
        }
    }

    /// Abort every timer kind for one visitor.  Ending a request or a
    /// connection by any path goes through here so no cancelled-but-still-
    /// scheduled duplicate reclamation can fire.
    pub fn cancel_all(&self, visitor: &str) {
        self.cancel_all_except(visitor, None);
    }

    /// Like `cancel_all`, sparing one kind.  A timer callback tearing
    /// down the visitor's other timers must not abort its own task
    /// mid-flight — it passes its own kind here.
    pub fn cancel_all_except(&self, visitor: &str, except: Option<TimerKind>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|(v, kind), handle| {
            if v == visitor && Some(*kind) != except {
                handle.abort();
                false
            } else {
                true
            }
        });
    }

    /// Number of live timers for a visitor (for tests/monitoring).
    pub fn live_count(&self, visitor: &str) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|((v, _), handle)| v == visitor && !handle.is_finished())
            .count()
    }

    /// Abort everything (process teardown).
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock();
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}

//! Fallback wrapper — degrade to the in-process map when the durable
//! store is unreachable.
//!
//! Every operation tries the primary backend first.  On failure it is
//! retried against the in-process twin, a `StoreFallback` trace event is
//! emitted, and the caller sees a success.  Store unavailability is never
//! propagated — the affected visitor degrades, the service does not.
//!
//! Known limitation: records written to the twin during an outage are not
//! replayed to the primary on recovery, and the atomic-claim guarantee
//! only holds within one process while degraded.  Acceptable for
//! single-instance deployments.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use swb_domain::error::Result;
use swb_domain::trace::TraceEvent;

use crate::kv::KvStore;
use crate::memory::MemoryKv;

/// Wraps an optional durable backend with an in-process twin.
///
/// With no primary configured, all traffic goes straight to the twin.
pub struct FallbackKv {
    primary: Option<Arc<dyn KvStore>>,
    twin: MemoryKv,
}

impl FallbackKv {
    pub fn new(primary: Option<Arc<dyn KvStore>>) -> Self {
        Self {
            primary,
            twin: MemoryKv::new(),
        }
    }

    /// True when a durable backend is configured.
    pub fn is_durable(&self) -> bool {
        self.primary.is_some()
    }

    fn note_fallback(op: &str, err: &swb_domain::error::Error) {
        tracing::warn!(op, error = %err, "durable store unreachable, using in-process fallback");
        TraceEvent::StoreFallback {
            op: op.to_owned(),
            error: err.to_string(),
        }
        .emit();
    }
}

#[async_trait]
impl KvStore for FallbackKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(primary) = &self.primary {
            match primary.get(key).await {
                Ok(v) => return Ok(v),
                Err(e) => Self::note_fallback("get", &e),
            }
        }
        self.twin.get(key).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        if let Some(primary) = &self.primary {
            match primary.put(key, value, ttl).await {
                Ok(()) => return Ok(()),
                Err(e) => Self::note_fallback("put", &e),
            }
        }
        self.twin.put(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        if let Some(primary) = &self.primary {
            match primary.delete(key).await {
                Ok(existed) => {
                    // Also clear any twin copy written during an outage.
                    let _ = self.twin.delete(key).await;
                    return Ok(existed);
                }
                Err(e) => Self::note_fallback("delete", &e),
            }
        }
        self.twin.delete(key).await
    }

    async fn claim(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        if let Some(primary) = &self.primary {
            match primary.claim(key, value, ttl).await {
                Ok(created) => return Ok(created),
                Err(e) => Self::note_fallback("claim", &e),
            }
        }
        self.twin.claim(key, value, ttl).await
    }
}

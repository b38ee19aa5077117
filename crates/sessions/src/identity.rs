//! Identity reconciliation — map transient browser sessions onto the
//! durable visitor identity.
//!
//! A visitor who reloads the page arrives with a fresh session id but the
//! same durable visitor id.  `bind` records `session → visitor` and keeps
//! the visitor's current-session pointer fresh so outbound routing (and an
//! active agent connection) follows the visitor to its newest session.
//! Both entries carry the bounded session-mapping TTL.

use std::sync::Arc;
use std::time::Duration;

use swb_domain::error::Result;
use swb_domain::trace::TraceEvent;
use swb_store::KvStore;

fn session_key(session: &str) -> String {
    format!("session:{session}")
}

fn current_session_key(visitor: &str) -> String {
    format!("visitor:{visitor}:session")
}

/// Resolves transient session ids to durable visitor ids.
pub struct IdentityReconciler {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl IdentityReconciler {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Record (or overwrite) the live `session → visitor` mapping and
    /// update the visitor's current-session pointer.
    pub async fn bind(&self, session: &str, visitor: &str) -> Result<()> {
        let superseded = self.current_session(visitor).await?;

        self.kv
            .put(&session_key(session), visitor, Some(self.ttl))
            .await?;
        self.kv
            .put(&current_session_key(visitor), session, Some(self.ttl))
            .await?;

        if superseded.as_deref() != Some(session) {
            TraceEvent::IdentityBound {
                session_id: session.to_owned(),
                visitor_id: visitor.to_owned(),
                superseded,
            }
            .emit();
        }
        Ok(())
    }

    /// Look up the visitor a session belongs to, if any.
    pub async fn resolve(&self, session: &str) -> Result<Option<String>> {
        self.kv.get(&session_key(session)).await
    }

    /// The visitor's newest session id, used for outbound routing.
    pub async fn current_session(&self, visitor: &str) -> Result<Option<String>> {
        self.kv.get(&current_session_key(visitor)).await
    }

    /// Resolve an identifier that may be either a session id or already a
    /// visitor id (agent-side events arrive keyed by either).  Unknown
    /// identifiers pass through unchanged as a degraded standalone
    /// identity.
    pub async fn resolve_or_self(&self, id: &str) -> Result<String> {
        Ok(self.resolve(id).await?.unwrap_or_else(|| id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swb_store::MemoryKv;

    fn reconciler() -> IdentityReconciler {
        IdentityReconciler::new(Arc::new(MemoryKv::new()), Duration::from_secs(86_400))
    }

    #[tokio::test]
    async fn bind_then_resolve() {
        let ids = reconciler();
        ids.bind("s1", "v1").await.unwrap();
        assert_eq!(ids.resolve("s1").await.unwrap().as_deref(), Some("v1"));
        assert_eq!(
            ids.current_session("v1").await.unwrap().as_deref(),
            Some("s1")
        );
    }

    #[tokio::test]
    async fn reconnect_supersedes_session_pointer() {
        let ids = reconciler();
        ids.bind("s1", "v1").await.unwrap();
        ids.bind("s2", "v1").await.unwrap();

        // Routing follows the newest session; the old mapping remains
        // valid for late claims keyed by the stale session id.
        assert_eq!(
            ids.current_session("v1").await.unwrap().as_deref(),
            Some("s2")
        );
        assert_eq!(ids.resolve("s1").await.unwrap().as_deref(), Some("v1"));
        assert_eq!(ids.resolve("s2").await.unwrap().as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn unknown_session_resolves_none() {
        let ids = reconciler();
        assert!(ids.resolve("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolve_or_self_passes_visitor_ids_through() {
        let ids = reconciler();
        ids.bind("s1", "v1").await.unwrap();
        assert_eq!(ids.resolve_or_self("s1").await.unwrap(), "v1");
        assert_eq!(ids.resolve_or_self("v1").await.unwrap(), "v1");
    }
}

//! In-process implementation of [`KvStore`].
//!
//! Backs the degraded mode when the durable store is unreachable, and
//! single-instance deployments that run without one.  Expiry is lazy: an
//! entry past its deadline reads as absent and is purged on access.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use swb_domain::error::Result;

use crate::kv::KvStore;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if now >= deadline)
    }
}

/// Process-scoped key-value map with TTL support.
///
/// `claim` holds the map lock across the existence check and the insert,
/// which makes it atomic with respect to every other claim in this process.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let entry = Entry {
            value: value.to_owned(),
            expires_at: ttl.map(|t| Instant::now() + t),
        };
        self.entries.lock().insert(key.to_owned(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.remove(key) {
            Some(entry) => Ok(!entry.is_expired(now)),
            None => Ok(false),
        }
    }

    async fn claim(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if let Some(existing) = entries.get(key) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
            entries.remove(key);
        }

        entries.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires_at: ttl.map(|t| now + t),
            },
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let kv = MemoryKv::new();
        kv.put("k", "v", None).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let kv = MemoryKv::new();
        assert!(kv.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entry_reads_absent() {
        let kv = MemoryKv::new();
        kv.put("k", "v", Some(Duration::from_millis(10))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(kv.get("k").await.unwrap().is_none());
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let kv = MemoryKv::new();
        kv.put("k", "v", None).await.unwrap();
        assert!(kv.delete("k").await.unwrap());
        assert!(!kv.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn claim_wins_once() {
        let kv = MemoryKv::new();
        assert!(kv.claim("k", "first", None).await.unwrap());
        assert!(!kv.claim("k", "second", None).await.unwrap());
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn claim_succeeds_over_expired_entry() {
        let kv = MemoryKv::new();
        kv.put("k", "old", Some(Duration::from_millis(10))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(kv.claim("k", "new", None).await.unwrap());
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn concurrent_claims_single_winner() {
        let kv = Arc::new(MemoryKv::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let kv = kv.clone();
            handles.push(tokio::spawn(async move {
                kv.claim("race", &format!("agent-{i}"), None).await.unwrap()
            }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}

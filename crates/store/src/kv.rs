//! The `KvStore` trait defines the interface for all Switchboard storage
//! backends (REST, in-process, fallback-wrapped, test doubles).

use std::time::Duration;

use async_trait::async_trait;
use swb_domain::error::Result;

/// Abstraction over the durable key-value store.
///
/// Values are opaque strings (the callers serialize records as JSON).
/// All methods return `swb_domain::error::Result`.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a value.  Expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any existing one.  `ttl = None` keeps the
    /// entry until deleted.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Delete a key.  Returns `true` if an entry existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Atomically create the entry only if the key is absent.  Returns
    /// `true` if this call created it.  This is the single compare-and-set
    /// primitive the claim race relies on — implementations must not
    /// emulate it with a read followed by a write.
    async fn claim(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool>;
}

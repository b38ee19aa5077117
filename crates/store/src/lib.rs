//! Key-value store adapter for Switchboard.
//!
//! The orchestrator keeps all per-visitor records (conversation state,
//! identity mappings, pending requests, active connections) behind the
//! [`KvStore`] trait: a TTL-capable key/value surface with one atomic
//! `claim` (create-if-absent) primitive.  Backends: the REST client for the
//! durable store service, an in-process map, and a wrapper that degrades
//! from the former to the latter when the service is unreachable.

pub mod fallback;
pub mod kv;
pub mod memory;
pub mod rest;

pub use fallback::FallbackKv;
pub use kv::KvStore;
pub use memory::MemoryKv;
pub use rest::RestKvClient;

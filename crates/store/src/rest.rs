//! REST implementation of [`KvStore`].
//!
//! `RestKvClient` wraps a `reqwest::Client` and translates every trait
//! method into the corresponding HTTP call against the durable store
//! service, with automatic retry + exponential back-off on transient
//! (5xx / timeout) failures.  The service owns the conditional write behind
//! `claim` — the client never emulates it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use swb_domain::config::StoreConfig;
use swb_domain::error::{Error, Result};
use uuid::Uuid;

use crate::kv::KvStore;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Serialize)]
struct WriteBody<'a> {
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl_ms: Option<u64>,
}

#[derive(Deserialize)]
struct ValueBody {
    value: String,
}

#[derive(Deserialize)]
struct DeleteBody {
    deleted: bool,
}

#[derive(Deserialize)]
struct ClaimBody {
    created: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST-based client for the durable key-value service.
///
/// Created once and reused for the lifetime of the process.  The
/// underlying `reqwest::Client` maintains a connection pool.
#[derive(Debug, Clone)]
pub struct RestKvClient {
    http: Client,
    base_url: String,
    max_retries: u32,
}

impl RestKvClient {
    /// Build a new client from the shared `StoreConfig`.
    ///
    /// Fails with `Error::Config` when no `base_url` is configured.
    pub fn new(cfg: &StoreConfig) -> Result<Self> {
        let base_url = cfg
            .base_url
            .as_deref()
            .ok_or_else(|| Error::Config("store.base_url is not set".into()))?
            .trim_end_matches('/')
            .to_owned();

        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            max_retries: cfg.max_retries,
        })
    }

    fn url(&self, key: &str) -> String {
        format!("{}/kv/{key}", self.base_url)
    }

    /// Decorate a `RequestBuilder` with the standard Switchboard headers.
    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.header("X-Client-Type", "switchboard")
            .header("X-Trace-Id", Uuid::new_v4().to_string())
    }

    /// Execute a request with retry + exponential back-off on transient
    /// errors.
    ///
    /// * Retries on 5xx status codes and on timeouts.
    /// * Does **not** retry on 4xx; 404 passes through as a success so
    ///   callers can interpret "absent".
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let rb = self.decorate(build_request());
            match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_server_error() {
                        // 5xx — transient, retry
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::Store(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                        continue;
                    }

                    if status.is_client_error() && status != StatusCode::NOT_FOUND {
                        // 4xx — permanent, do NOT retry
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::Store(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    last_err = Some(from_reqwest(e));
                    // Timeouts and connection errors are transient — retry
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Store(format!("{endpoint}: all retries exhausted"))))
    }
}

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl KvStore for RestKvClient {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let url = self.url(key);
        let resp = self
            .execute_with_retry("GET /kv", || self.http.get(&url))
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = resp.text().await.map_err(from_reqwest)?;
        let parsed: ValueBody = serde_json::from_str(&body)
            .map_err(|e| Error::Store(format!("failed to parse get response: {e}: {body}")))?;
        Ok(Some(parsed.value))
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let url = self.url(key);
        let body = WriteBody {
            value,
            ttl_ms: ttl.map(|t| t.as_millis() as u64),
        };
        self.execute_with_retry("PUT /kv", || self.http.put(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let url = self.url(key);
        let resp = self
            .execute_with_retry("DELETE /kv", || self.http.delete(&url))
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        let body = resp.text().await.map_err(from_reqwest)?;
        let parsed: DeleteBody = serde_json::from_str(&body)
            .map_err(|e| Error::Store(format!("failed to parse delete response: {e}: {body}")))?;
        Ok(parsed.deleted)
    }

    async fn claim(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        let url = format!("{}/claim", self.url(key));
        let body = WriteBody {
            value,
            ttl_ms: ttl.map(|t| t.as_millis() as u64),
        };
        let resp = self
            .execute_with_retry("POST /kv/claim", || self.http.post(&url).json(&body))
            .await?;

        let body = resp.text().await.map_err(from_reqwest)?;
        let parsed: ClaimBody = serde_json::from_str(&body)
            .map_err(|e| Error::Store(format!("failed to parse claim response: {e}: {body}")))?;
        Ok(parsed.created)
    }
}

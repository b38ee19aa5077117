//! Notification surface — the human-agent channel handoff requests are
//! published to.
//!
//! The coordinator only ever holds the opaque handle returned by
//! `publish` and uses it for in-place updates and thread replies.  Accept
//! and end button-clicks travel back through the gateway's agent
//! endpoints, not through this client.

use async_trait::async_trait;
use serde::Deserialize;
use swb_domain::config::SurfaceConfig;
use swb_domain::error::{Error, Result};

use crate::http::{execute_with_retry, from_reqwest};

/// Outbound surface operations the coordinator relies on.
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    /// Post a new message; returns the surface's opaque handle.
    async fn publish(&self, content: &str) -> Result<String>;

    /// Replace the message behind `handle` in place.
    async fn update(&self, handle: &str, content: &str) -> Result<()>;

    /// Append to the message's thread.
    async fn notify_thread(&self, handle: &str, content: &str) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message content
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn request_content(summary: &str) -> String {
    format!("New handoff request\n> {summary}\nWaiting for an agent.")
}

pub fn waiting_content(summary: &str, waited_secs: i64) -> String {
    format!("New handoff request\n> {summary}\nWaiting for {waited_secs}s.")
}

pub fn connected_content(agent_name: &str, summary: &str, connected_secs: i64) -> String {
    let mins = connected_secs / 60;
    format!("{agent_name} is connected ({mins}m)\n> {summary}")
}

pub fn ended_content(agent_name: &str, duration_secs: i64, reason: &str) -> String {
    let mins = duration_secs / 60;
    format!("Conversation ended after {mins}m ({agent_name}, {reason}).")
}

pub fn timeout_content(summary: &str) -> String {
    format!("Handoff request expired unanswered.\n> {summary}")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// REST client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
struct PublishBody {
    handle: String,
}

/// REST client for the notification surface connector.
#[derive(Debug, Clone)]
pub struct RestSurfaceClient {
    http: reqwest::Client,
    base_url: String,
    channel: String,
    max_retries: u32,
}

impl RestSurfaceClient {
    pub fn new(cfg: &SurfaceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            channel: cfg.channel.clone(),
            max_retries: cfg.max_retries,
        })
    }
}

#[async_trait]
impl NotificationSurface for RestSurfaceClient {
    async fn publish(&self, content: &str) -> Result<String> {
        let url = format!("{}/messages", self.base_url);
        let body = serde_json::json!({ "channel": self.channel, "content": content });
        let resp = execute_with_retry("POST /messages", self.max_retries, || {
            self.http.post(&url).json(&body)
        })
        .await?;

        let raw = resp.text().await.map_err(from_reqwest)?;
        let parsed: PublishBody = serde_json::from_str(&raw)
            .map_err(|e| Error::Http(format!("failed to parse publish response: {e}: {raw}")))?;
        Ok(parsed.handle)
    }

    async fn update(&self, handle: &str, content: &str) -> Result<()> {
        let url = format!("{}/messages/{handle}", self.base_url);
        let body = serde_json::json!({ "content": content });
        execute_with_retry("PATCH /messages", self.max_retries, || {
            self.http.patch(&url).json(&body)
        })
        .await?;
        Ok(())
    }

    async fn notify_thread(&self, handle: &str, content: &str) -> Result<()> {
        let url = format!("{}/messages/{handle}/thread", self.base_url);
        let body = serde_json::json!({ "content": content });
        execute_with_retry("POST /messages/thread", self.max_retries, || {
            self.http.post(&url).json(&body)
        })
        .await?;
        Ok(())
    }
}

//! Automated responder — the external generation service the orchestrator
//! calls while no human is connected.
//!
//! The orchestrator never interprets the returned text beyond scanning it
//! for the out-of-band markers (see `markers`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use swb_domain::config::ResponderConfig;
use swb_domain::error::{Error, Result};
use swb_sessions::ConversationState;

use crate::http::{execute_with_retry, from_reqwest};

/// Context shipped to the responder for one turn.
#[derive(Debug, Clone, Serialize)]
pub struct ResponderContext {
    pub visitor_id: String,
    pub session_id: String,
    pub message: String,
    /// Whether the current turn may offer a human handoff.
    pub offer_handoff: bool,
    /// Inside the configured business-hours window (messaging only).
    pub business_hours: bool,
}

#[async_trait]
pub trait Responder: Send + Sync {
    /// Generate the reply for the current mode.  The text may carry the
    /// lead-captured or escape markers.
    async fn generate(&self, mode: ConversationState, ctx: &ResponderContext) -> Result<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// REST client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Serialize)]
struct GenerateRequest<'a> {
    mode: String,
    #[serde(flatten)]
    ctx: &'a ResponderContext,
}

#[derive(Deserialize)]
struct GenerateResponse {
    text: String,
}

/// REST client for the responder service.
#[derive(Debug, Clone)]
pub struct RestResponderClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl RestResponderClient {
    pub fn new(cfg: &ResponderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            max_retries: cfg.max_retries,
        })
    }
}

#[async_trait]
impl Responder for RestResponderClient {
    async fn generate(&self, mode: ConversationState, ctx: &ResponderContext) -> Result<String> {
        let url = format!("{}/v1/generate", self.base_url);
        let body = GenerateRequest {
            mode: mode.to_string(),
            ctx,
        };
        let resp = execute_with_retry("POST /v1/generate", self.max_retries, || {
            self.http.post(&url).json(&body)
        })
        .await?;

        let raw = resp.text().await.map_err(from_reqwest)?;
        let parsed: GenerateResponse = serde_json::from_str(&raw)
            .map_err(|e| Error::Http(format!("failed to parse generate response: {e}: {raw}")))?;
        Ok(parsed.text)
    }
}

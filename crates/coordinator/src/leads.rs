//! Lead dispatch — ship captured contact details to the configured
//! webhook, fire-and-forget.
//!
//! Durable lead storage lives behind an external append-only log; the
//! orchestrator only posts and forgets.  Failures are logged, never
//! surfaced to the visitor's turn.

use chrono::Utc;
use swb_domain::trace::TraceEvent;

use crate::markers::Lead;

const MAX_ATTEMPTS: u32 = 3;

/// Post a captured lead to the webhook, if one is configured.
pub fn dispatch_lead(webhook_url: Option<&str>, visitor_id: &str, lead: &Lead) {
    TraceEvent::LeadCaptured {
        visitor_id: visitor_id.to_owned(),
    }
    .emit();

    let Some(url) = webhook_url else {
        return;
    };

    let url = url.to_owned();
    let payload = serde_json::json!({
        "visitor_id": visitor_id,
        "first_name": lead.first_name,
        "last_name": lead.last_name,
        "email": lead.email,
        "phone": lead.phone,
        "captured_at": Utc::now(),
    });

    tokio::spawn(async move {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        for attempt in 1..=MAX_ATTEMPTS {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => return,
                Ok(resp) => {
                    tracing::warn!(attempt, status = %resp.status(), "lead webhook rejected");
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "lead webhook unreachable");
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(200 * attempt as u64)).await;
        }
        tracing::error!(url, "lead webhook delivery failed after {MAX_ATTEMPTS} attempts");
    });
}

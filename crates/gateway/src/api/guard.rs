//! Agent auth guard — `AgentGuard` Axum extractor.
//!
//! Handlers for the agent-facing endpoints opt in by adding
//! `_guard: AgentGuard` to their parameter list.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Json;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Axum extractor that enforces the agent bearer token.
///
/// Uses SHA-256 + constant-time comparison to prevent timing
/// side-channel attacks.  If the token env var is not configured (dev
/// mode), all requests pass.
pub struct AgentGuard;

#[async_trait]
impl FromRequestParts<AppState> for AgentGuard {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected_hash = match &state.agent_token_hash {
            Some(h) => h,
            None => return Ok(AgentGuard), // no token configured → dev mode, allow all
        };

        let provided = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");

        // Hash the provided token to a fixed-length digest, then compare
        // in constant time.  This avoids leaking the token length.
        let provided_hash = Sha256::digest(provided.as_bytes());

        if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "invalid agent token" })),
            ));
        }
        Ok(AgentGuard)
    }
}

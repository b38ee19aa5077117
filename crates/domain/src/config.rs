use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub handoff: HandoffConfig,
    #[serde(default)]
    pub business_hours: BusinessHoursConfig,
    #[serde(default)]
    pub leads: LeadsConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_8090")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    /// Environment variable holding the bearer token for the agent-facing
    /// endpoints (`/v1/agent/*`).  If the env var is set and non-empty,
    /// those endpoints require `Authorization: Bearer <token>`.  If unset,
    /// the server logs a warning and allows unauthenticated access.
    #[serde(default = "d_agent_token_env")]
    pub agent_token_env: String,
    #[serde(default = "d_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8090,
            host: "127.0.0.1".into(),
            agent_token_env: d_agent_token_env(),
            allowed_origins: d_origins(),
        }
    }
}

fn d_8090() -> u16 {
    8090
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_agent_token_env() -> String {
    "SWB_AGENT_TOKEN".into()
}
fn d_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Durable store connection + record TTLs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the durable key-value service.  `None` runs on the
    /// in-process store only (no cross-restart durability).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "d_5000")]
    pub timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
    /// TTL for the session → visitor mapping (24h).
    #[serde(default = "d_86400")]
    pub session_ttl_secs: u64,
    /// TTL for the conversation-state record (1h).
    #[serde(default = "d_3600")]
    pub conversation_ttl_secs: u64,
    /// TTL for a pending handoff request (10m).
    #[serde(default = "d_600")]
    pub pending_ttl_secs: u64,
    /// TTL for an active agent connection (1h).  Set once at creation; the
    /// inactivity timer, not TTL renewal, reclaims idle connections.
    #[serde(default = "d_3600")]
    pub connection_ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 5_000,
            max_retries: 2,
            session_ttl_secs: 86_400,
            conversation_ttl_secs: 3_600,
            pending_ttl_secs: 600,
            connection_ttl_secs: 3_600,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Automated responder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    #[serde(default = "d_responder_url")]
    pub base_url: String,
    #[serde(default = "d_15000")]
    pub timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            base_url: d_responder_url(),
            timeout_ms: 15_000,
            max_retries: 2,
        }
    }
}

fn d_responder_url() -> String {
    "http://127.0.0.1:8091".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Notification surface (agent channel)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    #[serde(default = "d_surface_url")]
    pub base_url: String,
    /// Channel identifier the surface posts handoff requests into.
    #[serde(default = "d_channel")]
    pub channel: String,
    #[serde(default = "d_5000")]
    pub timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            base_url: d_surface_url(),
            channel: d_channel(),
            timeout_ms: 5_000,
            max_retries: 2,
        }
    }
}

fn d_surface_url() -> String {
    "http://127.0.0.1:8092".into()
}
fn d_channel() -> String {
    "handoffs".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handoff policy + timers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Minimum interval between successive live handoffs for one visitor.
    #[serde(default = "d_3600")]
    pub cooldown_secs: u64,
    /// How long a published request waits for an agent before reclamation.
    #[serde(default = "d_600000")]
    pub request_timeout_ms: u64,
    /// How long a connected visitor may stay silent before reclamation.
    #[serde(default = "d_1800000")]
    pub inactivity_timeout_ms: u64,
    /// Interval for in-place waiting-time updates on the published request.
    #[serde(default = "d_30000")]
    pub waiting_tick_ms: u64,
    /// Interval for in-place duration updates on the connected message.
    #[serde(default = "d_300000")]
    pub duration_tick_ms: u64,
    /// Cap on the conversation summary attached to a published request.
    #[serde(default = "d_summary_chars")]
    pub summary_max_chars: usize,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 3_600,
            request_timeout_ms: 600_000,
            inactivity_timeout_ms: 1_800_000,
            waiting_tick_ms: 30_000,
            duration_tick_ms: 300_000,
            summary_max_chars: 600,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Business hours (affordances only — never gates eligibility)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHoursConfig {
    /// IANA timezone name the open/close hours are evaluated in.
    #[serde(default = "d_tz")]
    pub timezone: String,
    #[serde(default = "d_9")]
    pub open_hour: u8,
    #[serde(default = "d_18")]
    pub close_hour: u8,
    /// When true (the default), Saturday and Sunday are always closed.
    #[serde(default = "d_true")]
    pub weekdays_only: bool,
}

impl Default for BusinessHoursConfig {
    fn default() -> Self {
        Self {
            timezone: d_tz(),
            open_hour: 9,
            close_hour: 18,
            weekdays_only: true,
        }
    }
}

fn d_tz() -> String {
    "America/New_York".into()
}
fn d_9() -> u8 {
    9
}
fn d_18() -> u8 {
    18
}
fn d_true() -> bool {
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lead sink
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LeadsConfig {
    /// Webhook URL captured leads are dispatched to (fire-and-forget).
    /// `None` disables dispatch; leads are still traced.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

// ── shared default fns ───────────────────────────────────────────────

fn d_2() -> u32 {
    2
}
fn d_600() -> u64 {
    600
}
fn d_summary_chars() -> usize {
    600
}
fn d_3600() -> u64 {
    3_600
}
fn d_86400() -> u64 {
    86_400
}
fn d_5000() -> u64 {
    5_000
}
fn d_15000() -> u64 {
    15_000
}
fn d_30000() -> u64 {
    30_000
}
fn d_300000() -> u64 {
    300_000
}
fn d_600000() -> u64 {
    600_000
}
fn d_1800000() -> u64 {
    1_800_000
}

/// Shared error type used across all Switchboard crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A state-machine setter was handed a transition outside the legal
    /// graph.  State is left unchanged.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidState { from: String, to: String },

    /// An agent tried to claim a visitor another agent already holds.
    /// Expected under concurrent accepts — a normal negative result.
    #[error("already claimed by {agent_name} ({agent_id})")]
    AlreadyClaimed { agent_id: String, agent_name: String },

    /// A claim or end referenced a visitor with no matching record.
    #[error("not found: {0}")]
    NotFound(String),

    /// The durable store rejected or failed an operation.  Callers of the
    /// fallback-wrapped store never see this variant.
    #[error("store: {0}")]
    Store(String),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Out-of-band markers the responder embeds in generated text.
//!
//! Two markers exist: `[LEAD_CAPTURED: first, last, email, phone]` when
//! all four contact fields were collected, and `[LEAD_ESCAPE]` when the
//! visitor refuses to continue providing details.  A lead payload with
//! fewer than four comma-separated fields reads as "no lead captured",
//! never as an error.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const ESCAPE_MARKER: &str = "[LEAD_ESCAPE]";

fn lead_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[LEAD_CAPTURED:\s*([^\]]*)\]").unwrap())
}

/// The four contact fields, extracted verbatim in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lead {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

/// Scan responder output for a lead marker.
pub fn extract_lead(text: &str) -> Option<Lead> {
    let captures = lead_re().captures(text)?;
    let payload = captures.get(1)?.as_str();

    let fields: Vec<&str> = payload.split(',').map(str::trim).collect();
    if fields.len() < 4 {
        tracing::debug!(fields = fields.len(), "malformed lead marker, ignoring");
        return None;
    }

    Some(Lead {
        first_name: fields[0].to_owned(),
        last_name: fields[1].to_owned(),
        email: fields[2].to_owned(),
        phone: fields[3].to_owned(),
    })
}

/// True when the responder signalled that the visitor refuses to continue.
pub fn has_escape(text: &str) -> bool {
    text.contains(ESCAPE_MARKER)
}

/// Remove both markers from the text shown to the visitor.
pub fn strip_markers(text: &str) -> String {
    let without_lead = lead_re().replace_all(text, "");
    without_lead.replace(ESCAPE_MARKER, "").trim().to_owned()
}

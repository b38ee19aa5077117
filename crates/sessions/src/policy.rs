//! Handoff eligibility — cooldown, prior-offer, and business-hours rules.
//!
//! Callback requests never pass through this policy; they take their own
//! unconditional transition path in the orchestrator.  Business hours are
//! a pure wall-clock predicate surfaced for messaging/affordances only and
//! never gate eligibility.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

use swb_domain::config::BusinessHoursConfig;
use swb_domain::error::Result;

use crate::state::{ConversationState, ConversationStore};

/// Decides whether a new human-handoff offer is permitted now.
pub struct HandoffPolicy {
    convo: Arc<ConversationStore>,
    cooldown: chrono::Duration,
    hours: BusinessHoursConfig,
}

impl HandoffPolicy {
    pub fn new(convo: Arc<ConversationStore>, cooldown_secs: u64, hours: BusinessHoursConfig) -> Self {
        Self {
            convo,
            cooldown: chrono::Duration::seconds(cooldown_secs as i64),
            hours,
        }
    }

    /// Evaluate the rules in order for one visitor.
    ///
    /// 1. In `CallbackRequest`, `LeadCapture`, or `HumanConnected` the
    ///    caller should not be evaluating at all — returns `false`.
    /// 2. In `NormalChat`, stay put until the cooldown since the last live
    ///    handoff has elapsed; once elapsed, transition to
    ///    `SeekingHandoff` (starting a new episode) and continue.
    /// 3. No re-offer within one episode.
    pub async fn can_offer_handoff(&self, visitor: &str) -> Result<bool> {
        let record = self.convo.get(visitor).await?;

        let record = match record.state {
            ConversationState::CallbackRequest
            | ConversationState::LeadCapture
            | ConversationState::HumanConnected => return Ok(false),
            ConversationState::NormalChat => {
                // A visitor lands in NormalChat with no recorded handoff
                // after a lead was captured; there is no cooldown to wake
                // up from in that case.
                let Some(last) = record.last_live_handoff_at else {
                    return Ok(false);
                };
                if Utc::now().signed_duration_since(last) < self.cooldown {
                    return Ok(false);
                }
                self.convo
                    .set_state(visitor, ConversationState::SeekingHandoff)
                    .await?
            }
            ConversationState::SeekingHandoff => record,
        };

        Ok(!record.handoff_offered)
    }

    /// Pure wall-clock predicate: inside the configured weekday window?
    ///
    /// Alters messaging/affordances only — callers must not use it to
    /// gate eligibility.
    pub fn is_business_hours(&self, now: DateTime<Utc>) -> bool {
        let tz = Tz::from_str(&self.hours.timezone).unwrap_or(chrono_tz::UTC);
        let local = now.with_timezone(&tz);

        if self.hours.weekdays_only && local.weekday().number_from_monday() > 5 {
            return false;
        }
        let hour = local.hour() as u8;
        hour >= self.hours.open_hour && hour < self.hours.close_hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use chrono::TimeZone;
    use swb_store::{KvStore, MemoryKv};

    use crate::state::ConversationRecord;

    fn setup() -> (Arc<MemoryKv>, Arc<ConversationStore>, HandoffPolicy) {
        let kv = Arc::new(MemoryKv::new());
        let convo = Arc::new(ConversationStore::new(
            kv.clone(),
            StdDuration::from_secs(3_600),
        ));
        let policy = HandoffPolicy::new(convo.clone(), 3_600, BusinessHoursConfig::default());
        (kv, convo, policy)
    }

    /// Seed a conversation record directly in the store.
    async fn seed(
        kv: &MemoryKv,
        visitor: &str,
        state: ConversationState,
        offered: bool,
        last_handoff_mins_ago: Option<i64>,
    ) {
        let record = ConversationRecord {
            state,
            last_activity_at: Utc::now(),
            handoff_offered: offered,
            last_live_handoff_at: last_handoff_mins_ago
                .map(|m| Utc::now() - chrono::Duration::minutes(m)),
        };
        kv.put(
            &format!("convo:{visitor}"),
            &serde_json::to_string(&record).unwrap(),
            None,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn fresh_visitor_is_eligible() {
        let (_, _, policy) = setup();
        assert!(policy.can_offer_handoff("v1").await.unwrap());
    }

    #[tokio::test]
    async fn collecting_states_skip_evaluation() {
        let (kv, _, policy) = setup();
        for state in [
            ConversationState::CallbackRequest,
            ConversationState::LeadCapture,
            ConversationState::HumanConnected,
        ] {
            seed(&kv, "v1", state, false, None).await;
            assert!(!policy.can_offer_handoff("v1").await.unwrap(), "{state}");
        }
    }

    #[tokio::test]
    async fn cooldown_not_elapsed_at_59m() {
        let (kv, convo, policy) = setup();
        seed(&kv, "v1", ConversationState::NormalChat, false, Some(59)).await;

        assert!(!policy.can_offer_handoff("v1").await.unwrap());
        let record = convo.get("v1").await.unwrap();
        assert_eq!(record.state, ConversationState::NormalChat);
    }

    #[tokio::test]
    async fn cooldown_elapsed_at_61m() {
        let (kv, convo, policy) = setup();
        seed(&kv, "v1", ConversationState::NormalChat, true, Some(61)).await;

        assert!(policy.can_offer_handoff("v1").await.unwrap());
        // The cooldown wake-up started a new episode.
        let record = convo.get("v1").await.unwrap();
        assert_eq!(record.state, ConversationState::SeekingHandoff);
        assert!(!record.handoff_offered);
    }

    #[tokio::test]
    async fn normal_chat_without_prior_handoff_stays_put() {
        let (kv, convo, policy) = setup();
        seed(&kv, "v1", ConversationState::NormalChat, false, None).await;

        assert!(!policy.can_offer_handoff("v1").await.unwrap());
        let record = convo.get("v1").await.unwrap();
        assert_eq!(record.state, ConversationState::NormalChat);
    }

    #[tokio::test]
    async fn no_reoffer_within_episode() {
        let (kv, _, policy) = setup();
        seed(&kv, "v1", ConversationState::SeekingHandoff, true, None).await;
        assert!(!policy.can_offer_handoff("v1").await.unwrap());
    }

    #[test]
    fn business_hours_weekday_noon_open() {
        let (_, _, policy) = setup();
        // Wednesday 2026-03-04 noon America/New_York == 17:00 UTC.
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 17, 0, 0).unwrap();
        assert!(policy.is_business_hours(now));
    }

    #[test]
    fn business_hours_sunday_closed() {
        let (_, _, policy) = setup();
        // Sunday 2026-03-08 noon in New York.
        let now = Utc.with_ymd_and_hms(2026, 3, 8, 17, 0, 0).unwrap();
        assert!(!policy.is_business_hours(now));
    }

    #[test]
    fn business_hours_early_morning_closed() {
        let (_, _, policy) = setup();
        // Wednesday 2026-03-04 06:00 in New York == 11:00 UTC.
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 11, 0, 0).unwrap();
        assert!(!policy.is_business_hours(now));
    }
}

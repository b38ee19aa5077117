//! Lifecycle tests for the assignment coordinator: request → claim →
//! end, the claim race, timeout/inactivity reclamation, and reconnects.

mod common;

use std::time::Duration;

use common::fixture;
use swb_coordinator::{RequestOutcome, TimerKind, VisitorEvent};
use swb_domain::error::Error;
use swb_sessions::ConversationState;

#[tokio::test]
async fn request_then_claim_creates_single_connection() {
    let fx = fixture();
    fx.ids.bind("s1", "v1").await.unwrap();

    let outcome = fx
        .coordinator
        .request_handoff("v1", "s1", "needs pricing help")
        .await
        .unwrap();
    assert_eq!(outcome, RequestOutcome::Requested);
    assert_eq!(fx.surface.published.lock().len(), 1);

    let conn = fx.coordinator.claim("v1", "a1", "Dana").await.unwrap();
    assert_eq!(conn.agent_id, "a1");
    assert_eq!(conn.session_id, "s1");

    // The pending request is consumed and the visitor is connected.
    assert!(fx.coordinator.pending("v1").await.unwrap().is_none());
    let record = fx.convo.get("v1").await.unwrap();
    assert_eq!(record.state, ConversationState::HumanConnected);

    let events = fx.transport.for_session("s1");
    assert!(events
        .iter()
        .any(|e| matches!(e, VisitorEvent::AgentConnected { agent_name } if agent_name == "Dana")));
}

#[tokio::test]
async fn repeated_request_updates_pointer_without_duplicates() {
    let fx = fixture();
    fx.coordinator
        .request_handoff("v1", "s1", "first ask")
        .await
        .unwrap();

    // Visitor reloads and asks again from a fresh session.
    let outcome = fx
        .coordinator
        .request_handoff("v1", "s2", "first ask")
        .await
        .unwrap();
    assert_eq!(outcome, RequestOutcome::StillPending);

    assert_eq!(fx.surface.published.lock().len(), 1, "no duplicate publish");
    assert_eq!(fx.timers.live_count("v1"), 2, "no duplicate timers");
    let pending = fx.coordinator.pending("v1").await.unwrap().unwrap();
    assert_eq!(pending.session_id, "s2");
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let fx = fixture();
    fx.coordinator
        .request_handoff("v1", "s1", "race me")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let coordinator = fx.coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .claim("v1", &format!("a{i}"), &format!("Agent {i}"))
                .await
        }));
    }

    let mut winners = Vec::new();
    let mut losers = Vec::new();
    for h in handles {
        match h.await.unwrap() {
            Ok(conn) => winners.push(conn),
            Err(e) => losers.push(e),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one claim succeeds");
    assert_eq!(losers.len(), 7);

    // Every loser is told who holds the visitor.
    let winner_id = &winners[0].agent_id;
    for err in losers {
        match err {
            Error::AlreadyClaimed { agent_id, .. } => assert_eq!(&agent_id, winner_id),
            other => panic!("expected AlreadyClaimed, got {other}"),
        }
    }
}

#[tokio::test]
async fn claim_without_pending_request_is_not_found() {
    let fx = fixture();
    let err = fx.coordinator.claim("ghost", "a1", "Dana").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn claim_resolves_stale_session_identifier() {
    let fx = fixture();
    fx.ids.bind("s1", "v1").await.unwrap();
    fx.coordinator
        .request_handoff("v1", "s1", "hello")
        .await
        .unwrap();

    // The accept event arrives keyed by the legacy session id.
    let conn = fx.coordinator.claim("s1", "a1", "Dana").await.unwrap();
    assert_eq!(conn.visitor_id, "v1");
}

#[tokio::test]
async fn second_claim_reports_holder() {
    let fx = fixture();
    fx.coordinator
        .request_handoff("v1", "s1", "hello")
        .await
        .unwrap();
    fx.coordinator.claim("v1", "a1", "Dana").await.unwrap();

    let err = fx.coordinator.claim("v1", "a2", "Lee").await.unwrap_err();
    match err {
        Error::AlreadyClaimed {
            agent_id,
            agent_name,
        } => {
            assert_eq!(agent_id, "a1");
            assert_eq!(agent_name, "Dana");
        }
        other => panic!("expected AlreadyClaimed, got {other}"),
    }
}

#[tokio::test]
async fn unclaimed_request_times_out_exactly_once() {
    let fx = fixture();
    fx.coordinator
        .request_handoff("v1", "s1", "anyone there")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(fx.coordinator.pending("v1").await.unwrap().is_none());
    let record = fx.convo.get("v1").await.unwrap();
    assert_eq!(record.state, ConversationState::SeekingHandoff);

    let timeouts = fx
        .transport
        .for_session("s1")
        .iter()
        .filter(|e| matches!(e, VisitorEvent::HandoffTimeout))
        .count();
    assert_eq!(timeouts, 1);
    assert_eq!(fx.timers.live_count("v1"), 0);
}

#[tokio::test]
async fn claim_makes_late_timeout_firing_a_noop() {
    let fx = fixture();
    fx.coordinator
        .request_handoff("v1", "s1", "quick claim")
        .await
        .unwrap();
    fx.coordinator.claim("v1", "a1", "Dana").await.unwrap();

    // Even a timeout callback racing in now must find nothing to reclaim.
    fx.coordinator.reclaim_on_timeout("v1").await.unwrap();

    assert!(fx.coordinator.connection("v1").await.unwrap().is_some());
    let record = fx.convo.get("v1").await.unwrap();
    assert_eq!(record.state, ConversationState::HumanConnected);
    assert!(fx
        .transport
        .for_session("s1")
        .iter()
        .all(|e| !matches!(e, VisitorEvent::HandoffTimeout)));
}

#[tokio::test]
async fn silent_connected_visitor_is_reclaimed_once() {
    let fx = fixture();
    fx.coordinator
        .request_handoff("v1", "s1", "hello")
        .await
        .unwrap();
    fx.coordinator.claim("v1", "a1", "Dana").await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(fx.coordinator.connection("v1").await.unwrap().is_none());
    let record = fx.convo.get("v1").await.unwrap();
    assert_eq!(record.state, ConversationState::NormalChat);

    let disconnects: Vec<_> = fx
        .transport
        .for_session("s1")
        .into_iter()
        .filter(|e| matches!(e, VisitorEvent::AgentDisconnected { .. }))
        .collect();
    assert_eq!(disconnects.len(), 1);
    assert!(
        matches!(&disconnects[0], VisitorEvent::AgentDisconnected { reason } if reason == "inactivity")
    );
}

#[tokio::test]
async fn visitor_messages_keep_the_connection_alive() {
    let fx = fixture();
    fx.coordinator
        .request_handoff("v1", "s1", "hello")
        .await
        .unwrap();
    fx.coordinator.claim("v1", "a1", "Dana").await.unwrap();

    // Three messages, each inside the 80ms inactivity window, spanning
    // well past it in total.
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(40)).await;
        let routed = fx
            .coordinator
            .visitor_activity("v1", "s1", "still here")
            .await
            .unwrap();
        assert!(routed);
    }
    assert!(fx.coordinator.connection("v1").await.unwrap().is_some());

    // Silence now lets the timer fire.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(fx.coordinator.connection("v1").await.unwrap().is_none());

    // The messages reached the agent's thread.
    assert_eq!(fx.surface.threads.lock().len(), 3);
}

#[tokio::test]
async fn disconnect_while_waiting_keeps_request_and_timers() {
    let fx = fixture();
    fx.coordinator
        .request_handoff("v1", "s1", "hello")
        .await
        .unwrap();

    fx.coordinator.handle_visitor_disconnect("v1").await.unwrap();

    assert!(fx.coordinator.pending("v1").await.unwrap().is_some());
    assert_eq!(fx.timers.live_count("v1"), 2);
}

#[tokio::test]
async fn reconnect_while_waiting_updates_only_routing() {
    let fx = fixture();
    fx.ids.bind("s1", "v1").await.unwrap();
    fx.coordinator
        .request_handoff("v1", "s1", "hello")
        .await
        .unwrap();
    let events_before = fx.transport.events.lock().len();

    // New tab, new session, same visitor.
    fx.ids.bind("s2", "v1").await.unwrap();
    fx.coordinator.note_visitor_session("v1", "s2").await.unwrap();

    let pending = fx.coordinator.pending("v1").await.unwrap().unwrap();
    assert_eq!(pending.session_id, "s2");
    assert_eq!(fx.surface.published.lock().len(), 1);
    assert_eq!(
        fx.transport.events.lock().len(),
        events_before,
        "no notification re-sent for already-communicated state"
    );
}

#[tokio::test]
async fn reconnect_while_connected_resumes_same_agent() {
    let fx = fixture();
    fx.ids.bind("s1", "v1").await.unwrap();
    fx.coordinator
        .request_handoff("v1", "s1", "hello")
        .await
        .unwrap();
    fx.coordinator.claim("v1", "a1", "Dana").await.unwrap();

    fx.coordinator.handle_visitor_disconnect("v1").await.unwrap();
    let marked = fx.coordinator.connection("v1").await.unwrap().unwrap();
    assert!(marked.pending_reclaim, "marked, not deleted");

    // Back on a fresh session: routing follows, the mark clears, and no
    // second connection appears.
    fx.ids.bind("s2", "v1").await.unwrap();
    let routed = fx
        .coordinator
        .visitor_activity("v1", "s2", "back again")
        .await
        .unwrap();
    assert!(routed);

    let conn = fx.coordinator.connection("v1").await.unwrap().unwrap();
    assert_eq!(conn.session_id, "s2");
    assert!(!conn.pending_reclaim);
    assert_eq!(conn.agent_id, "a1");
}

#[tokio::test]
async fn cooldown_anchor_is_the_claim_not_the_end() {
    let fx = fixture();
    fx.coordinator
        .request_handoff("v1", "s1", "hello")
        .await
        .unwrap();
    fx.coordinator.claim("v1", "a1", "Dana").await.unwrap();

    let at_claim = fx
        .convo
        .get("v1")
        .await
        .unwrap()
        .last_live_handoff_at
        .expect("stamped at claim");

    tokio::time::sleep(Duration::from_millis(20)).await;
    let duration = fx.coordinator.end_by_agent("v1").await.unwrap();
    assert!(duration >= 0);

    let record = fx.convo.get("v1").await.unwrap();
    assert_eq!(record.state, ConversationState::NormalChat);
    assert_eq!(record.last_live_handoff_at, Some(at_claim));
    assert_eq!(fx.timers.live_count("v1"), 0);
}

#[tokio::test]
async fn end_without_connection_is_not_found() {
    let fx = fixture();
    let err = fx.coordinator.end_by_agent("v1").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn waiting_ticker_updates_surface_in_place() {
    let fx = fixture();
    fx.coordinator
        .request_handoff("v1", "s1", "hello")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let updates = fx.surface.updates.lock();
    assert!(!updates.is_empty(), "waiting ticks update the notice");
    assert!(updates.iter().all(|(handle, _)| handle == "m0"));
    drop(updates);

    // And the visitor sees waiting progress.
    assert!(fx
        .transport
        .for_session("s1")
        .iter()
        .any(|e| matches!(e, VisitorEvent::AgentWaiting { .. })));

    // Cleanup so the timeout path doesn't outlive the test harness.
    fx.timers.cancel_all("v1");
}

#[tokio::test]
async fn relay_agent_message_reaches_current_session() {
    let fx = fixture();
    fx.ids.bind("s1", "v1").await.unwrap();
    fx.coordinator
        .request_handoff("v1", "s1", "hello")
        .await
        .unwrap();
    fx.coordinator.claim("v1", "a1", "Dana").await.unwrap();

    fx.coordinator
        .relay_agent_message("v1", "happy to help")
        .await
        .unwrap();

    assert!(fx.transport.for_session("s1").iter().any(|e| matches!(
        e,
        VisitorEvent::AgentMessage { agent_name, text }
            if agent_name == "Dana" && text == "happy to help"
    )));
}

#[tokio::test]
async fn summary_is_truncated_to_configured_cap() {
    let mut cfg = common::fast_handoff_cfg();
    cfg.summary_max_chars = 10;
    let fx = common::fixture_with(cfg);

    fx.coordinator
        .request_handoff("v1", "s1", "a very long conversation summary")
        .await
        .unwrap();

    let pending = fx.coordinator.pending("v1").await.unwrap().unwrap();
    assert_eq!(pending.summary, "a very lon");
    fx.timers.cancel_all("v1");
}

#[tokio::test]
async fn cancelling_timers_by_kind_is_independent() {
    let fx = fixture();
    fx.coordinator
        .request_handoff("v1", "s1", "hello")
        .await
        .unwrap();

    assert!(fx.timers.cancel("v1", TimerKind::WaitingTick));
    assert_eq!(fx.timers.live_count("v1"), 1);
    assert!(fx.timers.cancel("v1", TimerKind::HandoffTimeout));
    assert_eq!(fx.timers.live_count("v1"), 0);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Direct worker-path tests: one observation at a time through
//! `process_obs`, no background loops.

use super::helpers::*;
use crate::agent::FakeAgentMode;
use crate::memory::TurnStatus;
use axon_core::{Clock, Observation};
use axon_gate::{GateAction, ModelTier, Scene};
use serde_json::json;

#[tokio::test]
async fn user_message_invokes_agent_once_with_hint() {
    let h = harness();
    h.process(user_msg(&h.clock, "hi")).await;

    let requests = h.agent.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.decision.action, GateAction::Deliver);
    assert_eq!(request.decision.scene, Scene::Dialogue);
    assert!(request.decision.has_reason("user_dialogue_safe_valve"));
    let hint = request.hint.as_ref().unwrap();
    assert_eq!(hint.model_tier, ModelTier::Standard);

    // the echo reply went back out through the bus
    assert_eq!(h.metrics.snapshot().bus_published_total, 1);
}

#[tokio::test]
async fn agent_sourced_message_never_reinvokes_the_agent() {
    let h = harness();
    h.process(agent_msg(&h.clock, "ack: hi")).await;
    assert_eq!(h.agent.call_count(), 0);
    // it still counts as processed session traffic
    let state = h.session_state("dm:alice").unwrap();
    assert_eq!(state.lock().processed_total, 1);
}

#[tokio::test]
async fn empty_message_is_dropped_before_the_agent() {
    let h = harness();
    h.process(user_msg(&h.clock, "   ")).await;
    assert_eq!(h.agent.call_count(), 0);

    let gate = h.runtime.gate.lock();
    assert_eq!(gate.pools().drop.len(), 1);
    assert!(gate.pools().sink.is_empty());
}

#[tokio::test]
async fn duplicate_message_reaches_the_agent_once() {
    let h = harness();
    h.process(user_msg(&h.clock, "hi")).await;
    h.clock.advance_secs(5);
    h.process(user_msg(&h.clock, "hi")).await;

    assert_eq!(h.agent.call_count(), 1);
    let gate = h.runtime.gate.lock();
    assert_eq!(gate.pools().sink.len(), 1);
}

#[tokio::test]
async fn agent_failure_is_contained() {
    let h = harness();
    h.agent.set_mode(FakeAgentMode::Fail);
    let key = h.process(user_msg(&h.clock, "hi")).await;

    let state = h.session_state(&key).unwrap();
    assert_eq!(state.lock().error_total, 1);
    assert_eq!(h.metrics.agent_errors(), 1);
    // no reply was published
    assert_eq!(h.metrics.snapshot().bus_published_total, 0);

    let turns = h.memory.turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].status, Some(TurnStatus::Error));
    assert!(turns[0].error_message.as_deref().unwrap().contains("fake"));
}

#[tokio::test]
async fn memory_event_id_flows_into_the_turn() {
    let h = harness();
    h.process(user_msg(&h.clock, "hi")).await;

    let appended = h.memory.appended();
    // only the input message was processed; the reply sits on the bus
    assert_eq!(appended.len(), 1);
    let turns = h.memory.turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].session_key, "dm:alice");
    assert_eq!(turns[0].input_event_id, "ev-1");
    assert_eq!(turns[0].status, Some(TurnStatus::Ok));
    assert!(turns[0].final_output_obs_id.is_some());
}

#[tokio::test]
async fn memory_failure_is_fail_open() {
    let h = harness();
    h.memory.set_fail(true);
    h.process(user_msg(&h.clock, "hi")).await;

    // the agent still ran; failures only show up as metrics
    assert_eq!(h.agent.call_count(), 1);
    assert!(h.metrics.snapshot().memory_failures_total >= 1);
    assert!(h.memory.turns().is_empty());
}

#[tokio::test]
async fn system_observations_are_not_appended_to_memory() {
    let h = harness();
    h.process(Observation::control("tick", json!({}), h.clock.now()))
        .await;
    assert!(h.memory.appended().is_empty());
}

#[tokio::test]
async fn non_message_deliverables_do_not_reach_the_agent() {
    // world data delivered via an override still is not a MESSAGE
    let config = axon_gate::GateConfig::default().with_overrides(axon_gate::OverridePatch {
        deliver_sessions: Some(["feed:world".to_string()].into_iter().collect()),
        ..axon_gate::OverridePatch::default()
    });
    let h = harness_with(crate::runtime::RuntimeConfig::default(), config);
    let obs = Observation::new(
        axon_core::Payload::WorldData { data: json!({}) },
        axon_core::Actor::service("crawler"),
        "world_feed",
        axon_core::SourceKind::External,
        h.clock.now(),
    )
    .with_session_key("feed:world");
    h.process(obs).await;
    assert_eq!(h.agent.call_count(), 0);
}

#[tokio::test]
async fn agent_sourced_message_is_enqueued_for_egress() {
    let h = harness();
    h.process(agent_msg(&h.clock, "ack: hi")).await;

    let mut rx = h.runtime.egress_rx.lock().take().unwrap();
    let queued = rx.try_recv().unwrap();
    assert!(queued.is_agent_sourced());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn user_message_is_not_enqueued_for_egress() {
    let h = harness();
    h.process(user_msg(&h.clock, "hi")).await;
    let mut rx = h.runtime.egress_rx.lock().take().unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn gate_emits_are_republished_on_the_bus() {
    let h = harness();
    // three hard drops trip the consecutive burst threshold
    for _ in 0..3 {
        h.clock.advance_secs(1);
        h.process(user_msg(&h.clock, "")).await;
    }
    // drop burst pain alert was published
    assert!(h.metrics.snapshot().bus_published_total >= 1);
}

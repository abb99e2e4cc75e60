// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full-loop tests: startup, routing, GC, revival, shutdown.

use super::helpers::*;
use crate::agent::FakeAgentMode;
use crate::bus::PublishOutcome;
use axon_core::{Clock, SYSTEM_SESSION_KEY};
use axon_gate::GateConfig;

#[tokio::test]
async fn published_message_flows_to_agent_and_egress() {
    let h = harness_with(fast_config(), GateConfig::default());
    h.runtime.start();

    let outcome = h.runtime.bus().publish_nowait(user_msg(&h.clock, "hi"));
    assert!(outcome.is_published());

    wait_until("agent invocation", || h.agent.call_count() == 1).await;
    wait_until("egress delivery", || h.egress.sent().len() == 1).await;

    let sent = h.egress.sent();
    assert!(sent[0].is_agent_sourced());
    assert_eq!(sent[0].normalized_text(), Some("ack: hi"));
    assert!(sent[0].source_name.starts_with("agent:"));

    // the reply re-entered the router but never re-triggered the agent
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.agent.call_count(), 1);

    h.runtime.shutdown().await;
}

#[tokio::test]
async fn worker_and_state_appear_for_new_sessions() {
    let h = harness_with(fast_config(), GateConfig::default());
    h.runtime.start();
    h.runtime.bus().publish_nowait(user_msg(&h.clock, "hi"));

    wait_until("session worker", || {
        h.runtime
            .state_snapshot()
            .sessions
            .iter()
            .any(|s| s.session_key == "dm:alice")
    })
    .await;

    h.runtime.shutdown().await;
}

#[tokio::test]
async fn idle_session_is_collected_and_revived() {
    let h = harness_with(fast_config(), GateConfig::default());
    h.runtime.start();

    h.runtime.bus().publish_nowait(user_msg(&h.clock, "hi"));
    wait_until("first agent invocation", || h.agent.call_count() == 1).await;

    // fall idle past the 600s TTL
    h.clock.advance_secs(601);
    wait_until("session collected", || {
        !h.runtime.router().contains_session("dm:alice")
            && h.runtime.state_snapshot().sessions.iter().all(|s| {
                s.session_key != "dm:alice"
            })
    })
    .await;

    // the next event re-creates inbox, state and worker within a tick
    h.runtime.bus().publish_nowait(user_msg(&h.clock, "hello again"));
    wait_until("revived agent invocation", || h.agent.call_count() == 2).await;
    assert!(h.runtime.router().contains_session("dm:alice"));

    // fresh state: the old processed counter is gone
    let snapshot = h.runtime.state_snapshot();
    let session = snapshot
        .sessions
        .iter()
        .find(|s| s.session_key == "dm:alice")
        .unwrap();
    assert!(session.processed_total <= 2);

    h.runtime.shutdown().await;
}

#[tokio::test]
async fn system_session_survives_gc() {
    let h = harness_with(fast_config(), GateConfig::default());
    h.runtime.start();

    h.runtime
        .bus()
        .publish_nowait(axon_core::Observation::schedule(
            serde_json::json!({"tick": 1}),
            h.clock.now(),
        ));
    wait_until("system session", || {
        h.runtime.router().contains_session(SYSTEM_SESSION_KEY)
    })
    .await;

    h.clock.advance_secs(100_000);
    tokio::time::sleep(std::time::Duration::from_millis(80)).await;
    assert!(h.runtime.router().contains_session(SYSTEM_SESSION_KEY));

    h.runtime.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_the_bus_and_is_idempotent() {
    let h = harness_with(fast_config(), GateConfig::default());
    h.runtime.start();
    h.runtime.bus().publish_nowait(user_msg(&h.clock, "hi"));
    wait_until("agent invocation", || h.agent.call_count() == 1).await;

    h.runtime.shutdown().await;
    h.runtime.shutdown().await;

    assert_eq!(
        h.runtime.bus().publish_nowait(user_msg(&h.clock, "late")),
        PublishOutcome::Closed
    );
    assert!(h.memory.is_closed());
}

#[tokio::test]
async fn agent_failures_do_not_kill_the_session() {
    let h = harness_with(fast_config(), GateConfig::default());
    h.runtime.start();

    h.agent.set_mode(FakeAgentMode::Fail);
    h.runtime.bus().publish_nowait(user_msg(&h.clock, "hi"));
    wait_until("agent error", || h.metrics.agent_errors() == 1).await;

    h.agent.set_mode(FakeAgentMode::Echo);
    h.clock.advance_secs(1);
    h.runtime
        .bus()
        .publish_nowait(user_msg(&h.clock, "are you there?"));
    wait_until("recovery invocation", || h.agent.call_count() == 2).await;
    wait_until("egress delivery", || !h.egress.sent().is_empty()).await;

    let snapshot = h.runtime.state_snapshot();
    let session = snapshot
        .sessions
        .iter()
        .find(|s| s.session_key == "dm:alice")
        .unwrap();
    assert_eq!(session.error_total, 1);

    h.runtime.shutdown().await;
}

#[tokio::test]
async fn egress_failures_are_fail_open() {
    let h = harness_with(fast_config(), GateConfig::default());
    h.runtime.start();

    h.egress.set_fail(true);
    h.runtime.bus().publish_nowait(user_msg(&h.clock, "hi"));
    wait_until("egress failure", || {
        h.metrics.snapshot().egress_failed_total == 1
    })
    .await;

    // the engine keeps processing
    h.egress.set_fail(false);
    h.clock.advance_secs(1);
    h.runtime.bus().publish_nowait(user_msg(&h.clock, "still on?"));
    wait_until("second invocation", || h.agent.call_count() == 2).await;

    h.runtime.shutdown().await;
}

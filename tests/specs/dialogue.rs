//! User dialogue: safety valve, dedup, empty content.

use crate::prelude::*;
use axon_gate::{GateAction, Scene};

#[tokio::test]
async fn greeting_is_delivered_and_answered_exactly_once() {
    let engine = engine();
    engine
        .runtime
        .bus()
        .publish_nowait(user_msg(&engine, "alice", "hi"));

    wait_until("agent invocation", || engine.agent.call_count() == 1).await;
    let request = &engine.agent.requests()[0];
    assert_eq!(request.decision.action, GateAction::Deliver);
    assert_eq!(request.decision.scene, Scene::Dialogue);
    assert_eq!(request.decision.session_key, "dm:alice");
    assert!(request.decision.has_reason("user_dialogue_safe_valve"));

    // the agent-sourced reply reaches egress with the agent: namespace
    wait_until("egress", || engine.egress.sent().len() == 1).await;
    let reply = &engine.egress.sent()[0];
    assert!(reply.source_name.starts_with("agent:"));
    assert_eq!(reply.normalized_text(), Some("ack: hi"));
    assert_eq!(reply.session_key.as_deref(), Some("dm:alice"));

    // the reply re-entered the router without re-triggering the agent
    settle().await;
    assert_eq!(engine.agent.call_count(), 1);

    engine.runtime.shutdown().await;
}

#[tokio::test]
async fn duplicate_message_within_window_is_sunk() {
    let engine = engine();
    let bus = engine.runtime.bus();
    bus.publish_nowait(user_msg(&engine, "alice", "hi"));
    wait_until("first invocation", || engine.agent.call_count() == 1).await;

    engine.clock.advance_secs(5);
    bus.publish_nowait(user_msg(&engine, "alice", "hi"));
    wait_until("dedup sink", || {
        engine
            .runtime
            .inspect_gate(|gate| gate.pools().sink.len() == 1)
    })
    .await;

    settle().await;
    assert_eq!(engine.agent.call_count(), 1, "only one agent invocation");

    engine.runtime.shutdown().await;
}

#[tokio::test]
async fn empty_message_is_dropped_without_agent_contact() {
    let engine = engine();
    engine
        .runtime
        .bus()
        .publish_nowait(user_msg(&engine, "alice", ""));

    wait_until("drop pool entry", || {
        engine
            .runtime
            .inspect_gate(|gate| gate.pools().drop.len() == 1)
    })
    .await;

    settle().await;
    assert_eq!(engine.agent.call_count(), 0);
    assert!(engine.runtime.inspect_gate(|gate| gate.pools().sink.is_empty()));

    engine.runtime.shutdown().await;
}

#[tokio::test]
async fn sessions_are_isolated_from_each_other() {
    let engine = engine();
    let bus = engine.runtime.bus();
    bus.publish_nowait(user_msg(&engine, "alice", "hello from alice"));
    bus.publish_nowait(user_msg(&engine, "bob", "hello from bob"));

    wait_until("both sessions answered", || engine.agent.call_count() == 2).await;
    let mut sessions: Vec<String> = engine
        .agent
        .requests()
        .iter()
        .map(|r| r.decision.session_key.clone())
        .collect();
    sessions.sort();
    assert_eq!(sessions, vec!["dm:alice".to_string(), "dm:bob".to_string()]);

    engine.runtime.shutdown().await;
}

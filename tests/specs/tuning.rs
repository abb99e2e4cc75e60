//! Reflex tuning: whitelisted overrides with TTL and automatic revert.

use crate::prelude::*;
use axon_core::{Clock, Observation, Payload};
use axon_gate::ModelTier;
use serde_json::json;

#[tokio::test]
async fn tuning_suggestion_applies_and_reverts() {
    let engine = engine();
    let bus = engine.runtime.bus();

    let suggestion = Observation::control(
        "tuning_suggestion",
        json!({
            "suggested_overrides": {"force_low_model": true, "emergency_mode": true},
            "ttl_sec": 60,
            "reason": "load spike",
        }),
        engine.clock.now(),
    );
    bus.publish_nowait(suggestion);

    wait_until("override applied", || {
        engine.provider.snapshot().overrides.force_low_model
    })
    .await;
    // emergency_mode is not whitelisted and stayed off
    assert!(!engine.provider.snapshot().overrides.emergency_mode);
    assert!(engine
        .runtime
        .state_snapshot()
        .suggestions
        .contains_key("force_low_model"));

    // the mode change is announced through egress
    wait_until("mode change egressed", || {
        engine.egress.sent().iter().any(|obs| {
            matches!(
                &obs.payload,
                Payload::Control { kind, .. } if kind == "system_mode_changed"
            )
        })
    })
    .await;

    // deliveries inside the window carry the low tier
    bus.publish_nowait(user_msg(&engine, "alice", "hi"));
    wait_until("delivery in window", || engine.agent.call_count() == 1).await;
    let hint = engine.agent.requests()[0].hint.clone().unwrap();
    assert_eq!(hint.model_tier, ModelTier::Low);

    // TTL expiry reverts on the next system observation
    engine.clock.advance_secs(61);
    bus.publish_nowait(Observation::schedule(json!({"tick": 1}), engine.clock.now()));
    wait_until("override reverted", || {
        !engine.provider.snapshot().overrides.force_low_model
    })
    .await;
    assert!(engine.runtime.state_snapshot().suggestions.is_empty());

    // deliveries after the window are back to the standard tier
    engine.clock.advance_secs(1);
    bus.publish_nowait(user_msg(&engine, "alice", "and now?"));
    wait_until("delivery after window", || engine.agent.call_count() == 2).await;
    let hint = engine.agent.requests()[1].hint.clone().unwrap();
    assert_eq!(hint.model_tier, ModelTier::Standard);

    engine.runtime.shutdown().await;
}

#[tokio::test]
async fn unlisted_overrides_change_nothing() {
    let engine = engine();
    let before = engine.provider.snapshot();

    engine.runtime.bus().publish_nowait(Observation::control(
        "tuning_suggestion",
        json!({
            "suggested_overrides": {"emergency_mode": true, "drop_sessions": ["dm:alice"]},
        }),
        engine.clock.now(),
    ));

    settle().await;
    let after = engine.provider.snapshot();
    assert_eq!(*before, *after);
    assert!(engine.runtime.state_snapshot().suggestions.is_empty());

    engine.runtime.shutdown().await;
}

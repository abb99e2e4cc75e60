// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System-session handling: reflex control, pain aggregation, overload.

use super::helpers::*;
use crate::nociception::{DROP_OVERLOAD_DELTA, PAIN_BURST_THRESHOLD};
use crate::reflex::CONTROL_TUNING_SUGGESTION;
use axon_core::{Clock, Observation, Severity};
use axon_gate::ModelTier;
use serde_json::json;

fn suggestion(h: &TestHarness, overrides: serde_json::Value, ttl_sec: i64) -> Observation {
    Observation::control(
        CONTROL_TUNING_SUGGESTION,
        json!({
            "suggested_overrides": overrides,
            "ttl_sec": ttl_sec,
            "reason": "test tuning",
        }),
        h.clock.now(),
    )
}

#[tokio::test]
async fn tuning_suggestion_applies_whitelisted_overrides() {
    let h = harness();
    h.process(suggestion(
        &h,
        json!({"force_low_model": true, "emergency_mode": true}),
        60,
    ))
    .await;

    let overrides = &h.provider.snapshot().overrides;
    assert!(overrides.force_low_model);
    assert!(!overrides.emergency_mode);

    let snapshot = h.runtime.state_snapshot();
    assert!(snapshot.suggestions.contains_key("force_low_model"));
    // tuning_applied + system_mode_changed were republished on the bus
    assert_eq!(h.metrics.snapshot().bus_published_total, 2);
}

#[tokio::test]
async fn deliveries_during_the_window_carry_the_low_tier() {
    let h = harness();
    h.process(suggestion(&h, json!({"force_low_model": true}), 60))
        .await;
    h.process(user_msg(&h.clock, "hi")).await;

    let requests = h.agent.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].hint.as_ref().unwrap().model_tier,
        ModelTier::Low
    );
    assert!(requests[0].decision.has_reason("override=force_low_model"));
}

#[tokio::test]
async fn ttl_expiry_reverts_on_the_next_system_observation() {
    let h = harness();
    h.process(suggestion(&h, json!({"force_low_model": true}), 60))
        .await;
    assert!(h.provider.snapshot().overrides.force_low_model);

    h.clock.advance_secs(61);
    h.process(Observation::schedule(json!({"tick": 1}), h.clock.now()))
        .await;

    assert!(!h.provider.snapshot().overrides.force_low_model);
    assert!(h.runtime.state_snapshot().suggestions.is_empty());
}

#[tokio::test]
async fn pain_burst_cools_the_adapter_down() {
    let h = harness();
    for i in 0..PAIN_BURST_THRESHOLD {
        let alert = Observation::alert(
            Severity::High,
            "adapter",
            "text_input",
            Some("TimeoutError".to_string()),
            json!({"attempt": i}),
            h.clock.now(),
        );
        h.process(alert).await;
        h.clock.advance_secs(1);
    }

    let snapshot = h.runtime.state_snapshot();
    assert!(snapshot.nociception.adapter_cooldowns.contains_key("text_input"));
    assert!(snapshot.nociception.fanout_suppress_until.is_some());
    // the synthesized system pain alert was republished
    assert!(h.metrics.snapshot().bus_published_total >= 1);
}

#[tokio::test]
async fn drop_overload_suppresses_fanout() {
    let h = harness();
    // baseline tick
    h.process(Observation::schedule(json!({"tick": 1}), h.clock.now()))
        .await;

    for _ in 0..DROP_OVERLOAD_DELTA {
        h.metrics.record_decision("unknown", "drop");
    }
    // a 30s tick cadence clears the dedup window and stays inside the
    // overload window
    h.clock.advance_secs(30);
    h.process(Observation::schedule(json!({"tick": 2}), h.clock.now()))
        .await;

    let noci = h.runtime.nociceptor.lock();
    assert!(noci.fanout_suppressed(h.clock.now()));
}

#[tokio::test]
async fn quiet_ticks_do_not_suppress_fanout() {
    let h = harness();
    h.process(Observation::schedule(json!({"tick": 1}), h.clock.now()))
        .await;
    h.clock.advance_secs(30);
    h.process(Observation::schedule(json!({"tick": 2}), h.clock.now()))
        .await;
    let noci = h.runtime.nociceptor.lock();
    assert!(!noci.fanout_suppressed(h.clock.now()));
}

//! Self-protection: pain bursts and adapter cooldown.

use crate::prelude::*;
use axon_core::{Clock, Severity};
use axon_runtime::make_pain_alert;
use chrono::Duration;

#[tokio::test]
async fn adapter_error_burst_triggers_cooldown_and_suppression() {
    let engine = engine();
    let bus = engine.runtime.bus();

    // five pain alerts from the same adapter within ten seconds
    for i in 0..5 {
        let alert = make_pain_alert(
            "adapter",
            "text_input",
            Severity::Medium,
            Some("TimeoutError".to_string()),
            Some(format!("read timed out ({i})")),
            engine.clock.now(),
        );
        assert!(bus.publish_nowait(alert).is_published());
        engine.clock.advance(Duration::seconds(2));
    }

    wait_until("adapter cooldown", || {
        engine
            .runtime
            .state_snapshot()
            .nociception
            .adapter_cooldowns
            .contains_key("text_input")
    })
    .await;

    let snapshot = engine.runtime.state_snapshot().nociception;
    let now = engine.clock.now();
    let cooldown_until = snapshot.adapter_cooldowns["text_input"];
    assert!(cooldown_until >= now + Duration::seconds(290));
    let suppress_until = snapshot.fanout_suppress_until.unwrap();
    assert!(suppress_until >= now + Duration::seconds(50));

    // a synthesized system pain alert was published back onto the bus
    assert!(engine.metrics.snapshot().bus_published_total >= 1);

    engine.runtime.shutdown().await;
}

#[tokio::test]
async fn pain_alerts_are_never_deduplicated() {
    let engine = engine();
    let bus = engine.runtime.bus();
    for _ in 0..2 {
        let alert = make_pain_alert(
            "adapter",
            "timer",
            Severity::High,
            None,
            Some("tick failed".to_string()),
            engine.clock.now(),
        );
        bus.publish_nowait(alert);
        engine.clock.advance(Duration::seconds(1));
    }

    // both identical alerts were delivered into the system handler; the
    // pain window saw two entries and nothing was sunk as a duplicate
    wait_until("alerts processed", || {
        engine
            .runtime
            .state_snapshot()
            .metrics
            .decisions
            .get("alert/deliver")
            .copied()
            .unwrap_or(0)
            == 2
    })
    .await;
    assert!(engine
        .runtime
        .inspect_gate(|gate| gate.pools().sink.is_empty()));

    engine.runtime.shutdown().await;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::GateAction;
use crate::context::SystemHealth;
use crate::test_support::{t0, user_msg, TestCtx};
use axon_core::Payload;

#[test]
fn empty_message_is_hard_dropped() {
    let harness = TestCtx::new();
    let ctx = harness.ctx(t0());
    let obs = user_msg("");
    let mut state = BurstState::default();
    let mut draft = GateDraft::default();
    run(&mut state, &obs, &ctx, &mut draft).unwrap();
    assert_eq!(draft.action, Some(GateAction::Drop));
    assert!(draft.hard_dropped);
    assert!(draft.reasons.iter().any(|r| r == "empty_content"));
}

#[test]
fn overload_drops_and_emits_pain() {
    let harness = TestCtx::new();
    let mut ctx = harness.ctx(t0());
    ctx.system_health = Some(SystemHealth { overload: true });
    let obs = user_msg("hello");
    let mut state = BurstState::default();
    let mut draft = GateDraft::default();
    run(&mut state, &obs, &ctx, &mut draft).unwrap();
    assert_eq!(draft.action, Some(GateAction::Drop));
    assert_eq!(draft.emit.len(), 1);
    match &draft.emit[0].payload {
        Payload::Alert { source_id, .. } => assert_eq!(source_id, "overload"),
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn normal_message_passes_untouched() {
    let harness = TestCtx::new();
    let ctx = harness.ctx(t0());
    let obs = user_msg("hello");
    let mut state = BurstState::default();
    let mut draft = GateDraft::default();
    run(&mut state, &obs, &ctx, &mut draft).unwrap();
    assert_eq!(draft.action, None);
    assert_eq!(state.window_len(), 0);
}

#[test]
fn window_burst_tags_and_alerts() {
    let harness = TestCtx::new();
    // default burst_count_threshold is 5, consecutive_threshold 3; drive the
    // window path by spreading drops so consecutive triggers first anyway —
    // assert on the tag plus the single alert within the suggest cooldown
    let mut state = BurstState::default();
    let mut alerts = 0;
    for i in 0..6 {
        let ctx = harness.ctx(t0() + Duration::seconds(i));
        let obs = user_msg("");
        let mut draft = GateDraft::default();
        run(&mut state, &obs, &ctx, &mut draft).unwrap();
        if i >= 2 {
            assert_eq!(draft.tags.get("drop_burst").map(String::as_str), Some("true"));
        }
        alerts += draft.emit.len();
    }
    // one alert for the whole burst; the rest suppressed by cooldown_suggest_sec
    assert_eq!(alerts, 1);
}

#[test]
fn alert_resets_consecutive_counter() {
    let harness = TestCtx::new();
    let mut state = BurstState::default();
    for i in 0..2 {
        let ctx = harness.ctx(t0() + Duration::seconds(i));
        let mut draft = GateDraft::default();
        run(&mut state, &user_msg(""), &ctx, &mut draft).unwrap();
    }
    assert_eq!(state.consecutive(), 2);

    let alert = Observation::alert(
        Severity::Low,
        "adapter",
        "x",
        None,
        serde_json::json!({}),
        t0() + Duration::seconds(3),
    );
    let ctx = harness.ctx(t0() + Duration::seconds(3));
    let mut draft = GateDraft::default();
    run(&mut state, &alert, &ctx, &mut draft).unwrap();
    assert_eq!(state.consecutive(), 0);
}

#[test]
fn old_drops_fall_out_of_window() {
    let harness = TestCtx::new();
    let mut state = BurstState::default();
    let mut draft = GateDraft::default();
    run(&mut state, &user_msg(""), &harness.ctx(t0()), &mut draft).unwrap();
    assert_eq!(state.window_len(), 1);

    // well past burst_window_sec
    let later = t0() + Duration::seconds(120);
    let mut draft = GateDraft::default();
    run(&mut state, &user_msg(""), &harness.ctx(later), &mut draft).unwrap();
    assert_eq!(state.window_len(), 1);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::{GateAction, GateConfig, OverridePatch};
use crate::test_support::{t0, user_msg, TestCtx};
use axon_core::{Actor, Observation, Payload, Severity};
use serde_json::json;

fn run_policy(harness: &TestCtx, obs: &Observation, scene: Scene) -> GateDraft {
    let ctx = harness.ctx(t0());
    let mut draft = GateDraft {
        scene,
        ..GateDraft::default()
    };
    run(obs, &ctx, &mut draft).unwrap();
    draft
}

fn run_policy_scored(harness: &TestCtx, obs: &Observation, scene: Scene, score: f64) -> GateDraft {
    let ctx = harness.ctx(t0());
    let mut draft = GateDraft {
        scene,
        score,
        ..GateDraft::default()
    };
    run(obs, &ctx, &mut draft).unwrap();
    draft
}

fn with_overrides(patch: OverridePatch) -> TestCtx {
    TestCtx::with_config(GateConfig::default().with_overrides(patch))
}

#[test]
fn user_dialogue_safety_valve_delivers() {
    let harness = TestCtx::new();
    let draft = run_policy(&harness, &user_msg("hi"), Scene::Dialogue);
    assert_eq!(draft.action, Some(GateAction::Deliver));
    assert!(draft.reasons.iter().any(|r| r == "user_dialogue_safe_valve"));
    assert!(draft.hint.is_some());
}

#[test]
fn emergency_mode_beats_the_valve() {
    let harness = with_overrides(OverridePatch {
        emergency_mode: Some(true),
        ..OverridePatch::default()
    });
    let draft = run_policy(&harness, &user_msg("hi"), Scene::Dialogue);
    assert_eq!(draft.action, Some(GateAction::Sink));
    assert!(draft.reasons.iter().any(|r| r == "override=emergency"));
    let hint = draft.hint.unwrap();
    assert_eq!(hint.model_tier, ModelTier::Low);
}

#[test]
fn drop_session_beats_the_valve() {
    let harness = with_overrides(OverridePatch {
        drop_sessions: Some(["dm:alice".to_string()].into_iter().collect()),
        ..OverridePatch::default()
    });
    let draft = run_policy(&harness, &user_msg("hi"), Scene::Dialogue);
    assert_eq!(draft.action, Some(GateAction::Drop));
    assert!(draft.reasons.iter().any(|r| r == "override=drop_session"));
}

#[test]
fn drop_actor_beats_the_valve() {
    let harness = with_overrides(OverridePatch {
        drop_actors: Some(["alice".to_string()].into_iter().collect()),
        ..OverridePatch::default()
    });
    let draft = run_policy(&harness, &user_msg("hi"), Scene::Dialogue);
    assert_eq!(draft.action, Some(GateAction::Drop));
}

#[test]
fn hard_bypass_drop_is_preserved() {
    let harness = TestCtx::new();
    let ctx = harness.ctx(t0());
    let mut draft = GateDraft {
        scene: Scene::Dialogue,
        action: Some(GateAction::Drop),
        hard_dropped: true,
        ..GateDraft::default()
    };
    run(&user_msg(""), &ctx, &mut draft).unwrap();
    assert_eq!(draft.action, Some(GateAction::Drop));
    assert!(!draft.reasons.iter().any(|r| r == "user_dialogue_safe_valve"));
}

#[test]
fn dedup_sink_is_preserved_for_user_messages() {
    let harness = TestCtx::new();
    let ctx = harness.ctx(t0());
    let mut draft = GateDraft {
        scene: Scene::Dialogue,
        action: Some(GateAction::Sink),
        ..GateDraft::default()
    };
    run(&user_msg("hi"), &ctx, &mut draft).unwrap();
    assert_eq!(draft.action, Some(GateAction::Sink));
}

#[test]
fn deliver_session_applies_to_non_user_traffic() {
    let harness = with_overrides(OverridePatch {
        deliver_sessions: Some(["feed:world".to_string()].into_iter().collect()),
        ..OverridePatch::default()
    });
    let obs = Observation::new(
        Payload::WorldData { data: json!({}) },
        Actor::service("crawler"),
        "world_feed",
        axon_core::SourceKind::External,
        t0(),
    )
    .with_session_key("feed:world");
    let draft = run_policy(&harness, &obs, Scene::Unknown);
    assert_eq!(draft.action, Some(GateAction::Deliver));
    assert!(draft.reasons.iter().any(|r| r == "override=deliver_session"));
}

#[test]
fn deliver_lists_exclude_agent_sourced() {
    let harness = with_overrides(OverridePatch {
        deliver_sessions: Some(["dm:alice".to_string()].into_iter().collect()),
        deliver_actors: Some(["agent".to_string()].into_iter().collect()),
        ..OverridePatch::default()
    });
    let obs = Observation::message(Actor::agent(), "agent:core", "reply", t0())
        .with_session_key("dm:alice");
    let draft = run_policy(&harness, &obs, Scene::Unknown);
    // falls through to the message default, not the deliver overrides
    assert!(draft.reasons.iter().any(|r| r == "message_default"));
}

#[test]
fn agent_message_skips_the_valve_but_delivers_by_default() {
    let harness = TestCtx::new();
    let obs = Observation::message(Actor::agent(), "agent:core", "reply", t0())
        .with_session_key("dm:alice");
    let draft = run_policy(&harness, &obs, Scene::Unknown);
    assert_eq!(draft.action, Some(GateAction::Deliver));
    assert!(!draft.reasons.iter().any(|r| r == "user_dialogue_safe_valve"));
}

#[test]
fn threshold_policy_for_non_messages() {
    let harness = TestCtx::new();
    let alert = Observation::alert(Severity::Critical, "adapter", "x", None, json!({}), t0());
    let draft = run_policy_scored(&harness, &alert, Scene::Alert, 1.0);
    assert_eq!(draft.action, Some(GateAction::Deliver));
    assert!(draft.reasons.iter().any(|r| r == "score_deliver"));

    let draft = run_policy_scored(&harness, &alert, Scene::Alert, 0.3);
    assert_eq!(draft.action, Some(GateAction::Sink));
    assert!(draft.reasons.iter().any(|r| r == "score_sink"));

    let draft = run_policy_scored(&harness, &alert, Scene::Alert, 0.1);
    // scene default for alert is sink
    assert_eq!(draft.action, Some(GateAction::Sink));
    assert!(draft.reasons.iter().any(|r| r == "scene_default"));
}

#[test]
fn force_low_model_downgrades_delivered_tier() {
    let harness = with_overrides(OverridePatch {
        force_low_model: Some(true),
        ..OverridePatch::default()
    });
    let draft = run_policy(&harness, &user_msg("hi"), Scene::Dialogue);
    assert_eq!(draft.action, Some(GateAction::Deliver));
    assert!(draft.reasons.iter().any(|r| r == "override=force_low_model"));
    assert_eq!(draft.hint.unwrap().model_tier, ModelTier::Low);
}

#[test]
fn force_low_model_leaves_sunk_traffic_alone() {
    let harness = with_overrides(OverridePatch {
        force_low_model: Some(true),
        ..OverridePatch::default()
    });
    let alert = Observation::alert(Severity::Low, "adapter", "x", None, json!({}), t0());
    let draft = run_policy_scored(&harness, &alert, Scene::Alert, 0.3);
    assert_eq!(draft.action, Some(GateAction::Sink));
    assert!(!draft.reasons.iter().any(|r| r == "override=force_low_model"));
}

#[test]
fn budget_profile_by_scene() {
    let harness = TestCtx::new();

    let alert = Observation::alert(Severity::High, "adapter", "x", None, json!({}), t0());
    let draft = run_policy_scored(&harness, &alert, Scene::Alert, 0.8);
    let hint = draft.hint.unwrap();
    assert_eq!(hint.debug["profile"], json!("deep"));
    assert!(!hint.budget.auto_clarify);

    let tool = Observation::message(Actor::service("search"), "tool_result:search", "r", t0())
        .with_session_key("dm:alice");
    let draft = run_policy(&harness, &tool, Scene::ToolResult);
    let hint = draft.hint.unwrap();
    assert_eq!(hint.debug["profile"], json!("tiny"));
}

#[test]
fn low_score_dialogue_asks_for_clarification() {
    let harness = TestCtx::new();
    let draft = run_policy_scored(&harness, &user_msg("hi"), Scene::Dialogue, 0.2);
    let hint = draft.hint.unwrap();
    assert_eq!(hint.debug["profile"], json!("tiny"));
    assert!(hint.budget.auto_clarify);
}

#[test]
fn high_score_dialogue_gets_deep_budget() {
    let harness = TestCtx::new();
    let draft = run_policy_scored(&harness, &user_msg("everything is broken!?"), Scene::Dialogue, 0.9);
    let hint = draft.hint.unwrap();
    assert_eq!(hint.debug["profile"], json!("deep"));
    assert!(!hint.budget.auto_clarify);
}

#[test]
fn missing_budget_profile_still_produces_hint() {
    let mut config = GateConfig::default();
    config.budget_profiles.clear();
    let harness = TestCtx::with_config(config);
    let ctx = harness.ctx(t0());
    let mut draft = GateDraft {
        scene: Scene::Dialogue,
        ..GateDraft::default()
    };
    let err = run(&user_msg("hi"), &ctx, &mut draft).unwrap_err();
    assert_eq!(err.kind, "missing_budget_profile");
    assert!(draft.hint.is_some());
    assert_eq!(draft.action, Some(GateAction::Deliver));
}

#[test]
fn hint_is_always_produced() {
    let harness = TestCtx::new();
    let draft = run_policy(&harness, &user_msg(""), Scene::Dialogue);
    assert!(draft.hint.is_some());
}

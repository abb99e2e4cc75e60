// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::t0;
use axon_core::{Actor, Severity, SYSTEM_SESSION_KEY};
use serde_json::json;

#[test]
fn alert_wins_over_everything() {
    let obs = Observation::alert(Severity::Low, "adapter", "x", None, json!({}), t0());
    assert_eq!(infer(&obs, SYSTEM_SESSION_KEY), Scene::Alert);
}

#[test]
fn system_session_wins_over_tool_source() {
    let obs = Observation::control("tick", json!({}), t0()).with_source_name("tool_scheduler");
    assert_eq!(infer(&obs, SYSTEM_SESSION_KEY), Scene::System);
}

#[test]
fn user_message_is_dialogue() {
    let obs = Observation::message(Actor::user("alice"), "text_input", "hi", t0())
        .with_session_key("dm:alice");
    assert_eq!(infer(&obs, SYSTEM_SESSION_KEY), Scene::Dialogue);
}

#[test]
fn tool_sources_split_by_result_marker() {
    let call = Observation::message(Actor::service("search"), "tool:search", "q", t0())
        .with_session_key("dm:alice");
    assert_eq!(infer(&call, SYSTEM_SESSION_KEY), Scene::ToolCall);

    let result = Observation::message(Actor::service("search"), "tool_result:search", "r", t0())
        .with_session_key("dm:alice");
    assert_eq!(infer(&result, SYSTEM_SESSION_KEY), Scene::ToolResult);
}

#[test]
fn agent_message_in_user_session_is_unknown() {
    let obs = Observation::message(Actor::agent(), "agent:core", "reply", t0())
        .with_session_key("dm:alice");
    assert_eq!(infer(&obs, SYSTEM_SESSION_KEY), Scene::Unknown);
}

#[test]
fn run_sets_draft_scene() {
    let harness = crate::test_support::TestCtx::new();
    let ctx = harness.ctx(t0());
    let obs = crate::test_support::user_msg("hi");
    let mut draft = crate::context::GateDraft::default();
    run(&obs, &ctx, &mut draft).unwrap();
    assert_eq!(draft.scene, Scene::Dialogue);
}

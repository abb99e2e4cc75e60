// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 6: policy mapping and budget selection.
//!
//! Resolution is strict priority: overrides, preserved prior decisions, the
//! user dialogue safety valve, deliver lists, then the threshold policy. A
//! `GateHint` is always produced, whatever the action.

use crate::config::{BudgetThresholds, GateAction, ModelTier, Scene};
use crate::context::{GateContext, GateDraft};
use crate::decision::GateHint;
use crate::stages::StageError;
use axon_core::{ActorType, ObsType, Observation, AGENT_ACTOR_ID};
use serde_json::json;
use std::collections::BTreeMap;

pub fn run(obs: &Observation, ctx: &GateContext, draft: &mut GateDraft) -> Result<(), StageError> {
    let cfg = ctx.config;
    let ov = &cfg.overrides;
    let policy = cfg.scene_policy(draft.scene);
    let session_key = obs.routing_key();
    let actor_id = obs.actor.actor_id.as_str();
    let agent_sourced = obs.is_agent_sourced();
    let is_user_message =
        obs.obs_type == ObsType::Message && obs.actor.actor_type == ActorType::User;

    let mut tier = policy.default_model_tier;
    let mut action = draft.action;

    if ov.emergency_mode {
        action = Some(GateAction::Sink);
        tier = ModelTier::Low;
        draft.push_reason("override=emergency");
    } else if ov.drop_sessions.contains(session_key) {
        action = Some(GateAction::Drop);
        draft.push_reason("override=drop_session");
    } else if ov.drop_actors.contains(actor_id) {
        action = Some(GateAction::Drop);
        draft.push_reason("override=drop_actor");
    } else if action == Some(GateAction::Drop) {
        // hard bypass preserved
    } else if action == Some(GateAction::Sink) {
        // dedup verdict preserved
    } else if is_user_message && !agent_sourced && actor_id != AGENT_ACTOR_ID {
        action = Some(GateAction::Deliver);
        draft.push_reason("user_dialogue_safe_valve");
    } else if ov.deliver_sessions.contains(session_key) && !agent_sourced {
        action = Some(GateAction::Deliver);
        draft.push_reason("override=deliver_session");
    } else if ov.deliver_actors.contains(actor_id) && !agent_sourced {
        action = Some(GateAction::Deliver);
        draft.push_reason("override=deliver_actor");
    } else if obs.obs_type == ObsType::Message {
        action = Some(GateAction::Deliver);
        draft.push_reason("message_default");
    } else if draft.score >= policy.deliver_threshold {
        action = Some(GateAction::Deliver);
        draft.push_reason("score_deliver");
    } else if draft.score >= policy.sink_threshold {
        action = Some(GateAction::Sink);
        draft.push_reason("score_sink");
    } else {
        action = Some(policy.default_action);
        draft.push_reason("scene_default");
    }

    if action == Some(GateAction::Deliver) && ov.force_low_model && tier != ModelTier::Low {
        tier = ModelTier::Low;
        draft.push_reason("override=force_low_model");
    }

    draft.action = action;

    let (profile, auto_clarify) =
        select_profile(draft.scene, draft.score, &cfg.budget_thresholds);
    let (mut budget, profile_missing) = match cfg.budget_profiles.get(profile) {
        Some(spec) => (spec.clone(), false),
        None => (Default::default(), true),
    };
    if auto_clarify {
        budget.auto_clarify = true;
    }

    draft.hint = Some(GateHint {
        model_tier: tier,
        response_policy: policy.default_response_policy.clone(),
        budget,
        reason_tags: vec![
            format!("scene:{}", draft.scene.as_str()),
            format!("budget:{}", profile),
        ],
        debug: BTreeMap::from([
            ("score".to_string(), json!(draft.score)),
            ("profile".to_string(), json!(profile)),
        ]),
    });

    if profile_missing {
        return Err(StageError::new("missing_budget_profile"));
    }
    Ok(())
}

/// Budget profile by scene; DIALOGUE by score band, low-score dialogue asks
/// the handler to clarify instead of spending tokens.
fn select_profile(scene: Scene, score: f64, thresholds: &BudgetThresholds) -> (&'static str, bool) {
    match scene {
        Scene::Alert => ("deep", false),
        Scene::ToolCall | Scene::ToolResult => ("tiny", false),
        Scene::Dialogue => {
            if score >= thresholds.high_score {
                ("deep", false)
            } else if score >= thresholds.medium_score {
                ("normal", false)
            } else {
                ("tiny", true)
            }
        }
        Scene::System | Scene::Unknown => ("tiny", false),
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 1: scene inference.

use crate::config::Scene;
use crate::context::{GateContext, GateDraft};
use crate::stages::StageError;
use axon_core::{ActorType, ObsType, Observation};

pub fn run(obs: &Observation, ctx: &GateContext, draft: &mut GateDraft) -> Result<(), StageError> {
    draft.scene = infer(obs, ctx.system_session_key);
    Ok(())
}

/// Classification order matters: ALERT wins over the system session, which
/// wins over user dialogue, which wins over tool provenance.
pub fn infer(obs: &Observation, system_session_key: &str) -> Scene {
    if obs.obs_type == ObsType::Alert {
        return Scene::Alert;
    }
    if obs.routing_key() == system_session_key {
        return Scene::System;
    }
    if obs.obs_type == ObsType::Message && obs.actor.actor_type == ActorType::User {
        return Scene::Dialogue;
    }
    if obs.source_name.contains("tool_result") {
        return Scene::ToolResult;
    }
    if obs.source_name.contains("tool") {
        return Scene::ToolCall;
    }
    Scene::Unknown
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;

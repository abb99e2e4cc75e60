// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 7: assemble the decision and outcome.

use crate::config::GateAction;
use crate::context::{GateContext, GateDraft};
use crate::decision::{GateDecision, GateOutcome};
use crate::stages::dedup::compute_fingerprint;
use axon_core::Observation;

pub fn run(obs: &Observation, ctx: &GateContext, mut draft: GateDraft) -> GateOutcome {
    let scene = draft.scene;
    let policy = ctx.config.scene_policy(scene);

    let action = match draft.action {
        Some(action) => action,
        None => {
            draft.push_reason("indeterminate_action");
            GateAction::Sink
        }
    };

    let fingerprint = draft
        .fingerprint
        .take()
        .unwrap_or_else(|| compute_fingerprint(obs, scene));

    let mut reasons = draft.reasons;
    reasons.truncate(policy.max_reasons);

    ctx.metrics.record_decision(scene.as_str(), action.as_str());

    let decision = GateDecision {
        action,
        scene,
        session_key: obs.routing_key().to_string(),
        target_worker: None,
        score: draft.score,
        reasons,
        tags: draft.tags,
        fingerprint,
        hint: draft.hint,
    };

    // DELIVERed observations are not pooled unless they belong to a tool
    // scene, which is always retained for inspection.
    let ingest = if action != GateAction::Deliver || scene.is_tool() {
        vec![obs.clone()]
    } else {
        Vec::new()
    };

    GateOutcome {
        decision,
        emit: draft.emit,
        ingest,
    }
}

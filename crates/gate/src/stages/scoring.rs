// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 4: per-scene weighted scoring, clamped to `[0, 1]`.

use crate::context::{Features, GateContext, GateDraft};
use crate::stages::StageError;
use axon_core::{Observation, Severity};

pub fn run(_obs: &Observation, ctx: &GateContext, draft: &mut GateDraft) -> Result<(), StageError> {
    let rules = ctx.config.scene_rules(draft.scene);
    let mut score = 0.0;
    for (key, weight) in &rules.weights {
        score += weight * feature_value(key, &draft.features, rules.long_text_len);
    }
    if !score.is_finite() {
        return Err(StageError::new("non_finite_score"));
    }
    draft.score = score.clamp(0.0, 1.0);
    Ok(())
}

fn feature_value(key: &str, features: &Features, long_text_len: usize) -> f64 {
    match key {
        "base" => 1.0,
        "question" => bool_value(features.has_question),
        "mention" => bool_value(features.has_mention),
        "long_text" => bool_value(long_text_len > 0 && features.text_len >= long_text_len),
        "attachments" => bool_value(features.attachment_count > 0),
        "severity" => match features.severity {
            Some(Severity::Low) => 0.25,
            Some(Severity::Medium) => 0.5,
            Some(Severity::High) => 0.75,
            Some(Severity::Critical) => 1.0,
            None => 0.0,
        },
        _ => match key.strip_prefix("kw:") {
            Some(group) => bool_value(features.keyword_hits.get(group).copied().unwrap_or(0) > 0),
            // unknown feature keys contribute nothing
            None => 0.0,
        },
    }
}

fn bool_value(v: bool) -> f64 {
    if v {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
#[path = "scoring_tests.rs"]
mod tests;

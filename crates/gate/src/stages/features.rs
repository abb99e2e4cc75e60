// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 3: feature extraction.

use crate::context::{GateContext, GateDraft};
use crate::stages::StageError;
use axon_core::{Observation, Payload};

pub fn run(obs: &Observation, ctx: &GateContext, draft: &mut GateDraft) -> Result<(), StageError> {
    let rules = ctx.config.scene_rules(draft.scene);
    let features = &mut draft.features;

    match &obs.payload {
        Payload::Message {
            text,
            attachments,
            mentions,
            ..
        } => {
            let trimmed = text.trim();
            features.text_len = trimmed.chars().count();
            features.has_question = trimmed.contains('?') || trimmed.contains('？');
            features.attachment_count = attachments.len();
            features.mention_count = mentions.len();
            features.has_mention = !mentions.is_empty() || trimmed.contains('@');

            let lowered = trimmed.to_lowercase();
            for (group, words) in &rules.keywords {
                let hits = words
                    .iter()
                    .filter(|w| !w.is_empty() && lowered.contains(&w.to_lowercase()))
                    .count() as u32;
                if hits > 0 {
                    features.keyword_hits.insert(group.clone(), hits);
                }
            }
        }
        Payload::Alert { severity, .. } => {
            features.severity = Some(*severity);
        }
        _ => {}
    }

    features.recent_len = ctx.session_state.map(|s| s.recent_len()).unwrap_or(0);
    Ok(())
}

#[cfg(test)]
#[path = "features_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 5: deduplication by content fingerprint.
//!
//! Non-ALERT duplicates within the window are downgraded to SINK. ALERTs are
//! never deduplicated — losing a repeated failure signal would blind the
//! nociception path.

use crate::config::Scene;
use crate::context::{GateContext, GateDraft};
use crate::stages::StageError;
use axon_core::{ObsType, Observation};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Default dedup window.
pub const DEDUP_WINDOW_SECS: i64 = 30;

const PRUNE_THRESHOLD: usize = 512;

/// Per-(session, scene) fingerprint → last-seen instant.
#[derive(Debug)]
pub struct DedupState {
    window: Duration,
    seen: HashMap<(String, Scene), HashMap<String, DateTime<Utc>>>,
}

impl DedupState {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for DedupState {
    fn default() -> Self {
        Self::new(Duration::seconds(DEDUP_WINDOW_SECS))
    }
}

/// Stable hash over {normalized text, scene, actor, session, type}.
pub fn compute_fingerprint(obs: &Observation, scene: Scene) -> String {
    let mut hasher = Sha256::new();
    hasher.update(obs.normalized_text().unwrap_or(""));
    hasher.update([0u8]);
    hasher.update(scene.as_str());
    hasher.update([0u8]);
    hasher.update(&obs.actor.actor_id);
    hasher.update([0u8]);
    hasher.update(obs.routing_key());
    hasher.update([0u8]);
    hasher.update(obs.obs_type.as_str());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

pub fn run(
    state: &mut DedupState,
    obs: &Observation,
    ctx: &GateContext,
    draft: &mut GateDraft,
) -> Result<(), StageError> {
    let fingerprint = compute_fingerprint(obs, draft.scene);
    draft.fingerprint = Some(fingerprint.clone());

    if obs.obs_type == ObsType::Alert {
        return Ok(());
    }

    let window = state.window;
    let entry = state
        .seen
        .entry((obs.routing_key().to_string(), draft.scene))
        .or_default();

    let hit = entry
        .get(&fingerprint)
        .map(|last| ctx.now - *last < window)
        .unwrap_or(false);
    entry.insert(fingerprint, ctx.now);

    if entry.len() > PRUNE_THRESHOLD {
        entry.retain(|_, last| ctx.now - *last < window);
    }

    if hit && draft.action.is_none() {
        draft.action = Some(crate::config::GateAction::Sink);
        draft.push_reason("dedup_hit");
        draft.tags.insert("dedup".to_string(), "hit".to_string());
    }

    Ok(())
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 2: hard bypass and DROP-burst detection.

use crate::config::GateAction;
use crate::context::{GateContext, GateDraft};
use crate::stages::StageError;
use axon_core::{ObsType, Observation, QualityFlag, Severity};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::VecDeque;

/// Sliding-window bookkeeping for hard DROPs.
///
/// The consecutive counter is reset only by an incoming ALERT, so a streak
/// survives interleaved non-dropped traffic.
#[derive(Debug, Default)]
pub struct BurstState {
    drops: VecDeque<DateTime<Utc>>,
    consecutive: usize,
    last_alert_at: Option<DateTime<Utc>>,
}

impl BurstState {
    pub fn window_len(&self) -> usize {
        self.drops.len()
    }

    pub fn consecutive(&self) -> usize {
        self.consecutive
    }
}

pub fn run(
    state: &mut BurstState,
    obs: &Observation,
    ctx: &GateContext,
    draft: &mut GateDraft,
) -> Result<(), StageError> {
    if ctx.system_health.map(|h| h.overload).unwrap_or(false) {
        draft.action = Some(GateAction::Drop);
        draft.hard_dropped = true;
        draft.push_reason("overload_bypass");
        draft.emit.push(Observation::alert(
            Severity::High,
            "system",
            "overload",
            None,
            json!({"message": "hard bypass engaged under overload"}),
            ctx.now,
        ));
    }

    if draft.action.is_none()
        && obs.obs_type == ObsType::Message
        && obs.has_flag(QualityFlag::EmptyContent)
    {
        draft.action = Some(GateAction::Drop);
        draft.hard_dropped = true;
        draft.push_reason("empty_content");
    }

    if obs.obs_type == ObsType::Alert {
        state.consecutive = 0;
    }

    if draft.action == Some(GateAction::Drop) {
        let esc = &ctx.config.drop_escalation;
        let window = Duration::seconds(esc.burst_window_sec as i64);

        state.consecutive += 1;
        state.drops.push_back(ctx.now);
        while state
            .drops
            .front()
            .map(|t| ctx.now - *t > window)
            .unwrap_or(false)
        {
            state.drops.pop_front();
        }

        if state.drops.len() >= esc.burst_count_threshold
            || state.consecutive >= esc.consecutive_threshold
        {
            draft.tags.insert("drop_burst".to_string(), "true".to_string());
            let suggest_cooldown = Duration::seconds(esc.cooldown_suggest_sec as i64);
            let alert_due = state
                .last_alert_at
                .map(|t| ctx.now - t >= suggest_cooldown)
                .unwrap_or(true);
            if alert_due {
                state.last_alert_at = Some(ctx.now);
                tracing::warn!(
                    window_count = state.drops.len(),
                    consecutive = state.consecutive,
                    "drop burst detected"
                );
                draft.emit.push(Observation::alert(
                    Severity::High,
                    "system",
                    "drop_burst",
                    None,
                    json!({
                        "window_count": state.drops.len(),
                        "consecutive": state.consecutive,
                        "cooldown_suggest_sec": esc.cooldown_suggest_sec,
                    }),
                    ctx.now,
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "bypass_tests.rs"]
mod tests;

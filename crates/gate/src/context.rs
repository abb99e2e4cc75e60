// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-observation gate input and the work-in-progress record.

use crate::config::{GateAction, GateConfig, Scene};
use crate::decision::GateHint;
use axon_core::{Metrics, Observation, SessionState, Severity};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// External health signal; `overload` forces a hard-bypass DROP.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHealth {
    pub overload: bool,
}

/// Everything a single `Gate::handle` call reads.
///
/// The config reference is captured once per observation; a concurrent
/// snapshot replacement does not affect an in-flight decision.
pub struct GateContext<'a> {
    pub now: DateTime<Utc>,
    pub config: &'a GateConfig,
    pub system_session_key: &'a str,
    pub metrics: &'a Metrics,
    pub session_state: Option<&'a SessionState>,
    pub system_health: Option<SystemHealth>,
    /// Invoked after each stage with the stage name and the current draft.
    pub trace: Option<&'a (dyn Fn(&'static str, &GateDraft) + Send + Sync)>,
}

/// Features extracted from the observation for scoring.
#[derive(Debug, Clone, Default)]
pub struct Features {
    pub text_len: usize,
    pub keyword_hits: BTreeMap<String, u32>,
    pub has_question: bool,
    pub has_mention: bool,
    pub attachment_count: usize,
    pub mention_count: usize,
    pub recent_len: usize,
    pub severity: Option<Severity>,
}

/// Mutable record the stages fill in before finalize assembles the decision.
#[derive(Debug, Clone, Default)]
pub struct GateDraft {
    pub scene: Scene,
    pub action: Option<GateAction>,
    pub score: f64,
    pub reasons: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub features: Features,
    pub fingerprint: Option<String>,
    pub hint: Option<GateHint>,
    pub emit: Vec<Observation>,
    /// Set by the hard bypass; the policy mapper must preserve the DROP.
    pub hard_dropped: bool,
}

impl GateDraft {
    pub fn push_reason(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }
}

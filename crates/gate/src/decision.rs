// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gate products: decision, hint, outcome.

use crate::config::{BudgetSpec, GateAction, ModelTier, Scene};
use axon_core::Observation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Advisory metadata for the downstream handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateHint {
    pub model_tier: ModelTier,
    pub response_policy: String,
    pub budget: BudgetSpec,
    #[serde(default)]
    pub reason_tags: Vec<String>,
    #[serde(default)]
    pub debug: BTreeMap<String, Value>,
}

/// The gate's verdict for one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub action: GateAction,
    pub scene: Scene,
    pub session_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_worker: Option<String>,
    /// Clamped to `[0, 1]`.
    pub score: f64,
    pub reasons: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<GateHint>,
}

impl GateDecision {
    pub fn has_reason(&self, reason: &str) -> bool {
        self.reasons.iter().any(|r| r == reason)
    }
}

/// Decision plus ordered side-effect lists.
///
/// `emit` observations are re-published on the bus; `ingest` observations are
/// stored in the gate pools for post-mortem inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub decision: GateDecision,
    pub emit: Vec<Observation>,
    pub ingest: Vec<Observation>,
}

#[cfg(test)]
#[path = "decision_tests.rs"]
mod tests;

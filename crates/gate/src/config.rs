// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable gate policy snapshot.
//!
//! A `GateConfig` is never mutated in place: the provider replaces the whole
//! snapshot atomically and readers keep whatever reference they captured for
//! the observation they are processing. Every section has serde defaults so a
//! partial `gate.yaml` parses into a usable policy set.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// What the gate decides to do with an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    Drop,
    Sink,
    Deliver,
}

impl GateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateAction::Drop => "drop",
            GateAction::Sink => "sink",
            GateAction::Deliver => "deliver",
        }
    }
}

/// Gate-inferred classification of an observation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Scene {
    Dialogue,
    Alert,
    System,
    ToolCall,
    ToolResult,
    #[default]
    Unknown,
}

impl Scene {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scene::Dialogue => "dialogue",
            Scene::Alert => "alert",
            Scene::System => "system",
            Scene::ToolCall => "tool_call",
            Scene::ToolResult => "tool_result",
            Scene::Unknown => "unknown",
        }
    }

    pub fn is_tool(&self) -> bool {
        matches!(self, Scene::ToolCall | Scene::ToolResult)
    }
}

/// Advisory model tier for the downstream handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Low,
    #[default]
    Standard,
    High,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Low => "low",
            ModelTier::Standard => "standard",
            ModelTier::High => "high",
        }
    }
}

/// Per-scene thresholds and defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenePolicy {
    pub deliver_threshold: f64,
    pub sink_threshold: f64,
    pub default_action: GateAction,
    pub default_model_tier: ModelTier,
    pub default_response_policy: String,
    pub max_reasons: usize,
}

impl Default for ScenePolicy {
    fn default() -> Self {
        Self {
            deliver_threshold: 0.6,
            sink_threshold: 0.3,
            default_action: GateAction::Sink,
            default_model_tier: ModelTier::Standard,
            default_response_policy: "respond".to_string(),
            max_reasons: 6,
        }
    }
}

/// Per-scene scoring weights and keyword lists.
///
/// Weight keys name features: `base`, `question`, `mention`, `long_text`,
/// `attachments`, `severity`, and `kw:<group>` for keyword groups. Unknown
/// keys contribute nothing. Values are tunable configuration, not contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneRules {
    pub weights: BTreeMap<String, f64>,
    pub keywords: BTreeMap<String, Vec<String>>,
    pub long_text_len: usize,
}

impl Default for SceneRules {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            keywords: BTreeMap::new(),
            long_text_len: 280,
        }
    }
}

/// DROP-burst escalation knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropEscalation {
    pub burst_window_sec: u64,
    pub burst_count_threshold: usize,
    pub consecutive_threshold: usize,
    pub cooldown_suggest_sec: u64,
}

impl Default for DropEscalation {
    fn default() -> Self {
        Self {
            burst_window_sec: 30,
            burst_count_threshold: 5,
            consecutive_threshold: 3,
            cooldown_suggest_sec: 60,
        }
    }
}

/// Operator and reflex-applied policy overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overrides {
    pub emergency_mode: bool,
    pub force_low_model: bool,
    pub drop_sessions: BTreeSet<String>,
    pub deliver_sessions: BTreeSet<String>,
    pub drop_actors: BTreeSet<String>,
    pub deliver_actors: BTreeSet<String>,
}

/// Score bands selecting a budget profile for DIALOGUE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetThresholds {
    pub high_score: f64,
    pub medium_score: f64,
}

impl Default for BudgetThresholds {
    fn default() -> Self {
        Self {
            high_score: 0.7,
            medium_score: 0.4,
        }
    }
}

/// Resource envelope handed to the handler. Enforcement is the handler's
/// responsibility; the gate only selects and supplies the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSpec {
    pub time_ms: u64,
    pub max_tokens: u32,
    pub max_parallel: u32,
    pub evidence_allowed: bool,
    pub max_tool_calls: u32,
    pub can_search_kb: bool,
    pub can_call_tools: bool,
    pub auto_clarify: bool,
    pub fallback_mode: String,
}

impl Default for BudgetSpec {
    fn default() -> Self {
        Self {
            time_ms: 8_000,
            max_tokens: 1_024,
            max_parallel: 1,
            evidence_allowed: false,
            max_tool_calls: 0,
            can_search_kb: false,
            can_call_tools: false,
            auto_clarify: false,
            fallback_mode: "skip".to_string(),
        }
    }
}

/// Partial override update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverridePatch {
    pub emergency_mode: Option<bool>,
    pub force_low_model: Option<bool>,
    pub drop_sessions: Option<BTreeSet<String>>,
    pub deliver_sessions: Option<BTreeSet<String>>,
    pub drop_actors: Option<BTreeSet<String>>,
    pub deliver_actors: Option<BTreeSet<String>>,
}

impl OverridePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Errors loading or parsing `gate.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// The complete immutable policy snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub scene_policies: BTreeMap<Scene, ScenePolicy>,
    pub rules: BTreeMap<Scene, SceneRules>,
    pub drop_escalation: DropEscalation,
    pub overrides: Overrides,
    pub budget_thresholds: BudgetThresholds,
    pub budget_profiles: BTreeMap<String, BudgetSpec>,
}

impl Default for GateConfig {
    fn default() -> Self {
        let mut scene_policies = BTreeMap::new();
        scene_policies.insert(
            Scene::Dialogue,
            ScenePolicy {
                deliver_threshold: 0.55,
                sink_threshold: 0.25,
                default_action: GateAction::Sink,
                default_model_tier: ModelTier::Standard,
                default_response_policy: "converse".to_string(),
                max_reasons: 6,
            },
        );
        scene_policies.insert(
            Scene::Alert,
            ScenePolicy {
                deliver_threshold: 0.4,
                sink_threshold: 0.2,
                default_action: GateAction::Sink,
                default_model_tier: ModelTier::High,
                default_response_policy: "triage".to_string(),
                max_reasons: 8,
            },
        );
        scene_policies.insert(
            Scene::System,
            ScenePolicy {
                deliver_threshold: 0.5,
                sink_threshold: 0.2,
                default_action: GateAction::Sink,
                default_model_tier: ModelTier::Low,
                default_response_policy: "internal".to_string(),
                max_reasons: 6,
            },
        );
        scene_policies.insert(
            Scene::ToolCall,
            ScenePolicy {
                deliver_threshold: 0.6,
                sink_threshold: 0.2,
                default_action: GateAction::Sink,
                default_model_tier: ModelTier::Low,
                default_response_policy: "internal".to_string(),
                max_reasons: 6,
            },
        );
        scene_policies.insert(
            Scene::ToolResult,
            ScenePolicy {
                deliver_threshold: 0.6,
                sink_threshold: 0.2,
                default_action: GateAction::Sink,
                default_model_tier: ModelTier::Low,
                default_response_policy: "internal".to_string(),
                max_reasons: 6,
            },
        );
        scene_policies.insert(
            Scene::Unknown,
            ScenePolicy {
                deliver_threshold: 0.7,
                sink_threshold: 0.3,
                default_action: GateAction::Sink,
                default_model_tier: ModelTier::Low,
                default_response_policy: "internal".to_string(),
                max_reasons: 6,
            },
        );

        let mut rules = BTreeMap::new();
        rules.insert(
            Scene::Dialogue,
            SceneRules {
                weights: [
                    ("base".to_string(), 0.2),
                    ("question".to_string(), 0.25),
                    ("mention".to_string(), 0.2),
                    ("long_text".to_string(), 0.15),
                    ("attachments".to_string(), 0.1),
                    ("kw:urgent".to_string(), 0.3),
                ]
                .into_iter()
                .collect(),
                keywords: [(
                    "urgent".to_string(),
                    vec![
                        "urgent".to_string(),
                        "asap".to_string(),
                        "emergency".to_string(),
                        "broken".to_string(),
                        "down".to_string(),
                    ],
                )]
                .into_iter()
                .collect(),
                long_text_len: 280,
            },
        );
        rules.insert(
            Scene::Alert,
            SceneRules {
                weights: [("base".to_string(), 0.3), ("severity".to_string(), 0.7)]
                    .into_iter()
                    .collect(),
                ..SceneRules::default()
            },
        );
        rules.insert(
            Scene::System,
            SceneRules {
                weights: [("base".to_string(), 1.0)].into_iter().collect(),
                ..SceneRules::default()
            },
        );
        rules.insert(
            Scene::ToolCall,
            SceneRules {
                weights: [("base".to_string(), 0.4)].into_iter().collect(),
                ..SceneRules::default()
            },
        );
        rules.insert(
            Scene::ToolResult,
            SceneRules {
                weights: [("base".to_string(), 0.4)].into_iter().collect(),
                ..SceneRules::default()
            },
        );
        rules.insert(
            Scene::Unknown,
            SceneRules {
                weights: [("base".to_string(), 0.1)].into_iter().collect(),
                ..SceneRules::default()
            },
        );

        let mut budget_profiles = BTreeMap::new();
        budget_profiles.insert(
            "tiny".to_string(),
            BudgetSpec {
                time_ms: 4_000,
                max_tokens: 512,
                max_parallel: 1,
                evidence_allowed: false,
                max_tool_calls: 0,
                can_search_kb: false,
                can_call_tools: false,
                auto_clarify: false,
                fallback_mode: "skip".to_string(),
            },
        );
        budget_profiles.insert(
            "normal".to_string(),
            BudgetSpec {
                time_ms: 12_000,
                max_tokens: 2_048,
                max_parallel: 2,
                evidence_allowed: true,
                max_tool_calls: 4,
                can_search_kb: true,
                can_call_tools: true,
                auto_clarify: false,
                fallback_mode: "tiny".to_string(),
            },
        );
        budget_profiles.insert(
            "deep".to_string(),
            BudgetSpec {
                time_ms: 45_000,
                max_tokens: 8_192,
                max_parallel: 4,
                evidence_allowed: true,
                max_tool_calls: 16,
                can_search_kb: true,
                can_call_tools: true,
                auto_clarify: false,
                fallback_mode: "normal".to_string(),
            },
        );

        Self {
            scene_policies,
            rules,
            drop_escalation: DropEscalation::default(),
            overrides: Overrides::default(),
            budget_thresholds: BudgetThresholds::default(),
            budget_profiles,
        }
    }
}

impl GateConfig {
    /// Parse a YAML document; omitted sections fall back to defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Produce a new snapshot with the patch applied.
    pub fn with_overrides(&self, patch: OverridePatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.emergency_mode {
            next.overrides.emergency_mode = v;
        }
        if let Some(v) = patch.force_low_model {
            next.overrides.force_low_model = v;
        }
        if let Some(v) = patch.drop_sessions {
            next.overrides.drop_sessions = v;
        }
        if let Some(v) = patch.deliver_sessions {
            next.overrides.deliver_sessions = v;
        }
        if let Some(v) = patch.drop_actors {
            next.overrides.drop_actors = v;
        }
        if let Some(v) = patch.deliver_actors {
            next.overrides.deliver_actors = v;
        }
        next
    }

    pub fn scene_policy(&self, scene: Scene) -> ScenePolicy {
        self.scene_policies.get(&scene).cloned().unwrap_or_default()
    }

    pub fn scene_rules(&self, scene: Scene) -> SceneRules {
        self.rules.get(&scene).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

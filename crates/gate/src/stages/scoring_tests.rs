// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::{GateConfig, Scene, SceneRules};
use crate::context::GateDraft;
use crate::test_support::{t0, user_msg, TestCtx};
use yare::parameterized;

fn scored(harness: &TestCtx, scene: Scene, features: Features) -> f64 {
    let ctx = harness.ctx(t0());
    let mut draft = GateDraft {
        scene,
        features,
        ..GateDraft::default()
    };
    run(&user_msg("ignored"), &ctx, &mut draft).unwrap();
    draft.score
}

#[test]
fn dialogue_base_score() {
    let harness = TestCtx::new();
    let score = scored(&harness, Scene::Dialogue, Features::default());
    assert!((score - 0.2).abs() < 1e-9, "{score}");
}

#[test]
fn question_and_keyword_add_up() {
    let harness = TestCtx::new();
    let features = Features {
        has_question: true,
        keyword_hits: [("urgent".to_string(), 1)].into_iter().collect(),
        ..Features::default()
    };
    // base 0.2 + question 0.25 + kw:urgent 0.3
    let score = scored(&harness, Scene::Dialogue, features);
    assert!((score - 0.75).abs() < 1e-9, "{score}");
}

#[parameterized(
    low = { Severity::Low, 0.475 },
    medium = { Severity::Medium, 0.65 },
    high = { Severity::High, 0.825 },
    critical = { Severity::Critical, 1.0 },
)]
fn alert_severity_bands(severity: Severity, expected: f64) {
    let harness = TestCtx::new();
    let features = Features {
        severity: Some(severity),
        ..Features::default()
    };
    let score = scored(&harness, Scene::Alert, features);
    assert!((score - expected).abs() < 1e-9, "{score}");
}

#[test]
fn score_is_clamped_to_one() {
    let mut config = GateConfig::default();
    config.rules.insert(
        Scene::Dialogue,
        SceneRules {
            weights: [("base".to_string(), 5.0)].into_iter().collect(),
            ..SceneRules::default()
        },
    );
    let harness = TestCtx::with_config(config);
    let score = scored(&harness, Scene::Dialogue, Features::default());
    assert_eq!(score, 1.0);
}

#[test]
fn negative_total_clamps_to_zero() {
    let mut config = GateConfig::default();
    config.rules.insert(
        Scene::Dialogue,
        SceneRules {
            weights: [("base".to_string(), -2.0)].into_iter().collect(),
            ..SceneRules::default()
        },
    );
    let harness = TestCtx::with_config(config);
    let score = scored(&harness, Scene::Dialogue, Features::default());
    assert_eq!(score, 0.0);
}

#[test]
fn unknown_weight_keys_contribute_nothing() {
    let mut config = GateConfig::default();
    config.rules.insert(
        Scene::Dialogue,
        SceneRules {
            weights: [
                ("base".to_string(), 0.4),
                ("made_up_feature".to_string(), 0.6),
            ]
            .into_iter()
            .collect(),
            ..SceneRules::default()
        },
    );
    let harness = TestCtx::with_config(config);
    let score = scored(&harness, Scene::Dialogue, Features::default());
    assert!((score - 0.4).abs() < 1e-9, "{score}");
}

#[test]
fn non_finite_weight_is_a_stage_error() {
    let mut config = GateConfig::default();
    config.rules.insert(
        Scene::Dialogue,
        SceneRules {
            weights: [("base".to_string(), f64::NAN)].into_iter().collect(),
            ..SceneRules::default()
        },
    );
    let harness = TestCtx::with_config(config);
    let ctx = harness.ctx(t0());
    let mut draft = GateDraft {
        scene: Scene::Dialogue,
        ..GateDraft::default()
    };
    let err = run(&user_msg("hi"), &ctx, &mut draft).unwrap_err();
    assert_eq!(err.kind, "non_finite_score");
    assert_eq!(draft.score, 0.0);
}

#[test]
fn missing_scene_rules_score_zero() {
    let mut config = GateConfig::default();
    config.rules.clear();
    let harness = TestCtx::with_config(config);
    let score = scored(&harness, Scene::Dialogue, Features::default());
    assert_eq!(score, 0.0);
}

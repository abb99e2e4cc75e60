// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The gate driver: runs the stage pipeline and owns the pools.

use crate::config::GateAction;
use crate::context::{GateContext, GateDraft};
use crate::decision::{GateDecision, GateOutcome};
use crate::pools::GatePools;
use crate::stages::bypass::BurstState;
use crate::stages::dedup::DedupState;
use crate::stages::{self, StageError};
use axon_core::Observation;
use chrono::Duration;

/// Deterministic pre-processing gate.
///
/// Holds the cross-observation state the stages need: the DROP-burst window,
/// the dedup table, and the inspection pools. Callers serialize access (the
/// runtime keeps the gate behind one mutex), so `handle` takes `&mut self`.
#[derive(Debug, Default)]
pub struct Gate {
    burst: BurstState,
    dedup: DedupState,
    pools: GatePools,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedup_window(window: Duration) -> Self {
        Self {
            dedup: DedupState::new(window),
            ..Self::default()
        }
    }

    /// Run the pipeline. Always returns an outcome; stage failures degrade
    /// into reason tags.
    pub fn handle(&mut self, obs: &Observation, ctx: &GateContext) -> GateOutcome {
        let mut draft = GateDraft::default();

        run_stage("scene", ctx, &mut draft, |d| stages::scene::run(obs, ctx, d));
        run_stage("hard_bypass", ctx, &mut draft, |d| {
            stages::bypass::run(&mut self.burst, obs, ctx, d)
        });
        run_stage("features", ctx, &mut draft, |d| {
            stages::features::run(obs, ctx, d)
        });
        run_stage("scoring", ctx, &mut draft, |d| {
            stages::scoring::run(obs, ctx, d)
        });
        run_stage("dedup", ctx, &mut draft, |d| {
            stages::dedup::run(&mut self.dedup, obs, ctx, d)
        });
        run_stage("policy", ctx, &mut draft, |d| {
            stages::policy::run(obs, ctx, d)
        });

        stages::finalize::run(obs, ctx, draft)
    }

    /// Route an ingested observation into its pool.
    pub fn ingest(&mut self, obs: &Observation, decision: &GateDecision) {
        if decision.scene.is_tool() {
            self.pools.tool.push(obs.clone());
            return;
        }
        match decision.action {
            GateAction::Drop => self.pools.drop.push(obs.clone()),
            GateAction::Sink => self.pools.sink.push(obs.clone()),
            GateAction::Deliver => {}
        }
    }

    pub fn pools(&self) -> &GatePools {
        &self.pools
    }
}

fn run_stage(
    name: &'static str,
    ctx: &GateContext,
    draft: &mut GateDraft,
    f: impl FnOnce(&mut GateDraft) -> Result<(), StageError>,
) {
    if let Err(err) = f(draft) {
        tracing::warn!(stage = name, kind = err.kind, "gate stage error");
        draft.reasons.push(format!("{}_error:{}", name, err.kind));
    }
    if let Some(trace) = ctx.trace {
        trace(name, draft);
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;

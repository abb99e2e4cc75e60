// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for gate tests.

use crate::config::GateConfig;
use crate::context::GateContext;
use axon_core::{Actor, Metrics, Observation, SYSTEM_SESSION_KEY};
use chrono::{DateTime, TimeZone, Utc};

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Owns the borrowed pieces of a `GateContext`.
pub(crate) struct TestCtx {
    pub config: GateConfig,
    pub metrics: Metrics,
}

impl TestCtx {
    pub fn new() -> Self {
        Self {
            config: GateConfig::default(),
            metrics: Metrics::new(),
        }
    }

    pub fn with_config(config: GateConfig) -> Self {
        Self {
            config,
            metrics: Metrics::new(),
        }
    }

    pub fn ctx(&self, now: DateTime<Utc>) -> GateContext<'_> {
        GateContext {
            now,
            config: &self.config,
            system_session_key: SYSTEM_SESSION_KEY,
            metrics: &self.metrics,
            session_state: None,
            system_health: None,
            trace: None,
        }
    }
}

pub(crate) fn user_msg(text: &str) -> Observation {
    Observation::message(Actor::user("alice"), "text_input", text, t0())
        .with_session_key("dm:alice")
}

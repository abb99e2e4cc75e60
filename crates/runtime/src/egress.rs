// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Egress hub: routes deliverable observations to output sinks.

use async_trait::async_trait;
use axon_core::{Metrics, ObsType, Observation, Payload};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::reflex::CONTROL_SYSTEM_MODE_CHANGED;

/// Errors from egress adapters.
#[derive(Debug, Error)]
pub enum EgressError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Output sink for observations leaving the system.
#[async_trait]
pub trait EgressAdapter: Send + Sync + 'static {
    async fn send(&self, obs: &Observation) -> Result<(), EgressError>;
}

/// Whether an observation is destined for the outside world: handler-emitted
/// MESSAGEs, plus mode-change CONTROLs operators subscribe to.
pub fn should_egress(obs: &Observation) -> bool {
    if obs.obs_type == ObsType::Message && obs.is_agent_sourced() {
        return true;
    }
    matches!(
        &obs.payload,
        Payload::Control { kind, .. } if kind == CONTROL_SYSTEM_MODE_CHANGED
    )
}

/// Adapter registry; session-specific adapters win over the default.
pub struct EgressHub {
    metrics: Arc<Metrics>,
    default: Mutex<Option<Arc<dyn EgressAdapter>>>,
    by_session: Mutex<HashMap<String, Arc<dyn EgressAdapter>>>,
}

impl EgressHub {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            default: Mutex::new(None),
            by_session: Mutex::new(HashMap::new()),
        }
    }

    pub fn register_default(&self, adapter: Arc<dyn EgressAdapter>) {
        *self.default.lock() = Some(adapter);
    }

    pub fn register_session(&self, session_key: impl Into<String>, adapter: Arc<dyn EgressAdapter>) {
        self.by_session.lock().insert(session_key.into(), adapter);
    }

    /// Deliver to the session adapter, else the default, else drop with a
    /// counter increment.
    pub async fn dispatch(&self, obs: &Observation) -> Result<(), EgressError> {
        let adapter = {
            let by_session = self.by_session.lock();
            by_session.get(obs.routing_key()).cloned()
        }
        .or_else(|| self.default.lock().clone());

        match adapter {
            Some(adapter) => {
                adapter.send(obs).await?;
                self.metrics.inc_egress_dispatched();
                Ok(())
            }
            None => {
                debug!(session = %obs.routing_key(), "no egress adapter, dropping");
                self.metrics.inc_egress_dropped();
                Ok(())
            }
        }
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;

    #[derive(Default)]
    struct FakeEgressState {
        sent: Vec<Observation>,
        fail: bool,
    }

    /// Recording egress adapter for tests.
    #[derive(Clone, Default)]
    pub struct FakeEgressAdapter {
        inner: Arc<Mutex<FakeEgressState>>,
    }

    impl FakeEgressAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<Observation> {
            self.inner.lock().sent.clone()
        }

        pub fn set_fail(&self, fail: bool) {
            self.inner.lock().fail = fail;
        }
    }

    #[async_trait]
    impl EgressAdapter for FakeEgressAdapter {
        async fn send(&self, obs: &Observation) -> Result<(), EgressError> {
            let mut state = self.inner.lock();
            if state.fail {
                return Err(EgressError::SendFailed("fake egress failure".to_string()));
            }
            state.sent.push(obs.clone());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeEgressAdapter;

#[cfg(test)]
#[path = "egress_tests.rs"]
mod tests;

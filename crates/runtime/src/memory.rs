// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure-tolerant memory hooks.
//!
//! Persistence of events and turns lives behind [`MemoryService`]. The core
//! calls it through [`MemoryHooks`], which swallows every failure into a
//! counter: memory must never block or abort the dispatch path.

use async_trait::async_trait;
use axon_core::{Metrics, Observation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Metadata key carrying the appended event id back to the turn hooks.
pub const MEMORY_EVENT_ID_KEY: &str = "memory_event_id";

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("backend error: {0}")]
    Backend(String),
}

/// Outcome of a handler turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Ok,
    Error,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Ok => "ok",
            TurnStatus::Error => "error",
        }
    }
}

/// External persistence collaborator. The core imposes no storage layout and
/// requires no durability across restarts.
#[async_trait]
pub trait MemoryService: Send + Sync + 'static {
    /// Append a gated observation; returns the stored event id, if any.
    async fn append_event(&self, obs: &Observation) -> Result<Option<String>, MemoryError>;

    /// Open a turn for a DELIVERed message; returns the turn id, if any.
    async fn start_turn(
        &self,
        session_key: &str,
        input_event_id: &str,
        plan: Option<&str>,
    ) -> Result<Option<String>, MemoryError>;

    /// Close a turn after the handler returned or failed.
    async fn finish_turn(
        &self,
        turn_id: &str,
        status: TurnStatus,
        error_message: Option<&str>,
        final_output_obs_id: Option<&str>,
    ) -> Result<(), MemoryError>;

    /// Flush buffered writes at shutdown.
    async fn close(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}

/// Memory service that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMemory;

#[async_trait]
impl MemoryService for NoopMemory {
    async fn append_event(&self, _obs: &Observation) -> Result<Option<String>, MemoryError> {
        Ok(None)
    }

    async fn start_turn(
        &self,
        _session_key: &str,
        _input_event_id: &str,
        _plan: Option<&str>,
    ) -> Result<Option<String>, MemoryError> {
        Ok(None)
    }

    async fn finish_turn(
        &self,
        _turn_id: &str,
        _status: TurnStatus,
        _error_message: Option<&str>,
        _final_output_obs_id: Option<&str>,
    ) -> Result<(), MemoryError> {
        Ok(())
    }
}

/// Fail-open wrapper: every error becomes a warning and a metric.
#[derive(Clone)]
pub struct MemoryHooks {
    inner: Arc<dyn MemoryService>,
    metrics: Arc<Metrics>,
}

impl MemoryHooks {
    pub fn new(inner: Arc<dyn MemoryService>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }

    pub async fn append_event(&self, obs: &Observation) -> Option<String> {
        match self.inner.append_event(obs).await {
            Ok(event_id) => event_id,
            Err(err) => {
                warn!(error = %err, "memory append_event failed");
                self.metrics.inc_memory_failures();
                None
            }
        }
    }

    pub async fn start_turn(
        &self,
        session_key: &str,
        input_event_id: &str,
        plan: Option<&str>,
    ) -> Option<String> {
        match self.inner.start_turn(session_key, input_event_id, plan).await {
            Ok(turn_id) => turn_id,
            Err(err) => {
                warn!(error = %err, "memory start_turn failed");
                self.metrics.inc_memory_failures();
                None
            }
        }
    }

    pub async fn finish_turn(
        &self,
        turn_id: &str,
        status: TurnStatus,
        error_message: Option<&str>,
        final_output_obs_id: Option<&str>,
    ) {
        if let Err(err) = self
            .inner
            .finish_turn(turn_id, status, error_message, final_output_obs_id)
            .await
        {
            warn!(error = %err, "memory finish_turn failed");
            self.metrics.inc_memory_failures();
        }
    }

    pub async fn close(&self) {
        if let Err(err) = self.inner.close().await {
            warn!(error = %err, "memory close failed");
            self.metrics.inc_memory_failures();
        }
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;

    /// Recorded turn lifecycle.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct TurnRecord {
        pub turn_id: String,
        pub session_key: String,
        pub input_event_id: String,
        pub status: Option<TurnStatus>,
        pub error_message: Option<String>,
        pub final_output_obs_id: Option<String>,
    }

    #[derive(Default)]
    struct FakeMemoryState {
        appended: Vec<Observation>,
        turns: Vec<TurnRecord>,
        fail: bool,
        closed: bool,
        counter: u64,
    }

    /// In-memory recording backend for tests.
    #[derive(Clone, Default)]
    pub struct FakeMemory {
        inner: Arc<Mutex<FakeMemoryState>>,
    }

    impl FakeMemory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn appended(&self) -> Vec<Observation> {
            self.inner.lock().appended.clone()
        }

        pub fn turns(&self) -> Vec<TurnRecord> {
            self.inner.lock().turns.clone()
        }

        pub fn set_fail(&self, fail: bool) {
            self.inner.lock().fail = fail;
        }

        pub fn is_closed(&self) -> bool {
            self.inner.lock().closed
        }
    }

    #[async_trait]
    impl MemoryService for FakeMemory {
        async fn append_event(&self, obs: &Observation) -> Result<Option<String>, MemoryError> {
            let mut state = self.inner.lock();
            if state.fail {
                return Err(MemoryError::Backend("fake append failure".to_string()));
            }
            state.counter += 1;
            state.appended.push(obs.clone());
            Ok(Some(format!("ev-{}", state.counter)))
        }

        async fn start_turn(
            &self,
            session_key: &str,
            input_event_id: &str,
            _plan: Option<&str>,
        ) -> Result<Option<String>, MemoryError> {
            let mut state = self.inner.lock();
            if state.fail {
                return Err(MemoryError::Backend("fake start_turn failure".to_string()));
            }
            state.counter += 1;
            let turn_id = format!("turn-{}", state.counter);
            state.turns.push(TurnRecord {
                turn_id: turn_id.clone(),
                session_key: session_key.to_string(),
                input_event_id: input_event_id.to_string(),
                status: None,
                error_message: None,
                final_output_obs_id: None,
            });
            Ok(Some(turn_id))
        }

        async fn finish_turn(
            &self,
            turn_id: &str,
            status: TurnStatus,
            error_message: Option<&str>,
            final_output_obs_id: Option<&str>,
        ) -> Result<(), MemoryError> {
            let mut state = self.inner.lock();
            if state.fail {
                return Err(MemoryError::Backend("fake finish_turn failure".to_string()));
            }
            if let Some(turn) = state.turns.iter_mut().find(|t| t.turn_id == turn_id) {
                turn.status = Some(status);
                turn.error_message = error_message.map(str::to_string);
                turn.final_output_obs_id = final_output_obs_id.map(str::to_string);
            }
            Ok(())
        }

        async fn close(&self) -> Result<(), MemoryError> {
            self.inner.lock().closed = true;
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMemory, TurnRecord};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Contract with the intelligent handler.
//!
//! The core hands the handler one DELIVERed observation at a time together
//! with the gate's decision, the owning session's state and the advisory
//! budget. Implementations wrapping synchronous provider clients (LLM HTTP
//! calls) must isolate them from the event loop with
//! `tokio::task::spawn_blocking`; the supplied `hint.budget.time_ms` is the
//! time envelope they are expected to honor.

use async_trait::async_trait;
use axon_core::{Observation, SessionState};
use axon_gate::{GateDecision, GateHint};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("handler failure: {0}")]
    Handler(String),
    #[error("provider failure: {0}")]
    Provider(String),
}

/// One DELIVERed observation for the handler.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub obs: Observation,
    pub decision: GateDecision,
    /// Snapshot of the owning session at dispatch time.
    pub session: SessionState,
    pub now: DateTime<Utc>,
    pub hint: Option<GateHint>,
}

/// Handler output: observations to publish back onto the bus. Emitted
/// MESSAGEs must carry the `agent:` source prefix so they are egressed and
/// never re-trigger the handler.
#[derive(Debug, Clone, Default)]
pub struct AgentReply {
    pub emit: Vec<Observation>,
}

impl AgentReply {
    pub fn silent() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait AgentHandler: Send + Sync + 'static {
    async fn handle(&self, request: AgentRequest) -> Result<AgentReply, AgentError>;
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use axon_core::Actor;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// How the fake responds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FakeAgentMode {
        /// Reply with an agent-sourced acknowledgment MESSAGE.
        Echo,
        /// Reply with no emissions.
        Silent,
        /// Fail every request.
        Fail,
    }

    struct FakeAgentState {
        requests: Vec<AgentRequest>,
        mode: FakeAgentMode,
    }

    /// Recording handler for tests.
    #[derive(Clone)]
    pub struct FakeAgent {
        inner: Arc<Mutex<FakeAgentState>>,
    }

    impl FakeAgent {
        pub fn new() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeAgentState {
                    requests: Vec::new(),
                    mode: FakeAgentMode::Echo,
                })),
            }
        }

        pub fn set_mode(&self, mode: FakeAgentMode) {
            self.inner.lock().mode = mode;
        }

        pub fn requests(&self) -> Vec<AgentRequest> {
            self.inner.lock().requests.clone()
        }

        pub fn call_count(&self) -> usize {
            self.inner.lock().requests.len()
        }
    }

    impl Default for FakeAgent {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl AgentHandler for FakeAgent {
        async fn handle(&self, request: AgentRequest) -> Result<AgentReply, AgentError> {
            let mode = {
                let mut state = self.inner.lock();
                state.requests.push(request.clone());
                state.mode
            };
            match mode {
                FakeAgentMode::Echo => {
                    let text = request.obs.normalized_text().unwrap_or("").to_string();
                    let reply = Observation::message(
                        Actor::agent(),
                        "agent:fake",
                        format!("ack: {}", text),
                        request.now,
                    )
                    .with_session_key(request.session.session_key.clone());
                    Ok(AgentReply { emit: vec![reply] })
                }
                FakeAgentMode::Silent => Ok(AgentReply::silent()),
                FakeAgentMode::Fail => {
                    Err(AgentError::Handler("fake agent failure".to_string()))
                }
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAgent, FakeAgentMode};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! axon-runtime: the concurrent dispatch engine.
//!
//! Producers publish observations onto the input bus without blocking; the
//! router demultiplexes them into per-session inboxes; one worker per session
//! drives the gate, the self-regulation controllers and — for DELIVERed
//! observations — the intelligent handler. Egress and memory are fail-open
//! collaborators reached through narrow async traits.

pub mod agent;
pub mod bus;
pub mod egress;
pub mod memory;
pub mod nociception;
pub mod reflex;
pub mod router;
pub mod runtime;

pub use agent::{AgentError, AgentHandler, AgentReply, AgentRequest};
#[cfg(any(test, feature = "test-support"))]
pub use agent::{FakeAgent, FakeAgentMode};
pub use bus::{BusReader, InputBus, PublishOutcome};
pub use egress::{should_egress, EgressAdapter, EgressError, EgressHub};
#[cfg(any(test, feature = "test-support"))]
pub use egress::FakeEgressAdapter;
pub use memory::{
    MemoryError, MemoryHooks, MemoryService, NoopMemory, TurnStatus, MEMORY_EVENT_ID_KEY,
};
#[cfg(any(test, feature = "test-support"))]
pub use memory::{FakeMemory, TurnRecord};
pub use nociception::{extract_pain_key, make_pain_alert, Nociceptor, NociceptionSnapshot};
pub use reflex::{
    ReflexController, SuggestionEntry, CONTROL_SYSTEM_MODE_CHANGED, CONTROL_TUNING_APPLIED,
    CONTROL_TUNING_REVERTED, CONTROL_TUNING_SUGGESTION,
};
pub use router::SessionRouter;
pub use runtime::{
    CoreRuntime, RuntimeConfig, RuntimeDeps, RuntimeSnapshot, SessionSummary,
};

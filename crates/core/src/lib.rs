// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! axon-core: event model and shared runtime primitives for the Axon dispatch core

pub mod clock;
pub mod metrics;
pub mod observation;
pub mod session;

#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use clock::{Clock, SystemClock};
pub use metrics::{Metrics, MetricsSnapshot};
pub use observation::{
    Actor, ActorType, Evidence, ObsType, Observation, ObservationError, Payload, QualityFlag,
    Severity, SourceKind, AGENT_ACTOR_ID, AGENT_SOURCE_PREFIX, SYSTEM_SESSION_KEY,
};
pub use session::{SessionState, RECENT_OBS_CAP};

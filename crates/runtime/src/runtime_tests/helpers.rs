// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for orchestrator tests.

use crate::agent::FakeAgent;
use crate::egress::{EgressHub, FakeEgressAdapter};
use crate::memory::FakeMemory;
use crate::router::SessionRouter;
use crate::runtime::{CoreRuntime, RuntimeConfig, RuntimeDeps};
use axon_core::{Actor, Clock, FakeClock, Metrics, Observation, SessionState};
use axon_gate::{GateConfig, GateConfigProvider};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type TestRuntime = Arc<CoreRuntime<FakeAgent, FakeClock>>;

pub(crate) struct TestHarness {
    pub runtime: TestRuntime,
    pub clock: FakeClock,
    pub agent: FakeAgent,
    pub memory: FakeMemory,
    pub egress: FakeEgressAdapter,
    pub provider: Arc<GateConfigProvider>,
    pub metrics: Arc<Metrics>,
    /// Session states for direct `process_obs` tests, keyed like the router
    /// would key them.
    states: Mutex<HashMap<String, Arc<Mutex<SessionState>>>>,
}

pub(crate) fn harness() -> TestHarness {
    harness_with(RuntimeConfig::default(), GateConfig::default())
}

pub(crate) fn harness_with(cfg: RuntimeConfig, gate_config: GateConfig) -> TestHarness {
    let clock = FakeClock::new();
    let agent = FakeAgent::new();
    let memory = FakeMemory::new();
    let metrics = Arc::new(Metrics::new());
    let egress_hub = Arc::new(EgressHub::new(Arc::clone(&metrics)));
    let egress = FakeEgressAdapter::new();
    egress_hub.register_default(Arc::new(egress.clone()));
    let provider = Arc::new(GateConfigProvider::new(gate_config));

    let runtime = CoreRuntime::new(
        RuntimeDeps {
            agent: agent.clone(),
            memory: Arc::new(memory.clone()),
            egress: egress_hub,
            provider: Arc::clone(&provider),
            metrics: Arc::clone(&metrics),
        },
        clock.clone(),
        cfg,
    );

    TestHarness {
        runtime,
        clock,
        agent,
        memory,
        egress,
        provider,
        metrics,
        states: Mutex::new(HashMap::new()),
    }
}

/// Config tuned for fast loop tests.
pub(crate) fn fast_config() -> RuntimeConfig {
    RuntimeConfig {
        watcher_interval: Duration::from_millis(10),
        sweep_interval: Duration::from_millis(20),
        ..RuntimeConfig::default()
    }
}

impl TestHarness {
    /// Run one observation through the worker path without loops, the way a
    /// session worker would after routing.
    pub(crate) async fn process(&self, obs: Observation) -> String {
        let key = SessionRouter::resolve_session_key(&obs);
        let obs = obs.with_session_key(key.clone());
        let state = Arc::clone(self.states.lock().entry(key.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(SessionState::new(&key, self.clock.now())))
        }));
        self.runtime.process_obs(&key, &state, obs).await;
        key
    }

    pub(crate) fn session_state(&self, key: &str) -> Option<Arc<Mutex<SessionState>>> {
        self.states.lock().get(key).cloned()
    }
}

pub(crate) fn user_msg(clock: &FakeClock, text: &str) -> Observation {
    Observation::message(Actor::user("alice"), "text_input", text, clock.now())
}

pub(crate) fn agent_msg(clock: &FakeClock, text: &str) -> Observation {
    Observation::message(Actor::agent(), "agent:core", text, clock.now())
        .with_session_key("dm:alice")
}

/// Poll until the condition holds or a wall-clock deadline passes.
pub(crate) async fn wait_until(label: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timeout waiting for {label}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

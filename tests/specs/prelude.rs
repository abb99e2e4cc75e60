//! Shared helpers for the behavioral tests.

use axon_core::{Actor, Clock, FakeClock, Metrics, Observation};
use axon_gate::{GateConfig, GateConfigProvider};
use axon_runtime::{
    CoreRuntime, EgressHub, FakeAgent, FakeEgressAdapter, FakeMemory, RuntimeConfig, RuntimeDeps,
};
use std::sync::Arc;
use std::time::Duration;

pub type SpecRuntime = Arc<CoreRuntime<FakeAgent, FakeClock>>;

pub struct Engine {
    pub runtime: SpecRuntime,
    pub clock: FakeClock,
    pub agent: FakeAgent,
    pub memory: FakeMemory,
    pub egress: FakeEgressAdapter,
    pub provider: Arc<GateConfigProvider>,
    pub metrics: Arc<Metrics>,
}

/// Build and start an engine with fake collaborators and fast maintenance
/// loops.
pub fn engine() -> Engine {
    engine_with_provider(Arc::new(GateConfigProvider::new(GateConfig::default())))
}

pub fn engine_with_provider(provider: Arc<GateConfigProvider>) -> Engine {
    let clock = FakeClock::new();
    let agent = FakeAgent::new();
    let memory = FakeMemory::new();
    let metrics = Arc::new(Metrics::new());
    let egress_hub = Arc::new(EgressHub::new(Arc::clone(&metrics)));
    let egress = FakeEgressAdapter::new();
    egress_hub.register_default(Arc::new(egress.clone()));

    let cfg = RuntimeConfig {
        watcher_interval: Duration::from_millis(10),
        sweep_interval: Duration::from_millis(20),
        ..RuntimeConfig::default()
    };
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
    runtime.start();

    Engine {
        runtime,
        clock,
        agent,
        memory,
        egress,
        provider,
        metrics,
    }
}

pub fn user_msg(engine: &Engine, actor_id: &str, text: &str) -> Observation {
    Observation::message(Actor::user(actor_id), "text_input", text, engine.clock.now())
}

/// Poll until the condition holds; panic after five wall-clock seconds.
pub async fn wait_until(label: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timeout waiting for {label}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Let the loops run briefly so "nothing further happens" assertions hold.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(60)).await;
}

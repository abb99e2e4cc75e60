// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core worker orchestrator.
//!
//! Owns the background tasks — router loop, watcher loop, session GC, egress
//! loop — plus one serial worker per session. Everything here is cancellable
//! and bounded: GC waits at most `worker_cancel_wait` per worker, shutdown at
//! most `shutdown_deadline` overall.

mod maintenance;
mod worker;

pub(crate) use worker::SessionEntry;

use crate::agent::AgentHandler;
use crate::bus::{self, BusReader, InputBus};
use crate::egress::EgressHub;
use crate::memory::{MemoryHooks, MemoryService};
use crate::nociception::{NociceptionSnapshot, Nociceptor};
use crate::reflex::{ReflexController, SuggestionEntry};
use crate::router::SessionRouter;
use axon_core::{Clock, Metrics, MetricsSnapshot, Observation, SYSTEM_SESSION_KEY};
use axon_gate::{Gate, GateConfigProvider};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Orchestrator tunables. Defaults follow the production profile.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub bus_capacity: usize,
    pub inbox_capacity: usize,
    pub egress_capacity: usize,
    pub watcher_interval: Duration,
    pub gc_enabled: bool,
    pub idle_ttl: Duration,
    pub sweep_interval: Duration,
    pub min_sessions_to_gc: usize,
    pub worker_cancel_wait: Duration,
    pub shutdown_deadline: Duration,
    pub egress_timeout: Duration,
    pub system_session_key: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bus_capacity: 1_024,
            inbox_capacity: 256,
            egress_capacity: 256,
            watcher_interval: Duration::from_millis(250),
            gc_enabled: true,
            idle_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(30),
            min_sessions_to_gc: 1,
            worker_cancel_wait: Duration::from_secs(1),
            shutdown_deadline: Duration::from_millis(1_500),
            egress_timeout: Duration::from_secs(5),
            system_session_key: SYSTEM_SESSION_KEY.to_string(),
        }
    }
}

/// External collaborators handed to the runtime.
pub struct RuntimeDeps<A> {
    pub agent: A,
    pub memory: Arc<dyn MemoryService>,
    pub egress: Arc<EgressHub>,
    pub provider: Arc<GateConfigProvider>,
    pub metrics: Arc<Metrics>,
}

/// Per-session summary in the runtime snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_key: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub processed_total: u64,
    pub error_total: u64,
    pub idle_seconds: u64,
}

/// Structured state consumed by controllers and tests.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeSnapshot {
    pub sessions: Vec<SessionSummary>,
    pub metrics: MetricsSnapshot,
    pub nociception: NociceptionSnapshot,
    pub suggestions: BTreeMap<String, SuggestionEntry>,
}

/// The dispatch engine.
pub struct CoreRuntime<A, C: Clock> {
    /// Back-reference for spawning tasks that need an owned handle.
    self_ref: Weak<Self>,
    pub(crate) cfg: RuntimeConfig,
    pub(crate) clock: C,
    pub(crate) agent: A,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) bus: InputBus,
    reader: Mutex<Option<BusReader>>,
    pub(crate) router: SessionRouter,
    pub(crate) provider: Arc<GateConfigProvider>,
    pub(crate) gate: Mutex<Gate>,
    pub(crate) nociceptor: Mutex<Nociceptor>,
    pub(crate) reflex: Mutex<ReflexController>,
    pub(crate) egress_hub: Arc<EgressHub>,
    pub(crate) egress_tx: Mutex<Option<mpsc::Sender<Observation>>>,
    egress_rx: Mutex<Option<mpsc::Receiver<Observation>>>,
    pub(crate) memory: MemoryHooks,
    pub(crate) sessions: Mutex<HashMap<String, SessionEntry>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl<A, C> CoreRuntime<A, C>
where
    A: AgentHandler,
    C: Clock,
{
    pub fn new(deps: RuntimeDeps<A>, clock: C, cfg: RuntimeConfig) -> Arc<Self> {
        let metrics = deps.metrics;
        let (bus, reader) = bus::channel(cfg.bus_capacity, Arc::clone(&metrics));
        let router = SessionRouter::new(cfg.inbox_capacity, Arc::clone(&metrics));
        let (egress_tx, egress_rx) = mpsc::channel(cfg.egress_capacity);
        let (shutdown_tx, _) = watch::channel(false);

        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            cfg,
            clock,
            agent: deps.agent,
            memory: MemoryHooks::new(deps.memory, Arc::clone(&metrics)),
            metrics,
            bus,
            reader: Mutex::new(Some(reader)),
            router,
            provider: deps.provider,
            gate: Mutex::new(Gate::new()),
            nociceptor: Mutex::new(Nociceptor::new()),
            reflex: Mutex::new(ReflexController::new()),
            egress_hub: deps.egress,
            egress_tx: Mutex::new(Some(egress_tx)),
            egress_rx: Mutex::new(Some(egress_rx)),
            sessions: Mutex::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    /// Producer handle for adapters.
    pub fn bus(&self) -> InputBus {
        self.bus.clone()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn provider(&self) -> Arc<GateConfigProvider> {
        Arc::clone(&self.provider)
    }

    pub fn router(&self) -> &SessionRouter {
        &self.router
    }

    /// Inspect the gate (pools, dedup state) under its lock.
    pub fn inspect_gate<R>(&self, f: impl FnOnce(&Gate) -> R) -> R {
        f(&self.gate.lock())
    }

    /// Launch the background tasks. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        info!("core runtime starting");
        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(Arc::clone(&this).router_loop()));
        tasks.push(tokio::spawn(Arc::clone(&this).watcher_loop()));
        if self.cfg.gc_enabled {
            tasks.push(tokio::spawn(Arc::clone(&this).gc_loop()));
        }
        tasks.push(tokio::spawn(this.egress_loop()));
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Owned handle for spawning; `None` only while the runtime is dropping.
    pub(crate) fn self_ref_upgrade(&self) -> Option<Arc<Self>> {
        self.self_ref.upgrade()
    }

    /// Consume the bus into per-session inboxes. Ends once the bus is closed
    /// and drained.
    async fn router_loop(self: Arc<Self>) {
        let Some(mut reader) = self.reader.lock().take() else {
            return;
        };
        while let Some(obs) = reader.recv().await {
            self.router.route(obs);
        }
        tracing::debug!("router loop ended");
    }

    /// Drain the egress queue; failures and timeouts are logged, never
    /// propagated.
    async fn egress_loop(self: Arc<Self>) {
        let Some(mut rx) = self.egress_rx.lock().take() else {
            return;
        };
        while let Some(obs) = rx.recv().await {
            match tokio::time::timeout(self.cfg.egress_timeout, self.egress_hub.dispatch(&obs))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(error = %err, "egress dispatch failed");
                    self.metrics.inc_egress_failed();
                }
                Err(_) => {
                    warn!("egress dispatch timed out");
                    self.metrics.inc_egress_failed();
                }
            }
        }
        tracing::debug!("egress loop ended");
    }

    /// Graceful stop: close intake, drain workers within the deadline,
    /// force-cancel the rest, flush memory. Idempotent.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("core runtime shutting down");
        let deadline = self.cfg.shutdown_deadline;
        let started_at = tokio::time::Instant::now();

        // stop watcher and GC first so nothing is revived mid-teardown
        let _ = self.shutdown_tx.send(true);
        self.bus.close();

        // dropping the inbox senders lets workers drain and exit
        for key in self.router.list_active_sessions() {
            self.router.remove_session(&key);
        }
        let entries: Vec<(String, SessionEntry)> = self.sessions.lock().drain().collect();
        for (key, entry) in entries {
            let mut task = entry.task;
            let remaining = deadline.saturating_sub(started_at.elapsed());
            if tokio::time::timeout(remaining, &mut task).await.is_err() {
                warn!(session = %key, "worker force-cancelled at shutdown");
                task.abort();
            }
        }

        // close the egress channel; the loop drains and exits
        drop(self.egress_tx.lock().take());

        let tasks: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock();
            tasks.drain(..).collect()
        };
        for mut task in tasks {
            let remaining = deadline.saturating_sub(started_at.elapsed());
            if tokio::time::timeout(remaining, &mut task).await.is_err() {
                task.abort();
            }
        }

        self.memory.close().await;
        info!("core runtime stopped");
    }

    /// Structured state snapshot for controllers and tests.
    pub fn state_snapshot(&self) -> RuntimeSnapshot {
        let now = self.clock.now();
        let mut sessions: Vec<SessionSummary> = self
            .sessions
            .lock()
            .iter()
            .map(|(key, entry)| {
                let state = entry.state.lock();
                SessionSummary {
                    session_key: key.clone(),
                    created_at: state.created_at,
                    last_active_at: state.last_active_at,
                    processed_total: state.processed_total,
                    error_total: state.error_total,
                    idle_seconds: state.idle_seconds(now),
                }
            })
            .collect();
        sessions.sort_by(|a, b| a.session_key.cmp(&b.session_key));

        RuntimeSnapshot {
            sessions,
            metrics: self.metrics.snapshot(),
            nociception: self.nociceptor.lock().snapshot(),
            suggestions: self.reflex.lock().entries().clone(),
        }
    }
}

#[cfg(test)]
#[path = "../runtime_tests/mod.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counters and structured state snapshots.
//!
//! Counters are plain atomics: each is incremented from exactly one logical
//! place (bus, router, gate finalize, egress loop, worker), so no aggregate
//! consistency is needed beyond monotonicity. The snapshot is what the reflex
//! controller and tests consume.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    bus_published_total: AtomicU64,
    bus_dropped_total: AtomicU64,
    bus_rejected_total: AtomicU64,
    inbox_dropped_total: AtomicU64,
    gate_dropped_total: AtomicU64,
    egress_dispatched_total: AtomicU64,
    egress_dropped_total: AtomicU64,
    egress_failed_total: AtomicU64,
    agent_invocations_total: AtomicU64,
    agent_errors_total: AtomicU64,
    memory_failures_total: AtomicU64,
    /// Gate decisions keyed `"{scene}/{action}"`.
    decisions: Mutex<BTreeMap<String, u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_bus_published(&self) {
        self.bus_published_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bus_dropped(&self) {
        self.bus_dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bus_rejected(&self) {
        self.bus_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_inbox_dropped(&self) {
        self.inbox_dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_egress_dispatched(&self) {
        self.egress_dispatched_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_egress_dropped(&self) {
        self.egress_dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_egress_failed(&self) {
        self.egress_failed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_agent_invocations(&self) {
        self.agent_invocations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_agent_errors(&self) {
        self.agent_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_memory_failures(&self) {
        self.memory_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a gate decision per scene and action.
    pub fn record_decision(&self, scene: &str, action: &str) {
        if action == "drop" {
            self.gate_dropped_total.fetch_add(1, Ordering::Relaxed);
        }
        let mut decisions = self.decisions.lock();
        *decisions.entry(format!("{}/{}", scene, action)).or_insert(0) += 1;
    }

    pub fn bus_dropped(&self) -> u64 {
        self.bus_dropped_total.load(Ordering::Relaxed)
    }

    pub fn inbox_dropped(&self) -> u64 {
        self.inbox_dropped_total.load(Ordering::Relaxed)
    }

    pub fn gate_dropped(&self) -> u64 {
        self.gate_dropped_total.load(Ordering::Relaxed)
    }

    pub fn agent_invocations(&self) -> u64 {
        self.agent_invocations_total.load(Ordering::Relaxed)
    }

    pub fn agent_errors(&self) -> u64 {
        self.agent_errors_total.load(Ordering::Relaxed)
    }

    /// Combined drop counter feeding the overload check: queue overflow on
    /// the bus and inboxes plus gate DROP decisions.
    pub fn drop_total(&self) -> u64 {
        self.bus_dropped() + self.inbox_dropped() + self.gate_dropped()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bus_published_total: self.bus_published_total.load(Ordering::Relaxed),
            bus_dropped_total: self.bus_dropped(),
            bus_rejected_total: self.bus_rejected_total.load(Ordering::Relaxed),
            inbox_dropped_total: self.inbox_dropped(),
            gate_dropped_total: self.gate_dropped(),
            egress_dispatched_total: self.egress_dispatched_total.load(Ordering::Relaxed),
            egress_dropped_total: self.egress_dropped_total.load(Ordering::Relaxed),
            egress_failed_total: self.egress_failed_total.load(Ordering::Relaxed),
            agent_invocations_total: self.agent_invocations(),
            agent_errors_total: self.agent_errors(),
            memory_failures_total: self.memory_failures_total.load(Ordering::Relaxed),
            decisions: self.decisions.lock().clone(),
        }
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub bus_published_total: u64,
    pub bus_dropped_total: u64,
    pub bus_rejected_total: u64,
    pub inbox_dropped_total: u64,
    pub gate_dropped_total: u64,
    pub egress_dispatched_total: u64,
    pub egress_dropped_total: u64,
    pub egress_failed_total: u64,
    pub agent_invocations_total: u64,
    pub agent_errors_total: u64,
    pub memory_failures_total: u64,
    pub decisions: BTreeMap<String, u64>,
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;

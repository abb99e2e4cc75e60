// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watcher and idle-session GC loops.

use super::{CoreRuntime, SessionEntry};
use crate::agent::AgentHandler;
use axon_core::Clock;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

impl<A, C> CoreRuntime<A, C>
where
    A: AgentHandler,
    C: Clock,
{
    /// Every tick, make sure a worker exists for every active session. The
    /// scan covers the router's whole current set, not only new keys: GC
    /// removes entries whose next event must resurrect them.
    pub(crate) async fn watcher_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown_signal();
        let mut ticker = tokio::time::interval(self.cfg.watcher_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.watcher_tick(),
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("watcher loop ended");
    }

    pub(crate) fn watcher_tick(&self) {
        for key in self.router.list_active_sessions() {
            self.ensure_worker(&key);
        }
    }

    pub(crate) async fn gc_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown_signal();
        let mut ticker = tokio::time::interval(self.cfg.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.gc_sweep().await,
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("gc loop ended");
    }

    /// Collect sessions idle past the TTL. The system session is exempt.
    /// Each worker gets a bounded cancellation wait; one that overruns it is
    /// abandoned — the session is removed regardless and a later event
    /// re-creates the state.
    pub(crate) async fn gc_sweep(&self) {
        let now = self.clock.now();
        let idle_ttl_secs = self.cfg.idle_ttl.as_secs();
        let candidates: Vec<String> = {
            let sessions = self.sessions.lock();
            sessions
                .iter()
                .filter(|(key, entry)| {
                    **key != self.cfg.system_session_key
                        && entry.state.lock().idle_seconds(now) >= idle_ttl_secs
                })
                .map(|(key, _)| key.clone())
                .collect()
        };
        if candidates.len() < self.cfg.min_sessions_to_gc {
            return;
        }

        for key in candidates {
            self.router.remove_session(&key);
            let entry: Option<SessionEntry> = self.sessions.lock().remove(&key);
            let Some(entry) = entry else {
                continue;
            };
            info!(session = %key, "collecting idle session");
            let mut task = entry.task;
            if tokio::time::timeout(self.cfg.worker_cancel_wait, &mut task)
                .await
                .is_err()
            {
                warn!(session = %key, "worker exceeded cancellation deadline, abandoning");
                task.abort();
            }
        }
    }
}

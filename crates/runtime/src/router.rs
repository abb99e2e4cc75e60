// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Demultiplexes the bus stream into per-session bounded inboxes.
//!
//! The router only creates channels; workers are the watcher's job. A fresh
//! inbox parks its receiver until a worker claims it, so an event arriving
//! for a GC'd session re-creates the inbox and the next watcher tick revives
//! the worker.

use axon_core::{ActorType, Metrics, ObsType, Observation, SYSTEM_SESSION_KEY};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Per-session inbox capacity.
pub const DEFAULT_INBOX_CAPACITY: usize = 256;

struct Inbox {
    tx: mpsc::Sender<Observation>,
    /// Receiver parked until a worker claims it.
    pending: Option<mpsc::Receiver<Observation>>,
}

fn new_inbox(capacity: usize) -> Inbox {
    let (tx, rx) = mpsc::channel(capacity);
    Inbox {
        tx,
        pending: Some(rx),
    }
}

pub struct SessionRouter {
    inbox_capacity: usize,
    metrics: Arc<Metrics>,
    inner: Mutex<HashMap<String, Inbox>>,
}

impl SessionRouter {
    pub fn new(inbox_capacity: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            inbox_capacity,
            metrics,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Derive the routing key for an observation without one.
    pub fn resolve_session_key(obs: &Observation) -> String {
        if let Some(key) = &obs.session_key {
            if !key.is_empty() {
                return key.clone();
            }
        }
        match obs.obs_type {
            ObsType::Message if obs.actor.actor_type == ActorType::User => {
                format!("dm:{}", obs.actor.actor_id)
            }
            ObsType::Schedule | ObsType::Alert | ObsType::System | ObsType::Control => {
                SYSTEM_SESSION_KEY.to_string()
            }
            _ => "unknown".to_string(),
        }
    }

    /// Enqueue to the target inbox, drop-newest on full. Returns whether the
    /// observation was enqueued.
    pub fn route(&self, mut obs: Observation) -> bool {
        let key = Self::resolve_session_key(&obs);
        obs.session_key = Some(key.clone());

        let mut inner = self.inner.lock();
        let inbox = inner
            .entry(key.clone())
            .or_insert_with(|| new_inbox(self.inbox_capacity));
        match inbox.tx.try_send(obs) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(session = %key, "session inbox full, dropping newest");
                self.metrics.inc_inbox_dropped();
                false
            }
            Err(TrySendError::Closed(obs)) => {
                // the worker's receiver died without a GC; rebuild the inbox
                // so the watcher revives the session on its next tick
                debug!(session = %key, "inbox receiver gone, rebuilding");
                let fresh = new_inbox(self.inbox_capacity);
                let enqueued = fresh.tx.try_send(obs).is_ok();
                *inbox = fresh;
                enqueued
            }
        }
    }

    /// Take the parked receiver for a session, if any.
    pub fn claim_inbox(&self, key: &str) -> Option<mpsc::Receiver<Observation>> {
        self.inner.lock().get_mut(key).and_then(|i| i.pending.take())
    }

    /// Replace a session's channel and hand back the new receiver. Used by
    /// the watcher when a worker died holding the old receiver. Queued
    /// events in the dead receiver are lost.
    pub fn rebuild_inbox(&self, key: &str) -> Option<mpsc::Receiver<Observation>> {
        let mut inner = self.inner.lock();
        let inbox = inner.get_mut(key)?;
        if let Some(rx) = inbox.pending.take() {
            return Some(rx);
        }
        let mut fresh = new_inbox(self.inbox_capacity);
        inbox.tx = fresh.tx.clone();
        fresh.pending.take()
    }

    /// Stable snapshot of the keys with inboxes.
    pub fn list_active_sessions(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drop a session's inbox. Must be called by the GC after terminating
    /// the worker, or the watcher will keep reviving it.
    pub fn remove_session(&self, key: &str) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    pub fn contains_session(&self, key: &str) -> bool {
        self.inner.lock().contains_key(key)
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;

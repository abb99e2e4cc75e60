// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session serial workers.
//!
//! A worker is the only writer of its `SessionState`. Each observation is
//! fully processed — gate, emit/ingest bookkeeping, and for DELIVER the
//! handler call with its memory effects — before the next one is dequeued,
//! so a slow handler head-of-line blocks its own session and nothing else.

use super::CoreRuntime;
use crate::agent::{AgentHandler, AgentRequest};
use crate::egress;
use crate::memory::{TurnStatus, MEMORY_EVENT_ID_KEY};
use axon_core::{Clock, ObsType, Observation, Payload, SessionState};
use axon_gate::{GateAction, GateContext, GateDecision};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub(crate) struct SessionEntry {
    pub state: Arc<Mutex<SessionState>>,
    pub task: JoinHandle<()>,
}

impl<A, C> CoreRuntime<A, C>
where
    A: AgentHandler,
    C: Clock,
{
    /// Make sure a live worker exists for the session. Called by the watcher
    /// for every active router key, which is what revives a GC'd session
    /// after its next event.
    pub(crate) fn ensure_worker(&self, key: &str) {
        let Some(this) = self.self_ref_upgrade() else {
            return;
        };
        let mut sessions = self.sessions.lock();
        if let Some(entry) = sessions.get(key) {
            if !entry.task.is_finished() {
                return;
            }
        }
        let rx = match self.router.claim_inbox(key) {
            Some(rx) => rx,
            None => match self.router.rebuild_inbox(key) {
                Some(rx) => rx,
                None => return,
            },
        };
        let state = sessions
            .get(key)
            .map(|entry| Arc::clone(&entry.state))
            .unwrap_or_else(|| {
                Arc::new(Mutex::new(SessionState::new(key, self.clock.now())))
            });
        debug!(session = %key, "spawning session worker");
        let task = tokio::spawn(this.session_loop(key.to_string(), Arc::clone(&state), rx));
        sessions.insert(key.to_string(), SessionEntry { state, task });
    }

    async fn session_loop(
        self: Arc<Self>,
        key: String,
        state: Arc<Mutex<SessionState>>,
        mut rx: mpsc::Receiver<Observation>,
    ) {
        debug!(session = %key, "session worker started");
        while let Some(obs) = rx.recv().await {
            self.process_obs(&key, &state, obs).await;
        }
        debug!(session = %key, "session worker stopped");
    }

    /// Process one observation end to end.
    pub(crate) async fn process_obs(
        &self,
        key: &str,
        state: &Arc<Mutex<SessionState>>,
        mut obs: Observation,
    ) {
        let now = self.clock.now();
        state.lock().record(&obs, now);

        if egress::should_egress(&obs) {
            self.enqueue_egress(&obs);
        }

        self.provider.reload_if_changed();
        let snapshot = self.provider.snapshot();

        let outcome = {
            let session_state = state.lock();
            let ctx = GateContext {
                now,
                config: snapshot.as_ref(),
                system_session_key: &self.cfg.system_session_key,
                metrics: &self.metrics,
                session_state: Some(&session_state),
                system_health: None,
                trace: None,
            };
            self.gate.lock().handle(&obs, &ctx)
        };

        for emitted in &outcome.emit {
            self.bus.publish_nowait(emitted.clone());
        }
        {
            let mut gate = self.gate.lock();
            for ingested in &outcome.ingest {
                gate.ingest(ingested, &outcome.decision);
            }
        }

        if key != self.cfg.system_session_key {
            if let Some(event_id) = self.memory.append_event(&obs).await {
                obs.metadata
                    .insert(MEMORY_EVENT_ID_KEY.to_string(), json!(event_id));
            }
        }

        if outcome.decision.action != GateAction::Deliver {
            return;
        }
        self.handle_observation(key, state, obs, outcome.decision, now)
            .await;
    }

    async fn handle_observation(
        &self,
        key: &str,
        state: &Arc<Mutex<SessionState>>,
        obs: Observation,
        decision: GateDecision,
        now: DateTime<Utc>,
    ) {
        if key == self.cfg.system_session_key {
            self.handle_system(obs, now).await;
        } else {
            self.handle_user(key, state, obs, decision, now).await;
        }
    }

    /// System-session dispatch: pain aggregation, reflex control, overload
    /// inspection — each followed by the override TTL sweep.
    async fn handle_system(&self, obs: Observation, now: DateTime<Utc>) {
        let mut emits: Vec<Observation> = Vec::new();
        match &obs.payload {
            Payload::Alert { .. } => {
                emits.extend(self.nociceptor.lock().record_pain(&obs, now));
            }
            Payload::Control { .. } => {
                emits.extend(self.reflex.lock().handle_control(&obs, &self.provider, now));
            }
            Payload::Schedule { .. } => {
                emits.extend(
                    self.nociceptor
                        .lock()
                        .check_drop_overload(self.metrics.drop_total(), now),
                );
            }
            _ => return,
        }
        emits.extend(self.reflex.lock().evaluate_ttl(&self.provider, now));

        for emitted in emits {
            self.bus.publish_nowait(emitted);
        }
    }

    /// User-session dispatch: reject self-loops, then hand MESSAGEs to the
    /// handler with the turn lifecycle around the call.
    async fn handle_user(
        &self,
        key: &str,
        state: &Arc<Mutex<SessionState>>,
        obs: Observation,
        decision: GateDecision,
        now: DateTime<Utc>,
    ) {
        if obs.is_agent_sourced() {
            debug!(session = %key, obs_id = %obs.obs_id, "self-loop rejected");
            return;
        }
        if obs.obs_type != ObsType::Message {
            return;
        }

        let turn_id = match obs.metadata.get(MEMORY_EVENT_ID_KEY).and_then(Value::as_str) {
            Some(event_id) => self.memory.start_turn(key, event_id, None).await,
            None => None,
        };

        self.metrics.inc_agent_invocations();
        let request = AgentRequest {
            obs: obs.clone(),
            session: state.lock().clone(),
            now,
            hint: decision.hint.clone(),
            decision,
        };

        match self.agent.handle(request).await {
            Ok(reply) => {
                let final_output = reply.emit.first().map(|o| o.obs_id.clone());
                for emitted in reply.emit {
                    self.bus.publish_nowait(emitted);
                }
                if let Some(turn_id) = turn_id {
                    self.memory
                        .finish_turn(&turn_id, TurnStatus::Ok, None, final_output.as_deref())
                        .await;
                }
            }
            Err(err) => {
                warn!(session = %key, error = %err, "agent handler failed");
                state.lock().error_total += 1;
                self.metrics.inc_agent_errors();
                if let Some(turn_id) = turn_id {
                    self.memory
                        .finish_turn(&turn_id, TurnStatus::Error, Some(&err.to_string()), None)
                        .await;
                }
            }
        }
    }

    fn enqueue_egress(&self, obs: &Observation) {
        let guard = self.egress_tx.lock();
        let Some(tx) = guard.as_ref() else {
            return;
        };
        match tx.try_send(obs.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(session = %obs.routing_key(), "egress queue full, dropping newest");
                self.metrics.inc_egress_dropped();
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

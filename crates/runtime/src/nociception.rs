// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pain aggregation: error-as-event with burst-based self-protection.
//!
//! Adapter failures are standardized into ALERT observations. Repeated pain
//! from the same `source_kind:source_id` within the window puts that adapter
//! into cooldown and suppresses fanout; a jump in the drop counters between
//! two ticks does the same for the system as a whole.

use axon_core::{Observation, Payload, Severity};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::warn;

pub const PAIN_WINDOW_SECONDS: i64 = 60;
pub const PAIN_BURST_THRESHOLD: usize = 5;
pub const ADAPTER_COOLDOWN_SECONDS: i64 = 300;
pub const FANOUT_SUPPRESS_SECONDS: i64 = 60;
pub const DROP_OVERLOAD_DELTA: u64 = 50;
pub const DROP_OVERLOAD_WINDOW_SECONDS: i64 = 30;

const NOCICEPTION_SOURCE: &str = "core:nociception";

/// Standardized pain ALERT addressed to the system session.
pub fn make_pain_alert(
    source_kind: &str,
    source_id: &str,
    severity: Severity,
    exception_type: Option<String>,
    message: Option<String>,
    now: DateTime<Utc>,
) -> Observation {
    Observation::alert(
        severity,
        source_kind,
        source_id,
        exception_type,
        json!({ "message": message }),
        now,
    )
    .with_source_name(NOCICEPTION_SOURCE)
}

/// Aggregation key of an ALERT observation.
pub fn extract_pain_key(obs: &Observation) -> Option<String> {
    match &obs.payload {
        Payload::Alert {
            source_kind,
            source_id,
            ..
        } => Some(format!("{}:{}", source_kind, source_id)),
        _ => None,
    }
}

/// Serializable view of the protection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NociceptionSnapshot {
    pub adapter_cooldowns: BTreeMap<String, DateTime<Utc>>,
    pub fanout_suppress_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct Nociceptor {
    pain: HashMap<String, VecDeque<DateTime<Utc>>>,
    adapter_cooldowns: HashMap<String, DateTime<Utc>>,
    fanout_suppress_until: Option<DateTime<Utc>>,
    last_drop_total: u64,
    last_drop_check: Option<DateTime<Utc>>,
}

impl Nociceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pain ALERT. When the burst threshold trips, the failing
    /// adapter is cooled down, fanout is suppressed, and a synthesized
    /// system pain ALERT is returned for publication.
    pub fn record_pain(&mut self, obs: &Observation, now: DateTime<Utc>) -> Option<Observation> {
        // our own synthesized alerts do not feed the windows; a sustained
        // burst would otherwise cascade
        if obs.source_name == NOCICEPTION_SOURCE {
            let is_self = matches!(
                &obs.payload,
                Payload::Alert { source_kind, .. } if source_kind == "system"
            );
            if is_self {
                return None;
            }
        }

        let key = extract_pain_key(obs)?;
        let source_id = match &obs.payload {
            Payload::Alert { source_id, .. } => source_id.clone(),
            _ => return None,
        };

        let window = Duration::seconds(PAIN_WINDOW_SECONDS);
        let timestamps = self.pain.entry(key.clone()).or_default();
        timestamps.push_back(now);
        while timestamps
            .front()
            .map(|t| now - *t > window)
            .unwrap_or(false)
        {
            timestamps.pop_front();
        }

        if timestamps.len() < PAIN_BURST_THRESHOLD {
            return None;
        }
        timestamps.clear();

        let cooldown_until = now + Duration::seconds(ADAPTER_COOLDOWN_SECONDS);
        self.adapter_cooldowns.insert(source_id.clone(), cooldown_until);
        self.fanout_suppress_until = Some(now + Duration::seconds(FANOUT_SUPPRESS_SECONDS));
        warn!(
            pain_key = %key,
            cooldown_until = %cooldown_until,
            "pain burst, cooling adapter down"
        );

        Some(make_pain_alert(
            "system",
            "pain_burst",
            Severity::High,
            None,
            Some(format!("pain burst from {}", key)),
            now,
        ))
    }

    /// Per-tick drop-overload inspection. `drop_total` is the combined drop
    /// counter; a delta of [`DROP_OVERLOAD_DELTA`] or more against the
    /// previous tick within the window raises a system pain ALERT.
    pub fn check_drop_overload(
        &mut self,
        drop_total: u64,
        now: DateTime<Utc>,
    ) -> Option<Observation> {
        let alert = match self.last_drop_check {
            Some(last)
                if now - last <= Duration::seconds(DROP_OVERLOAD_WINDOW_SECONDS) =>
            {
                let delta = drop_total.saturating_sub(self.last_drop_total);
                if delta >= DROP_OVERLOAD_DELTA {
                    self.fanout_suppress_until =
                        Some(now + Duration::seconds(FANOUT_SUPPRESS_SECONDS));
                    warn!(delta, "drop overload, suppressing fanout");
                    Some(make_pain_alert(
                        "system",
                        "drop_overload",
                        Severity::High,
                        None,
                        Some(format!("{} drops since last tick", delta)),
                        now,
                    ))
                } else {
                    None
                }
            }
            _ => None,
        };

        self.last_drop_total = drop_total;
        self.last_drop_check = Some(now);
        self.adapter_cooldowns.retain(|_, until| *until > now);
        alert
    }

    pub fn in_cooldown(&self, source_id: &str, now: DateTime<Utc>) -> bool {
        self.adapter_cooldowns
            .get(source_id)
            .map(|until| *until > now)
            .unwrap_or(false)
    }

    pub fn cooldown_until(&self, source_id: &str) -> Option<DateTime<Utc>> {
        self.adapter_cooldowns.get(source_id).copied()
    }

    pub fn fanout_suppressed(&self, now: DateTime<Utc>) -> bool {
        self.fanout_suppress_until
            .map(|until| until > now)
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> NociceptionSnapshot {
        NociceptionSnapshot {
            adapter_cooldowns: self
                .adapter_cooldowns
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            fanout_suppress_until: self.fanout_suppress_until,
        }
    }
}

#[cfg(test)]
#[path = "nociception_tests.rs"]
mod tests;

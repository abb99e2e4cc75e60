// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System reflex controller.
//!
//! Translates CONTROL(`tuning_suggestion`) into whitelisted, TTL-bounded
//! config overrides with a per-key cooldown, and reverts them automatically.
//! Every suggestion is answered with a CONTROL(`tuning_applied`) carrying the
//! approved and denied key sets; actual changes additionally announce a
//! CONTROL(`system_mode_changed`), and expiry a CONTROL(`tuning_reverted`).

use axon_gate::{GateConfig, GateConfigProvider, OverridePatch};
use axon_core::{Observation, Payload};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

pub const CONTROL_TUNING_SUGGESTION: &str = "tuning_suggestion";
pub const CONTROL_TUNING_APPLIED: &str = "tuning_applied";
pub const CONTROL_SYSTEM_MODE_CHANGED: &str = "system_mode_changed";
pub const CONTROL_TUNING_REVERTED: &str = "tuning_reverted";

pub const SUGGESTION_COOLDOWN_SECS: i64 = 30;
pub const SUGGESTION_TTL_SECS: i64 = 60;
pub const SUGGESTION_TTL_MAX_SECS: i64 = 3600;

const REFLEX_SOURCE: &str = "core:reflex";

/// One applied override awaiting its TTL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionEntry {
    /// Value to restore on expiry.
    pub prior: Value,
    pub active_until: DateTime<Utc>,
    pub last_applied_ts: DateTime<Utc>,
    pub applied_reason: String,
}

pub struct ReflexController {
    whitelist: BTreeSet<String>,
    cooldown: Duration,
    default_ttl: Duration,
    entries: BTreeMap<String, SuggestionEntry>,
    /// Survives entry removal so reverts do not reset the cooldown.
    last_applied: BTreeMap<String, DateTime<Utc>>,
}

impl Default for ReflexController {
    fn default() -> Self {
        Self::with_whitelist(["force_low_model".to_string()])
    }
}

impl ReflexController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_whitelist(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            whitelist: keys.into_iter().collect(),
            cooldown: Duration::seconds(SUGGESTION_COOLDOWN_SECS),
            default_ttl: Duration::seconds(SUGGESTION_TTL_SECS),
            entries: BTreeMap::new(),
            last_applied: BTreeMap::new(),
        }
    }

    pub fn entries(&self) -> &BTreeMap<String, SuggestionEntry> {
        &self.entries
    }

    /// Process a CONTROL observation. Returns the CONTROL observations to
    /// publish back onto the bus.
    pub fn handle_control(
        &mut self,
        obs: &Observation,
        provider: &GateConfigProvider,
        now: DateTime<Utc>,
    ) -> Vec<Observation> {
        let Payload::Control { kind, data } = &obs.payload else {
            return Vec::new();
        };
        if kind != CONTROL_TUNING_SUGGESTION {
            return Vec::new();
        }

        let reason = data
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("unspecified")
            .to_string();
        let ttl_secs = data
            .get("ttl_sec")
            .and_then(Value::as_i64)
            .unwrap_or(self.default_ttl.num_seconds())
            .clamp(1, SUGGESTION_TTL_MAX_SECS);
        let until = now + Duration::seconds(ttl_secs);

        let Some(suggested) = data.get("suggested_overrides").and_then(Value::as_object) else {
            warn!("tuning suggestion without suggested_overrides map");
            let denied: Map<String, Value> =
                [("suggested_overrides".to_string(), json!("invalid_payload"))]
                    .into_iter()
                    .collect();
            return vec![self.applied_event(Map::new(), denied, ttl_secs, until, now)];
        };

        let snapshot = provider.snapshot();
        let mut patch = OverridePatch::default();
        let mut approved = Map::new();
        let mut denied = Map::new();
        let mut priors: Vec<(String, Value)> = Vec::new();

        for (key, value) in suggested {
            if !self.whitelist.contains(key) {
                denied.insert(key.clone(), json!("not_whitelisted"));
                continue;
            }
            if let Some(last) = self.last_applied.get(key) {
                if now - *last < self.cooldown {
                    denied.insert(key.clone(), json!("cooldown"));
                    continue;
                }
            }
            match apply_to_patch(&mut patch, key, value) {
                Ok(()) => {
                    priors.push((key.clone(), override_value(&snapshot, key)));
                    approved.insert(key.clone(), value.clone());
                }
                Err(()) => {
                    denied.insert(key.clone(), json!("invalid_payload"));
                }
            }
        }

        let mut emits = Vec::new();
        if !approved.is_empty() {
            provider.update_overrides(patch);
            for (key, prior) in priors {
                self.last_applied.insert(key.clone(), now);
                self.entries.insert(
                    key,
                    SuggestionEntry {
                        prior,
                        active_until: until,
                        last_applied_ts: now,
                        applied_reason: reason.clone(),
                    },
                );
            }
            info!(
                approved = ?approved.keys().collect::<Vec<_>>(),
                ttl_secs,
                reason = %reason,
                "tuning suggestion applied"
            );
        }

        emits.push(self.applied_event(approved.clone(), denied, ttl_secs, until, now));
        if !approved.is_empty() {
            emits.push(
                Observation::control(
                    CONTROL_SYSTEM_MODE_CHANGED,
                    json!({
                        "changed_overrides": Value::Object(approved),
                        "reason": reason,
                    }),
                    now,
                )
                .with_source_name(REFLEX_SOURCE),
            );
        }
        emits
    }

    /// Revert every entry whose TTL elapsed. Called on each system-session
    /// ALERT, CONTROL and SCHEDULE observation.
    pub fn evaluate_ttl(
        &mut self,
        provider: &GateConfigProvider,
        now: DateTime<Utc>,
    ) -> Vec<Observation> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| now >= entry.active_until)
            .map(|(key, _)| key.clone())
            .collect();

        let mut emits = Vec::new();
        for key in expired {
            let Some(entry) = self.entries.remove(&key) else {
                continue;
            };
            let mut patch = OverridePatch::default();
            if apply_to_patch(&mut patch, &key, &entry.prior).is_ok() {
                provider.update_overrides(patch);
            }
            info!(key = %key, "tuning override expired, reverted");

            let mut reverted = Map::new();
            reverted.insert(key, entry.prior);
            emits.push(
                Observation::control(
                    CONTROL_TUNING_REVERTED,
                    json!({
                        "reverted_overrides": Value::Object(reverted),
                        "reason": "ttl_expired",
                    }),
                    now,
                )
                .with_source_name(REFLEX_SOURCE),
            );
        }
        emits
    }

    fn applied_event(
        &self,
        approved: Map<String, Value>,
        denied: Map<String, Value>,
        ttl_secs: i64,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Observation {
        let mut data = Map::new();
        if approved.is_empty() {
            let all_unlisted = !denied.is_empty()
                && denied.values().all(|v| v == &json!("not_whitelisted"));
            let tag = if all_unlisted {
                "no_allowed_overrides"
            } else {
                "rejected"
            };
            data.insert("reason".to_string(), json!(tag));
        }
        data.insert("approved".to_string(), Value::Object(approved));
        data.insert("denied".to_string(), Value::Object(denied));
        data.insert("ttl_sec".to_string(), json!(ttl_secs));
        data.insert("until_ts".to_string(), json!(until.to_rfc3339()));
        Observation::control(CONTROL_TUNING_APPLIED, Value::Object(data), now)
            .with_source_name(REFLEX_SOURCE)
    }
}

/// Map one suggested key/value onto the typed patch. `Err` means the value
/// has the wrong shape for the key.
fn apply_to_patch(patch: &mut OverridePatch, key: &str, value: &Value) -> Result<(), ()> {
    match key {
        "emergency_mode" => {
            patch.emergency_mode = Some(value.as_bool().ok_or(())?);
        }
        "force_low_model" => {
            patch.force_low_model = Some(value.as_bool().ok_or(())?);
        }
        "drop_sessions" => {
            patch.drop_sessions = Some(string_set(value)?);
        }
        "deliver_sessions" => {
            patch.deliver_sessions = Some(string_set(value)?);
        }
        "drop_actors" => {
            patch.drop_actors = Some(string_set(value)?);
        }
        "deliver_actors" => {
            patch.deliver_actors = Some(string_set(value)?);
        }
        _ => return Err(()),
    }
    Ok(())
}

fn string_set(value: &Value) -> Result<BTreeSet<String>, ()> {
    let items = value.as_array().ok_or(())?;
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or(()))
        .collect()
}

/// Current value of an override key, for later revert.
fn override_value(config: &GateConfig, key: &str) -> Value {
    let ov = &config.overrides;
    match key {
        "emergency_mode" => json!(ov.emergency_mode),
        "force_low_model" => json!(ov.force_low_model),
        "drop_sessions" => json!(ov.drop_sessions),
        "deliver_sessions" => json!(ov.deliver_sessions),
        "drop_actors" => json!(ov.drop_actors),
        "deliver_actors" => json!(ov.deliver_actors),
        _ => Value::Null,
    }
}

#[cfg(test)]
#[path = "reflex_tests.rs"]
mod tests;

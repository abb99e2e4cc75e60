// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::observation::{Actor, Observation};
use chrono::{Duration, TimeZone, Utc};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn obs(text: &str) -> Observation {
    Observation::message(Actor::user("alice"), "text_input", text, now())
}

#[test]
fn record_updates_counters_and_activity() {
    let mut state = SessionState::new("dm:alice", now());
    let later = now() + Duration::seconds(30);
    state.record(&obs("hi"), later);
    assert_eq!(state.processed_total, 1);
    assert_eq!(state.last_active_at, later);
    assert_eq!(state.recent_len(), 1);
}

#[test]
fn recent_obs_evicts_oldest_beyond_cap() {
    let mut state = SessionState::new("dm:alice", now());
    for i in 0..RECENT_OBS_CAP + 5 {
        state.record(&obs(&format!("msg {i}")), now());
    }
    assert_eq!(state.recent_len(), RECENT_OBS_CAP);
    let first = state.recent_obs().next().unwrap();
    assert_eq!(first.normalized_text(), Some("msg 5"));
}

#[test]
fn idle_seconds_clamps_at_zero() {
    let state = SessionState::new("dm:alice", now());
    assert_eq!(state.idle_seconds(now() - Duration::seconds(10)), 0);
    assert_eq!(state.idle_seconds(now() + Duration::seconds(601)), 601);
}

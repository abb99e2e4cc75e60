// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The universal event carried through the system.
//!
//! Every component — bus, router, gate, workers, egress — exchanges a single
//! tagged event type, [`Observation`]. The payload is a sum type keyed by the
//! observation type; only `metadata` stays free-form (it is mutated in flight,
//! e.g. to carry the memory event id back to the turn hooks).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Routing key of the reserved system session.
pub const SYSTEM_SESSION_KEY: &str = "sys:core";

/// `source_name` prefix marking handler-emitted observations.
pub const AGENT_SOURCE_PREFIX: &str = "agent:";

/// Actor id reserved for the intelligent handler.
pub const AGENT_ACTOR_ID: &str = "agent";

/// Observation type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObsType {
    Message,
    Alert,
    Control,
    Schedule,
    WorldData,
    System,
}

impl ObsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObsType::Message => "message",
            ObsType::Alert => "alert",
            ObsType::Control => "control",
            ObsType::Schedule => "schedule",
            ObsType::WorldData => "world_data",
            ObsType::System => "system",
        }
    }
}

/// Who produced the observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    User,
    Agent,
    System,
    Service,
    Unknown,
}

/// Provenance class of the producing source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    External,
    Internal,
    System,
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// The acting party behind an observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub actor_id: String,
    pub actor_type: ActorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Actor {
    pub fn new(actor_id: impl Into<String>, actor_type: ActorType) -> Self {
        Self {
            actor_id: actor_id.into(),
            actor_type,
            display_name: None,
        }
    }

    pub fn user(actor_id: impl Into<String>) -> Self {
        Self::new(actor_id, ActorType::User)
    }

    pub fn agent() -> Self {
        Self::new(AGENT_ACTOR_ID, ActorType::Agent)
    }

    pub fn system() -> Self {
        Self::new("system", ActorType::System)
    }

    pub fn service(actor_id: impl Into<String>) -> Self {
        Self::new(actor_id, ActorType::Service)
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Payload variants, one per observation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Message {
        #[serde(default)]
        text: String,
        #[serde(default)]
        attachments: Vec<Value>,
        #[serde(default)]
        mentions: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<String>,
    },
    Alert {
        severity: Severity,
        /// Class of the failing source (e.g. `adapter`, `system`).
        source_kind: String,
        source_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exception_type: Option<String>,
        #[serde(default)]
        data: Value,
    },
    Control {
        kind: String,
        #[serde(default)]
        data: Value,
    },
    Schedule {
        #[serde(default)]
        data: Value,
    },
    WorldData {
        #[serde(default)]
        data: Value,
    },
    System {
        #[serde(default)]
        data: Value,
    },
}

impl Payload {
    pub fn obs_type(&self) -> ObsType {
        match self {
            Payload::Message { .. } => ObsType::Message,
            Payload::Alert { .. } => ObsType::Alert,
            Payload::Control { .. } => ObsType::Control,
            Payload::Schedule { .. } => ObsType::Schedule,
            Payload::WorldData { .. } => ObsType::WorldData,
            Payload::System { .. } => ObsType::System,
        }
    }
}

/// Pointer back to the raw event the observation was derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub raw_event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_event_uri: Option<String>,
}

/// Content quality markers computed at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    EmptyContent,
}

/// Validation failures surfaced to publishers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObservationError {
    #[error("source_name must not be empty")]
    EmptySourceName,
    #[error("obs_id must not be empty")]
    EmptyObsId,
    #[error("obs_type {obs_type:?} does not match payload {payload:?}")]
    TypeMismatch { obs_type: ObsType, payload: ObsType },
}

/// The universal event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub obs_id: String,
    pub obs_type: ObsType,
    /// Routing key; `None` until the router derives one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    pub actor: Actor,
    pub source_name: String,
    pub source_kind: SourceKind,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub payload: Payload,
    #[serde(default)]
    pub evidence: Evidence,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub quality_flags: Vec<QualityFlag>,
}

impl Observation {
    /// Construct an observation, stamping id, timestamps and quality flags.
    pub fn new(
        payload: Payload,
        actor: Actor,
        source_name: impl Into<String>,
        source_kind: SourceKind,
        now: DateTime<Utc>,
    ) -> Self {
        let obs_type = payload.obs_type();
        let mut quality_flags = Vec::new();
        if let Payload::Message {
            text, attachments, ..
        } = &payload
        {
            if text.trim().is_empty() && attachments.is_empty() {
                quality_flags.push(QualityFlag::EmptyContent);
            }
        }
        Self {
            obs_id: uuid::Uuid::new_v4().to_string(),
            obs_type,
            session_key: None,
            actor,
            source_name: source_name.into(),
            source_kind,
            timestamp: now,
            received_at: now,
            payload,
            evidence: Evidence::default(),
            metadata: HashMap::new(),
            quality_flags,
        }
    }

    /// An external MESSAGE observation.
    pub fn message(
        actor: Actor,
        source_name: impl Into<String>,
        text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            Payload::Message {
                text: text.into(),
                attachments: Vec::new(),
                mentions: Vec::new(),
                reply_to: None,
            },
            actor,
            source_name,
            SourceKind::External,
            now,
        )
    }

    /// An ALERT observation addressed to the system session.
    pub fn alert(
        severity: Severity,
        source_kind: impl Into<String>,
        source_id: impl Into<String>,
        exception_type: Option<String>,
        data: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            Payload::Alert {
                severity,
                source_kind: source_kind.into(),
                source_id: source_id.into(),
                exception_type,
                data,
            },
            Actor::system(),
            "core:alert",
            SourceKind::Internal,
            now,
        )
        .with_session_key(SYSTEM_SESSION_KEY)
    }

    /// A CONTROL observation addressed to the system session.
    pub fn control(kind: impl Into<String>, data: Value, now: DateTime<Utc>) -> Self {
        Self::new(
            Payload::Control {
                kind: kind.into(),
                data,
            },
            Actor::system(),
            "core:control",
            SourceKind::Internal,
            now,
        )
        .with_session_key(SYSTEM_SESSION_KEY)
    }

    /// A SCHEDULE tick addressed to the system session.
    pub fn schedule(data: Value, now: DateTime<Utc>) -> Self {
        Self::new(
            Payload::Schedule { data },
            Actor::system(),
            "core:schedule",
            SourceKind::System,
            now,
        )
        .with_session_key(SYSTEM_SESSION_KEY)
    }

    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = Some(key.into());
        self
    }

    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self
    }

    pub fn with_source_kind(mut self, source_kind: SourceKind) -> Self {
        self.source_kind = source_kind;
        self
    }

    pub fn with_mentions(mut self, new_mentions: Vec<String>) -> Self {
        if let Payload::Message { mentions, .. } = &mut self.payload {
            *mentions = new_mentions;
        }
        self
    }

    pub fn with_attachments(mut self, new_attachments: Vec<Value>) -> Self {
        if let Payload::Message {
            text, attachments, ..
        } = &mut self.payload
        {
            *attachments = new_attachments;
            if !attachments.is_empty() && text.trim().is_empty() {
                self.quality_flags.retain(|f| *f != QualityFlag::EmptyContent);
            }
        }
        self
    }

    pub fn with_reply_to(mut self, target: impl Into<String>) -> Self {
        if let Payload::Message { reply_to, .. } = &mut self.payload {
            *reply_to = Some(target.into());
        }
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = evidence;
        self
    }

    /// Routing key, `"unknown"` when unresolved.
    pub fn routing_key(&self) -> &str {
        self.session_key.as_deref().unwrap_or("unknown")
    }

    /// Trimmed message text; `None` for non-MESSAGE observations.
    pub fn normalized_text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Message { text, .. } => Some(text.trim()),
            _ => None,
        }
    }

    /// Whether the observation was emitted by the intelligent handler.
    ///
    /// The canonical signal is the `agent:` source namespace; the reserved
    /// actor id is accepted as a fallback for handlers that only set it.
    pub fn is_agent_sourced(&self) -> bool {
        self.source_name.starts_with(AGENT_SOURCE_PREFIX) || self.actor.actor_id == AGENT_ACTOR_ID
    }

    pub fn has_flag(&self, flag: QualityFlag) -> bool {
        self.quality_flags.contains(&flag)
    }

    /// Check publish-time invariants.
    pub fn validate(&self) -> Result<(), ObservationError> {
        if self.source_name.is_empty() {
            return Err(ObservationError::EmptySourceName);
        }
        if self.obs_id.is_empty() {
            return Err(ObservationError::EmptyObsId);
        }
        let payload_type = self.payload.obs_type();
        if self.obs_type != payload_type {
            return Err(ObservationError::TypeMismatch {
                obs_type: self.obs_type,
                payload: payload_type,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "observation_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single source of truth for the current gate config snapshot.
//!
//! Readers call `snapshot()` once per observation and never block; writers
//! (reload, override updates) are serialized behind a mutex and publish by
//! atomic reference swap. A failed parse never replaces the snapshot.
//!
//! Change detection is `(mtime_ns, size)` first with a content-hash
//! fallback, because some filesystems round mtime to whole seconds.

use crate::config::{ConfigError, GateConfig, OverridePatch};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileFingerprint {
    mtime_ns: u128,
    size: u64,
    content_hash: String,
}

pub struct GateConfigProvider {
    path: Option<PathBuf>,
    current: ArcSwap<GateConfig>,
    /// Serializes mutation; the read path never touches it.
    state: Mutex<Option<FileFingerprint>>,
}

impl GateConfigProvider {
    /// Provider with an in-memory config and no backing file.
    pub fn new(config: GateConfig) -> Self {
        Self {
            path: None,
            current: ArcSwap::from_pointee(config),
            state: Mutex::new(None),
        }
    }

    /// Built-in defaults, no backing file.
    pub fn with_defaults() -> Self {
        Self::new(GateConfig::default())
    }

    /// Load `gate.yaml` now (fail-fast) and arm hot reload for it.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;
        let config = GateConfig::from_yaml_str(&content)?;
        let fingerprint = file_fingerprint(&path, &content);
        info!(path = %path.display(), "gate config loaded");
        Ok(Self {
            path: Some(path),
            current: ArcSwap::from_pointee(config),
            state: Mutex::new(Some(fingerprint)),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// O(1) read of the current snapshot.
    pub fn snapshot(&self) -> Arc<GateConfig> {
        self.current.load_full()
    }

    /// Re-read the backing file if it changed. Returns whether a new
    /// snapshot was published.
    pub fn reload_if_changed(&self) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        let mut state = self.state.lock();

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "gate config unreadable, keeping previous snapshot");
                return false;
            }
        };
        let fingerprint = file_fingerprint(path, &content);

        if let Some(prev) = state.as_ref() {
            if prev.content_hash == fingerprint.content_hash {
                // Content identical even if the stat changed (e.g. touch).
                if *prev != fingerprint {
                    *state = Some(fingerprint);
                }
                return false;
            }
        }

        match GateConfig::from_yaml_str(&content) {
            Ok(config) => {
                self.current.store(Arc::new(config));
                *state = Some(fingerprint);
                info!(path = %path.display(), "gate config reloaded");
                true
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "gate config parse failed, keeping previous snapshot");
                false
            }
        }
    }

    /// Apply an override patch as a new snapshot. Returns whether the
    /// snapshot actually changed.
    pub fn update_overrides(&self, patch: OverridePatch) -> bool {
        let _guard = self.state.lock();
        let current = self.current.load_full();
        let next = current.with_overrides(patch);
        if *current == next {
            return false;
        }
        self.current.store(Arc::new(next));
        debug!("gate overrides updated");
        true
    }
}

fn file_fingerprint(path: &Path, content: &str) -> FileFingerprint {
    let (mtime_ns, size) = match std::fs::metadata(path) {
        Ok(meta) => {
            let mtime_ns = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            (mtime_ns, meta.len())
        }
        Err(_) => (0, content.len() as u64),
    };
    let content_hash = format!("{:x}", Sha256::digest(content.as_bytes()));
    FileFingerprint {
        mtime_ns,
        size,
        content_hash,
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, producer-nonblocking input bus.
//!
//! Producers call [`InputBus::publish_nowait`] and never wait: a full queue
//! drops the newest event and bumps a counter. Overload is visible through
//! `dropped_total` and the downstream pain path, never through backpressure.
//! The single consumer (the router) drains remaining items after `close`,
//! then sees the end of the stream.

use axon_core::{Metrics, Observation};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Result of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Enqueued.
    Published,
    /// Queue full; the event was discarded.
    Dropped,
    /// Failed validation; the event was never enqueued.
    Rejected,
    /// The bus is shut down.
    Closed,
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published)
    }
}

/// Producer handle. Cheap to clone; all clones share the queue.
#[derive(Clone)]
pub struct InputBus {
    tx: mpsc::Sender<Observation>,
    closed: Arc<watch::Sender<bool>>,
    metrics: Arc<Metrics>,
}

/// The single consumer side.
pub struct BusReader {
    rx: mpsc::Receiver<Observation>,
    closed: watch::Receiver<bool>,
}

/// Create a bus with the given capacity.
pub fn channel(capacity: usize, metrics: Arc<Metrics>) -> (InputBus, BusReader) {
    let (tx, rx) = mpsc::channel(capacity);
    let (closed_tx, closed_rx) = watch::channel(false);
    (
        InputBus {
            tx,
            closed: Arc::new(closed_tx),
            metrics,
        },
        BusReader {
            rx,
            closed: closed_rx,
        },
    )
}

impl InputBus {
    /// Validate and enqueue without blocking.
    pub fn publish_nowait(&self, obs: Observation) -> PublishOutcome {
        if let Err(err) = obs.validate() {
            warn!(error = %err, source = %obs.source_name, "rejecting invalid observation");
            self.metrics.inc_bus_rejected();
            return PublishOutcome::Rejected;
        }
        if *self.closed.borrow() {
            return PublishOutcome::Closed;
        }
        match self.tx.try_send(obs) {
            Ok(()) => {
                self.metrics.inc_bus_published();
                PublishOutcome::Published
            }
            Err(TrySendError::Full(_)) => {
                warn!("input bus full, dropping newest");
                self.metrics.inc_bus_dropped();
                PublishOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => PublishOutcome::Closed,
        }
    }

    /// Shut down the bus. Idempotent; queued events remain readable.
    pub fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        debug!("input bus closed");
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl BusReader {
    /// Next event in FIFO order; `None` once the bus is closed and drained.
    pub async fn recv(&mut self) -> Option<Observation> {
        loop {
            match self.rx.try_recv() {
                Ok(obs) => return Some(obs),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {}
            }
            if *self.closed.borrow_and_update() {
                // drained; one last race-free check
                return self.rx.try_recv().ok();
            }
            tokio::select! {
                maybe = self.rx.recv() => return maybe,
                _ = self.closed.changed() => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;

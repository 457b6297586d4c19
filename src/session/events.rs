// SPDX-License-Identifier: MIT

//! Typed session events for presentation layers.
//!
//! Store snapshots are decoded field by field; each field present in a
//! delivery fires its own event, fields absent from a delivery fire
//! nothing. Consumers must not assume every event fires on every snapshot.

use std::collections::BTreeSet;
use tokio::sync::broadcast;

use crate::models::Rewards;

/// One decoded change, fanned out to every engine subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// `elapsedSeconds` changed (host: every local tick; guest: every
    /// received publish).
    TimerUpdated(f64),
    ActiveChanged(bool),
    PausedChanged(bool),
    ParticipantsChanged(BTreeSet<String>),
    ReadyToStartChanged(bool),
    /// Terminal. Emitted exactly once per session even when the store
    /// re-delivers the ended snapshot.
    Ended { final_time: f64, rewards: Rewards },
}

/// In-process fan-out over a broadcast channel. A subscriber that falls
/// behind drops its oldest events; the exactly-once guarantee for `Ended`
/// is the engine's, not the channel's.
pub(crate) struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; events are fire-and-forget.
        let _ = self.tx.send(event);
    }
}

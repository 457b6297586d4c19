// SPDX-License-Identifier: MIT

//! Reward application at session end.
//!
//! The engine only transports the reward payload; applying it to local
//! user state (XP, coins, leaderboard score) is the application's job,
//! expressed as a [`RewardSink`]. Duplicate terminal snapshots are already
//! absorbed by the engine, so a sink runs at most once per session.

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use super::SessionEvent;
use crate::models::Rewards;

/// Consumer of a session's end-of-session reward payload.
pub trait RewardSink: Send + Sync {
    fn apply(&self, final_time: f64, rewards: &Rewards);
}

/// Drive `Ended` events from an engine subscription into a sink.
pub async fn pump(mut events: broadcast::Receiver<SessionEvent>, sink: Arc<dyn RewardSink>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Ended { final_time, rewards }) => sink.apply(final_time, &rewards),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Reward pump lagged behind the event bus");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Sink recording every application, for tests and the demo binary.
#[derive(Default)]
pub struct RecordingSink {
    applied: Mutex<Vec<(f64, Rewards)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> Vec<(f64, Rewards)> {
        self.applied.lock().expect("sink lock poisoned").clone()
    }

    pub fn total_exp(&self) -> i64 {
        self.applied().iter().map(|(_, rewards)| rewards.exp).sum()
    }

    pub fn total_coins(&self) -> i64 {
        self.applied().iter().map(|(_, rewards)| rewards.coins).sum()
    }
}

impl RewardSink for RecordingSink {
    fn apply(&self, final_time: f64, rewards: &Rewards) {
        tracing::info!(
            final_time,
            exp = rewards.exp,
            coins = rewards.coins,
            score = rewards.score,
            "Rewards applied"
        );
        self.applied
            .lock()
            .expect("sink lock poisoned")
            .push((final_time, *rewards));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_accumulates_totals() {
        let sink = RecordingSink::new();

        sink.apply(
            10.0,
            &Rewards {
                exp: 50,
                coins: 10,
                score: 0,
            },
        );
        sink.apply(
            4.0,
            &Rewards {
                exp: 20,
                coins: 5,
                score: 1,
            },
        );

        assert_eq!(sink.applied().len(), 2);
        assert_eq!(sink.total_exp(), 70);
        assert_eq!(sink.total_coins(), 15);
    }
}

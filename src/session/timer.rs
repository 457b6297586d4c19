// SPDX-License-Identifier: MIT

//! Host timer driver.
//!
//! The host is the only participant that originates periodic writes. Every
//! tick advances the local accumulator so the host's own display stays
//! smooth; only the replicated copy is throttled to the publish interval,
//! bounding write volume at the cost of guest-displayed time lagging by up
//! to one publish interval plus a round trip.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::engine::Shared;
use super::SessionEvent;
use crate::config::SyncConfig;
use crate::models::session::fields;
use crate::store::{paths, ReplicatedStore};

pub(crate) struct TimerDriver {
    store: Arc<dyn ReplicatedStore>,
    shared: Arc<Shared>,
    config: SyncConfig,
    session_id: String,
    publish_accumulator: f64,
}

impl TimerDriver {
    pub(crate) fn new(
        store: Arc<dyn ReplicatedStore>,
        shared: Arc<Shared>,
        config: SyncConfig,
        session_id: String,
    ) -> Self {
        Self {
            store,
            shared,
            config,
            session_id,
            publish_accumulator: 0.0,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so elapsed-time
        // accounting starts at the next full interval.
        ticker.tick().await;
        let mut last = tokio::time::Instant::now();

        loop {
            ticker.tick().await;
            // A tick that fires late still accounts its real delay, so the
            // host clock tracks wall time under scheduling pressure.
            let now = tokio::time::Instant::now();
            let dt = now - last;
            last = now;
            if !self.tick(dt).await {
                break;
            }
        }
    }

    /// Advance the host clock by `dt`. Returns false once the session is
    /// terminal or this driver no longer belongs to the attached session.
    async fn tick(&mut self, dt: Duration) -> bool {
        let step = dt.as_secs_f64();

        let (elapsed, publish) = {
            let mut state = self.shared.state.lock().expect("state lock poisoned");
            if state.ended || state.session_id.as_deref() != Some(self.session_id.as_str()) {
                return false;
            }
            if !state.is_host || !state.active || state.paused {
                return true;
            }

            state.elapsed_seconds += step;
            self.publish_accumulator += step;
            let publish =
                self.publish_accumulator >= self.config.publish_interval.as_secs_f64();
            if publish {
                self.publish_accumulator = 0.0;
            }
            (state.elapsed_seconds, publish)
        };

        self.shared.events.emit(SessionEvent::TimerUpdated(elapsed));

        if publish {
            let path = paths::field(&self.session_id, fields::ELAPSED_SECONDS);
            if let Err(err) = self.store.put(&path, json!(elapsed)).await {
                // Not retried here; the next threshold crossing publishes a
                // fresher value anyway.
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %err,
                    "Timer publish failed"
                );
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn running_shared(session_id: &str) -> Arc<Shared> {
        let shared = Arc::new(Shared::new(8));
        {
            let mut state = shared.state.lock().expect("state lock poisoned");
            state.session_id = Some(session_id.to_string());
            state.is_host = true;
            state.active = true;
        }
        shared
    }

    #[tokio::test(start_paused = true)]
    async fn late_tick_accounts_real_elapsed_time() {
        let store: Arc<dyn ReplicatedStore> = Arc::new(MemoryStore::new());
        let shared = running_shared("session_t");
        let driver = TimerDriver::new(
            Arc::clone(&store),
            Arc::clone(&shared),
            SyncConfig::default(),
            "session_t".to_string(),
        );
        let handle = tokio::spawn(driver.run());
        tokio::task::yield_now().await;

        // One on-schedule tick.
        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        let on_schedule = shared
            .state
            .lock()
            .expect("state lock poisoned")
            .elapsed_seconds;
        assert!((on_schedule - 0.1).abs() < 1e-9, "got {on_schedule}");

        // The next tick fires 300 ms late in one jump; the clock must
        // account the full real delay, not one nominal interval.
        tokio::time::advance(Duration::from_millis(400)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        let after_late = shared
            .state
            .lock()
            .expect("state lock poisoned")
            .elapsed_seconds;
        assert!(
            (after_late - 0.5).abs() < 1e-9,
            "late tick must add its real elapsed time, got {after_late}"
        );

        handle.abort();
    }
}

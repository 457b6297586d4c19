// SPDX-License-Identifier: MIT

//! Session lifecycle engine.
//!
//! Per session, every participant observes the same state machine:
//!
//! `Uncreated → Lobby(active=false) → Running ⇄ Paused → Ended → Deleted`
//!
//! The engine issues lifecycle writes to the replicated store and reacts to
//! the store's subscription stream; all state changes, including the host's
//! own, arrive back through the watch and are re-emitted as typed events.
//! Host authority over control fields is enforced client-side: a non-host
//! caller gets an error and no write is issued.

use futures_util::StreamExt;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::events::EventBus;
use super::timer::TimerDriver;
use super::SessionEvent;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::models::session::fields;
use crate::models::{Rewards, SessionDoc};
use crate::store::{paths, ReplicatedStore};

/// Per-client mirror of the last-seen session state. Derived, never
/// authoritative; `is_host` is local-only and fixed at create/join time.
#[derive(Debug, Clone, Default)]
pub struct LocalView {
    pub session_id: Option<String>,
    pub is_host: bool,
    pub active: bool,
    pub paused: bool,
    pub ready_to_start: bool,
    pub ended: bool,
    pub elapsed_seconds: f64,
}

/// State shared between the engine API, the watch task, and the timer
/// driver. Locks are never held across an await.
pub(crate) struct Shared {
    pub(crate) state: Mutex<LocalView>,
    pub(crate) events: EventBus,
    /// Session ids whose terminal snapshot was already processed. The store
    /// may re-deliver the same ended state before deletion; reward side
    /// effects must happen exactly once.
    ended_seen: Mutex<HashSet<String>>,
}

impl Shared {
    pub(crate) fn new(event_capacity: usize) -> Self {
        Self {
            state: Mutex::new(LocalView::default()),
            events: EventBus::new(event_capacity),
            ended_seen: Mutex::new(HashSet::new()),
        }
    }

    /// Decode one snapshot and emit an event per present field. The ended
    /// branch runs last so observers still see the other fields of the
    /// terminal delivery, and is de-duplicated per session id.
    pub(crate) fn apply_snapshot(&self, session_id: &str, value: &Value) {
        let doc = SessionDoc::decode(value);

        if let Some(participants) = doc.participants {
            self.events
                .emit(SessionEvent::ParticipantsChanged(participants));
        }

        let is_host = self.state.lock().expect("state lock poisoned").is_host;
        if !is_host {
            // Guests display whatever they last received; the host's local
            // accumulator is authoritative and ignores its own echo.
            if let Some(elapsed) = doc.elapsed_seconds {
                self.state.lock().expect("state lock poisoned").elapsed_seconds = elapsed;
                self.events.emit(SessionEvent::TimerUpdated(elapsed));
            }
        }

        if let Some(active) = doc.active {
            self.state.lock().expect("state lock poisoned").active = active;
            self.events.emit(SessionEvent::ActiveChanged(active));
        }

        if let Some(paused) = doc.paused {
            self.state.lock().expect("state lock poisoned").paused = paused;
            self.events.emit(SessionEvent::PausedChanged(paused));
        }

        if let Some(ready) = doc.ready_to_start {
            self.state.lock().expect("state lock poisoned").ready_to_start = ready;
            self.events.emit(SessionEvent::ReadyToStartChanged(ready));
        }

        if doc.ended == Some(true) {
            self.state.lock().expect("state lock poisoned").ended = true;
            let first = self
                .ended_seen
                .lock()
                .expect("ended guard lock poisoned")
                .insert(session_id.to_string());
            if first {
                let final_time = doc.final_time.unwrap_or(0.0);
                let rewards = doc.rewards.unwrap_or_default();
                tracing::info!(session_id, final_time, "Session ended");
                self.events.emit(SessionEvent::Ended { final_time, rewards });
            }
        }
    }
}

#[derive(Default)]
struct TaskHandles {
    watch: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
    delete: Option<JoinHandle<()>>,
}

/// One client's handle on at most one collaborative session.
pub struct SessionEngine {
    store: Arc<dyn ReplicatedStore>,
    config: SyncConfig,
    user_id: String,
    shared: Arc<Shared>,
    tasks: Mutex<TaskHandles>,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn ReplicatedStore>,
        user_id: impl Into<String>,
        config: SyncConfig,
    ) -> Self {
        let shared = Arc::new(Shared::new(config.event_capacity));
        Self {
            store,
            config,
            user_id: user_id.into(),
            shared,
            tasks: Mutex::new(TaskHandles::default()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Receive typed session events. At-least-once, in order; a receiver
    /// that falls behind drops its oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Snapshot of the local view.
    pub fn view(&self) -> LocalView {
        self.shared.state.lock().expect("state lock poisoned").clone()
    }

    /// Create a session as host: the full initial document and the host's
    /// participant entry land in one atomic commit. On failure nothing
    /// changes locally; retry is an explicit user action.
    pub async fn create(&self, group_id: &str) -> Result<String> {
        let session_id = new_session_id();

        let mut updates = HashMap::new();
        updates.insert(
            paths::session(&session_id),
            SessionDoc::initial_value(group_id, &self.user_id),
        );
        updates.insert(
            paths::participant(&session_id, &self.user_id),
            json!(true),
        );

        if let Err(err) = self.store.update(updates).await {
            tracing::error!(session_id = %session_id, error = %err, "Session creation failed");
            return Err(err);
        }

        self.detach();
        {
            let mut state = self.shared.state.lock().expect("state lock poisoned");
            *state = LocalView {
                session_id: Some(session_id.clone()),
                is_host: true,
                ..LocalView::default()
            };
        }

        tracing::info!(
            session_id = %session_id,
            group_id,
            user_id = %self.user_id,
            "Session created"
        );

        self.start_watch(&session_id);
        self.start_timer(&session_id);
        Ok(session_id)
    }

    /// Join an existing session. A nonexistent session id fails loudly and
    /// leaves local state untouched, as does a session that already ended
    /// (readable only during its deletion grace window). Re-joining is
    /// idempotent, and a host re-entering its own session regains host
    /// authority.
    pub async fn join(&self, session_id: &str) -> Result<()> {
        let snapshot = self.store.get(&paths::session(session_id)).await?;
        let Some(value) = snapshot else {
            tracing::warn!(session_id, user_id = %self.user_id, "Join failed: no such session");
            return Err(SyncError::SessionNotFound(session_id.to_string()));
        };

        let doc = SessionDoc::decode(&value);
        if doc.ended == Some(true) {
            // Terminal documents are immutable; a session lingering in its
            // deletion grace window must not gain participants.
            tracing::warn!(session_id, user_id = %self.user_id, "Join refused: session already ended");
            return Err(SyncError::Ended);
        }
        let is_host = doc.host_id.as_deref() == Some(self.user_id.as_str());

        self.store
            .put(&paths::participant(session_id, &self.user_id), json!(true))
            .await?;

        self.detach();
        {
            let mut state = self.shared.state.lock().expect("state lock poisoned");
            *state = LocalView {
                session_id: Some(session_id.to_string()),
                is_host,
                active: doc.active.unwrap_or(false),
                paused: doc.paused.unwrap_or(false),
                ready_to_start: doc.ready_to_start.unwrap_or(false),
                ended: doc.ended.unwrap_or(false),
                elapsed_seconds: doc.elapsed_seconds.unwrap_or(0.0),
            };
        }

        tracing::info!(session_id, user_id = %self.user_id, is_host, "Joined session");

        self.start_watch(session_id);
        if is_host {
            self.start_timer(session_id);
        }
        Ok(())
    }

    /// Host only: begin counting.
    pub async fn start(&self) -> Result<()> {
        let session_id = self.host_session()?;
        self.store
            .put(&paths::field(&session_id, fields::ACTIVE), json!(true))
            .await
    }

    /// Host only: suspend the running timer. Recorded even when not
    /// active; the timer only advances while `active && !paused`.
    pub async fn pause(&self) -> Result<()> {
        let session_id = self.host_session()?;
        self.store
            .put(&paths::field(&session_id, fields::PAUSED), json!(true))
            .await
    }

    /// Host only: resume a paused timer.
    pub async fn resume(&self) -> Result<()> {
        let session_id = self.host_session()?;
        self.store
            .put(&paths::field(&session_id, fields::PAUSED), json!(false))
            .await
    }

    /// Host only: flag the lobby as ready to start.
    pub async fn set_ready(&self) -> Result<()> {
        let session_id = self.host_session()?;
        self.store
            .put(&paths::field(&session_id, fields::READY_TO_START), json!(true))
            .await
    }

    /// Host only: two-phase teardown. Phase one writes the terminal
    /// summary (`active=false`, `ended=true`, `finalTime`, rewards) as one
    /// commit so every subscriber observes it atomically. Phase two, after
    /// the acknowledged write, deletes the session path once the grace
    /// delay has given every subscriber a window to observe the snapshot.
    pub async fn end(&self, rewards: Rewards) -> Result<()> {
        let session_id = self.host_session()?;

        // Stop the timer before the terminal write so no stale publish can
        // land after it.
        self.stop_timer();

        let final_time = {
            self.shared
                .state
                .lock()
                .expect("state lock poisoned")
                .elapsed_seconds
        };

        let mut updates = HashMap::new();
        updates.insert(paths::field(&session_id, fields::ACTIVE), json!(false));
        updates.insert(paths::field(&session_id, fields::ENDED), json!(true));
        updates.insert(
            paths::field(&session_id, fields::FINAL_TIME),
            json!(final_time),
        );
        let rewards_path = paths::field(&session_id, fields::REWARDS);
        updates.insert(format!("{}/exp", rewards_path), json!(rewards.exp));
        updates.insert(format!("{}/coins", rewards_path), json!(rewards.coins));
        updates.insert(format!("{}/score", rewards_path), json!(rewards.score));

        if let Err(err) = self.store.update(updates).await {
            tracing::error!(session_id = %session_id, error = %err, "Failed to send session end summary");
            // The session is still live; the host clock keeps running until
            // a retry succeeds.
            self.start_timer(&session_id);
            return Err(err);
        }

        // Lifecycle is terminal: refuse further control writes immediately
        // instead of waiting for our own snapshot to come back.
        self.shared.state.lock().expect("state lock poisoned").ended = true;

        tracing::info!(session_id = %session_id, final_time, "Session summary sent");

        let store = Arc::clone(&self.store);
        let grace = self.config.delete_grace;
        let path = paths::session(&session_id);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            match store.delete(&path).await {
                Ok(()) => tracing::info!(path = %path, "Session deleted"),
                Err(err) => tracing::error!(path = %path, error = %err, "Session deletion failed"),
            }
        });
        if let Some(old) = self
            .tasks
            .lock()
            .expect("task lock poisoned")
            .delete
            .replace(handle)
        {
            old.abort();
        }
        Ok(())
    }

    /// Stop observing the current session. Local no-op on the store: never
    /// cancels in-flight writes, and a pending deferred deletion keeps
    /// running so an ended session still disappears.
    pub fn detach(&self) {
        let mut tasks = self.tasks.lock().expect("task lock poisoned");
        if let Some(handle) = tasks.watch.take() {
            handle.abort();
        }
        if let Some(handle) = tasks.timer.take() {
            handle.abort();
        }
    }

    /// Tear down every local task, including a pending deferred deletion.
    /// For process shutdown.
    pub fn shutdown(&self) {
        self.detach();
        if let Some(handle) = self.tasks.lock().expect("task lock poisoned").delete.take() {
            handle.abort();
        }
    }

    fn stop_timer(&self) {
        if let Some(handle) = self.tasks.lock().expect("task lock poisoned").timer.take() {
            handle.abort();
        }
    }

    fn host_session(&self) -> Result<String> {
        let state = self.shared.state.lock().expect("state lock poisoned");
        let Some(session_id) = state.session_id.clone() else {
            return Err(SyncError::NoSession);
        };
        if state.ended {
            return Err(SyncError::Ended);
        }
        if !state.is_host {
            return Err(SyncError::NotHost);
        }
        Ok(session_id)
    }

    fn start_watch(&self, session_id: &str) {
        let mut subscription = self.store.watch(&paths::session(session_id));
        let shared = Arc::clone(&self.shared);
        let session_id = session_id.to_string();

        let handle = tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                // A missing snapshot means the path does not exist (yet, or
                // anymore after deletion); nothing to decode.
                let Some(value) = snapshot else { continue };
                shared.apply_snapshot(&session_id, &value);
            }
        });

        if let Some(old) = self
            .tasks
            .lock()
            .expect("task lock poisoned")
            .watch
            .replace(handle)
        {
            old.abort();
        }
    }

    fn start_timer(&self, session_id: &str) {
        let driver = TimerDriver::new(
            Arc::clone(&self.store),
            Arc::clone(&self.shared),
            self.config.clone(),
            session_id.to_string(),
        );
        let handle = tokio::spawn(driver.run());

        if let Some(old) = self
            .tasks
            .lock()
            .expect("task lock poisoned")
            .timer
            .replace(handle)
        {
            old.abort();
        }
    }
}

impl Drop for SessionEngine {
    fn drop(&mut self) {
        self.detach();
    }
}

fn new_session_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("session_{}", &id[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_prefixed_and_unique() {
        let a = new_session_id();
        let b = new_session_id();

        assert!(a.starts_with("session_"));
        assert_eq!(a.len(), "session_".len() + 12);
        assert_ne!(a, b);
    }
}

// SPDX-License-Identifier: MIT

//! Replicated store abstraction.
//!
//! A session's shared state lives in a realtime, path-addressable,
//! eventually-consistent key tree. The trait covers the four operations the
//! engine needs: point writes, multi-path atomic updates, point reads, and
//! path-scoped subscriptions that fire on any change under the watched path.
//!
//! Concurrency control is field-level last-writer-wins only. There is no
//! compare-and-swap and no store-side authorization; correctness depends on
//! the convention that exactly one device acts as host per session.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::error::Result;

pub mod memory;

pub use memory::MemoryStore;

/// Path helpers for the session tree.
pub mod paths {
    /// Root collection holding all sessions.
    pub const SESSIONS: &str = "sessions";

    /// `sessions/{sessionId}`
    pub fn session(session_id: &str) -> String {
        format!("{}/{}", SESSIONS, session_id)
    }

    /// `sessions/{sessionId}/{field}`
    pub fn field(session_id: &str, field: &str) -> String {
        format!("{}/{}/{}", SESSIONS, session_id, field)
    }

    /// `sessions/{sessionId}/participants/{userId}`
    pub fn participant(session_id: &str, user_id: &str) -> String {
        format!("{}/{}/participants/{}", SESSIONS, session_id, user_id)
    }
}

/// Sentinel resolved to the current epoch milliseconds when committed.
pub fn server_timestamp() -> Value {
    serde_json::json!({ ".sv": "timestamp" })
}

/// Value of a watched subtree at delivery time. `None` once the path
/// does not exist (never written, or deleted).
pub type Snapshot = Option<Value>;

/// A live subscription on one path.
///
/// Each delivery carries the full current value of the watched subtree;
/// deliveries for one subscriber arrive in commit order. Dropping the
/// subscription detaches it, a local no-op on the store that never
/// cancels writes already in flight.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Snapshot>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Snapshot>) -> Self {
        Self { rx }
    }

    /// Next snapshot, or `None` once the store side has gone away.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }
}

impl futures_util::Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Realtime path-addressable key-tree database client.
#[async_trait]
pub trait ReplicatedStore: Send + Sync {
    /// Write the value at `path`, replacing the whole subtree.
    /// Writing `Value::Null` removes the subtree.
    async fn put(&self, path: &str, value: Value) -> Result<()>;

    /// Apply several path writes as one atomic commit: subscribers observe
    /// either none or all of the entries. Ancestor paths are applied before
    /// their descendants.
    async fn update(&self, updates: HashMap<String, Value>) -> Result<()>;

    /// Read the current value at `path`, `None` if absent.
    async fn get(&self, path: &str) -> Result<Option<Value>>;

    /// Remove the subtree at `path`.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Subscribe to `path`. The current snapshot is delivered immediately,
    /// then one snapshot per commit touching the path or anything under it.
    fn watch(&self, path: &str) -> Subscription;
}

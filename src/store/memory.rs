// SPDX-License-Identifier: MIT

//! In-memory replicated store backend.
//!
//! Reference implementation of [`ReplicatedStore`] used by tests and the
//! demo binary: a single JSON tree guarded by a mutex, with watchers
//! notified synchronously on every commit. Per-subscriber delivery is in
//! commit order, which matches the causal per-path guarantee of the real
//! backends this stands in for.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::{ReplicatedStore, Snapshot, Subscription};
use crate::error::{Result, SyncError};

struct Watcher {
    path: Vec<String>,
    tx: mpsc::UnboundedSender<Snapshot>,
}

struct Inner {
    tree: Mutex<Value>,
    watchers: DashMap<u64, Watcher>,
    next_watcher_id: AtomicU64,
    offline: AtomicBool,
}

/// In-process store sharing one tree between all of its clones.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tree: Mutex::new(Value::Object(serde_json::Map::new())),
                watchers: DashMap::new(),
                next_watcher_id: AtomicU64::new(0),
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Simulate a transport outage: while offline, every operation fails
    /// with a store error. Subscriptions stay attached and resume with the
    /// next successful commit.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Store("memory store offline".to_string()));
        }
        Ok(())
    }

    /// Notify every watcher whose path overlaps one of the touched paths.
    /// Called with the tree lock held so deliveries stay in commit order.
    /// Watchers whose receiver is gone are dropped here.
    fn notify(&self, tree: &Value, touched: &[Vec<String>]) {
        self.inner.watchers.retain(|_, watcher| {
            if !touched.iter().any(|t| overlaps(&watcher.path, t)) {
                return true;
            }
            let snapshot = subtree(tree, &watcher.path).cloned();
            watcher.tx.send(snapshot).is_ok()
        });
    }
}

#[async_trait::async_trait]
impl ReplicatedStore for MemoryStore {
    async fn put(&self, path: &str, value: Value) -> Result<()> {
        self.check_online()?;
        let segments = split(path);
        let mut value = value;
        resolve_server_values(&mut value, chrono::Utc::now().timestamp_millis());

        let mut guard = self.inner.tree.lock().expect("store tree lock poisoned");
        write_at(&mut guard, &segments, value);
        self.notify(&guard, std::slice::from_ref(&segments));
        Ok(())
    }

    async fn update(&self, updates: HashMap<String, Value>) -> Result<()> {
        self.check_online()?;
        let now_ms = chrono::Utc::now().timestamp_millis();

        // Ancestors first, so a root entry cannot clobber a sibling entry
        // written deeper in the same commit.
        let mut entries: Vec<(Vec<String>, Value)> = updates
            .into_iter()
            .map(|(path, mut value)| {
                resolve_server_values(&mut value, now_ms);
                (split(&path), value)
            })
            .collect();
        entries.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));

        let mut guard = self.inner.tree.lock().expect("store tree lock poisoned");
        let touched: Vec<Vec<String>> = entries.iter().map(|(segments, _)| segments.clone()).collect();
        for (segments, value) in entries {
            write_at(&mut guard, &segments, value);
        }
        // One snapshot per affected watcher, taken after all entries landed:
        // the commit is observed atomically.
        self.notify(&guard, &touched);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>> {
        self.check_online()?;
        let segments = split(path);
        let guard = self.inner.tree.lock().expect("store tree lock poisoned");
        Ok(subtree(&guard, &segments).cloned())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.check_online()?;
        let segments = split(path);
        let mut guard = self.inner.tree.lock().expect("store tree lock poisoned");
        remove_at(&mut guard, &segments);
        self.notify(&guard, std::slice::from_ref(&segments));
        Ok(())
    }

    fn watch(&self, path: &str) -> Subscription {
        let segments = split(path);
        let (tx, rx) = mpsc::unbounded_channel();

        // Deliver the current snapshot before any further commit, matching
        // realtime-DB listener semantics the engine relies on when joining
        // a session already in progress.
        {
            let guard = self.inner.tree.lock().expect("store tree lock poisoned");
            let _ = tx.send(subtree(&guard, &segments).cloned());
            let id = self.inner.next_watcher_id.fetch_add(1, Ordering::Relaxed);
            self.inner.watchers.insert(
                id,
                Watcher {
                    path: segments,
                    tx,
                },
            );
        }

        Subscription::new(rx)
    }
}

fn split(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// A watcher at path P fires for a write at path W when either is a
/// prefix of the other.
fn overlaps(a: &[String], b: &[String]) -> bool {
    let n = a.len().min(b.len());
    a[..n] == b[..n]
}

fn subtree<'a>(tree: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = tree;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn write_at(tree: &mut Value, segments: &[String], value: Value) {
    // Writing null removes the subtree, as in Firebase.
    if value.is_null() {
        remove_at(tree, segments);
        return;
    }
    if segments.is_empty() {
        *tree = value;
        return;
    }

    let mut current = tree;
    for segment in &segments[..segments.len() - 1] {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = current
            .as_object_mut()
            .expect("just ensured object")
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(serde_json::Map::new());
    }
    current
        .as_object_mut()
        .expect("just ensured object")
        .insert(segments[segments.len() - 1].clone(), value);
}

fn remove_at(tree: &mut Value, segments: &[String]) {
    if segments.is_empty() {
        *tree = Value::Object(serde_json::Map::new());
        return;
    }
    let mut current = tree;
    for segment in &segments[..segments.len() - 1] {
        match current.as_object_mut().and_then(|map| map.get_mut(segment)) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Some(map) = current.as_object_mut() {
        map.remove(&segments[segments.len() - 1]);
    }
}

fn resolve_server_values(value: &mut Value, now_ms: i64) {
    if is_timestamp_sentinel(value) {
        *value = Value::from(now_ms);
        return;
    }
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                resolve_server_values(child, now_ms);
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                resolve_server_values(child, now_ms);
            }
        }
        _ => {}
    }
}

fn is_timestamp_sentinel(value: &Value) -> bool {
    value
        .as_object()
        .map(|map| map.len() == 1 && map.get(".sv").and_then(Value::as_str) == Some("timestamp"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_drops_empty_segments() {
        assert_eq!(split("sessions//abc/"), vec!["sessions", "abc"]);
        assert!(split("").is_empty());
    }

    #[test]
    fn overlap_is_prefix_in_either_direction() {
        let sessions = split("sessions");
        let field = split("sessions/s1/active");
        let other = split("users/u1");

        assert!(overlaps(&sessions, &field));
        assert!(overlaps(&field, &sessions));
        assert!(!overlaps(&field, &other));
    }

    #[test]
    fn sentinel_resolves_to_millis() {
        let mut value = json!({ "createdAt": { ".sv": "timestamp" }, "active": false });
        resolve_server_values(&mut value, 1_700_000_000_000);

        assert_eq!(value["createdAt"], json!(1_700_000_000_000i64));
        assert_eq!(value["active"], json!(false));
    }

    #[test]
    fn deep_write_creates_intermediate_objects() {
        let mut tree = Value::Object(serde_json::Map::new());
        write_at(&mut tree, &split("sessions/s1/participants/u1"), json!(true));

        assert_eq!(tree["sessions"]["s1"]["participants"]["u1"], json!(true));
    }

    #[test]
    fn null_write_removes_subtree() {
        let mut tree = json!({ "sessions": { "s1": { "active": true } } });
        write_at(&mut tree, &split("sessions/s1"), Value::Null);

        assert!(subtree(&tree, &split("sessions/s1")).is_none());
    }
}

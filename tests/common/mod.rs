// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use studysync::config::SyncConfig;
use studysync::session::SessionEngine;
use studysync::store::{MemoryStore, ReplicatedStore};

#[allow(dead_code)]
pub fn test_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

#[allow(dead_code)]
pub fn test_engine(store: &Arc<MemoryStore>, user_id: &str) -> SessionEngine {
    let store = Arc::clone(store) as Arc<dyn ReplicatedStore>;
    SessionEngine::new(store, user_id, SyncConfig::default())
}

/// Let watch tasks drain queued snapshots before asserting.
#[allow(dead_code)]
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// SPDX-License-Identifier: MIT

use std::sync::Arc;

use studysync::session::SessionLobby;
use studysync::store::ReplicatedStore;

mod common;
use common::{test_engine, test_store};

#[tokio::test]
async fn list_filters_sessions_by_group() {
    let store = test_store();
    let host_a = test_engine(&store, "user_a");
    let host_b = test_engine(&store, "user_b");

    let session_a = host_a.create("groupA").await.expect("create should succeed");
    host_b.create("groupB").await.expect("create should succeed");

    let lobby = SessionLobby::new(Arc::clone(&store) as Arc<dyn ReplicatedStore>);
    let rows = lobby.list("groupA").await.expect("list should succeed");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].session_id, session_a);
    assert_eq!(rows[0].group_id, "groupA");
    assert_eq!(rows[0].host_id.as_deref(), Some("user_a"));
    assert!(!rows[0].active, "fresh session is still in the lobby");
    assert_eq!(rows[0].participant_count, 1);
}

#[tokio::test]
async fn list_of_empty_store_is_empty() {
    let store = test_store();
    let lobby = SessionLobby::new(Arc::clone(&store) as Arc<dyn ReplicatedStore>);

    let rows = lobby.list("groupA").await.expect("list should succeed");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn watch_reemits_listing_on_changes() {
    let store = test_store();
    let lobby = SessionLobby::new(Arc::clone(&store) as Arc<dyn ReplicatedStore>);
    let mut watch = lobby.watch("groupA");

    // Initial delivery: nothing yet.
    let rows = watch.recv().await.expect("watch should be live");
    assert!(rows.is_empty());

    let host = test_engine(&store, "user_a");
    let session_id = host.create("groupA").await.expect("create should succeed");

    // The creation commit produces one delivery with the new row.
    let rows = watch.recv().await.expect("watch should be live");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].session_id, session_id);

    // A session in another group still triggers a delivery (the watcher
    // covers the whole collection) but stays filtered out.
    let other = test_engine(&store, "user_b");
    other.create("groupB").await.expect("create should succeed");

    let rows = watch.recv().await.expect("watch should be live");
    assert_eq!(rows.len(), 1, "other group's session must be filtered out");
}

#[tokio::test]
async fn guest_can_join_a_discovered_session() {
    let store = test_store();
    let host = test_engine(&store, "user_a");
    host.create("groupA").await.expect("create should succeed");

    let lobby = SessionLobby::new(Arc::clone(&store) as Arc<dyn ReplicatedStore>);
    let rows = lobby.list("groupA").await.expect("list should succeed");

    let guest = test_engine(&store, "user_guest");
    guest
        .join(&rows[0].session_id)
        .await
        .expect("join via lobby listing should succeed");
    assert_eq!(
        guest.view().session_id.as_deref(),
        Some(rows[0].session_id.as_str())
    );
}

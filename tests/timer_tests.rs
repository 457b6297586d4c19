// SPDX-License-Identifier: MIT

use std::time::Duration;

mod common;
use common::{settle, test_engine, test_store};

#[tokio::test(start_paused = true)]
async fn elapsed_does_not_advance_in_lobby() {
    let store = test_store();
    let host = test_engine(&store, "user_host");

    host.create("groupA").await.expect("create should succeed");
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(host.view().elapsed_seconds, 0.0);
}

#[tokio::test(start_paused = true)]
async fn elapsed_advances_only_while_active_and_unpaused() {
    let store = test_store();
    let host = test_engine(&store, "user_host");

    host.create("groupA").await.expect("create should succeed");
    host.start().await.expect("start should succeed");
    settle().await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    let running = host.view().elapsed_seconds;
    assert!(
        (0.8..=1.2).contains(&running),
        "expected ~1s elapsed, got {running}"
    );

    host.pause().await.expect("pause should succeed");
    settle().await;
    let at_pause = host.view().elapsed_seconds;

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        host.view().elapsed_seconds,
        at_pause,
        "elapsed must not advance while paused"
    );

    host.resume().await.expect("resume should succeed");
    settle().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let resumed = host.view().elapsed_seconds;
    assert!(
        resumed >= at_pause + 0.8,
        "expected ~1s more after resume, got {resumed} from {at_pause}"
    );
}

#[tokio::test(start_paused = true)]
async fn guest_display_lags_host_by_at_most_one_publish_interval() {
    let store = test_store();
    let host = test_engine(&store, "user_host");
    let guest = test_engine(&store, "user_guest");

    let session_id = host.create("groupA").await.expect("create should succeed");
    guest.join(&session_id).await.expect("join should succeed");

    host.start().await.expect("start should succeed");
    settle().await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;

    let host_elapsed = host.view().elapsed_seconds;
    let guest_elapsed = guest.view().elapsed_seconds;

    assert!(
        (4.5..=5.2).contains(&host_elapsed),
        "host elapsed should track real time, got {host_elapsed}"
    );
    assert!(
        guest_elapsed <= host_elapsed,
        "guest never runs ahead of host"
    );
    assert!(
        host_elapsed - guest_elapsed <= 0.7,
        "guest lag should stay within one publish interval, host {host_elapsed} guest {guest_elapsed}"
    );
}

#[tokio::test(start_paused = true)]
async fn failed_publishes_self_heal_on_next_cadence() {
    let store = test_store();
    let host = test_engine(&store, "user_host");
    let guest = test_engine(&store, "user_guest");

    let session_id = host.create("groupA").await.expect("create should succeed");
    guest.join(&session_id).await.expect("join should succeed");
    host.start().await.expect("start should succeed");
    settle().await;

    tokio::time::sleep(Duration::from_secs(1)).await;

    // Outage: host keeps ticking locally, every publish fails.
    store.set_offline(true);
    tokio::time::sleep(Duration::from_secs(2)).await;
    let stale = guest.view().elapsed_seconds;
    assert!(stale <= 1.1, "guest should be stale during outage, got {stale}");

    // Recovery: the next threshold crossing publishes a fresh value.
    store.set_offline(false);
    tokio::time::sleep(Duration::from_secs(1)).await;
    settle().await;

    let host_elapsed = host.view().elapsed_seconds;
    let guest_elapsed = guest.view().elapsed_seconds;
    assert!(
        host_elapsed - guest_elapsed <= 0.7,
        "guest should catch up after recovery, host {host_elapsed} guest {guest_elapsed}"
    );
    assert!(
        host_elapsed >= 3.8,
        "host local clock must not lose time during the outage, got {host_elapsed}"
    );
}

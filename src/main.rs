// SPDX-License-Identifier: MIT

//! Studysync demo.
//!
//! Runs a host and a guest against the in-memory store: create, join,
//! start, five seconds of study, pause, end with rewards, grace-delay
//! deletion.

use std::sync::Arc;
use std::time::Duration;

use studysync::config::SyncConfig;
use studysync::session::{rewards, RecordingSink, RewardSink, SessionEngine, SessionLobby};
use studysync::store::{paths, MemoryStore, ReplicatedStore};
use studysync::Rewards;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = SyncConfig::from_env().expect("Failed to load configuration");
    let store: Arc<dyn ReplicatedStore> = Arc::new(MemoryStore::new());

    let host = SessionEngine::new(Arc::clone(&store), "user_host", config.clone());
    let guest = SessionEngine::new(Arc::clone(&store), "user_guest", config.clone());

    let session_id = host.create("groupA").await?;

    let lobby = SessionLobby::new(Arc::clone(&store));
    let listed = lobby.list("groupA").await?;
    tracing::info!(count = listed.len(), "Sessions discoverable in group");

    let sink = Arc::new(RecordingSink::new());
    let pump = tokio::spawn(rewards::pump(
        guest.subscribe(),
        Arc::clone(&sink) as Arc<dyn RewardSink>,
    ));

    guest.join(&session_id).await?;
    host.start().await?;

    tokio::time::sleep(Duration::from_secs(5)).await;
    tracing::info!(
        host_elapsed = host.view().elapsed_seconds,
        guest_elapsed = guest.view().elapsed_seconds,
        "Five seconds of study"
    );

    host.pause().await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    host.end(Rewards {
        exp: 50,
        coins: 10,
        score: 0,
    })
    .await?;

    tokio::time::sleep(config.delete_grace + Duration::from_millis(200)).await;
    let deleted = store.get(&paths::session(&session_id)).await?.is_none();
    tracing::info!(
        deleted,
        rewards_applied = sink.applied().len(),
        "Session torn down"
    );

    host.shutdown();
    guest.shutdown();
    pump.abort();
    Ok(())
}

fn init_logging() {
    let format = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("studysync=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}

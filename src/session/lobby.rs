// SPDX-License-Identifier: MIT

//! Group session discovery.
//!
//! Sessions are discoverable by filtering the `sessions` collection on
//! `groupId`; clients pick one from the listing and hand its id to
//! [`SessionEngine::join`](super::SessionEngine::join).

use std::sync::Arc;

use crate::error::Result;
use crate::models::SessionSummary;
use crate::store::{paths, ReplicatedStore, Subscription};

pub struct SessionLobby {
    store: Arc<dyn ReplicatedStore>,
}

impl SessionLobby {
    pub fn new(store: Arc<dyn ReplicatedStore>) -> Self {
        Self { store }
    }

    /// One-shot listing of a group's sessions.
    pub async fn list(&self, group_id: &str) -> Result<Vec<SessionSummary>> {
        let snapshot = self.store.get(paths::SESSIONS).await?;
        Ok(snapshot
            .map(|value| SessionSummary::decode_group(&value, group_id))
            .unwrap_or_default())
    }

    /// Live listing: re-emits the filtered rows on every change anywhere
    /// in the sessions collection.
    pub fn watch(&self, group_id: &str) -> LobbyWatch {
        LobbyWatch {
            subscription: self.store.watch(paths::SESSIONS),
            group_id: group_id.to_string(),
        }
    }
}

pub struct LobbyWatch {
    subscription: Subscription,
    group_id: String,
}

impl LobbyWatch {
    /// Next listing, or `None` once the store side has gone away. An empty
    /// collection yields an empty listing.
    pub async fn recv(&mut self) -> Option<Vec<SessionSummary>> {
        let snapshot = self.subscription.recv().await?;
        Some(
            snapshot
                .map(|value| SessionSummary::decode_group(&value, &self.group_id))
                .unwrap_or_default(),
        )
    }
}

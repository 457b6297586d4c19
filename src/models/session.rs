// SPDX-License-Identifier: MIT

//! Session document schema and snapshot decoding.
//!
//! A session document lives at `sessions/{sessionId}` in the replicated
//! store. Decoding is field-wise and defensive: a field that is absent or
//! arrives in an unexpected representation decodes to `None` rather than
//! failing the whole snapshot, since the store makes no type guarantees
//! and may deliver partial trees.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::store::server_timestamp;

/// Wire field names under `sessions/{sessionId}`.
pub mod fields {
    pub const GROUP_ID: &str = "groupId";
    pub const HOST_ID: &str = "hostId";
    pub const ACTIVE: &str = "active";
    pub const PAUSED: &str = "paused";
    pub const ELAPSED_SECONDS: &str = "elapsedSeconds";
    pub const READY_TO_START: &str = "readyToStart";
    pub const CREATED_AT: &str = "createdAt";
    pub const PARTICIPANTS: &str = "participants";
    pub const ENDED: &str = "ended";
    pub const FINAL_TIME: &str = "finalTime";
    pub const REWARDS: &str = "rewards";
}

/// Reward payload written once at session end and delivered to every
/// observing client. The engine only transports it; the values come from
/// whatever policy component computes rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rewards {
    pub exp: i64,
    pub coins: i64,
    pub score: i64,
}

/// Decoded view of one session snapshot. Every field is optional; absent
/// fields simply did not appear in this delivery.
#[derive(Debug, Clone, Default)]
pub struct SessionDoc {
    pub group_id: Option<String>,
    pub host_id: Option<String>,
    pub active: Option<bool>,
    pub paused: Option<bool>,
    pub elapsed_seconds: Option<f64>,
    pub ready_to_start: Option<bool>,
    pub created_at: Option<i64>,
    pub participants: Option<BTreeSet<String>>,
    pub ended: Option<bool>,
    pub final_time: Option<f64>,
    pub rewards: Option<Rewards>,
}

impl SessionDoc {
    /// Decode a session snapshot field by field.
    pub fn decode(snapshot: &Value) -> Self {
        let field = |name: &str| snapshot.get(name);

        Self {
            group_id: field(fields::GROUP_ID).and_then(as_string),
            host_id: field(fields::HOST_ID).and_then(as_string),
            active: field(fields::ACTIVE).and_then(as_bool),
            paused: field(fields::PAUSED).and_then(as_bool),
            elapsed_seconds: field(fields::ELAPSED_SECONDS).and_then(as_f64),
            ready_to_start: field(fields::READY_TO_START).and_then(as_bool),
            created_at: field(fields::CREATED_AT).and_then(as_i64),
            participants: field(fields::PARTICIPANTS).and_then(decode_participants),
            ended: field(fields::ENDED).and_then(as_bool),
            final_time: field(fields::FINAL_TIME).and_then(as_f64),
            rewards: field(fields::REWARDS).and_then(decode_rewards),
        }
    }

    /// The full initial document a host writes at creation time.
    /// `participants` is written alongside in the same commit, not here.
    pub fn initial_value(group_id: &str, host_id: &str) -> Value {
        serde_json::json!({
            "groupId": group_id,
            "hostId": host_id,
            "active": false,
            "paused": false,
            "elapsedSeconds": 0.0,
            "readyToStart": false,
            "createdAt": server_timestamp(),
        })
    }
}

/// One row of a group's session listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    pub group_id: String,
    pub host_id: Option<String>,
    pub active: bool,
    pub participant_count: usize,
}

impl SessionSummary {
    /// Decode the `sessions` collection snapshot, keeping only the rows
    /// belonging to `group_id`. Sessions missing a group id are skipped.
    pub fn decode_group(collection: &Value, group_id: &str) -> Vec<Self> {
        let Some(map) = collection.as_object() else {
            return Vec::new();
        };

        map.iter()
            .filter_map(|(session_id, value)| {
                let doc = SessionDoc::decode(value);
                let session_group = doc.group_id?;
                if session_group != group_id {
                    return None;
                }
                Some(Self {
                    session_id: session_id.clone(),
                    group_id: session_group,
                    host_id: doc.host_id,
                    active: doc.active.unwrap_or(false),
                    participant_count: doc.participants.map_or(0, |p| p.len()),
                })
            })
            .collect()
    }
}

fn decode_participants(value: &Value) -> Option<BTreeSet<String>> {
    // Key presence means present; the flag value is ignored, matching the
    // schema where no leave operation exists.
    let map = value.as_object()?;
    Some(map.keys().cloned().collect())
}

fn decode_rewards(value: &Value) -> Option<Rewards> {
    let map = value.as_object()?;
    let read = |name: &str| map.get(name).and_then(as_i64).unwrap_or(0);
    Some(Rewards {
        exp: read("exp"),
        coins: read("coins"),
        score: read("score"),
    })
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(raw) => match raw.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

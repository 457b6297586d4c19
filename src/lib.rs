// SPDX-License-Identifier: MIT

//! Studysync: real-time collaborative study-session synchronization.
//!
//! Multiple clients (one host, any number of guests) share a session
//! document in a replicated, path-addressable store. The host drives the
//! timer and lifecycle; every participant observes state changes through a
//! store subscription and re-emits them as typed in-process events.

pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod store;

pub use error::{Result, SyncError};
pub use models::{Rewards, SessionDoc, SessionSummary};
pub use session::{SessionEngine, SessionEvent, SessionLobby};

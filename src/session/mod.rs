// SPDX-License-Identifier: MIT

//! Session lifecycle, host timer, event fan-out, and lobby discovery.

pub mod engine;
pub mod events;
pub mod lobby;
pub mod rewards;
mod timer;

pub use engine::{LocalView, SessionEngine};
pub use events::SessionEvent;
pub use lobby::{LobbyWatch, SessionLobby};
pub use rewards::{RecordingSink, RewardSink};

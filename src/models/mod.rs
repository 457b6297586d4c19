// SPDX-License-Identifier: MIT

//! Data models for replicated session documents.

pub mod session;

pub use session::{Rewards, SessionDoc, SessionSummary};

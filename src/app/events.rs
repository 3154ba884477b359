//! Outbound live-channel events.
//!
//! The broadcaster pushes [`LiveEvent::RaceResult`] to every observer;
//! the live-channel handler answers client messages with the other
//! variants.  Serialised as `{"type": "...", ...}`.

use serde::{Deserialize, Serialize};

use crate::model::{ControllerStatus, HeatResult};

/// Events pushed to live observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A heat finished and is already durable.
    RaceResult { data: HeatResult },

    /// Reply to a client `ping`.
    Pong,

    /// Reply to a client `get_status`.
    Status { data: ControllerStatus },

    /// The client sent something unreadable.
    Error { message: String },
}

impl LiveEvent {
    pub fn to_json(&self) -> String {
        // Serialising these plain structs cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

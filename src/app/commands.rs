//! Inbound requests to the controller.
//!
//! These are the operations a transport (HTTP, WebSocket, serial, the
//! JSON-lines bridge in the binary) can ask for.  The
//! [`dispatch`](crate::api::dispatch) layer maps each one onto a
//! [`TrackController`](super::service::TrackController) call.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{Lane, LaneList};

/// Default page size for `history`.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Commands external adapters can send into the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// `GET status`
    Status,

    /// `GET gate`
    GetGate,

    /// `POST gate {released}`
    SetGate { released: bool },

    /// `GET calibration`
    GetCalibration,

    /// `POST calibration {holding_angle, released_angle}`
    SetCalibration { holding_angle: u8, released_angle: u8 },

    /// `POST servo-test {angle}`, bench setup only.
    ServoTest { angle: u8 },

    /// `POST race/run {heat_id, occupied_lanes}`
    RunRace {
        heat_id: String,
        occupied_lanes: LaneList,
    },

    /// `GET history?limit=N`
    History { limit: Option<usize> },

    /// `GET history/{heat_id}`
    HistoryById { heat_id: String },

    /// `GET history/last`
    HistoryLast,
}

impl Command {
    pub fn run_race(heat_id: impl Into<String>, lanes: &[Lane]) -> Result<Self, Error> {
        let setup = crate::model::HeatSetup::new(heat_id, lanes)?;
        Ok(Self::RunRace {
            heat_id: setup.heat_id,
            occupied_lanes: setup.occupied_lanes,
        })
    }
}

//! Heat, lane and status records exchanged with callers and persisted in
//! the history log.  Field names are part of the wire and file format.

use core::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Lane identifier, `1..=num_tracks`.
pub type Lane = u8;

/// Upper bound on the configured track count.
pub const MAX_LANES: usize = 8;

/// Occupied lanes of a heat, in caller order.
pub type LaneList = heapless::Vec<Lane, MAX_LANES>;

/// Configuration for one heat, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatSetup {
    pub heat_id: String,
    pub occupied_lanes: LaneList,
}

impl HeatSetup {
    /// Build a setup from a lane slice.  More than `MAX_LANES` lanes is an
    /// invalid request; lane ranges and duplicates are checked when the
    /// race is prepared.
    pub fn new(heat_id: impl Into<String>, lanes: &[Lane]) -> Result<Self, Error> {
        let occupied_lanes = LaneList::from_slice(lanes).map_err(|()| {
            Error::InvalidRequest(format!(
                "{} lanes listed, at most {MAX_LANES} per heat",
                lanes.len()
            ))
        })?;
        Ok(Self {
            heat_id: heat_id.into(),
            occupied_lanes,
        })
    }

    pub fn occupies(&self, lane: Lane) -> bool {
        self.occupied_lanes.contains(&lane)
    }
}

/// Outcome for a single lane.
///
/// Exactly one of these holds: timed (`finish_time_ms` and `place` set),
/// DNF (`is_dnf`), or unoccupied (nothing set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneResult {
    pub lane_number: Lane,
    pub finish_time_ms: Option<f64>,
    pub place: Option<u8>,
    pub is_dnf: bool,
}

impl LaneResult {
    pub fn timed(lane: Lane, elapsed: Duration, place: u8) -> Self {
        Self {
            lane_number: lane,
            finish_time_ms: Some(round_ms(elapsed)),
            place: Some(place),
            is_dnf: false,
        }
    }

    pub fn dnf(lane: Lane) -> Self {
        Self {
            lane_number: lane,
            finish_time_ms: None,
            place: None,
            is_dnf: true,
        }
    }

    pub fn unoccupied(lane: Lane) -> Self {
        Self {
            lane_number: lane,
            finish_time_ms: None,
            place: None,
            is_dnf: false,
        }
    }

    pub fn is_timed(&self) -> bool {
        self.finish_time_ms.is_some() && self.place.is_some()
    }

    pub fn is_unoccupied(&self) -> bool {
        self.finish_time_ms.is_none() && self.place.is_none() && !self.is_dnf
    }
}

/// Milliseconds with two decimals, as reported to callers.
fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100_000.0).round() / 100.0
}

/// The finalized record of one heat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatResult {
    pub heat_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub lane_results: Vec<LaneResult>,
    pub is_complete: bool,
}

impl HeatResult {
    pub fn lane(&self, lane: Lane) -> Option<&LaneResult> {
        self.lane_results.iter().find(|r| r.lane_number == lane)
    }
}

/// Which driver family the controller was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareMode {
    Real,
    Simulated,
}

/// On-demand snapshot of the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub num_tracks: u8,
    pub is_gate_released: bool,
    pub current_heat_id: Option<String>,
    pub hardware_mode: HardwareMode,
}

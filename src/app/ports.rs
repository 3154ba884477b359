//! Port traits: the boundary between the race logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ RaceEngine / TrackController
//! ```
//!
//! Driven adapters (gate servo, finish sensors, history log, live
//! observers) implement these traits.  The engine consumes them via
//! generics, so the timing loop never knows whether it is talking to real
//! GPIO or a simulation.

use std::time::Instant;

use crate::error::{Error, HardwareError};
use crate::model::{HardwareMode, HeatResult, Lane};

use super::events::LiveEvent;

// ───────────────────────────────────────────────────────────────
// Gate actuator port (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Start gate actuator with two logical positions.
pub trait GateActuator {
    /// Command the gate to the calibrated released or holding angle.
    ///
    /// Only guarantees the command was issued; travel time is the
    /// caller's settle delay.
    fn set_position(&mut self, released: bool) -> Result<(), HardwareError>;

    /// Last commanded position (not sensor-verified).
    fn is_released(&self) -> bool;

    /// Drive a raw angle for bench calibration.  Never used during a race
    /// and does not change [`is_released`](Self::is_released).
    fn test_angle(&mut self, angle: u8) -> Result<(), HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Finish sensor port (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Per-lane break-beam inputs at the finish line.
pub trait FinishSensors {
    /// Called once per race, right after the start instant is captured
    /// and before the first poll.
    fn arm(&mut self, occupied: &[Lane], start: Instant) -> Result<(), HardwareError> {
        let _ = (occupied, start);
        Ok(())
    }

    /// Non-blocking: is the beam for `lane` currently broken?
    fn poll_lane(&mut self, lane: Lane) -> Result<bool, HardwareError>;
}

/// The driven hardware the controller is started with.
pub struct Hardware {
    pub gate: Box<dyn GateActuator + Send>,
    pub sensors: Box<dyn FinishSensors + Send>,
    pub mode: HardwareMode,
}

// ───────────────────────────────────────────────────────────────
// History port (domain ↔ durable log)
// ───────────────────────────────────────────────────────────────

/// Most-recent-first log of finalized heats.
///
/// Implementations MUST make `save` crash-atomic: either the previous log
/// or the updated one is readable after a crash, never a partial write.
pub trait HistoryPort {
    /// Upsert by `heat_id`, insert at the head and persist.
    fn save(&mut self, result: &HeatResult) -> Result<(), Error>;

    /// Up to `limit` heats, most recent first.
    fn list_recent(&self, limit: usize) -> Vec<HeatResult>;

    fn get_by_id(&self, heat_id: &str) -> Option<HeatResult>;

    fn most_recent(&self) -> Option<HeatResult>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ───────────────────────────────────────────────────────────────
// Observer port (domain → live clients)
// ───────────────────────────────────────────────────────────────

/// A live-result consumer registered with the broadcaster.
pub trait ResultObserver {
    /// Deliver one event without blocking.  An error deregisters the
    /// observer.
    fn deliver(&mut self, event: &LiveEvent) -> Result<(), DeliveryError>;
}

/// Why an observer could not take an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The receiving side has gone away.
    Closed,
    /// The observer's queue is full.
    Full,
}

impl core::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Closed => write!(f, "observer closed"),
            Self::Full => write!(f, "observer queue full"),
        }
    }
}

//! Servo angle calibration for the start gate.
//!
//! The calibration is process-wide state read by the gate driver on every
//! move.  [`CalibrationStore`] is the only mutation path; writes replace
//! both angles in one critical section so a race can never start with a
//! half-updated pair.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Largest angle a hobby servo accepts.
pub const MAX_ANGLE: u8 = 180;

/// Holding and released angles for the gate servo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    /// Angle while the gate holds the cars (before the start).
    pub holding_angle: u8,
    /// Angle that drops the gate (race start).
    pub released_angle: u8,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            holding_angle: 90,
            released_angle: 0,
        }
    }
}

impl Calibration {
    pub fn angle_for(&self, released: bool) -> u8 {
        if released {
            self.released_angle
        } else {
            self.holding_angle
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        check_angle(self.holding_angle)?;
        check_angle(self.released_angle)
    }
}

/// Reject angles beyond the servo's travel.
pub fn check_angle(angle: u8) -> Result<(), Error> {
    if angle > MAX_ANGLE {
        return Err(Error::InvalidRequest(format!(
            "angle {angle} out of range 0-{MAX_ANGLE}"
        )));
    }
    Ok(())
}

/// Single-writer holder of the live calibration.
pub struct CalibrationStore {
    current: Mutex<CriticalSectionRawMutex, Cell<Calibration>>,
}

impl CalibrationStore {
    pub fn new(initial: Calibration) -> Self {
        Self {
            current: Mutex::new(Cell::new(initial)),
        }
    }

    pub fn get(&self) -> Calibration {
        self.current.lock(Cell::get)
    }

    /// Validate and commit a new calibration, returning what was stored.
    pub fn set(&self, calibration: Calibration) -> Result<Calibration, Error> {
        calibration.validate()?;
        self.current.lock(|c| c.set(calibration));
        info!(
            "CALIB | holding={} released={}",
            calibration.holding_angle, calibration.released_angle
        );
        Ok(calibration)
    }
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new(Calibration::default())
    }
}

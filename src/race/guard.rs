//! Gate-holding drop guard.
//!
//! Wraps the gate for the duration of a race.  Whatever ends the race
//! (all lanes in, timeout, a driver fault, or the future simply being
//! dropped) the gate is commanded back to HOLDING exactly once.

use log::{error, warn};

use crate::app::ports::GateActuator;
use crate::error::HardwareError;

pub struct HoldGuard<'a, G: GateActuator + ?Sized> {
    gate: &'a mut G,
    armed: bool,
}

impl<'a, G: GateActuator + ?Sized> HoldGuard<'a, G> {
    pub fn new(gate: &'a mut G) -> Self {
        Self { gate, armed: true }
    }

    pub fn gate(&mut self) -> &mut G {
        self.gate
    }

    /// Command HOLDING now and disarm the guard.
    pub fn hold(mut self) -> Result<(), HardwareError> {
        self.armed = false;
        self.gate.set_position(false).inspect_err(|e| {
            error!("RACE | failed to return gate to HOLDING: {}", e);
        })
    }
}

impl<G: GateActuator + ?Sized> Drop for HoldGuard<'_, G> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("RACE | race abandoned, forcing gate to HOLDING");
        if let Err(e) = self.gate.set_position(false) {
            error!("RACE | failed to return gate to HOLDING: {}", e);
        }
    }
}

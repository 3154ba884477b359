//! In-memory start gate used when no servo is attached.
//!
//! Position changes are instant and only logged.

use log::info;

use crate::app::ports::GateActuator;
use crate::error::HardwareError;

#[derive(Debug, Default)]
pub struct SimulatedGate {
    released: bool,
    moves: u32,
}

impl SimulatedGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of position commands received so far.
    pub fn moves(&self) -> u32 {
        self.moves
    }
}

impl GateActuator for SimulatedGate {
    fn set_position(&mut self, released: bool) -> Result<(), HardwareError> {
        self.released = released;
        self.moves += 1;
        info!(
            "GATE | [sim] {}",
            if released { "RELEASED" } else { "HOLDING" }
        );
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released
    }

    fn test_angle(&mut self, angle: u8) -> Result<(), HardwareError> {
        info!("GATE | [sim] servo test angle={}", angle);
        Ok(())
    }
}

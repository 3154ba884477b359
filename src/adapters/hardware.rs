//! Hardware selection.
//!
//! Picks the gate and sensor drivers once at startup.  Real peripherals
//! are tried unless `mock_hardware` is set; if they cannot be opened the
//! controller falls back to simulation and says so in the log.  Nothing
//! downstream branches on which variant was chosen.

use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::Hardware;
use crate::calibration::CalibrationStore;
use crate::config::ControllerConfig;
use crate::drivers::sim_gate::SimulatedGate;
use crate::error::Result;
use crate::model::HardwareMode;
use crate::sensors::simulated::{FinishPlan, SimulatedSensors};

/// Gate and sensors for `config`, falling back to simulation.
pub fn make_hardware(config: &ControllerConfig, calibration: Arc<CalibrationStore>) -> Hardware {
    if config.mock_hardware {
        info!("HW | mock hardware requested, using simulated gate and sensors");
        return simulated(FinishPlan::default());
    }
    match open_real(config, calibration) {
        Ok(hw) => {
            info!("HW | real hardware ready");
            hw
        }
        Err(e) => {
            warn!("HW | {}, falling back to simulated hardware", e);
            simulated(FinishPlan::default())
        }
    }
}

/// Simulated gate plus sensors following `plan`.
pub fn simulated(plan: FinishPlan) -> Hardware {
    Hardware {
        gate: Box::new(SimulatedGate::new()),
        sensors: Box::new(SimulatedSensors::new(plan)),
        mode: HardwareMode::Simulated,
    }
}

#[cfg(feature = "rpi")]
fn open_real(config: &ControllerConfig, calibration: Arc<CalibrationStore>) -> Result<Hardware> {
    super::rpi::open(config, calibration)
}

#[cfg(not(feature = "rpi"))]
fn open_real(_config: &ControllerConfig, _calibration: Arc<CalibrationStore>) -> Result<Hardware> {
    Err(crate::error::Error::HardwareUnavailable(
        "built without the `rpi` feature".into(),
    ))
}

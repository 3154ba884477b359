//! Start-gate hobby servo driver.
//!
//! 50 Hz PWM, pulse width mapped linearly from angle: duty is
//! `2% + angle/18 %` of the 20 ms period (0° → 0.4 ms, 180° → 2.4 ms).
//! Generic over [`SetDutyCycle`] so the same driver runs on the Pi PWM
//! block or a test double.
//!
//! ## Safety contract
//!
//! The driver records the commanded position before writing the duty
//! cycle.  A failed write therefore still reports the position the engine
//! asked for; the engine treats the error as a hardware fault and
//! re-commands holding.

use std::sync::Arc;

use embedded_hal::pwm::SetDutyCycle;
use log::{info, warn};

use crate::app::ports::GateActuator;
use crate::calibration::{CalibrationStore, MAX_ANGLE};
use crate::error::HardwareError;

/// Denominator of the duty fraction: `(2 + angle/18) / 100 == (36 + angle) / 1800`.
const DUTY_DENOM: u16 = 1800;
const DUTY_BASE: u16 = 36;

pub struct ServoGate<P> {
    pwm: P,
    calibration: Arc<CalibrationStore>,
    released: bool,
    last_angle: Option<u8>,
}

impl<P: SetDutyCycle> ServoGate<P> {
    pub fn new(pwm: P, calibration: Arc<CalibrationStore>) -> Self {
        Self {
            pwm,
            calibration,
            released: false,
            last_angle: None,
        }
    }

    /// Most recent angle written, if any.
    pub fn last_angle(&self) -> Option<u8> {
        self.last_angle
    }

    fn write_angle(&mut self, angle: u8) -> Result<(), HardwareError> {
        let angle = angle.min(MAX_ANGLE);
        self.pwm
            .set_duty_cycle_fraction(DUTY_BASE + u16::from(angle), DUTY_DENOM)
            .map_err(|e| {
                warn!("GATE | servo PWM write failed: {:?}", e);
                HardwareError::PwmWriteFailed
            })?;
        self.last_angle = Some(angle);
        Ok(())
    }
}

impl<P: SetDutyCycle> GateActuator for ServoGate<P> {
    fn set_position(&mut self, released: bool) -> Result<(), HardwareError> {
        let angle = self.calibration.get().angle_for(released);
        self.released = released;
        self.write_angle(angle)?;
        info!(
            "GATE | {} (angle={})",
            if released { "RELEASED" } else { "HOLDING" },
            angle
        );
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released
    }

    fn test_angle(&mut self, angle: u8) -> Result<(), HardwareError> {
        self.write_angle(angle)?;
        info!("GATE | servo test angle={}", angle);
        Ok(())
    }
}

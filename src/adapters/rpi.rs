//! Raspberry Pi peripherals via `rppal`.
//!
//! The servo sits on a hardware PWM channel at 50 Hz and the finish beams
//! on pull-up GPIO inputs.  `rppal`'s `hal` feature supplies the
//! embedded-hal traits the generic drivers are written against.

use std::sync::Arc;

use log::info;
use rppal::gpio::Gpio;
use rppal::pwm::{Channel, Polarity, Pwm};

use crate::app::ports::{GateActuator, Hardware};
use crate::calibration::CalibrationStore;
use crate::config::ControllerConfig;
use crate::drivers::servo::ServoGate;
use crate::error::{Error, Result};
use crate::model::HardwareMode;
use crate::sensors::beam::BeamSensors;

/// Hobby-servo frame rate.
const SERVO_FREQUENCY_HZ: f64 = 50.0;

fn unavailable(what: &str, e: impl core::fmt::Display) -> Error {
    Error::HardwareUnavailable(format!("{what}: {e}"))
}

/// Open the servo PWM channel and every configured lane input.
pub fn open(config: &ControllerConfig, calibration: Arc<CalibrationStore>) -> Result<Hardware> {
    let channel = match config.servo_pwm_channel {
        0 => Channel::Pwm0,
        1 => Channel::Pwm1,
        other => {
            return Err(Error::HardwareUnavailable(format!(
                "no PWM channel {other}"
            )));
        }
    };
    let pwm = Pwm::with_frequency(channel, SERVO_FREQUENCY_HZ, 0.0, Polarity::Normal, true)
        .map_err(|e| unavailable("servo PWM", e))?;

    let gpio = Gpio::new().map_err(|e| unavailable("GPIO", e))?;
    let mut pins = Vec::with_capacity(usize::from(config.num_tracks));
    for &bcm in config.sensor_pins.iter().take(usize::from(config.num_tracks)) {
        let pin = gpio
            .get(bcm)
            .map_err(|e| unavailable("finish sensor pin", e))?
            .into_input_pullup();
        pins.push(pin);
    }

    let mut gate = ServoGate::new(pwm, calibration);
    gate.set_position(false).map_err(|e| unavailable("servo", e))?;

    info!(
        "HW | servo on {:?}, finish pins {:?}",
        channel,
        config.sensor_pins.as_slice()
    );
    Ok(Hardware {
        gate: Box::new(gate),
        sensors: Box::new(BeamSensors::new(pins)),
        mode: HardwareMode::Real,
    })
}

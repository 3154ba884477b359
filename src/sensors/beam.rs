//! IR break-beam finish sensors, one digital input per lane.
//!
//! Receivers are wired to pull-up inputs and pull the line low while the
//! beam is interrupted, so a car over the finish reads as `is_low()`.
//! Lane `n` maps to the `n`-th pin handed to [`BeamSensors::new`].

use embedded_hal::digital::InputPin;
use log::warn;

use crate::app::ports::FinishSensors;
use crate::error::HardwareError;
use crate::model::{Lane, MAX_LANES};

pub struct BeamSensors<P> {
    pins: heapless::Vec<P, MAX_LANES>,
}

impl<P: InputPin> BeamSensors<P> {
    /// Pins in lane order.  Anything past `MAX_LANES` is ignored.
    pub fn new(pins: impl IntoIterator<Item = P>) -> Self {
        let mut v = heapless::Vec::new();
        for pin in pins.into_iter().take(MAX_LANES) {
            if v.push(pin).is_err() {
                break;
            }
        }
        Self { pins: v }
    }

    pub fn lane_count(&self) -> usize {
        self.pins.len()
    }
}

impl<P: InputPin> FinishSensors for BeamSensors<P> {
    fn poll_lane(&mut self, lane: Lane) -> Result<bool, HardwareError> {
        let pin = usize::from(lane)
            .checked_sub(1)
            .and_then(|i| self.pins.get_mut(i))
            .ok_or(HardwareError::NoSuchLane(lane))?;

        pin.is_low().map_err(|e| {
            warn!("SENSOR | lane {} read failed: {:?}", lane, e);
            HardwareError::GpioReadFailed { lane }
        })
    }
}

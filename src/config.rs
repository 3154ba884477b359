//! Controller configuration.
//!
//! All tunable parameters for the track controller.  Defaults describe a
//! four-lane Raspberry Pi build; every field can be overridden from the
//! process environment and the result is validated before anything
//! touches hardware.

use core::fmt;
use core::time::Duration;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::calibration::{Calibration, MAX_ANGLE};
use crate::model::MAX_LANES;
use crate::race::RaceTiming;

/// BCM pin numbers of the stock four-lane finish line, lane 1 first.
pub const DEFAULT_SENSOR_PINS: [u8; 4] = [17, 27, 22, 23];

/// Core controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    // --- Track ---
    /// Number of lanes, fixed for the life of the process
    pub num_tracks: u8,

    // --- Hardware ---
    /// Skip real hardware and use the simulated gate and sensors
    pub mock_hardware: bool,
    /// Hardware PWM channel driving the gate servo
    pub servo_pwm_channel: u8,
    /// Break-beam input per lane (BCM numbering), lane 1 first
    pub sensor_pins: heapless::Vec<u8, MAX_LANES>,

    // --- History ---
    /// JSON file holding the heat log
    pub history_path: PathBuf,

    // --- Timing ---
    /// Servo travel time between release and the start instant (ms)
    pub settle_ms: u32,
    /// Finish-line sweep interval (ms)
    pub poll_interval_ms: u32,
    /// Lanes not finished after this are DNF (ms)
    pub race_timeout_ms: u32,

    // --- Gate ---
    /// Servo angles at startup
    pub calibration: Calibration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            num_tracks: 4,

            mock_hardware: false,
            servo_pwm_channel: 0,
            sensor_pins: heapless::Vec::from_slice(&DEFAULT_SENSOR_PINS).unwrap_or_default(),

            history_path: PathBuf::from("heat_history.json"),

            settle_ms: 500,
            poll_interval_ms: 1,
            race_timeout_ms: 30_000,

            calibration: Calibration::default(),
        }
    }
}

/// Why a configuration was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A value is out of its allowed range.
    ValidationFailed(&'static str),
    /// An environment variable is not a valid number; names the variable.
    Parse(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "invalid config: {msg}"),
            Self::Parse(var) => write!(f, "could not parse {var}"),
        }
    }
}

impl std::error::Error for ConfigError {}

const SENSOR_PIN_VARS: [&str; MAX_LANES] = [
    "SENSOR_PIN_1",
    "SENSOR_PIN_2",
    "SENSOR_PIN_3",
    "SENSOR_PIN_4",
    "SENSOR_PIN_5",
    "SENSOR_PIN_6",
    "SENSOR_PIN_7",
    "SENSOR_PIN_8",
];

impl ControllerConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// Recognised: `NUM_TRACKS`, `MOCK_HARDWARE` (`1`/`true`),
    /// `SERVO_PWM_CHANNEL`, `SENSOR_PIN_<n>`, `HISTORY_FILE`, `SETTLE_MS`,
    /// `POLL_INTERVAL_MS`, `RACE_TIMEOUT_MS`, `HOLDING_ANGLE`,
    /// `RELEASED_ANGLE`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        parse_into(&lookup, "NUM_TRACKS", &mut cfg.num_tracks)?;
        if let Some(v) = lookup("MOCK_HARDWARE") {
            cfg.mock_hardware = matches!(v.trim(), "1" | "true" | "TRUE" | "yes");
        }
        parse_into(&lookup, "SERVO_PWM_CHANNEL", &mut cfg.servo_pwm_channel)?;

        for (i, &var) in SENSOR_PIN_VARS.iter().enumerate() {
            let Some(raw) = lookup(var) else { continue };
            let pin: u8 = raw.trim().parse().map_err(|_| ConfigError::Parse(var))?;
            if let Some(slot) = cfg.sensor_pins.get_mut(i) {
                *slot = pin;
            } else if i == cfg.sensor_pins.len() {
                // Extends the list only when every earlier lane has a pin.
                let _ = cfg.sensor_pins.push(pin);
            } else {
                return Err(ConfigError::ValidationFailed(
                    "SENSOR_PIN_<n> must be set for every lane before n",
                ));
            }
        }

        if let Some(path) = lookup("HISTORY_FILE") {
            cfg.history_path = PathBuf::from(path);
        }
        parse_into(&lookup, "SETTLE_MS", &mut cfg.settle_ms)?;
        parse_into(&lookup, "POLL_INTERVAL_MS", &mut cfg.poll_interval_ms)?;
        parse_into(&lookup, "RACE_TIMEOUT_MS", &mut cfg.race_timeout_ms)?;
        parse_into(&lookup, "HOLDING_ANGLE", &mut cfg.calibration.holding_angle)?;
        parse_into(&lookup, "RELEASED_ANGLE", &mut cfg.calibration.released_angle)?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_LANES as u8).contains(&self.num_tracks) {
            return Err(ConfigError::ValidationFailed("num_tracks must be 1–8"));
        }
        if !self.mock_hardware && self.sensor_pins.len() < usize::from(self.num_tracks) {
            return Err(ConfigError::ValidationFailed(
                "sensor_pins must list a pin for every lane",
            ));
        }
        if self.calibration.holding_angle > MAX_ANGLE || self.calibration.released_angle > MAX_ANGLE
        {
            return Err(ConfigError::ValidationFailed(
                "calibration angles must be 0–180",
            ));
        }
        if !(1..=100).contains(&self.poll_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "poll_interval_ms must be 1–100",
            ));
        }
        if !(10..=600_000).contains(&self.race_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "race_timeout_ms must be 10–600000",
            ));
        }
        if self.race_timeout_ms <= self.poll_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "race_timeout_ms must be > poll_interval_ms",
            ));
        }
        if self.settle_ms > 5_000 {
            return Err(ConfigError::ValidationFailed("settle_ms must be 0–5000"));
        }
        Ok(())
    }

    pub fn race_timing(&self) -> RaceTiming {
        RaceTiming {
            settle: Duration::from_millis(u64::from(self.settle_ms)),
            poll_interval: Duration::from_millis(u64::from(self.poll_interval_ms)),
            timeout: Duration::from_millis(u64::from(self.race_timeout_ms)),
        }
    }
}

fn parse_into<T: core::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    slot: &mut T,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(var) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::Parse(var))?;
    }
    Ok(())
}

//! Unified error types for the track controller.
//!
//! A single [`Error`] enum that every subsystem converts into, so the
//! request dispatcher can map any failure to a stable kind identifier and
//! a human-readable message.  Hardware faults keep their own small `Copy`
//! enum because drivers raise them from inside the race polling loop.

use core::fmt;

use serde::Serialize;

use crate::model::Lane;

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

/// Faults raised by gate and sensor drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareError {
    /// PWM duty-cycle write to the gate servo failed.
    PwmWriteFailed,
    /// Reading a finish-line input failed.
    GpioReadFailed { lane: Lane },
    /// No sensor input is wired for this lane.
    NoSuchLane(Lane),
    /// The peripheral could not be opened.
    Unavailable(&'static str),
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::GpioReadFailed { lane } => write!(f, "GPIO read failed on lane {lane}"),
            Self::NoSuchLane(lane) => write!(f, "no sensor wired for lane {lane}"),
            Self::Unavailable(what) => write!(f, "{what} unavailable"),
        }
    }
}

impl std::error::Error for HardwareError {}

// ---------------------------------------------------------------------------
// Controller error
// ---------------------------------------------------------------------------

/// Every fallible controller operation funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A lane outside `1..=num_tracks` was requested.
    InvalidLane { lane: Lane, num_tracks: u8 },
    /// A lane appears more than once in a heat setup.
    DuplicateLane(Lane),
    /// A request parameter is malformed or out of range.
    InvalidRequest(String),
    /// `run` was called before `prepare`.
    NotArmed,
    /// A race is already running on the shared hardware.
    RaceInProgress,
    /// The engine already completed its heat; a new heat needs a new engine.
    HeatFinished,
    /// A driver fault aborted the operation (gate forced to holding first).
    HardwareFailure(HardwareError),
    /// Real hardware could not be initialised.
    HardwareUnavailable(String),
    /// The durable history log could not be parsed.
    PersistenceCorruption(String),
    /// Writing the durable history log failed.
    Persistence(String),
    /// Lookup of an unknown heat.
    NotFound(String),
}

impl Error {
    /// Stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidLane { .. } | Self::DuplicateLane(_) => ErrorKind::InvalidLane,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::NotArmed => ErrorKind::NotArmed,
            Self::RaceInProgress => ErrorKind::RaceInProgress,
            Self::HeatFinished => ErrorKind::HeatFinished,
            Self::HardwareFailure(_) => ErrorKind::HardwareFailure,
            Self::HardwareUnavailable(_) => ErrorKind::HardwareUnavailable,
            Self::PersistenceCorruption(_) => ErrorKind::PersistenceCorruption,
            Self::Persistence(_) => ErrorKind::PersistenceFailure,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLane { lane, num_tracks } => {
                write!(f, "invalid lane {lane}, must be 1-{num_tracks}")
            }
            Self::DuplicateLane(lane) => write!(f, "lane {lane} listed more than once"),
            Self::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            Self::NotArmed => write!(f, "no heat configured, prepare the race first"),
            Self::RaceInProgress => write!(f, "a race is already in progress"),
            Self::HeatFinished => write!(f, "heat already complete"),
            Self::HardwareFailure(e) => write!(f, "hardware failure: {e}"),
            Self::HardwareUnavailable(msg) => write!(f, "hardware unavailable: {msg}"),
            Self::PersistenceCorruption(msg) => write!(f, "history log corrupted: {msg}"),
            Self::Persistence(msg) => write!(f, "history write failed: {msg}"),
            Self::NotFound(what) => write!(f, "{what} not found"),
        }
    }
}

impl std::error::Error for Error {}

impl From<HardwareError> for Error {
    fn from(e: HardwareError) -> Self {
        Self::HardwareFailure(e)
    }
}

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

/// Stable, transport-visible error identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidLane,
    InvalidRequest,
    NotArmed,
    RaceInProgress,
    HeatFinished,
    HardwareFailure,
    HardwareUnavailable,
    PersistenceCorruption,
    PersistenceFailure,
    NotFound,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidLane => "invalid_lane",
            Self::InvalidRequest => "invalid_request",
            Self::NotArmed => "not_armed",
            Self::RaceInProgress => "race_in_progress",
            Self::HeatFinished => "heat_finished",
            Self::HardwareFailure => "hardware_failure",
            Self::HardwareUnavailable => "hardware_unavailable",
            Self::PersistenceCorruption => "persistence_corruption",
            Self::PersistenceFailure => "persistence_failure",
            Self::NotFound => "not_found",
        }
    }

    /// HTTP-equivalent status code for transports that speak HTTP.
    pub const fn status_code(self) -> u16 {
        match self {
            Self::InvalidLane | Self::InvalidRequest => 400,
            Self::NotFound => 404,
            Self::NotArmed | Self::RaceInProgress | Self::HeatFinished => 409,
            Self::HardwareFailure | Self::PersistenceCorruption | Self::PersistenceFailure => 500,
            Self::HardwareUnavailable => 503,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

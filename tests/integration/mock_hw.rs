//! Mock hardware and history for integration tests.
//!
//! Every gate command and sensor arm is recorded with its timestamp in a
//! shared log, so tests can hand the mocks to the controller and still
//! assert on the full command history afterwards.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use trackctl::app::ports::{FinishSensors, GateActuator, HistoryPort};
use trackctl::error::{Error, HardwareError};
use trackctl::model::{HeatResult, Lane};

// ── Gate ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum GateCall {
    Position { released: bool, at: Instant },
    TestAngle(u8),
}

pub type GateLog = Arc<Mutex<Vec<GateCall>>>;

pub struct RecordingGate {
    log: GateLog,
    released: bool,
    fail_release: bool,
}

#[allow(dead_code)]
impl RecordingGate {
    pub fn new() -> (Self, GateLog) {
        let log = GateLog::default();
        let gate = Self {
            log: Arc::clone(&log),
            released: false,
            fail_release: false,
        };
        (gate, log)
    }

    /// Every release command fails after being recorded.
    pub fn failing_release() -> (Self, GateLog) {
        let (mut gate, log) = Self::new();
        gate.fail_release = true;
        (gate, log)
    }
}

impl GateActuator for RecordingGate {
    fn set_position(&mut self, released: bool) -> Result<(), HardwareError> {
        self.log.lock().unwrap().push(GateCall::Position {
            released,
            at: Instant::now(),
        });
        self.released = released;
        if released && self.fail_release {
            return Err(HardwareError::PwmWriteFailed);
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released
    }

    fn test_angle(&mut self, angle: u8) -> Result<(), HardwareError> {
        self.log.lock().unwrap().push(GateCall::TestAngle(angle));
        Ok(())
    }
}

/// Released/held commands in order, dropping timestamps.
#[allow(dead_code)]
pub fn positions(log: &GateLog) -> Vec<bool> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|c| match c {
            GateCall::Position { released, .. } => Some(*released),
            GateCall::TestAngle(_) => None,
        })
        .collect()
}

/// When the gate was last commanded to release.
#[allow(dead_code)]
pub fn release_instant(log: &GateLog) -> Option<Instant> {
    log.lock().unwrap().iter().rev().find_map(|c| match c {
        GateCall::Position { released: true, at } => Some(*at),
        _ => None,
    })
}

// ── Sensors ───────────────────────────────────────────────────

pub type ArmLog = Arc<Mutex<Vec<Instant>>>;

/// Lanes finish at fixed delays after arming; one lane can be made to
/// fault on read.
pub struct ScriptedSensors {
    finish_at: BTreeMap<Lane, Duration>,
    fault_lane: Option<Lane>,
    start: Option<Instant>,
    arms: ArmLog,
}

#[allow(dead_code)]
impl ScriptedSensors {
    pub fn new(finish_at: &[(Lane, u64)]) -> (Self, ArmLog) {
        let arms = ArmLog::default();
        let sensors = Self {
            finish_at: finish_at
                .iter()
                .map(|&(l, ms)| (l, Duration::from_millis(ms)))
                .collect(),
            fault_lane: None,
            start: None,
            arms: Arc::clone(&arms),
        };
        (sensors, arms)
    }

    pub fn with_fault(mut self, lane: Lane) -> Self {
        self.fault_lane = Some(lane);
        self
    }
}

impl FinishSensors for ScriptedSensors {
    fn arm(&mut self, _occupied: &[Lane], start: Instant) -> Result<(), HardwareError> {
        self.arms.lock().unwrap().push(Instant::now());
        self.start = Some(start);
        Ok(())
    }

    fn poll_lane(&mut self, lane: Lane) -> Result<bool, HardwareError> {
        if self.fault_lane == Some(lane) {
            return Err(HardwareError::GpioReadFailed { lane });
        }
        let (Some(start), Some(delay)) = (self.start, self.finish_at.get(&lane)) else {
            return Ok(false);
        };
        Ok(start.elapsed() >= *delay)
    }
}

// ── History ───────────────────────────────────────────────────

/// History port whose disk is always full.
pub struct FailingHistory;

impl HistoryPort for FailingHistory {
    fn save(&mut self, _result: &HeatResult) -> Result<(), Error> {
        Err(Error::Persistence("disk full".into()))
    }

    fn list_recent(&self, _limit: usize) -> Vec<HeatResult> {
        Vec::new()
    }

    fn get_by_id(&self, _heat_id: &str) -> Option<HeatResult> {
        None
    }

    fn most_recent(&self) -> Option<HeatResult> {
        None
    }

    fn len(&self) -> usize {
        0
    }
}

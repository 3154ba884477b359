//! Controller service, the hexagonal core.
//!
//! [`TrackController`] owns the gate, the finish sensors, the history log
//! and the broadcaster, and exposes every operation a transport can ask
//! for.  All methods take `&self`; each piece of shared state sits behind
//! its own critical-section mutex and no lock is held across an `.await`.
//!
//! ```text
//!  GateActuator ◀──┐  ┌────────────────────────┐ ──▶ HistoryPort
//!                  ├──│    TrackController      │
//! FinishSensors ◀──┘  │  RaceEngine per heat    │ ──▶ ResultBroadcaster
//!                     └────────────────────────┘
//! ```
//!
//! The sensors are leased to one race at a time.  While the lease is out,
//! manual gate commands and new races fail with `RaceInProgress`.

use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{error, info};

use crate::calibration::{self, Calibration, CalibrationStore};
use crate::config::ControllerConfig;
use crate::error::{Error, HardwareError, Result};
use crate::model::{ControllerStatus, HardwareMode, HeatResult, HeatSetup, Lane};
use crate::race::{RaceEngine, RaceTiming};

use super::broadcast::{ObserverId, ResultBroadcaster, Subscription};
use super::ports::{FinishSensors, GateActuator, Hardware, HistoryPort, ResultObserver};

type Shared<T> = Mutex<CriticalSectionRawMutex, RefCell<T>>;
type GateSlot = Shared<Box<dyn GateActuator + Send>>;
type SensorSlot = Shared<Option<Box<dyn FinishSensors + Send>>>;

// ───────────────────────────────────────────────────────────────
// TrackController
// ───────────────────────────────────────────────────────────────

pub struct TrackController {
    num_tracks: u8,
    timing: RaceTiming,
    mode: HardwareMode,
    calibration: Arc<CalibrationStore>,
    gate: GateSlot,
    sensors: SensorSlot,
    history: Shared<Box<dyn HistoryPort + Send>>,
    current_heat: Shared<Option<String>>,
    broadcaster: ResultBroadcaster,
}

impl TrackController {
    /// Assemble the controller.  `calibration` must be the same store the
    /// gate driver reads.
    pub fn new(
        config: &ControllerConfig,
        calibration: Arc<CalibrationStore>,
        hardware: Hardware,
        history: Box<dyn HistoryPort + Send>,
    ) -> Self {
        info!(
            "CTRL | {} tracks, {:?} hardware, {} heats on record",
            config.num_tracks,
            hardware.mode,
            history.len()
        );
        Self {
            num_tracks: config.num_tracks,
            timing: config.race_timing(),
            mode: hardware.mode,
            calibration,
            gate: Mutex::new(RefCell::new(hardware.gate)),
            sensors: Mutex::new(RefCell::new(Some(hardware.sensors))),
            history: Mutex::new(RefCell::new(history)),
            current_heat: Mutex::new(RefCell::new(None)),
            broadcaster: ResultBroadcaster::new(),
        }
    }

    // ── Status ────────────────────────────────────────────────

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            num_tracks: self.num_tracks,
            is_gate_released: self.gate_released(),
            current_heat_id: self.current_heat.lock(|h| h.borrow().clone()),
            hardware_mode: self.mode,
        }
    }

    pub fn num_tracks(&self) -> u8 {
        self.num_tracks
    }

    pub fn hardware_mode(&self) -> HardwareMode {
        self.mode
    }

    // ── Gate ──────────────────────────────────────────────────

    pub fn gate_released(&self) -> bool {
        self.gate.lock(|g| g.borrow().is_released())
    }

    /// Manually release or hold the gate.  Returns the new position.
    pub fn set_gate(&self, released: bool) -> Result<bool> {
        self.with_idle_gate(|gate| gate.set_position(released))?;
        info!(
            "CTRL | gate manually {}",
            if released { "released" } else { "held" }
        );
        Ok(self.gate_released())
    }

    // ── Calibration ───────────────────────────────────────────

    pub fn calibration(&self) -> Calibration {
        self.calibration.get()
    }

    /// Store a new calibration; it applies from the next gate move.
    pub fn set_calibration(&self, calibration: Calibration) -> Result<Calibration> {
        self.calibration.set(calibration)
    }

    /// Drive the servo to a raw angle for bench calibration.
    pub fn servo_test(&self, angle: u8) -> Result<u8> {
        calibration::check_angle(angle)?;
        self.with_idle_gate(|gate| gate.test_angle(angle))?;
        Ok(angle)
    }

    // ── Racing ────────────────────────────────────────────────

    /// Run one heat end to end: arm, race, persist, then broadcast.
    ///
    /// The result is durable before any observer sees it.  If persisting
    /// fails the error is returned and nothing is broadcast.
    pub async fn run_heat(&self, setup: HeatSetup) -> Result<HeatResult> {
        let mut lease = self.lease_sensors(&setup.heat_id)?;
        let mut gate = LockedGate { slot: &self.gate };
        let mut engine = RaceEngine::new(self.num_tracks, self.timing);

        engine.prepare(setup, &mut gate)?;
        let result = engine.run(&mut gate, &mut lease).await?;
        drop(lease);

        self.history
            .lock(|h| h.borrow_mut().save(&result))
            .inspect_err(|e| error!("CTRL | heat '{}' not persisted: {}", result.heat_id, e))?;

        let delivered = self.broadcaster.notify(&result);
        info!(
            "CTRL | heat '{}' saved, sent to {} observer(s)",
            result.heat_id, delivered
        );
        Ok(result)
    }

    // ── History ───────────────────────────────────────────────

    pub fn history(&self, limit: usize) -> Vec<HeatResult> {
        self.history.lock(|h| h.borrow().list_recent(limit))
    }

    pub fn heat(&self, heat_id: &str) -> Result<HeatResult> {
        self.history
            .lock(|h| h.borrow().get_by_id(heat_id))
            .ok_or_else(|| Error::NotFound(format!("heat {heat_id}")))
    }

    pub fn last_heat(&self) -> Result<HeatResult> {
        self.history
            .lock(|h| h.borrow().most_recent())
            .ok_or_else(|| Error::NotFound("recorded heat".into()))
    }

    // ── Observers ─────────────────────────────────────────────

    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    pub fn register_observer(&self, observer: Box<dyn ResultObserver + Send>) -> ObserverId {
        self.broadcaster.register(observer)
    }

    pub fn deregister_observer(&self, id: ObserverId) -> bool {
        self.broadcaster.deregister(id)
    }

    pub fn observer_count(&self) -> usize {
        self.broadcaster.observer_count()
    }

    // ── Internal ──────────────────────────────────────────────

    /// Run a gate command only while no race holds the sensors.
    fn with_idle_gate(
        &self,
        f: impl FnOnce(&mut dyn GateActuator) -> core::result::Result<(), HardwareError>,
    ) -> Result<()> {
        self.sensors.lock(|s| {
            if s.borrow().is_none() {
                return Err(Error::RaceInProgress);
            }
            self.gate.lock(|g| {
                let mut gate = g.borrow_mut();
                f(&mut **gate).map_err(Error::from)
            })
        })
    }

    fn lease_sensors(&self, heat_id: &str) -> Result<SensorLease<'_>> {
        let sensors = self
            .sensors
            .lock(|s| s.borrow_mut().take())
            .ok_or(Error::RaceInProgress)?;
        self.current_heat
            .lock(|h| *h.borrow_mut() = Some(heat_id.to_owned()));
        Ok(SensorLease {
            owner: self,
            sensors: Some(sensors),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Race-scoped hardware handles
// ───────────────────────────────────────────────────────────────

/// Gate access that locks the slot per command, so status reads still
/// work while a race is suspended on a timer.
struct LockedGate<'a> {
    slot: &'a GateSlot,
}

impl GateActuator for LockedGate<'_> {
    fn set_position(&mut self, released: bool) -> core::result::Result<(), HardwareError> {
        self.slot.lock(|g| g.borrow_mut().set_position(released))
    }

    fn is_released(&self) -> bool {
        self.slot.lock(|g| g.borrow().is_released())
    }

    fn test_angle(&mut self, angle: u8) -> core::result::Result<(), HardwareError> {
        self.slot.lock(|g| g.borrow_mut().test_angle(angle))
    }
}

/// Exclusive use of the finish sensors for one heat.  Dropping it puts
/// the sensors back and clears the current heat id.
struct SensorLease<'a> {
    owner: &'a TrackController,
    sensors: Option<Box<dyn FinishSensors + Send>>,
}

impl SensorLease<'_> {
    fn sensors(
        &mut self,
    ) -> core::result::Result<&mut (dyn FinishSensors + Send + 'static), HardwareError> {
        self.sensors
            .as_deref_mut()
            .ok_or(HardwareError::Unavailable("finish sensors"))
    }
}

impl FinishSensors for SensorLease<'_> {
    fn arm(
        &mut self,
        occupied: &[Lane],
        start: std::time::Instant,
    ) -> core::result::Result<(), HardwareError> {
        self.sensors()?.arm(occupied, start)
    }

    fn poll_lane(&mut self, lane: Lane) -> core::result::Result<bool, HardwareError> {
        self.sensors()?.poll_lane(lane)
    }
}

impl Drop for SensorLease<'_> {
    fn drop(&mut self) {
        let sensors = self.sensors.take();
        self.owner.sensors.lock(|s| *s.borrow_mut() = sensors);
        self.owner.current_heat.lock(|h| *h.borrow_mut() = None);
    }
}

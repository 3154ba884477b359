//! Race engine: one heat from arming to final result.
//!
//! ```text
//!   ┌──────┐ prepare ┌───────┐  run   ┌─────────┐ lanes in / timeout / fault ┌──────────┐
//!   │ Idle │────────▶│ Armed │───────▶│ Running │───────────────────────────▶│ Complete │
//!   └──────┘         └───────┘        └─────────┘                            └──────────┘
//!                     ▲     │ prepare
//!                     └─────┘
//! ```
//!
//! `Complete` is terminal; the controller builds a fresh engine per heat.
//!
//! A race drops the gate, waits the settle delay, captures the start
//! instant, then polls every unfinished occupied lane in ascending lane
//! order until all have finished or the timeout elapses.  The only
//! suspension points are the settle delay and the poll interval.  The
//! gate goes back to HOLDING however the race ends (see [`guard`]).

pub mod guard;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::app::ports::{FinishSensors, GateActuator};
use crate::error::{Error, Result};
use crate::model::{HeatResult, HeatSetup, Lane};
use crate::results;
use guard::HoldGuard;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RaceState {
    Idle,
    Armed,
    Running,
    Complete,
}

impl RaceState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Armed => "Armed",
            Self::Running => "Running",
            Self::Complete => "Complete",
        }
    }
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Delays that shape a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceTiming {
    /// Servo travel time between release and the start instant.
    pub settle: Duration,
    /// Gap between sensor sweeps.
    pub poll_interval: Duration,
    /// Lanes still running after this are DNF.
    pub timeout: Duration,
}

impl Default for RaceTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            poll_interval: Duration::from_millis(1),
            timeout: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct RaceEngine {
    num_tracks: u8,
    timing: RaceTiming,
    state: RaceState,
    setup: Option<HeatSetup>,
}

/// What the polling loop observed before the gate was re-armed.
struct Sweep {
    started_at: DateTime<Utc>,
    finishes: BTreeMap<Lane, Duration>,
}

impl RaceEngine {
    pub fn new(num_tracks: u8, timing: RaceTiming) -> Self {
        Self {
            num_tracks,
            timing,
            state: RaceState::Idle,
            setup: None,
        }
    }

    pub fn state(&self) -> RaceState {
        self.state
    }

    pub fn setup(&self) -> Option<&HeatSetup> {
        self.setup.as_ref()
    }

    pub fn timing(&self) -> RaceTiming {
        self.timing
    }

    /// Validate `setup` and put the gate in HOLDING.
    ///
    /// Allowed from `Idle` and `Armed` (re-arming replaces the setup).
    /// Nothing touches the gate unless every lane is valid.
    pub fn prepare<G>(&mut self, setup: HeatSetup, gate: &mut G) -> Result<()>
    where
        G: GateActuator + ?Sized,
    {
        match self.state {
            RaceState::Idle | RaceState::Armed => {}
            RaceState::Running => return Err(Error::RaceInProgress),
            RaceState::Complete => return Err(Error::HeatFinished),
        }

        self.validate(&setup)?;
        gate.set_position(false)?;

        info!(
            "RACE | heat '{}' armed, lanes {:?}",
            setup.heat_id,
            setup.occupied_lanes.as_slice()
        );
        self.setup = Some(setup);
        self.transition(RaceState::Armed);
        Ok(())
    }

    /// Run the armed heat to completion.
    ///
    /// On a driver fault the gate is re-armed and the fault is returned;
    /// no partial result is produced.
    pub async fn run<G, S>(&mut self, gate: &mut G, sensors: &mut S) -> Result<HeatResult>
    where
        G: GateActuator + ?Sized,
        S: FinishSensors + ?Sized,
    {
        match self.state {
            RaceState::Armed => {}
            RaceState::Idle => return Err(Error::NotArmed),
            RaceState::Running => return Err(Error::RaceInProgress),
            RaceState::Complete => return Err(Error::HeatFinished),
        }
        let setup = self.setup.clone().ok_or(Error::NotArmed)?;

        self.transition(RaceState::Running);

        let mut guard = HoldGuard::new(gate);
        let sweep = self.sweep(guard.gate(), sensors, &setup).await;
        let held = guard.hold();

        self.transition(RaceState::Complete);

        let sweep = sweep?;
        held?;

        let lane_results =
            results::assemble(self.num_tracks, &setup.occupied_lanes, &sweep.finishes);
        let result = HeatResult {
            heat_id: setup.heat_id,
            started_at: sweep.started_at,
            finished_at: Some(Utc::now()),
            lane_results,
            is_complete: true,
        };
        info!(
            "RACE | heat '{}' complete: {} finished, {} DNF",
            result.heat_id,
            sweep.finishes.len(),
            result.lane_results.iter().filter(|r| r.is_dnf).count()
        );
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn validate(&self, setup: &HeatSetup) -> Result<()> {
        let mut seen = [false; u8::MAX as usize + 1];
        for &lane in &setup.occupied_lanes {
            if lane == 0 || lane > self.num_tracks {
                return Err(Error::InvalidLane {
                    lane,
                    num_tracks: self.num_tracks,
                });
            }
            if core::mem::replace(&mut seen[usize::from(lane)], true) {
                return Err(Error::DuplicateLane(lane));
            }
        }
        Ok(())
    }

    async fn sweep<G, S>(
        &self,
        gate: &mut G,
        sensors: &mut S,
        setup: &HeatSetup,
    ) -> Result<Sweep>
    where
        G: GateActuator + ?Sized,
        S: FinishSensors + ?Sized,
    {
        gate.set_position(true)?;
        async_io_mini::Timer::after(self.timing.settle).await;

        let started_at = Utc::now();
        let start = Instant::now();
        sensors.arm(&setup.occupied_lanes, start)?;

        let mut pending: Vec<Lane> = setup.occupied_lanes.to_vec();
        pending.sort_unstable();
        let mut finishes = BTreeMap::new();

        while !pending.is_empty() {
            if start.elapsed() >= self.timing.timeout {
                warn!(
                    "RACE | timeout after {:?}, lanes {:?} DNF",
                    self.timing.timeout, pending
                );
                break;
            }

            for &lane in &pending {
                if !sensors.poll_lane(lane)? {
                    continue;
                }
                let elapsed = start.elapsed();
                // A beam read at or past the deadline is not a finish.
                if elapsed >= self.timing.timeout {
                    continue;
                }
                info!("RACE | lane {} finished at {:?}", lane, elapsed);
                finishes.insert(lane, elapsed);
            }
            pending.retain(|lane| !finishes.contains_key(lane));

            if !pending.is_empty() {
                async_io_mini::Timer::after(self.timing.poll_interval).await;
            }
        }

        Ok(Sweep {
            started_at,
            finishes,
        })
    }

    fn transition(&mut self, next: RaceState) {
        info!(
            "RACE transition: {} -> {}",
            self.state.name(),
            next.name()
        );
        self.state = next;
    }
}

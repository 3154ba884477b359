//! Simulated finish line.
//!
//! When the engine arms the sensors at the start instant, every occupied
//! lane gets a finish delay from the [`FinishPlan`].  A lane reads as
//! triggered once that much time has passed since the start, so the race
//! engine polls it exactly as it would poll real beams.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::app::ports::FinishSensors;
use crate::error::HardwareError;
use crate::model::Lane;

/// Fastest simulated run.
pub const DEFAULT_MIN_FINISH: Duration = Duration::from_millis(2500);
/// Slowest simulated run.
pub const DEFAULT_MAX_FINISH: Duration = Duration::from_millis(4500);

/// How finish delays are chosen for each race.
#[derive(Debug, Clone, PartialEq)]
pub enum FinishPlan {
    /// Uniform random delay in `min..=max`, drawn per lane.
    Random { min: Duration, max: Duration },
    /// Fixed per-lane delays.  `None`, or a lane missing from the map,
    /// never finishes.
    Scripted(BTreeMap<Lane, Option<Duration>>),
}

impl Default for FinishPlan {
    fn default() -> Self {
        Self::Random {
            min: DEFAULT_MIN_FINISH,
            max: DEFAULT_MAX_FINISH,
        }
    }
}

impl FinishPlan {
    pub fn scripted(lanes: impl IntoIterator<Item = (Lane, Option<Duration>)>) -> Self {
        Self::Scripted(lanes.into_iter().collect())
    }
}

pub struct SimulatedSensors {
    plan: FinishPlan,
    rng: StdRng,
    start: Option<Instant>,
    finish_at: BTreeMap<Lane, Duration>,
}

impl SimulatedSensors {
    pub fn new(plan: FinishPlan) -> Self {
        Self::with_rng(plan, StdRng::from_entropy())
    }

    /// Reproducible random plan, for tests.
    pub fn seeded(plan: FinishPlan, seed: u64) -> Self {
        Self::with_rng(plan, StdRng::seed_from_u64(seed))
    }

    fn with_rng(plan: FinishPlan, rng: StdRng) -> Self {
        Self {
            plan,
            rng,
            start: None,
            finish_at: BTreeMap::new(),
        }
    }

    /// Delay drawn for `lane` in the current race.
    pub fn planned_finish(&self, lane: Lane) -> Option<Duration> {
        self.finish_at.get(&lane).copied()
    }

    fn draw(&mut self, lane: Lane) -> Option<Duration> {
        match &self.plan {
            FinishPlan::Random { min, max } => {
                let (lo, hi) = if min <= max { (*min, *max) } else { (*max, *min) };
                // Whole hundredths of a millisecond, matching reported precision.
                let lo = (lo.as_micros() / 10) as u64;
                let hi = (hi.as_micros() / 10) as u64;
                Some(Duration::from_micros(self.rng.gen_range(lo..=hi) * 10))
            }
            FinishPlan::Scripted(map) => map.get(&lane).copied().flatten(),
        }
    }
}

impl Default for SimulatedSensors {
    fn default() -> Self {
        Self::new(FinishPlan::default())
    }
}

impl FinishSensors for SimulatedSensors {
    fn arm(&mut self, occupied: &[Lane], start: Instant) -> Result<(), HardwareError> {
        self.finish_at.clear();
        for &lane in occupied {
            if let Some(delay) = self.draw(lane) {
                debug!("SENSOR | [sim] lane {} finishes after {:?}", lane, delay);
                self.finish_at.insert(lane, delay);
            }
        }
        self.start = Some(start);
        Ok(())
    }

    fn poll_lane(&mut self, lane: Lane) -> Result<bool, HardwareError> {
        let (Some(start), Some(delay)) = (self.start, self.finish_at.get(&lane)) else {
            return Ok(false);
        };
        Ok(start.elapsed() >= *delay)
    }
}

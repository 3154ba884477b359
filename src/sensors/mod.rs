//! Finish-line sensor drivers.
//!
//! Both implement [`FinishSensors`](crate::app::ports::FinishSensors):
//! [`beam::BeamSensors`] reads active-low GPIO inputs, and
//! [`simulated::SimulatedSensors`] fabricates finish times for bench runs
//! without a track attached.

pub mod beam;
pub mod simulated;

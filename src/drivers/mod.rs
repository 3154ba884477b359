//! Start gate actuator drivers.

pub mod servo;
pub mod sim_gate;

//! Application core: race orchestration with no direct I/O.
//!
//! The controller service, live-event fan-out, request and event types.
//! All interaction with hardware, disk and clients happens through
//! **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod broadcast;
pub mod commands;
pub mod events;
pub mod ports;
pub mod service;

//! Race-track controller library.
//!
//! Arms a start gate, times cars across a break-beam finish line, ranks
//! them, keeps a durable heat log and streams results to live observers.
//! Hardware sits behind port traits; the simulated drivers let the whole
//! stack run on a host with no track attached.

#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod app;
pub mod calibration;
pub mod config;
pub mod drivers;
pub mod error;
pub mod model;
pub mod race;
pub mod results;
pub mod sensors;

pub use app::service::TrackController;
pub use error::{Error, ErrorKind, HardwareError};

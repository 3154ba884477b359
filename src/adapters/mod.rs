//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                  |
//! |----------------|--------------------|------------------------------|
//! | `hardware`     | GateActuator       | servo driver or simulation   |
//! |                | FinishSensors      | beam inputs or simulation    |
//! | `history_file` | HistoryPort        | JSON file on local disk      |
//! | `log_sink`     | ResultObserver     | `log` output                 |
//! | `rpi`          | (constructor)      | Raspberry Pi PWM + GPIO      |

pub mod hardware;
pub mod history_file;
pub mod log_sink;
#[cfg(feature = "rpi")]
pub mod rpi;

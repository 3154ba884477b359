//! Request dispatch.
//!
//! One [`Request`] in, one [`Response`] or [`ApiError`] out.  Errors carry
//! a stable `kind` id and an HTTP-equivalent status code, so any
//! transport can render them without knowing the controller's internals.

use serde::{Deserialize, Serialize};

use crate::app::service::TrackController;
use crate::calibration::Calibration;
use crate::error::{Error, ErrorKind};
use crate::model::{ControllerStatus, HeatResult, HeatSetup};

pub use crate::app::commands::{Command as Request, DEFAULT_HISTORY_LIMIT};

/// Successful reply bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Status(ControllerStatus),
    Gate { is_gate_released: bool },
    Calibration(Calibration),
    ServoTest { angle: u8, message: String },
    History { heats: Vec<HeatResult>, count: usize },
    Heat(HeatResult),
}

/// Failure reply body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidRequest,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl core::fmt::Display for ApiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}

pub async fn dispatch(ctl: &TrackController, request: Request) -> Result<Response, ApiError> {
    let response = match request {
        Request::Status => Response::Status(ctl.status()),
        Request::GetGate => Response::Gate {
            is_gate_released: ctl.gate_released(),
        },
        Request::SetGate { released } => Response::Gate {
            is_gate_released: ctl.set_gate(released)?,
        },
        Request::GetCalibration => Response::Calibration(ctl.calibration()),
        Request::SetCalibration {
            holding_angle,
            released_angle,
        } => Response::Calibration(ctl.set_calibration(Calibration {
            holding_angle,
            released_angle,
        })?),
        Request::ServoTest { angle } => {
            let angle = ctl.servo_test(angle)?;
            Response::ServoTest {
                angle,
                message: format!("Servo moved to {angle}°"),
            }
        }
        Request::RunRace {
            heat_id,
            occupied_lanes,
        } => {
            let setup = HeatSetup {
                heat_id,
                occupied_lanes,
            };
            Response::Heat(ctl.run_heat(setup).await?)
        }
        Request::History { limit } => {
            let heats = ctl.history(limit.unwrap_or(DEFAULT_HISTORY_LIMIT));
            Response::History {
                count: heats.len(),
                heats,
            }
        }
        Request::HistoryById { heat_id } => Response::Heat(ctl.heat(&heat_id)?),
        Request::HistoryLast => Response::Heat(ctl.last_heat()?),
    };
    Ok(response)
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a serde_json::Value>,
    status: u16,
    body: &'a T,
}

fn envelope<T: Serialize>(id: Option<&serde_json::Value>, status: u16, body: &T) -> String {
    serde_json::to_string(&Envelope { id, status, body }).unwrap_or_default()
}

/// Parse one JSON request, run it, and render `{"status": .., "body": ..}`.
///
/// An `id` member on the request is echoed back unchanged so a client can
/// match replies to requests.  Lines that are not JSON get no `id`.
pub async fn handle_line(ctl: &TrackController, line: &str) -> String {
    let value = match serde_json::from_str::<serde_json::Value>(line) {
        Ok(value) => value,
        Err(e) => {
            let err = ApiError::invalid_request(e.to_string());
            return envelope(None, err.status_code(), &err);
        }
    };
    let id = value.get("id").cloned();
    let request = match serde_json::from_value::<Request>(value) {
        Ok(request) => request,
        Err(e) => {
            let err = ApiError::invalid_request(e.to_string());
            return envelope(id.as_ref(), err.status_code(), &err);
        }
    };
    match dispatch(ctl, request).await {
        Ok(response) => envelope(id.as_ref(), 200, &response),
        Err(err) => envelope(id.as_ref(), err.status_code(), &err),
    }
}

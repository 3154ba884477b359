//! Live result channel.
//!
//! Clients receive [`LiveEvent::RaceResult`] pushes from a
//! [`Subscription`](crate::app::broadcast::Subscription) and may send
//! small JSON messages of their own, answered here.

use serde::Deserialize;

use crate::app::events::LiveEvent;
use crate::app::service::TrackController;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping,
    GetStatus,
    #[serde(other)]
    Unknown,
}

/// Reply to one client message.  Unknown message types get no reply.
pub fn handle_client_message(ctl: &TrackController, text: &str) -> Option<LiveEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            return Some(LiveEvent::Error {
                message: "Invalid JSON".into(),
            });
        }
    };
    match ClientMessage::deserialize(value) {
        Ok(ClientMessage::Ping) => Some(LiveEvent::Pong),
        Ok(ClientMessage::GetStatus) => Some(LiveEvent::Status {
            data: ctl.status(),
        }),
        Ok(ClientMessage::Unknown) | Err(_) => None,
    }
}

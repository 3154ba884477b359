//! Log-based result observer.
//!
//! Writes every finished heat to the log, one line per heat plus one per
//! lane.  Registered by the binary so results show up on the console even
//! with no live client attached.

use log::info;

use crate::app::events::LiveEvent;
use crate::app::ports::{DeliveryError, ResultObserver};

/// Observer that logs every race result.
#[derive(Debug, Default)]
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl ResultObserver for LogObserver {
    fn deliver(&mut self, event: &LiveEvent) -> Result<(), DeliveryError> {
        let LiveEvent::RaceResult { data } = event else {
            return Ok(());
        };
        info!(
            "RESULT | heat='{}' started={} lanes={}",
            data.heat_id,
            data.started_at.to_rfc3339(),
            data.lane_results.len()
        );
        for lane in &data.lane_results {
            match (lane.finish_time_ms, lane.place) {
                (Some(ms), Some(place)) => {
                    info!("RESULT |   lane {}: {:.2}ms (#{})", lane.lane_number, ms, place)
                }
                _ if lane.is_dnf => info!("RESULT |   lane {}: DNF", lane.lane_number),
                _ => info!("RESULT |   lane {}: --", lane.lane_number),
            }
        }
        Ok(())
    }
}

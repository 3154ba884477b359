//! Result calculation: raw finish durations → places → per-lane results.
//!
//! Pure functions with no clock or hardware access, so ranking can be
//! tested deterministically independent of timing.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::model::{Lane, LaneResult};

/// Assign places `1..=k` by ascending duration.
///
/// Ties go to the lower lane number.  Lanes absent from `finishes` get no
/// place.
pub fn rank(finishes: &BTreeMap<Lane, Duration>) -> BTreeMap<Lane, u8> {
    // BTreeMap iterates in lane order and sort_by_key is stable, so equal
    // durations keep ascending lane order.
    let mut order: Vec<(Lane, Duration)> = finishes.iter().map(|(&l, &d)| (l, d)).collect();
    order.sort_by_key(|&(_, d)| d);

    order
        .into_iter()
        .enumerate()
        .map(|(i, (lane, _))| (lane, (i + 1) as u8))
        .collect()
}

/// Build one [`LaneResult`] per lane `1..=num_tracks`.
///
/// Occupied and finished lanes are timed, occupied lanes without a finish
/// are DNF, everything else is an empty placeholder.
pub fn assemble(
    num_tracks: u8,
    occupied: &[Lane],
    finishes: &BTreeMap<Lane, Duration>,
) -> Vec<LaneResult> {
    let occupied_finishes: BTreeMap<Lane, Duration> = finishes
        .iter()
        .filter(|(lane, _)| occupied.contains(lane))
        .map(|(&l, &d)| (l, d))
        .collect();
    let places = rank(&occupied_finishes);

    (1..=num_tracks)
        .map(|lane| {
            if !occupied.contains(&lane) {
                return LaneResult::unoccupied(lane);
            }
            match (occupied_finishes.get(&lane), places.get(&lane)) {
                (Some(&elapsed), Some(&place)) => LaneResult::timed(lane, elapsed, place),
                _ => LaneResult::dnf(lane),
            }
        })
        .collect()
}

//! Integration tests: TrackController → RaceEngine → gate/sensors → history → observers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_lite::future::{block_on, zip};
use trackctl::adapters::history_file::JsonHistoryStore;
use trackctl::app::events::LiveEvent;
use trackctl::app::ports::{FinishSensors, GateActuator, Hardware, HistoryPort};
use trackctl::calibration::CalibrationStore;
use trackctl::config::ControllerConfig;
use trackctl::error::{Error, ErrorKind, HardwareError};
use trackctl::model::{HardwareMode, HeatSetup};
use trackctl::race::{RaceEngine, RaceState, RaceTiming};
use trackctl::TrackController;

use super::mock_hw::{positions, release_instant, FailingHistory, RecordingGate, ScriptedSensors};

fn config(settle_ms: u32, timeout_ms: u32) -> ControllerConfig {
    ControllerConfig {
        mock_hardware: true,
        settle_ms,
        race_timeout_ms: timeout_ms,
        ..ControllerConfig::default()
    }
}

fn controller(
    cfg: &ControllerConfig,
    gate: impl GateActuator + Send + 'static,
    sensors: impl FinishSensors + Send + 'static,
    history: Box<dyn HistoryPort + Send>,
) -> TrackController {
    let hardware = Hardware {
        gate: Box::new(gate),
        sensors: Box::new(sensors),
        mode: HardwareMode::Simulated,
    };
    TrackController::new(cfg, Arc::new(CalibrationStore::default()), hardware, history)
}

fn temp_history() -> (tempfile::TempDir, Box<dyn HistoryPort + Send>) {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonHistoryStore::open(dir.path().join("heat_history.json")).unwrap();
    (dir, Box::new(store))
}

// ── End to end ────────────────────────────────────────────────

#[test]
fn heat_one_end_to_end() {
    let (gate, gate_log) = RecordingGate::new();
    let (sensors, _) = ScriptedSensors::new(&[(4, 50), (1, 120)]);
    let (_dir, history) = temp_history();
    let ctl = controller(&config(5, 300), gate, sensors, history);
    let sub = ctl.subscribe();

    let started = Instant::now();
    let result = block_on(ctl.run_heat(HeatSetup::new("heat-1", &[1, 2, 4]).unwrap())).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));

    assert_eq!(result.heat_id, "heat-1");
    assert!(result.is_complete);
    assert!(result.finished_at.is_some());
    assert_eq!(result.lane_results.len(), 4);

    let lane4 = result.lane(4).unwrap();
    assert_eq!(lane4.place, Some(1));
    let t4 = lane4.finish_time_ms.unwrap();
    assert!((50.0..150.0).contains(&t4), "lane 4 at {t4}ms");

    let lane1 = result.lane(1).unwrap();
    assert_eq!(lane1.place, Some(2));
    assert!(lane1.finish_time_ms.unwrap() >= 120.0);

    assert!(result.lane(2).unwrap().is_dnf);
    assert!(result.lane(3).unwrap().is_unoccupied());

    // Held for arming, released, held again.
    assert_eq!(positions(&gate_log), vec![false, true, false]);
    assert!(!ctl.gate_released());

    assert_eq!(ctl.last_heat().unwrap(), result);
    assert_eq!(ctl.history(10)[0], result);
    match sub.try_recv() {
        Some(LiveEvent::RaceResult { data }) => assert_eq!(data, result),
        other => panic!("expected race_result, got {other:?}"),
    }
}

#[test]
fn all_lanes_in_ends_before_timeout() {
    let (gate, _) = RecordingGate::new();
    let (sensors, _) = ScriptedSensors::new(&[(1, 10), (2, 20)]);
    let (_dir, history) = temp_history();
    let ctl = controller(&config(1, 5_000), gate, sensors, history);

    let started = Instant::now();
    let result = block_on(ctl.run_heat(HeatSetup::new("quick", &[1, 2]).unwrap())).unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(result.lane_results.iter().all(|r| !r.is_dnf));
}

// ── Timing ────────────────────────────────────────────────────

#[test]
fn start_instant_follows_settle_delay() {
    let (gate, gate_log) = RecordingGate::new();
    let (sensors, arms) = ScriptedSensors::new(&[(1, 0)]);
    let (_dir, history) = temp_history();
    let ctl = controller(&config(40, 500), gate, sensors, history);

    block_on(ctl.run_heat(HeatSetup::new("h", &[1]).unwrap())).unwrap();

    let released = release_instant(&gate_log).unwrap();
    let armed = arms.lock().unwrap()[0];
    assert!(armed.duration_since(released) >= Duration::from_millis(40));
}

#[test]
fn timeout_marks_unfinished_lanes_dnf() {
    let (gate, gate_log) = RecordingGate::new();
    let (sensors, _) = ScriptedSensors::new(&[(1, 10)]);
    let (_dir, history) = temp_history();
    let ctl = controller(&config(1, 60), gate, sensors, history);

    let started = Instant::now();
    let result = block_on(ctl.run_heat(HeatSetup::new("h", &[1, 2, 3]).unwrap())).unwrap();
    let took = started.elapsed();
    assert!(took >= Duration::from_millis(60));
    assert!(took < Duration::from_millis(300), "race ran {took:?}");

    assert_eq!(result.lane(1).unwrap().place, Some(1));
    assert!(result.lane(2).unwrap().is_dnf);
    assert!(result.lane(3).unwrap().is_dnf);
    assert_eq!(positions(&gate_log).last(), Some(&false));
}

#[test]
fn finish_after_deadline_is_dnf() {
    let (mut gate, gate_log) = RecordingGate::new();
    // Lane 1 trips after the 50ms deadline but before the poll that
    // would follow it at ~60ms.
    let (mut sensors, _) = ScriptedSensors::new(&[(1, 55), (2, 5)]);
    let timing = RaceTiming {
        settle: Duration::from_millis(1),
        poll_interval: Duration::from_millis(20),
        timeout: Duration::from_millis(50),
    };
    let mut engine = RaceEngine::new(4, timing);
    engine.prepare(HeatSetup::new("late", &[1, 2]).unwrap(), &mut gate).unwrap();

    let result = block_on(engine.run(&mut gate, &mut sensors)).unwrap();

    let lane1 = result.lane(1).unwrap();
    assert!(lane1.is_dnf, "{lane1:?}");
    assert_eq!(lane1.place, None);
    assert_eq!(lane1.finish_time_ms, None);
    assert_eq!(result.lane(2).unwrap().place, Some(1));
    assert!(result.lane(2).unwrap().finish_time_ms.unwrap() < 50.0);
    assert_eq!(positions(&gate_log).last(), Some(&false));
}

// ── Gate safety ───────────────────────────────────────────────

#[test]
fn sensor_fault_aborts_heat_and_holds_gate() {
    let (gate, gate_log) = RecordingGate::new();
    let (sensors, _) = ScriptedSensors::new(&[(1, 10)]);
    let (_dir, history) = temp_history();
    let ctl = controller(&config(1, 200), gate, sensors.with_fault(2), history);
    let sub = ctl.subscribe();

    let err = block_on(ctl.run_heat(HeatSetup::new("h", &[1, 2]).unwrap())).unwrap_err();
    assert_eq!(
        err,
        Error::HardwareFailure(HardwareError::GpioReadFailed { lane: 2 })
    );
    assert_eq!(err.kind(), ErrorKind::HardwareFailure);

    assert_eq!(positions(&gate_log), vec![false, true, false]);
    assert!(!ctl.gate_released());
    assert!(ctl.history(10).is_empty());
    assert!(sub.try_recv().is_none());
    assert_eq!(ctl.status().current_heat_id, None);
}

#[test]
fn release_fault_still_returns_gate_to_holding() {
    let (gate, gate_log) = RecordingGate::failing_release();
    let (sensors, _) = ScriptedSensors::new(&[(1, 10)]);
    let (_dir, history) = temp_history();
    let ctl = controller(&config(1, 200), gate, sensors, history);

    let err = block_on(ctl.run_heat(HeatSetup::new("h", &[1]).unwrap())).unwrap_err();
    assert_eq!(err, Error::HardwareFailure(HardwareError::PwmWriteFailed));
    assert_eq!(positions(&gate_log), vec![false, true, false]);
    assert!(!ctl.gate_released());
}

#[test]
fn invalid_lanes_never_touch_the_gate() {
    let (gate, gate_log) = RecordingGate::new();
    let (sensors, _) = ScriptedSensors::new(&[]);
    let (_dir, history) = temp_history();
    let ctl = controller(&config(1, 200), gate, sensors, history);

    let err = block_on(ctl.run_heat(HeatSetup::new("h", &[1, 5]).unwrap())).unwrap_err();
    assert_eq!(err, Error::InvalidLane { lane: 5, num_tracks: 4 });
    let err = block_on(ctl.run_heat(HeatSetup::new("h", &[2, 2]).unwrap())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidLane);
    assert!(positions(&gate_log).is_empty());
}

// ── Persistence and broadcast ordering ────────────────────────

#[test]
fn persist_failure_suppresses_broadcast() {
    let (gate, _) = RecordingGate::new();
    let (sensors, _) = ScriptedSensors::new(&[(1, 5)]);
    let ctl = controller(&config(1, 200), gate, sensors, Box::new(FailingHistory));
    let sub = ctl.subscribe();

    let err = block_on(ctl.run_heat(HeatSetup::new("h", &[1]).unwrap())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    assert!(sub.try_recv().is_none());
    assert!(!ctl.gate_released());
}

#[test]
fn broadcast_reaches_every_subscriber_and_skips_dropped_ones() {
    let (gate, _) = RecordingGate::new();
    let (sensors, _) = ScriptedSensors::new(&[(1, 5)]);
    let (_dir, history) = temp_history();
    let ctl = controller(&config(1, 200), gate, sensors, history);
    let a = ctl.subscribe();
    let b = ctl.subscribe();
    drop(ctl.subscribe());
    assert_eq!(ctl.observer_count(), 3);

    block_on(ctl.run_heat(HeatSetup::new("h", &[1]).unwrap())).unwrap();
    assert!(a.try_recv().is_some());
    assert!(b.try_recv().is_some());
    assert_eq!(ctl.observer_count(), 2);
}

// ── Concurrency ───────────────────────────────────────────────

#[test]
fn second_race_while_running_is_rejected() {
    let (gate, _) = RecordingGate::new();
    let (sensors, _) = ScriptedSensors::new(&[(1, 30)]);
    let (_dir, history) = temp_history();
    let ctl = controller(&config(10, 500), gate, sensors, history);

    let second = async {
        // Runs after the first heat has leased the sensors and parked on
        // its settle timer.
        let status = ctl.status();
        let rejected = ctl.run_heat(HeatSetup::new("h2", &[2]).unwrap()).await;
        let manual = ctl.set_gate(false);
        (status, rejected, manual)
    };
    let (first, (status, rejected, manual)) =
        block_on(zip(ctl.run_heat(HeatSetup::new("h1", &[1]).unwrap()), second));

    assert_eq!(first.unwrap().heat_id, "h1");
    assert_eq!(status.current_heat_id.as_deref(), Some("h1"));
    assert!(status.is_gate_released);
    assert_eq!(rejected.unwrap_err(), Error::RaceInProgress);
    assert_eq!(manual, Err(Error::RaceInProgress));

    assert_eq!(ctl.status().current_heat_id, None);
    assert_eq!(ctl.history(10).len(), 1);
}

// ── Engine lifecycle ──────────────────────────────────────────

#[test]
fn engine_is_single_use() {
    let (mut gate, _) = RecordingGate::new();
    let (mut sensors, _) = ScriptedSensors::new(&[(1, 0)]);
    let timing = RaceTiming {
        settle: Duration::from_millis(1),
        poll_interval: Duration::from_millis(1),
        timeout: Duration::from_millis(100),
    };
    let mut engine = RaceEngine::new(4, timing);

    assert_eq!(
        block_on(engine.run(&mut gate, &mut sensors)).unwrap_err(),
        Error::NotArmed
    );
    engine.prepare(HeatSetup::new("h", &[1]).unwrap(), &mut gate).unwrap();
    assert_eq!(engine.state(), RaceState::Armed);
    block_on(engine.run(&mut gate, &mut sensors)).unwrap();
    assert_eq!(engine.state(), RaceState::Complete);
    assert_eq!(
        engine.prepare(HeatSetup::new("h", &[1]).unwrap(), &mut gate),
        Err(Error::HeatFinished)
    );
}

//! Integration tests: JSON heat log durability.

use std::fs;
use std::time::Duration;

use chrono::Utc;
use trackctl::adapters::history_file::{tmp_path, JsonHistoryStore};
use trackctl::app::ports::HistoryPort;
use trackctl::error::ErrorKind;
use trackctl::model::{HeatResult, LaneResult};

fn heat(id: &str, lane1_ms: u64) -> HeatResult {
    HeatResult {
        heat_id: id.into(),
        started_at: Utc::now(),
        finished_at: Some(Utc::now()),
        lane_results: vec![
            LaneResult::timed(1, Duration::from_millis(lane1_ms), 1),
            LaneResult::dnf(2),
            LaneResult::unoccupied(3),
        ],
        is_complete: true,
    }
}

#[test]
fn interrupted_write_leaves_previous_log_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("heat_history.json");
    let first = heat("heat-1", 2500);
    {
        let mut store = JsonHistoryStore::open(&path).unwrap();
        store.save(&first).unwrap();
    }

    // A crash between writing the temp file and the rename.
    fs::write(tmp_path(&path), br#"[{"heat_id":"heat-2","start"#).unwrap();

    let store = JsonHistoryStore::open(&path).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.most_recent().unwrap(), first);
    assert!(store.recovered_backup().is_none());
    assert!(!tmp_path(&path).exists());
}

#[test]
fn resaving_same_heat_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("heat_history.json");
    let mut store = JsonHistoryStore::open(&path).unwrap();
    let h = heat("heat-1", 2500);

    store.save(&h).unwrap();
    let once = fs::read_to_string(&path).unwrap();
    store.save(&h).unwrap();
    let twice = fs::read_to_string(&path).unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(once, twice);
    assert_eq!(store.get_by_id("heat-1").unwrap(), h);
}

#[test]
fn resave_replaces_stale_result() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonHistoryStore::open(dir.path().join("h.json")).unwrap();
    store.save(&heat("heat-1", 2500)).unwrap();
    store.save(&heat("heat-2", 2600)).unwrap();
    store.save(&heat("heat-1", 3100)).unwrap();

    let heats = store.list_recent(10);
    assert_eq!(heats.len(), 2);
    assert_eq!(heats[0].heat_id, "heat-1");
    assert_eq!(heats[0].lane(1).unwrap().finish_time_ms, Some(3100.0));
    assert_eq!(heats[1].heat_id, "heat-2");
}

#[test]
fn failed_write_keeps_memory_and_disk_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("heat_history.json");
    let mut store = JsonHistoryStore::open(&path).unwrap();
    store.save(&heat("heat-1", 2500)).unwrap();
    let on_disk = fs::read_to_string(&path).unwrap();

    // A directory squatting on the temp path makes the next write fail.
    fs::create_dir(tmp_path(&path)).unwrap();
    let err = store.save(&heat("heat-2", 2600)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    assert_eq!(store.len(), 1);
    assert!(store.get_by_id("heat-2").is_none());
    assert_eq!(fs::read_to_string(&path).unwrap(), on_disk);
}

#[test]
fn corrupt_log_recovers_and_accepts_new_heats() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("heat_history.json");
    fs::write(&path, "{ definitely not a heat list").unwrap();

    let mut store = JsonHistoryStore::open(&path).unwrap();
    let backup = store.recovered_backup().unwrap().to_path_buf();
    assert!(backup.exists());

    store.save(&heat("heat-1", 2500)).unwrap();
    let reopened = JsonHistoryStore::open(&path).unwrap();
    assert_eq!(reopened.len(), 1);
    assert!(reopened.recovered_backup().is_none());
}

#[test]
fn file_format_is_a_most_recent_first_array() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("heat_history.json");
    let mut store = JsonHistoryStore::open(&path).unwrap();
    store.save(&heat("a", 2500)).unwrap();
    store.save(&heat("b", 2500)).unwrap();

    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let arr = v.as_array().unwrap();
    assert_eq!(arr[0]["heat_id"], "b");
    assert_eq!(arr[1]["heat_id"], "a");
    let lane = &arr[0]["lane_results"][0];
    assert_eq!(lane["lane_number"], 1);
    assert_eq!(lane["finish_time_ms"], 2500.0);
    assert_eq!(lane["place"], 1);
    assert_eq!(lane["is_dnf"], false);
    assert!(arr[0]["lane_results"][2]["finish_time_ms"].is_null());
}

//! trackctl: race-track controller entry point.
//!
//! Speaks JSON lines on stdin/stdout as a stand-in transport:
//!
//! ```text
//!   stdin ──▶ reader thread ──▶ INPUT channel ──▶ LocalExecutor
//!                                                  ├─ request task per line
//!                                                  │    {"op":...}   → {"id":..,"status":..,"body":..}
//!                                                  │    {"type":...} → live reply
//!                                                  └─ live task: race_result pushes
//! ```
//!
//! Configuration comes from the environment (see `ControllerConfig`).

use std::sync::Arc;

use anyhow::Result;
use edge_executor::{LocalExecutor, Task};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use trackctl::adapters::hardware::make_hardware;
use trackctl::adapters::history_file::JsonHistoryStore;
use trackctl::adapters::log_sink::LogObserver;
use trackctl::api::{dispatch, live};
use trackctl::app::broadcast::Subscription;
use trackctl::calibration::CalibrationStore;
use trackctl::config::ControllerConfig;
use trackctl::TrackController;

/// Lines read from stdin; `None` marks end of input.
static INPUT: Channel<CriticalSectionRawMutex, Option<String>, 4> = Channel::new();

const EXECUTOR_TASKS: usize = 16;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("trackctl v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Configuration ──────────────────────────────────────
    let config = ControllerConfig::from_env()?;

    // ── 2. Hardware, history, controller ──────────────────────
    let calibration = Arc::new(CalibrationStore::new(config.calibration));
    let hardware = make_hardware(&config, Arc::clone(&calibration));
    let history = JsonHistoryStore::open(&config.history_path)?;
    if let Some(backup) = history.recovered_backup() {
        warn!("History was unreadable, previous log kept at {}", backup.display());
    }
    let controller = TrackController::new(&config, calibration, hardware, Box::new(history));
    controller.register_observer(Box::new(LogObserver::new()));

    // ── 3. Stdin bridge ───────────────────────────────────────
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(read_stdin)?;

    // ── 4. Event loop ─────────────────────────────────────────
    let events = controller.subscribe();
    let executor: LocalExecutor<'_, EXECUTOR_TASKS> = LocalExecutor::new();
    executor.spawn(push_live(&events)).detach();

    futures_lite::future::block_on(executor.run(serve(&executor, &controller)));
    info!("stdin closed, shutting down");
    Ok(())
}

fn read_stdin() {
    for line in std::io::stdin().lines() {
        match line {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => futures_lite::future::block_on(INPUT.send(Some(line))),
            Err(e) => {
                warn!("stdin read failed: {}", e);
                break;
            }
        }
    }
    futures_lite::future::block_on(INPUT.send(None));
}

/// Hand every input line to its own task so a running heat does not block
/// status queries.  Returns once input ends and in-flight requests finish.
async fn serve<'a>(executor: &LocalExecutor<'a, EXECUTOR_TASKS>, ctl: &'a TrackController) {
    let mut in_flight: Vec<Task<()>> = Vec::new();
    while let Some(line) = INPUT.receive().await {
        in_flight.retain(|t| !t.is_finished());
        in_flight.push(executor.spawn(respond(ctl, line)));
    }
    for task in in_flight {
        task.await;
    }
}

async fn respond(ctl: &TrackController, line: String) {
    let is_live = serde_json::from_str::<serde_json::Value>(&line)
        .map(|v| v.get("type").is_some())
        .unwrap_or(false);

    if is_live {
        if let Some(reply) = live::handle_client_message(ctl, &line) {
            println!("{}", reply.to_json());
        }
    } else {
        println!("{}", dispatch::handle_line(ctl, &line).await);
    }
}

async fn push_live(events: &Subscription) {
    loop {
        let event = events.recv().await;
        println!("{}", event.to_json());
    }
}

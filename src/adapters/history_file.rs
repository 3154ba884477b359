//! JSON-file heat log.
//!
//! The whole log (most recent first, at most [`MAX_HISTORY`] heats) is
//! one pretty-printed JSON array.  Every save rewrites it through a
//! sibling `<file>.tmp`: write, `sync_all`, then rename over the real
//! file, so a crash leaves either the old or the new log on disk.
//!
//! A log that fails to parse at startup is moved aside to
//! `<file>.backup.<unix-seconds>` and the store starts empty.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::HistoryPort;
use crate::error::{Error, Result};
use crate::model::HeatResult;

/// Oldest heats beyond this are dropped on save.
pub const MAX_HISTORY: usize = 1000;

pub struct JsonHistoryStore {
    path: PathBuf,
    heats: Vec<HeatResult>,
    recovered_backup: Option<PathBuf>,
}

impl JsonHistoryStore {
    /// Load the log at `path`, creating parent directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let tmp = tmp_path(&path);
        match fs::remove_file(&tmp) {
            Ok(()) => warn!("HISTORY | removed interrupted write {}", tmp.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&tmp, e)),
        }

        let mut store = Self {
            path,
            heats: Vec::new(),
            recovered_backup: None,
        };
        store.load()?;
        info!(
            "HISTORY | {} heats loaded from {}",
            store.heats.len(),
            store.path.display()
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where a corrupted log was moved at startup, if that happened.
    pub fn recovered_backup(&self) -> Option<&Path> {
        self.recovered_backup.as_deref()
    }

    fn load(&mut self) -> Result<()> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_error(&self.path, e)),
        };
        if text.trim().is_empty() {
            return Ok(());
        }

        match serde_json::from_str::<Vec<HeatResult>>(&text) {
            Ok(mut heats) => {
                heats.truncate(MAX_HISTORY);
                self.heats = heats;
            }
            Err(e) => {
                let corruption = Error::PersistenceCorruption(e.to_string());
                let backup = self.move_aside()?;
                warn!(
                    "HISTORY | {}; moved to {}, starting empty",
                    corruption,
                    backup.display()
                );
                self.recovered_backup = Some(backup);
            }
        }
        Ok(())
    }

    fn move_aside(&self) -> Result<PathBuf> {
        let secs = chrono::Utc::now().timestamp();
        let base = append_suffix(&self.path, &format!(".backup.{secs}"));
        let mut backup = base.clone();
        let mut n = 1;
        while backup.exists() {
            backup = append_suffix(&base, &format!("-{n}"));
            n += 1;
        }
        fs::rename(&self.path, &backup).map_err(|e| io_error(&self.path, e))?;
        Ok(backup)
    }

    fn persist(&self, heats: &[HeatResult]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(heats)
            .map_err(|e| Error::Persistence(e.to_string()))?;

        let tmp = tmp_path(&self.path);
        {
            let mut f = File::create(&tmp).map_err(|e| io_error(&tmp, e))?;
            f.write_all(&bytes).map_err(|e| io_error(&tmp, e))?;
            f.sync_all().map_err(|e| io_error(&tmp, e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, e))
    }
}

impl HistoryPort for JsonHistoryStore {
    fn save(&mut self, result: &HeatResult) -> Result<()> {
        let mut next = Vec::with_capacity(self.heats.len() + 1);
        next.push(result.clone());
        next.extend(
            self.heats
                .iter()
                .filter(|h| h.heat_id != result.heat_id)
                .take(MAX_HISTORY - 1)
                .cloned(),
        );

        self.persist(&next)?;
        self.heats = next;
        info!("HISTORY | saved heat '{}' ({} total)", result.heat_id, self.heats.len());
        Ok(())
    }

    fn list_recent(&self, limit: usize) -> Vec<HeatResult> {
        self.heats.iter().take(limit).cloned().collect()
    }

    fn get_by_id(&self, heat_id: &str) -> Option<HeatResult> {
        self.heats.iter().find(|h| h.heat_id == heat_id).cloned()
    }

    fn most_recent(&self) -> Option<HeatResult> {
        self.heats.first().cloned()
    }

    fn len(&self) -> usize {
        self.heats.len()
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// `<path>.tmp`, next to the log so the rename stays on one filesystem.
pub fn tmp_path(path: &Path) -> PathBuf {
    append_suffix(path, ".tmp")
}

fn io_error(path: &Path, e: std::io::Error) -> Error {
    Error::Persistence(format!("{}: {e}", path.display()))
}

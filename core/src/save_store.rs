//! Autosave gate and the single on-disk save slot
//!
//! The gate decides when to ask the engine for a blob and replaces the save
//! file as a whole: write to a sibling `.tmp`, sync, then rename over the slot.
//! A reader never sees a partially written save.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::engine::{SimulationEngine, SnapshotOutcome};
use crate::time_source::{CalendarTime, Nanos, elapsed_between};

pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_UNCHANGED_RETRY: Duration = Duration::from_secs(1);
pub const DEFAULT_FAILURE_RETRY: Duration = Duration::from_secs(5);

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error reading or writing the save slot
#[derive(Debug, Error)]
pub enum PersistError {
    /// The save file exists but could not be read
    #[error("failed to read save {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    /// The save file was read but the engine rejected its contents
    #[error("save {} is corrupt: {source}", path.display())]
    Corrupt { path: PathBuf, source: BoxedError },

    /// Replacing the save file failed; the previous save is untouched
    #[error("failed to write save {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    /// The engine failed while producing a blob
    #[error("engine failed to produce a save: {0}")]
    Snapshot(BoxedError),
}

/// What a save attempt did
#[derive(Debug)]
pub enum SaveOutcome {
    /// The save interval has not elapsed (or a retry hold is active)
    NotDue,
    /// A blob was written and the save timer restarted
    Written { bytes: usize },
    /// The engine had nothing new to save
    Unchanged,
    /// The engine asked to be polled again later
    NotReady,
    /// Writing failed; the previous save file is intact
    WriteFailed(PersistError),
}

/// Autosave cadence and location
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceConfig {
    /// The one persisted slot
    pub save_path: PathBuf,
    /// Minimum real time between successful saves
    pub save_interval: Duration,
    /// Hold after the engine reports [`SnapshotOutcome::Unchanged`]
    pub unchanged_retry: Duration,
    /// Hold after [`SnapshotOutcome::NotReady`] or a failed write
    pub failure_retry: Duration,
}

impl PersistenceConfig {
    pub fn new(save_path: impl Into<PathBuf>) -> Self {
        Self {
            save_path: save_path.into(),
            save_interval: DEFAULT_SAVE_INTERVAL,
            unchanged_retry: DEFAULT_UNCHANGED_RETRY,
            failure_retry: DEFAULT_FAILURE_RETRY,
        }
    }
}

pub struct PersistenceGate {
    config: PersistenceConfig,
    last_save_at: Nanos,
    hold_until: Nanos,
    saves_written: u64,
}

impl PersistenceGate {
    /// Create a gate whose save timer starts at `now`.
    pub fn new(config: PersistenceConfig, now: Nanos) -> Self {
        Self {
            config,
            last_save_at: now,
            hold_until: 0,
            saves_written: 0,
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn save_path(&self) -> &Path {
        &self.config.save_path
    }

    /// Monotonic sample of the last successful write (or of timer start).
    pub fn last_save_at(&self) -> Nanos {
        self.last_save_at
    }

    pub fn saves_written(&self) -> u64 {
        self.saves_written
    }

    /// Restart the save timer and drop any retry hold.
    pub fn reset_timer(&mut self, now: Nanos) {
        self.last_save_at = now;
        self.hold_until = 0;
    }

    /// Whether a save attempt should be made at `now`.
    pub fn is_due(&self, now: Nanos) -> bool {
        elapsed_between(self.last_save_at, now) > self.config.save_interval
            && now >= self.hold_until
    }

    /// Save if the interval has elapsed since the last successful write.
    ///
    /// `at` is only sampled when the engine is actually asked for a blob.
    /// The save timer only advances when a blob reaches disk.
    pub fn maybe_save<E, F>(
        &mut self,
        now: Nanos,
        engine: &mut E,
        at: F,
    ) -> Result<SaveOutcome, PersistError>
    where
        E: SimulationEngine,
        F: FnOnce() -> CalendarTime,
    {
        if !self.is_due(now) {
            return Ok(SaveOutcome::NotDue);
        }
        self.save_now(now, engine, at)
    }

    /// Save regardless of the interval. Used on graceful shutdown.
    pub fn flush<E, F>(
        &mut self,
        now: Nanos,
        engine: &mut E,
        at: F,
    ) -> Result<SaveOutcome, PersistError>
    where
        E: SimulationEngine,
        F: FnOnce() -> CalendarTime,
    {
        self.save_now(now, engine, at)
    }

    fn save_now<E, F>(
        &mut self,
        now: Nanos,
        engine: &mut E,
        at: F,
    ) -> Result<SaveOutcome, PersistError>
    where
        E: SimulationEngine,
        F: FnOnce() -> CalendarTime,
    {
        let snapshot = engine
            .snapshot(at())
            .map_err(|e| PersistError::Snapshot(Box::new(e)))?;

        match snapshot {
            SnapshotOutcome::Blob(bytes) => match write_atomic(&self.config.save_path, &bytes) {
                Ok(()) => {
                    self.last_save_at = now;
                    self.hold_until = 0;
                    self.saves_written += 1;
                    Ok(SaveOutcome::Written { bytes: bytes.len() })
                }
                Err(source) => {
                    self.hold(now, self.config.failure_retry);
                    Ok(SaveOutcome::WriteFailed(PersistError::Write {
                        path: self.config.save_path.clone(),
                        source,
                    }))
                }
            },
            SnapshotOutcome::Unchanged => {
                self.hold(now, self.config.unchanged_retry);
                Ok(SaveOutcome::Unchanged)
            }
            SnapshotOutcome::NotReady => {
                self.hold(now, self.config.failure_retry);
                Ok(SaveOutcome::NotReady)
            }
        }
    }

    fn hold(&mut self, now: Nanos, wait: Duration) {
        let wait = u64::try_from(wait.as_nanos()).unwrap_or(u64::MAX);
        self.hold_until = now.saturating_add(wait);
    }

    /// Restore an engine from the save slot.
    ///
    /// Returns `Ok(None)` when no save exists (first run). A save that exists
    /// but cannot be read or decoded is an error; it is never overwritten
    /// here.
    pub fn load<E: SimulationEngine>(&self, at: CalendarTime) -> Result<Option<E>, PersistError> {
        let path = &self.config.save_path;
        remove_stale_tmp(path);

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistError::Read {
                    path: path.clone(),
                    source,
                });
            }
        };

        E::load(at, &bytes)
            .map(Some)
            .map_err(|e| PersistError::Corrupt {
                path: path.clone(),
                source: Box::new(e),
            })
    }
}

/// Sibling temporary path used while replacing `path`.
pub fn tmp_path(path: &Path) -> io::Result<PathBuf> {
    match path.file_name() {
        Some(name) => {
            let mut tmp_name = OsString::from(name);
            tmp_name.push(".tmp");
            Ok(path.with_file_name(tmp_name))
        }
        None => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "save path has no file name",
        )),
    }
}

/// Replace `path` with `bytes` so that readers see the old or the new
/// contents, never a mix.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = tmp_path(path)?;

    let written = (|| {
        let mut f = fs::File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    #[cfg(windows)]
    {
        if path.exists() {
            // Windows rename fails if destination exists.
            fs::remove_file(path)?;
        }
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

/// Delete a temporary file left behind by an interrupted write.
fn remove_stale_tmp(path: &Path) {
    let Ok(tmp) = tmp_path(path) else {
        return;
    };
    if tmp.exists() {
        tracing::warn!(
            "Removing unfinished save {} from an interrupted write",
            tmp.display()
        );
        if let Err(e) = fs::remove_file(&tmp) {
            tracing::warn!("Could not remove {}: {}", tmp.display(), e);
        }
    }
}

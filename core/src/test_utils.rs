//! Shared test utilities for integration and unit tests

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use chrono::{NaiveDate, TimeDelta};

use crate::bitmap::Bitmap;
use crate::engine::{DisplaySink, SimulationEngine, SnapshotOutcome};
use crate::input::{ButtonLevels, InputEvent, InputSource};
use crate::time_source::{CalendarTime, Nanos, TimeSource};

/// Calendar time `secs` seconds after 2024-01-01 00:00:00.
pub fn calendar(secs: i64) -> CalendarTime {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (base + TimeDelta::seconds(secs)).into()
}

// ============================================================================
// Recording Engine
// ============================================================================

const RECORDING_MAGIC: &[u8; 4] = b"REC1";

/// Decode failure of a [`RecordingEngine`] blob
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RecordingError(pub String);

/// What the next `snapshot` call should report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedSnapshot {
    Blob,
    Unchanged,
    NotReady,
    Fail,
}

/// Engine that records every call and saves its accumulated time and press
/// count.
#[derive(Debug)]
pub struct RecordingEngine {
    pub seeded_at: CalendarTime,
    pub loaded_at: Option<CalendarTime>,
    pub ticks: Vec<(Duration, ButtonLevels)>,
    pub snapshots: Vec<CalendarTime>,
    pub time_scales: Vec<f32>,
    elapsed: Duration,
    pressed_ticks: u32,
    script: VecDeque<ScriptedSnapshot>,
    frame: Bitmap,
}

impl RecordingEngine {
    /// Queue outcomes for upcoming snapshots; once drained, snapshots are blobs.
    pub fn script_snapshots(&mut self, outcomes: impl IntoIterator<Item = ScriptedSnapshot>) {
        self.script.extend(outcomes);
    }

    pub fn total_elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn pressed_ticks(&self) -> u32 {
        self.pressed_ticks
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        out.extend_from_slice(RECORDING_MAGIC);
        out.extend_from_slice(&(self.elapsed.as_nanos() as u64).to_le_bytes());
        out.extend_from_slice(&self.pressed_ticks.to_le_bytes());
        out
    }

    fn blank(at: CalendarTime) -> Self {
        Self {
            seeded_at: at,
            loaded_at: None,
            ticks: Vec::new(),
            snapshots: Vec::new(),
            time_scales: Vec::new(),
            elapsed: Duration::ZERO,
            pressed_ticks: 0,
            script: VecDeque::new(),
            frame: Bitmap::device(),
        }
    }
}

impl SimulationEngine for RecordingEngine {
    type Error = RecordingError;

    fn new(at: CalendarTime) -> Self {
        Self::blank(at)
    }

    fn load(at: CalendarTime, bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != 16 || &bytes[..4] != RECORDING_MAGIC {
            return Err(RecordingError(format!("bad blob of {} bytes", bytes.len())));
        }
        let mut nanos = [0u8; 8];
        nanos.copy_from_slice(&bytes[4..12]);
        let mut presses = [0u8; 4];
        presses.copy_from_slice(&bytes[12..16]);

        let mut engine = Self::blank(at);
        engine.loaded_at = Some(at);
        engine.elapsed = Duration::from_nanos(u64::from_le_bytes(nanos));
        engine.pressed_ticks = u32::from_le_bytes(presses);
        Ok(engine)
    }

    fn tick(&mut self, elapsed: Duration, buttons: ButtonLevels) {
        self.ticks.push((elapsed, buttons));
        self.elapsed += elapsed;
        if buttons.iter().any(|b| *b) {
            self.pressed_ticks += 1;
        }
    }

    fn render(&mut self) -> &Bitmap {
        // Row 0 carries elapsed milliseconds, row 1 the press count.
        self.frame.clear();
        let millis = self.elapsed.as_millis() as u64;
        for bit in 0..64 {
            self.frame.set(bit, 0, (millis >> bit) & 1 == 1);
        }
        for bit in 0..32 {
            self.frame.set(bit, 1, (self.pressed_ticks >> bit) & 1 == 1);
        }
        &self.frame
    }

    fn snapshot(&mut self, at: CalendarTime) -> Result<SnapshotOutcome, Self::Error> {
        self.snapshots.push(at);
        match self.script.pop_front().unwrap_or(ScriptedSnapshot::Blob) {
            ScriptedSnapshot::Blob => Ok(SnapshotOutcome::Blob(self.encode())),
            ScriptedSnapshot::Unchanged => Ok(SnapshotOutcome::Unchanged),
            ScriptedSnapshot::NotReady => Ok(SnapshotOutcome::NotReady),
            ScriptedSnapshot::Fail => Err(RecordingError("scripted snapshot failure".into())),
        }
    }

    fn set_time_scale(&mut self, scale: f32) {
        self.time_scales.push(scale);
    }
}

// ============================================================================
// Recording Display Sink
// ============================================================================

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub frames: Vec<Bitmap>,
    pub scales: Vec<u32>,
    pub shutdowns: u32,
    pub fail_present: bool,
}

impl DisplaySink for RecordingSink {
    fn present(&mut self, bitmap: &Bitmap) -> anyhow::Result<()> {
        if self.fail_present {
            anyhow::bail!("display went away");
        }
        self.frames.push(bitmap.clone());
        Ok(())
    }

    fn set_scale(&mut self, scale: u32) {
        self.scales.push(scale);
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.shutdowns += 1;
        Ok(())
    }
}

// ============================================================================
// Manual Time Source
// ============================================================================

#[derive(Debug)]
struct ManualClock {
    monotonic: Cell<Nanos>,
    calendar: Cell<CalendarTime>,
    calendar_samples: Cell<u32>,
}

/// Time source advanced by hand. Clones share the same clock.
#[derive(Debug, Clone)]
pub struct ManualTimeSource {
    clock: Rc<ManualClock>,
}

impl ManualTimeSource {
    pub fn new(at: CalendarTime) -> Self {
        Self {
            clock: Rc::new(ManualClock {
                monotonic: Cell::new(0),
                calendar: Cell::new(at),
                calendar_samples: Cell::new(0),
            }),
        }
    }

    /// Advance the monotonic clock.
    pub fn advance(&self, by: Duration) {
        let now = self.clock.monotonic.get();
        self.clock.monotonic.set(now + by.as_nanos() as Nanos);
    }

    /// Move the monotonic clock to an absolute sample, possibly backwards.
    pub fn set_monotonic(&self, nanos: Nanos) {
        self.clock.monotonic.set(nanos);
    }

    pub fn set_calendar(&self, at: CalendarTime) {
        self.clock.calendar.set(at);
    }

    pub fn calendar_samples(&self) -> u32 {
        self.clock.calendar_samples.get()
    }
}

impl TimeSource for ManualTimeSource {
    fn now_calendar(&self) -> CalendarTime {
        self.clock
            .calendar_samples
            .set(self.clock.calendar_samples.get() + 1);
        self.clock.calendar.get()
    }

    fn now_monotonic(&self) -> Nanos {
        self.clock.monotonic.get()
    }
}

// ============================================================================
// Scripted Input Source
// ============================================================================

/// Input source that hands out one queued batch per poll.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    pub(crate) batches: VecDeque<Vec<InputEvent>>,
    pub polls: u32,
    pub shutdowns: u32,
    pub fail_next: bool,
}

impl ScriptedInput {
    pub fn new(batches: impl IntoIterator<Item = Vec<InputEvent>>) -> Self {
        Self {
            batches: batches.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, batch: Vec<InputEvent>) {
        self.batches.push_back(batch);
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self, events: &mut Vec<InputEvent>) -> anyhow::Result<()> {
        self.polls += 1;
        if self.fail_next {
            self.fail_next = false;
            anyhow::bail!("input device lost");
        }
        if let Some(batch) = self.batches.pop_front() {
            events.extend(batch);
        }
        Ok(())
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.shutdowns += 1;
        Ok(())
    }
}


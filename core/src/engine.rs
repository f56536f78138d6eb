//! Engine and display contracts
//!
//! The simulation itself is opaque to the host. Each device front end supplies
//! a [`SimulationEngine`] and a [`DisplaySink`]; the [`HostLoop`](crate::HostLoop)
//! is generic over both, so tests can drive it with recording doubles.

use std::time::Duration;

use anyhow::Result;

use crate::bitmap::Bitmap;
use crate::input::ButtonLevels;
use crate::time_source::CalendarTime;

/// Result of asking an engine for a save blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Full engine state, including the calendar time it was taken at
    Blob(Vec<u8>),
    /// Nothing changed enough to warrant a write
    Unchanged,
    /// The engine cannot produce a consistent blob right now; ask again soon
    NotReady,
}

/// Trait for simulation engines driven by the host loop
///
/// The engine owns all device rules and its own save encoding. The host only
/// feeds it time and button levels, shows what it renders, and moves its
/// blobs to and from disk.
pub trait SimulationEngine: Sized {
    /// Decode or encode failure inside the engine
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fresh engine seeded with the current calendar time.
    fn new(at: CalendarTime) -> Self;

    /// Restore from a save blob.
    ///
    /// `at` is the calendar time sampled just before loading; the engine
    /// compares it against the timestamp inside the blob and fast-forwards.
    fn load(at: CalendarTime, bytes: &[u8]) -> std::result::Result<Self, Self::Error>;

    /// Advance by `elapsed` real time with the given button levels.
    ///
    /// `elapsed` is variable and occasionally large; there is no fixed
    /// timestep subdivision on the host side.
    fn tick(&mut self, elapsed: Duration, buttons: ButtonLevels);

    /// Draw the current frame.
    ///
    /// The returned bitmap is only valid until the next call into the engine.
    fn render(&mut self) -> &Bitmap;

    /// Produce a save blob stamped with `at`.
    fn snapshot(&mut self, at: CalendarTime) -> std::result::Result<SnapshotOutcome, Self::Error>;

    /// Change how fast simulated time runs relative to real time.
    ///
    /// Default implementation ignores the request.
    fn set_time_scale(&mut self, _scale: f32) {}
}

/// Trait for output surfaces that show engine frames
pub trait DisplaySink {
    /// Show one frame. The bitmap is borrowed for this call only.
    fn present(&mut self, bitmap: &Bitmap) -> Result<()>;

    /// Change the output multiplier (logical pixel to surface units).
    ///
    /// Default implementation ignores the request.
    fn set_scale(&mut self, _scale: u32) {}

    /// Release any display or OS resources. Called once when the host stops.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

//! PocketPet Core - Virtual device host loop
//!
//! This crate drives an opaque handheld-pet simulation: it feeds the engine
//! real elapsed time and button levels, shows each rendered frame, and keeps
//! one crash-safe save on disk.
//!
//! # Architecture
//!
//! - [`SimulationEngine`] - Trait implemented by each device simulation
//! - [`DisplaySink`] - Output surface for rendered frames
//! - [`InputSource`] - Non-blocking producer of button and quit events
//! - [`HostLoop`] - Poll, tick, render, present and autosave cycle
//! - [`PersistenceGate`] - Autosave cadence and whole-file save replacement

pub mod app;
pub mod bitmap;
pub mod engine;
pub mod input;
#[cfg(test)]
mod integration;
pub mod runtime;
pub mod save_store;
#[cfg(test)]
pub mod test_utils;
pub mod time_source;

// Re-export core traits and types
pub use bitmap::{Bitmap, BitmapSizeError, DEVICE_HEIGHT, DEVICE_WIDTH};
pub use engine::{DisplaySink, SimulationEngine, SnapshotOutcome};
pub use input::{Button, ButtonLevels, HostCommand, InputEvent, InputSource, InputState};
pub use runtime::{HostError, HostLoop, LoopState, RuntimeConfig};
pub use save_store::{PersistError, PersistenceConfig, PersistenceGate, SaveOutcome};
pub use time_source::{CalendarTime, Nanos, SystemTimeSource, TimeSource, elapsed_between};

// Re-export configuration types
pub use app::{Config, ConfigError};

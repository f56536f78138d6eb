//! Host loop orchestration
//!
//! Drives one engine through a poll, tick, render, present, autosave cycle.
//! Each pass ticks exactly once with the real monotonic delta since the
//! previous pass; there is no fixed timestep and no catch-up subdivision.

use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::engine::{DisplaySink, SimulationEngine};
use crate::input::{HostCommand, InputEvent, InputSource, InputState};
use crate::save_store::{PersistError, PersistenceGate, SaveOutcome};
use crate::time_source::{Nanos, TimeSource, elapsed_between};

mod config;


pub use config::{DEFAULT_SAVE_FILE, RuntimeConfig};

/// Slowest simulated-time multiplier reachable with host commands
pub const MIN_TIME_SCALE: f32 = 1.0;
/// Fastest simulated-time multiplier: one simulated hour per real second
pub const MAX_TIME_SCALE: f32 = 3600.0;
/// Largest display multiplier reachable with host commands
pub const MAX_DISPLAY_SCALE: u32 = 16;

/// Lifecycle of a [`HostLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Fatal host loop error
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("display failed: {0:#}")]
    Display(anyhow::Error),

    #[error("input failed: {0:#}")]
    Input(anyhow::Error),

    #[error("host loop is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: LoopState,
        actual: LoopState,
    },
}

impl HostError {
    /// Process exit status for this error.
    ///
    /// A save that exists but cannot be read exits with 3, everything else
    /// with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            HostError::Persist(PersistError::Read { .. } | PersistError::Corrupt { .. }) => 3,
            _ => 1,
        }
    }
}

/// Top-level driver for one simulation engine
///
/// Generic over the engine, the clocks and the display so the same loop runs
/// the terminal front end and the recording doubles in tests.
pub struct HostLoop<E, T, D>
where
    E: SimulationEngine,
    T: TimeSource,
    D: DisplaySink,
{
    config: RuntimeConfig,
    time: T,
    sink: D,
    engine: Option<E>,
    gate: PersistenceGate,
    input: InputState,
    events: Vec<InputEvent>,
    state: LoopState,
    stop_requested: bool,
    last_sample: Nanos,
    frames: u64,
    time_scale: f32,
    display_scale: u32,
}

impl<E, T, D> HostLoop<E, T, D>
where
    E: SimulationEngine,
    T: TimeSource,
    D: DisplaySink,
{
    /// Create a host loop in the `Starting` state. Nothing is loaded until
    /// [`start`](Self::start).
    pub fn new(config: RuntimeConfig, time: T, sink: D) -> Self {
        let now = time.now_monotonic();
        let gate = PersistenceGate::new(config.persistence.clone(), now);
        let time_scale = if config.time_scale.is_finite() {
            config.time_scale.clamp(MIN_TIME_SCALE, MAX_TIME_SCALE)
        } else {
            MIN_TIME_SCALE
        };
        let display_scale = config.display_scale.clamp(1, MAX_DISPLAY_SCALE);

        Self {
            config,
            time,
            sink,
            engine: None,
            gate,
            input: InputState::new(),
            events: Vec::new(),
            state: LoopState::Starting,
            stop_requested: false,
            last_sample: now,
            frames: 0,
            time_scale,
            display_scale,
        }
    }

    /// Load the saved engine (or seed a fresh one) and enter `Running`.
    ///
    /// A save that exists but cannot be read or decoded stops the loop and is
    /// returned as an error; the file is left as it was.
    pub fn start(&mut self) -> Result<(), HostError> {
        self.expect_state(LoopState::Starting)?;
        self.open().inspect_err(|_| self.abort())
    }

    /// Load or seed the engine. On error nothing has been released yet.
    fn open(&mut self) -> Result<(), HostError> {
        let at = self.time.now_calendar();
        let mut engine = match self.gate.load::<E>(at) {
            Ok(Some(engine)) => {
                tracing::info!(
                    "Loaded save from {} at {}",
                    self.gate.save_path().display(),
                    at
                );
                engine
            }
            Ok(None) => {
                tracing::info!(
                    "No save at {}, starting fresh at {}",
                    self.gate.save_path().display(),
                    at
                );
                E::new(at)
            }
            Err(e) => {
                tracing::error!("Cannot start: {}", e);
                return Err(e.into());
            }
        };

        engine.set_time_scale(self.time_scale);
        self.sink.set_scale(self.display_scale);
        self.engine = Some(engine);

        let now = self.time.now_monotonic();
        self.last_sample = now;
        self.gate.reset_timer(now);
        self.state = LoopState::Running;
        Ok(())
    }

    /// Ask the loop to stop gracefully at the top of the next pass.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Run one pass: poll input, tick, render, present, maybe autosave.
    ///
    /// Returns the state after the pass. Once `Stopped`, further calls do
    /// nothing.
    pub fn step<I: InputSource + ?Sized>(&mut self, input: &mut I) -> Result<LoopState, HostError> {
        match self.state {
            LoopState::Running => {}
            LoopState::Stopped => return Ok(LoopState::Stopped),
            actual => {
                return Err(HostError::InvalidState {
                    expected: LoopState::Running,
                    actual,
                });
            }
        }

        if self.stop_requested {
            self.stop(input)?;
            return Ok(self.state);
        }

        let mut events = std::mem::take(&mut self.events);
        events.clear();
        if let Err(e) = input.poll(&mut events) {
            self.events = events;
            tracing::error!("Input source failed: {:#}", e);
            release_input(input);
            self.abort();
            return Err(HostError::Input(e));
        }
        for event in events.drain(..) {
            match event {
                InputEvent::Quit => self.stop_requested = true,
                InputEvent::Command(command) => self.apply_command(command),
                edge => self.input.apply(edge),
            }
        }
        self.events = events;

        if self.stop_requested {
            self.stop(input)?;
            return Ok(self.state);
        }

        let now = self.time.now_monotonic();
        let elapsed = elapsed_between(self.last_sample, now);
        self.last_sample = now;

        let Some(engine) = self.engine.as_mut() else {
            return Err(HostError::InvalidState {
                expected: LoopState::Running,
                actual: self.state,
            });
        };

        engine.tick(elapsed, self.input.snapshot());

        if let Err(e) = self.sink.present(engine.render()) {
            tracing::error!("Display failed: {:#}", e);
            release_input(input);
            self.abort();
            return Err(HostError::Display(e));
        }

        let time = &self.time;
        match self.gate.maybe_save(now, engine, || time.now_calendar()) {
            Ok(outcome) => log_save_outcome(&outcome, "Autosave"),
            Err(e) => {
                tracing::error!("Engine failed to save: {}", e);
                release_input(input);
                self.abort();
                return Err(e.into());
            }
        }

        self.frames += 1;

        let pass = elapsed_between(now, self.time.now_monotonic());
        if pass > self.config.slow_frame_warning {
            tracing::warn!(
                "Frame took {:?}, exceeds warning threshold of {:?}",
                pass,
                self.config.slow_frame_warning
            );
        }

        Ok(self.state)
    }

    /// Start if needed, then step until stopped, pacing passes to
    /// `target_fps`.
    pub fn run<I: InputSource + ?Sized>(&mut self, input: &mut I) -> Result<(), HostError> {
        if self.state == LoopState::Starting
            && let Err(e) = self.open()
        {
            release_input(input);
            self.abort();
            return Err(e);
        }
        let budget = self.config.frame_budget();

        loop {
            let pass_start = self.time.now_monotonic();
            if self.step(input)? == LoopState::Stopped {
                return Ok(());
            }
            if let Some(budget) = budget {
                let spent = elapsed_between(pass_start, self.time.now_monotonic());
                if let Some(rest) = budget.checked_sub(spent)
                    && rest > Duration::ZERO
                {
                    thread::sleep(rest);
                }
            }
        }
    }

    /// Graceful stop: final save, then release the input and the display.
    fn stop<I: InputSource + ?Sized>(&mut self, input: &mut I) -> Result<(), HostError> {
        let mut result = Ok(());

        if let Some(engine) = self.engine.as_mut() {
            let now = self.time.now_monotonic();
            let time = &self.time;
            match self.gate.flush(now, engine, || time.now_calendar()) {
                Ok(outcome) => log_save_outcome(&outcome, "Final save"),
                Err(e) => {
                    tracing::error!("Engine failed to save on exit: {}", e);
                    result = Err(HostError::from(e));
                }
            }
        }

        self.state = LoopState::Stopping;
        release_input(input);
        if let Err(e) = self.sink.shutdown() {
            tracing::error!("Failed to release display: {:#}", e);
            if result.is_ok() {
                result = Err(HostError::Display(e));
            }
        }
        self.state = LoopState::Stopped;

        tracing::info!(
            "Stopped after {} frames, {} saves written",
            self.frames,
            self.gate.saves_written()
        );
        result
    }

    /// Fatal stop: release the display without saving. Callers holding the
    /// input source release it first.
    fn abort(&mut self) {
        self.state = LoopState::Stopping;
        if let Err(e) = self.sink.shutdown() {
            tracing::warn!("Failed to release display: {:#}", e);
        }
        self.state = LoopState::Stopped;
    }

    fn apply_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::TimeScaleUp => self.set_time_scale(self.time_scale + 1.0),
            HostCommand::TimeScaleDown => self.set_time_scale(self.time_scale - 1.0),
            HostCommand::ScaleUp => self.set_display_scale(self.display_scale.saturating_add(1)),
            HostCommand::ScaleDown => self.set_display_scale(self.display_scale.saturating_sub(1)),
        }
    }

    fn set_time_scale(&mut self, scale: f32) {
        let scale = scale.clamp(MIN_TIME_SCALE, MAX_TIME_SCALE);
        if scale == self.time_scale {
            return;
        }
        self.time_scale = scale;
        if let Some(engine) = self.engine.as_mut() {
            engine.set_time_scale(scale);
        }
        tracing::info!("Time scale: {}", scale);
    }

    fn set_display_scale(&mut self, scale: u32) {
        let scale = scale.clamp(1, MAX_DISPLAY_SCALE);
        if scale == self.display_scale {
            return;
        }
        self.display_scale = scale;
        self.sink.set_scale(scale);
        tracing::info!("Display scale: {}", scale);
    }

    fn expect_state(&self, expected: LoopState) -> Result<(), HostError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HostError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The running engine, once started.
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Current button levels.
    pub fn input_state(&self) -> InputState {
        self.input
    }

    /// Passes that ticked the engine.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn saves_written(&self) -> u64 {
        self.gate.saves_written()
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn display_scale(&self) -> u32 {
        self.display_scale
    }
}

fn release_input<I: InputSource + ?Sized>(input: &mut I) {
    if let Err(e) = input.shutdown() {
        tracing::warn!("Failed to release input: {:#}", e);
    }
}

fn log_save_outcome(outcome: &SaveOutcome, what: &str) {
    match outcome {
        SaveOutcome::NotDue => {}
        SaveOutcome::Written { bytes } => tracing::debug!("{}: wrote {} bytes", what, bytes),
        SaveOutcome::Unchanged => tracing::trace!("{}: nothing changed", what),
        SaveOutcome::NotReady => tracing::debug!("{}: engine not ready, retrying later", what),
        SaveOutcome::WriteFailed(e) => {
            tracing::warn!("{} failed, previous save kept: {}", what, e)
        }
    }
}

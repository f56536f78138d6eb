//! Button levels and input events
//!
//! The device has exactly three buttons. Input is level-triggered: each
//! iteration the host applies every edge seen since the last poll, then takes
//! one snapshot for the tick. A press and release that both land before the
//! snapshot read as released.

use anyhow::Result;

/// Logical device button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Left,
    Middle,
    Right,
}

impl Button {
    /// All buttons in snapshot order.
    pub const ALL: [Button; 3] = [Button::Left, Button::Middle, Button::Right];

    /// Position of this button in [`ButtonLevels`].
    pub fn index(&self) -> usize {
        match self {
            Button::Left => 0,
            Button::Middle => 1,
            Button::Right => 2,
        }
    }
}

/// Button levels in fixed (left, middle, right) order; `true` is held down.
pub type ButtonLevels = [bool; 3];

/// Host-level controls that never reach the engine as button presses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Run simulated time one step faster
    TimeScaleUp,
    /// Run simulated time one step slower (never below real time)
    TimeScaleDown,
    /// Increase the display output multiplier
    ScaleUp,
    /// Decrease the display output multiplier (never below 1)
    ScaleDown,
}

/// Discrete event from an input source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Press(Button),
    Release(Button),
    /// Quit command or escape-equivalent termination input
    Quit,
    Command(HostCommand),
}

/// Non-blocking producer of input events.
pub trait InputSource {
    /// Append every event that arrived since the previous poll to `events`.
    ///
    /// Must return promptly when nothing is pending.
    fn poll(&mut self, events: &mut Vec<InputEvent>) -> Result<()>;

    /// Release terminal or OS resources. Called once when the host stops,
    /// before the display is released.
    ///
    /// Default implementation does nothing.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Current level of the three buttons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    levels: ButtonLevels,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `button` as held. Pressing a held button changes nothing.
    pub fn on_press(&mut self, button: Button) {
        self.levels[button.index()] = true;
    }

    /// Mark `button` as released. Releasing a released button changes nothing.
    pub fn on_release(&mut self, button: Button) {
        self.levels[button.index()] = false;
    }

    /// Apply a button edge. Non-button events are ignored.
    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::Press(button) => self.on_press(button),
            InputEvent::Release(button) => self.on_release(button),
            InputEvent::Quit | InputEvent::Command(_) => {}
        }
    }

    /// Levels to pass into the next tick.
    pub fn snapshot(&self) -> ButtonLevels {
        self.levels
    }

    pub fn is_down(&self, button: Button) -> bool {
        self.levels[button.index()]
    }

    pub fn any_down(&self) -> bool {
        self.levels.iter().any(|down| *down)
    }
}

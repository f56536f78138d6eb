//! Keyboard input from the terminal
//!
//! Most terminals only report key presses. When the terminal supports the
//! keyboard enhancement protocol, real releases are requested and forwarded;
//! otherwise every button press gets a synthesized release at the next poll,
//! so it is seen by exactly one tick.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};

use pocketpet_core::app::KeyName;
use pocketpet_core::app::config::KeyConfig;
use pocketpet_core::{Button, ConfigError, HostCommand, InputEvent, InputSource};

/// What a bound key does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Button(Button),
    Quit,
    Command(HostCommand),
}

/// Map from terminal key codes to actions.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    map: HashMap<KeyCode, KeyAction>,
}

impl KeyBindings {
    pub fn from_config(keys: &KeyConfig) -> Result<Self, ConfigError> {
        let mut map = HashMap::new();
        for (field, name) in keys.parsed()? {
            let action = match field {
                "keys.left" => KeyAction::Button(Button::Left),
                "keys.middle" => KeyAction::Button(Button::Middle),
                "keys.right" => KeyAction::Button(Button::Right),
                "keys.quit" => KeyAction::Quit,
                "keys.time_faster" => KeyAction::Command(HostCommand::TimeScaleUp),
                "keys.time_slower" => KeyAction::Command(HostCommand::TimeScaleDown),
                "keys.zoom_in" => KeyAction::Command(HostCommand::ScaleUp),
                "keys.zoom_out" => KeyAction::Command(HostCommand::ScaleDown),
                _ => continue,
            };
            // First binding wins on conflicts; the config check warns about them.
            map.entry(key_code(name)).or_insert(action);
        }
        Ok(Self { map })
    }

    pub fn action(&self, code: KeyCode) -> Option<KeyAction> {
        let code = match code {
            KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
            other => other,
        };
        self.map.get(&code).copied()
    }
}

fn key_code(name: KeyName) -> KeyCode {
    match name {
        KeyName::Char(c) => KeyCode::Char(c),
        KeyName::Esc => KeyCode::Esc,
        KeyName::Enter => KeyCode::Enter,
        KeyName::Tab => KeyCode::Tab,
        KeyName::Backspace => KeyCode::Backspace,
        KeyName::Up => KeyCode::Up,
        KeyName::Down => KeyCode::Down,
        KeyName::Left => KeyCode::Left,
        KeyName::Right => KeyCode::Right,
        KeyName::F(n) => KeyCode::F(n),
    }
}

/// Turns key events into host input events.
#[derive(Debug)]
pub struct KeyTranslator {
    bindings: KeyBindings,
    synthesize_releases: bool,
    pending_releases: Vec<Button>,
}

impl KeyTranslator {
    pub fn new(bindings: KeyBindings, synthesize_releases: bool) -> Self {
        Self {
            bindings,
            synthesize_releases,
            pending_releases: Vec::new(),
        }
    }

    /// Release buttons pressed during the previous poll.
    pub fn release_pending(&mut self, out: &mut Vec<InputEvent>) {
        out.extend(self.pending_releases.drain(..).map(InputEvent::Release));
    }

    pub fn translate(&mut self, key: KeyEvent, out: &mut Vec<InputEvent>) {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c' | 'C'))
        {
            out.push(InputEvent::Quit);
            return;
        }

        let Some(action) = self.bindings.action(key.code) else {
            return;
        };

        match (action, key.kind) {
            (KeyAction::Button(button), KeyEventKind::Press) => {
                out.push(InputEvent::Press(button));
                if self.synthesize_releases && !self.pending_releases.contains(&button) {
                    self.pending_releases.push(button);
                }
            }
            (KeyAction::Button(button), KeyEventKind::Release) => {
                out.push(InputEvent::Release(button));
            }
            (KeyAction::Quit, KeyEventKind::Press) => out.push(InputEvent::Quit),
            (KeyAction::Command(command), KeyEventKind::Press) => {
                out.push(InputEvent::Command(command))
            }
            _ => {}
        }
    }
}

/// Non-blocking crossterm input source
pub struct TerminalInput {
    translator: KeyTranslator,
    enhanced: bool,
}

impl TerminalInput {
    /// Start reading keys. Call after the terminal is in raw mode.
    pub fn new(bindings: KeyBindings) -> Result<Self> {
        let enhanced = matches!(terminal::supports_keyboard_enhancement(), Ok(true));
        if enhanced {
            execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            tracing::info!("Terminal reports key releases");
        } else {
            tracing::info!("Terminal has no key release events, button presses are momentary");
        }

        Ok(Self {
            translator: KeyTranslator::new(bindings, !enhanced),
            enhanced,
        })
    }
}

impl InputSource for TerminalInput {
    fn poll(&mut self, events: &mut Vec<InputEvent>) -> Result<()> {
        self.translator.release_pending(events);
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                self.translator.translate(key, events);
            }
        }
        Ok(())
    }

    /// Pop the enhancement flags while the alternate screen is still active;
    /// its flag stack is separate from the main screen's.
    fn shutdown(&mut self) -> Result<()> {
        if self.enhanced {
            self.enhanced = false;
            execute!(io::stdout(), PopKeyboardEnhancementFlags)?;
        }
        Ok(())
    }
}

impl Drop for TerminalInput {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
    }
}

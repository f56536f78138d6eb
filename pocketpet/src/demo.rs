//! Reference pet engine
//!
//! A small clock toy that satisfies the engine contract: it keeps its own
//! simulated clock, counts button presses, and draws the time as bars. Saves
//! are bincode behind a short header.

use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pocketpet_core::{
    Bitmap, Button, ButtonLevels, CalendarTime, DEVICE_HEIGHT, DEVICE_WIDTH, SimulationEngine,
    SnapshotOutcome,
};

const SAVE_MAGIC: &[u8; 4] = b"PPET";
const SAVE_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2;

const PET_SIZE: u32 = 8;
/// 8x8 pet, one byte per row, MSB on the left.
const PET_SPRITE: [u8; 8] = [
    0b0100_0010,
    0b0111_1110,
    0b1101_1011,
    0b1111_1111,
    0b1011_1101,
    0b1100_0011,
    0b0111_1110,
    0b0010_0100,
];
/// Top of the pet; it bobs down one pixel on odd seconds.
const PET_Y: u32 = 44;

/// Demo engine save error
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("not a PocketPet save")]
    BadMagic,

    #[error("unsupported save version {0}")]
    UnsupportedVersion(u16),

    #[error("failed to decode save: {0}")]
    Decode(#[source] bincode::Error),

    #[error("failed to encode save: {0}")]
    Encode(#[source] bincode::Error),
}

/// Everything persisted in a save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DemoState {
    /// Simulated device clock
    clock: NaiveDateTime,
    /// Presses per button, indexed by `Button::index`
    presses: [u32; 3],
    /// Real calendar time when this state was saved
    saved_at: CalendarTime,
}

pub struct DemoEngine {
    state: DemoState,
    time_scale: f32,
    held: ButtonLevels,
    dirty: bool,
    last_saved_minute: Option<i64>,
    sprite: Bitmap,
    frame: Bitmap,
}

impl DemoEngine {
    fn from_state(state: DemoState) -> Self {
        Self {
            state,
            time_scale: 1.0,
            held: [false; 3],
            dirty: false,
            last_saved_minute: None,
            sprite: pet_sprite(),
            frame: Bitmap::new(DEVICE_WIDTH, DEVICE_HEIGHT),
        }
    }

    pub fn clock(&self) -> NaiveDateTime {
        self.state.clock
    }

    pub fn presses(&self, button: Button) -> u32 {
        self.state.presses[button.index()]
    }

    fn clock_minute(&self) -> i64 {
        self.state.clock.and_utc().timestamp().div_euclid(60)
    }

    /// Simulated time for `elapsed` real time at the current scale.
    fn scaled(&self, elapsed: Duration) -> Duration {
        if self.time_scale == 1.0 {
            return elapsed;
        }
        Duration::try_from_secs_f64(elapsed.as_secs_f64() * f64::from(self.time_scale))
            .unwrap_or(Duration::MAX)
    }

    fn advance(&mut self, by: TimeDelta) {
        if let Some(clock) = self.state.clock.checked_add_signed(by) {
            self.state.clock = clock;
        }
    }

    fn encode(&self) -> Result<Vec<u8>, DemoError> {
        let body = bincode::serialize(&self.state).map_err(DemoError::Encode)?;
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(SAVE_MAGIC);
        out.extend_from_slice(&SAVE_VERSION.to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn decode(bytes: &[u8]) -> Result<DemoState, DemoError> {
        if bytes.len() < HEADER_LEN || &bytes[..SAVE_MAGIC.len()] != SAVE_MAGIC {
            return Err(DemoError::BadMagic);
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != SAVE_VERSION {
            return Err(DemoError::UnsupportedVersion(version));
        }
        bincode::deserialize(&bytes[HEADER_LEN..]).map_err(DemoError::Decode)
    }
}

fn pet_sprite() -> Bitmap {
    Bitmap::from_packed(PET_SIZE, PET_SIZE, PET_SPRITE.to_vec()).unwrap_or_else(|e| {
        tracing::warn!("Bad pet sprite: {}", e);
        Bitmap::new(PET_SIZE, PET_SIZE)
    })
}

/// Outline of a rectangle, clipped to the bitmap.
fn draw_outline(bmp: &mut Bitmap, x: u32, y: u32, width: u32, height: u32) {
    if width == 0 || height == 0 {
        return;
    }
    bmp.fill_rect(x, y, width, 1, true);
    bmp.fill_rect(x, y + height - 1, width, 1, true);
    bmp.fill_rect(x, y, 1, height, true);
    bmp.fill_rect(x + width - 1, y, 1, height, true);
}

impl SimulationEngine for DemoEngine {
    type Error = DemoError;

    fn new(at: CalendarTime) -> Self {
        Self::from_state(DemoState {
            clock: at.to_naive(),
            presses: [0; 3],
            saved_at: at,
        })
    }

    fn load(at: CalendarTime, bytes: &[u8]) -> Result<Self, Self::Error> {
        let state = Self::decode(bytes)?;
        let gap = at.seconds_since(&state.saved_at);
        let mut engine = Self::from_state(state);
        engine.last_saved_minute = Some(engine.clock_minute());

        if gap > 0 {
            tracing::info!("Fast-forwarding {}s since last save", gap);
            engine.advance(TimeDelta::seconds(gap));
        } else if gap < 0 {
            tracing::warn!("Clock is {}s behind the last save, not rewinding", -gap);
        }
        Ok(engine)
    }

    fn tick(&mut self, elapsed: Duration, buttons: ButtonLevels) {
        let scaled = self.scaled(elapsed);
        self.advance(TimeDelta::from_std(scaled).unwrap_or(TimeDelta::zero()));

        for button in Button::ALL {
            let i = button.index();
            if buttons[i] && !self.held[i] {
                self.state.presses[i] = self.state.presses[i].saturating_add(1);
                self.dirty = true;
            }
        }
        self.held = buttons;
    }

    fn render(&mut self) -> &Bitmap {
        let width = self.frame.width();
        let height = self.frame.height();
        let clock = self.state.clock;
        let bmp = &mut self.frame;

        bmp.clear();
        draw_outline(bmp, 0, 0, width, height);

        // Hour, minute and second bars, one pixel per unit.
        bmp.fill_rect(2, 8, clock.hour() * 2, 4, true);
        bmp.fill_rect(2, 16, clock.minute(), 4, true);
        bmp.fill_rect(2, 24, clock.second(), 4, true);

        bmp.blit(&self.sprite, (width - PET_SIZE) / 2, PET_Y + clock.second() % 2);

        // One indicator per button: filled while held, with its press count
        // (mod 64) as a bar underneath.
        for button in Button::ALL {
            let i = button.index();
            let x = 4 + i as u32 * 20;
            let y = height - 24;
            if self.held[i] {
                bmp.fill_rect(x, y, 16, 12, true);
            } else {
                draw_outline(bmp, x, y, 16, 12);
            }
            let count = self.state.presses[i] % 64;
            bmp.fill_rect(x, y + 14, count.min(16), 2, true);
        }

        &self.frame
    }

    fn snapshot(&mut self, at: CalendarTime) -> Result<SnapshotOutcome, Self::Error> {
        let minute = self.clock_minute();
        if !self.dirty && self.last_saved_minute == Some(minute) {
            return Ok(SnapshotOutcome::Unchanged);
        }

        self.state.saved_at = at;
        let blob = self.encode()?;
        self.dirty = false;
        self.last_saved_minute = Some(minute);
        Ok(SnapshotOutcome::Blob(blob))
    }

    fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = if scale.is_finite() { scale.max(0.0) } else { 1.0 };
    }
}

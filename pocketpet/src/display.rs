//! Terminal display using ratatui
//!
//! Each terminal cell shows two vertically stacked device pixels with the
//! upper and lower half-block characters.

use anyhow::Result;
use ratatui::{
    DefaultTerminal,
    prelude::*,
    widgets::Paragraph,
};

use pocketpet_core::{Bitmap, DisplaySink};

const HELP: &str = "[Q/W/E] Buttons  [=/-] Speed  [P/O] Zoom  [Esc] Quit";

/// Render `bitmap` as half-block text, each pixel repeated `scale` times in
/// both directions.
pub fn bitmap_lines(bitmap: &Bitmap, scale: u32) -> Vec<String> {
    let scale = scale.max(1);
    let rows = bitmap.height() * scale;
    let cols = bitmap.width() * scale;
    let stride = bitmap.stride();
    let packed = bitmap.as_packed();
    let pixel = |x: u32, y: u32| {
        if y >= rows {
            return false;
        }
        let (px, py) = (x / scale, y / scale);
        packed[py as usize * stride + (px / 8) as usize] & (0x80 >> (px % 8)) != 0
    };

    (0..rows.div_ceil(2))
        .map(|cell_row| {
            let top = cell_row * 2;
            (0..cols)
                .map(|x| match (pixel(x, top), pixel(x, top + 1)) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                })
                .collect::<String>()
        })
        .collect()
}

/// Text for the status line under the device screen.
pub fn status_line(scale: u32) -> String {
    format!("PocketPet  x{}  {}", scale, HELP)
}

/// Terminal display sink
pub struct TerminalDisplay {
    terminal: DefaultTerminal,
    scale: u32,
    restored: bool,
}

impl TerminalDisplay {
    /// Enter the alternate screen and raw mode.
    pub fn new(scale: u32) -> Result<Self> {
        let terminal = ratatui::try_init()?;
        Ok(Self {
            terminal,
            scale: scale.max(1),
            restored: false,
        })
    }

    fn restore(&mut self) -> Result<()> {
        if !self.restored {
            self.restored = true;
            ratatui::try_restore()?;
        }
        Ok(())
    }
}

impl DisplaySink for TerminalDisplay {
    fn present(&mut self, bitmap: &Bitmap) -> Result<()> {
        let lines: Vec<Line> = bitmap_lines(bitmap, self.scale)
            .into_iter()
            .map(Line::from)
            .collect();
        let status = status_line(self.scale);

        self.terminal.draw(|frame| {
            let layout =
                Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(frame.area());

            let screen = Paragraph::new(lines)
                .style(Style::default().fg(Color::White).bg(Color::Black));
            frame.render_widget(screen, layout[0]);

            let help = Paragraph::new(status).style(Style::default().dim());
            frame.render_widget(help, layout[1]);
        })?;

        Ok(())
    }

    fn set_scale(&mut self, scale: u32) {
        self.scale = scale.max(1);
        // Old, larger frames would otherwise linger around the new one.
        if let Err(e) = self.terminal.clear() {
            tracing::warn!("Failed to clear terminal: {}", e);
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        self.restore()
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!("Failed to restore terminal: {:#}", e);
        }
    }
}

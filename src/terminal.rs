//! Terminal surface used by the playback scheduler.
//!
//! The scheduler never touches ambient terminal globals; it draws through an
//! explicit [`Surface`] value, which also makes the loop testable with a
//! recording fake.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{execute, queue};

/// Control keys the player reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Space: pause/resume.
    Toggle,
    /// Esc (or Ctrl-C): stop playback.
    Cancel,
}

/// Minimal terminal contract: cursor positioning, text output visible before
/// the next frame write, and non-blocking key polling.
pub trait Surface {
    fn clear(&mut self) -> Result<()>;
    fn set_cursor(&mut self, col: u16, row: u16) -> Result<()>;
    fn write(&mut self, text: &str) -> Result<()>;
    /// Check for a pending control key without waiting. Absence of input is
    /// not an error.
    fn poll_key(&mut self) -> Result<Option<Key>>;
}

/// Crossterm-backed surface. Raw mode is enabled and the cursor hidden for
/// the lifetime of the value; both are restored on drop, whichever way
/// playback ends.
pub struct TerminalSurface {
    out: Stdout,
}

impl TerminalSurface {
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode().context("enabling raw mode")?;
        let mut out = io::stdout();
        execute!(out, Hide).context("hiding cursor")?;
        Ok(Self { out })
    }

    /// Current terminal grid as (columns, rows).
    pub fn grid_size() -> Result<(u16, u16)> {
        terminal::size().context("querying terminal size")
    }
}

impl Surface for TerminalSurface {
    fn clear(&mut self) -> Result<()> {
        execute!(self.out, Clear(ClearType::All), MoveTo(0, 0)).context("clearing terminal")
    }

    fn set_cursor(&mut self, col: u16, row: u16) -> Result<()> {
        queue!(self.out, MoveTo(col, row)).context("moving cursor")
    }

    fn write(&mut self, text: &str) -> Result<()> {
        // Raw mode does not translate \n, so rows carry an explicit return.
        for line in text.lines() {
            queue!(self.out, Print(line), Print("\r\n")).context("queueing frame row")?;
        }
        self.out.flush().context("flushing frame")
    }

    fn poll_key(&mut self) -> Result<Option<Key>> {
        while event::poll(Duration::ZERO).context("polling input")? {
            if let Event::Key(key) = event::read().context("reading input")? {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                match key.code {
                    KeyCode::Char(' ') => return Ok(Some(Key::Toggle)),
                    KeyCode::Esc => return Ok(Some(Key::Cancel)),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(Some(Key::Cancel));
                    }
                    _ => {}
                }
            }
        }
        Ok(None)
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show);
        let _ = terminal::disable_raw_mode();
    }
}

use std::io::{self, Write};

use anyhow::Result;
use crossterm::{
    cursor,
    event::{Event, KeyCode, KeyEvent, KeyModifiers},
    style::Print,
    terminal::{Clear, ClearType},
};
use thiefbook_core::Command;
use unicode_width::UnicodeWidthChar;

/// Writes page text into the terminal.
pub struct TextPane<W: Write> {
    writer: W,
}

pub struct DrawParams {
    pub columns: u16,
    pub rows: u16,
}

impl DrawParams {
    pub fn clamped(columns: u16, rows: u16) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }
}

impl<W: Write> TextPane<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Clears the screen and prints `text`, wrapping long lines and dropping
    /// whatever does not fit in `params.rows`.
    pub fn draw(&mut self, text: &str, params: DrawParams) -> Result<()> {
        crossterm::queue!(self.writer, Clear(ClearType::All))?;
        let rows = wrap_text(text, usize::from(params.columns));
        for (row, line) in rows.iter().take(usize::from(params.rows)).enumerate() {
            crossterm::queue!(self.writer, cursor::MoveTo(0, row as u16), Print(line))?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// Disables synchronized updates.
    /// The terminal will render all buffered changes at once.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Wipes the page and leaves the cursor at the top left, ready for the
    /// shell prompt once the reader exits.
    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::queue!(self.writer, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Splits `text` into screen rows no wider than `columns` terminal cells.
/// Wide glyphs count as two cells and are never split across rows.
pub fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut rows = Vec::new();
    for line in text.split('\n') {
        let mut row = String::new();
        let mut width = 0;
        for ch in line.chars() {
            let ch_width = ch.width().unwrap_or(0);
            if width + ch_width > columns && !row.is_empty() {
                rows.push(std::mem::take(&mut row));
                width = 0;
            }
            row.push(ch);
            width += ch_width;
        }
        rows.push(row);
    }
    rows
}


#[derive(Debug, Clone)]
pub enum UiEvent {
    Command(Command),
    BeginJump,
    JumpInputChanged { input: String },
    JumpCancel,
    Refresh,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Jump,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
    jump_buffer: String,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.jump_buffer.clear();
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match self.mode {
            InputMode::Normal => self.map_event_normal(event),
            InputMode::Jump => self.map_event_jump(event),
        }
    }

    fn map_event_normal(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                    if let Some(digit) = c.to_digit(10) {
                        self.push_digit(digit as usize);
                    }
                    UiEvent::None
                }
                (KeyCode::Right, modifiers) if modifiers.contains(KeyModifiers::ALT) => {
                    self.reset_count();
                    UiEvent::Command(Command::NextPage)
                }
                (KeyCode::Left, modifiers) if modifiers.contains(KeyModifiers::ALT) => {
                    self.reset_count();
                    UiEvent::Command(Command::PrevPage)
                }
                (KeyCode::Char('j'), KeyModifiers::NONE)
                | (KeyCode::Char(' '), KeyModifiers::NONE)
                | (KeyCode::Down, KeyModifiers::NONE)
                | (KeyCode::Right, KeyModifiers::NONE)
                | (KeyCode::PageDown, _) => {
                    self.reset_count();
                    UiEvent::Command(Command::NextPage)
                }
                (KeyCode::Char('k'), KeyModifiers::NONE)
                | (KeyCode::Up, KeyModifiers::NONE)
                | (KeyCode::Left, KeyModifiers::NONE)
                | (KeyCode::PageUp, _) => {
                    self.reset_count();
                    UiEvent::Command(Command::PrevPage)
                }
                (KeyCode::Char('g'), KeyModifiers::NONE) => {
                    let page = self.take_count();
                    UiEvent::Command(Command::GotoPage { page })
                }
                (KeyCode::Enter, _) if self.pending_count.is_some() => {
                    let page = self.take_count();
                    UiEvent::Command(Command::GotoPage { page })
                }
                (KeyCode::Char('G'), KeyModifiers::SHIFT) | (KeyCode::End, _) => {
                    self.reset_count();
                    UiEvent::Command(Command::GotoPage { page: usize::MAX })
                }
                (KeyCode::Home, _) => {
                    self.reset_count();
                    UiEvent::Command(Command::GotoPage { page: 1 })
                }
                (KeyCode::Char(':'), _) => {
                    self.set_mode(InputMode::Jump);
                    UiEvent::BeginJump
                }
                (KeyCode::Char('r'), KeyModifiers::NONE) => {
                    self.reset_count();
                    UiEvent::Refresh
                }
                (KeyCode::Char('q'), _) => {
                    self.reset_count();
                    UiEvent::Quit
                }
                _ => {
                    self.reset_count();
                    UiEvent::None
                }
            },
            _ => UiEvent::None,
        }
    }

    fn map_event_jump(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Esc, _) => {
                    self.set_mode(InputMode::Normal);
                    UiEvent::JumpCancel
                }
                (KeyCode::Enter, _) => {
                    let input = self.jump_buffer.clone();
                    self.set_mode(InputMode::Normal);
                    UiEvent::Command(Command::JumpInput { input })
                }
                (KeyCode::Backspace, _) => {
                    self.jump_buffer.pop();
                    UiEvent::JumpInputChanged {
                        input: self.jump_buffer.clone(),
                    }
                }
                (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                    self.jump_buffer.push(c);
                    UiEvent::JumpInputChanged {
                        input: self.jump_buffer.clone(),
                    }
                }
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self.pending_count.take().unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    pub fn pending_input(&self) -> Option<String> {
        if matches!(self.mode, InputMode::Jump) {
            return Some(format!(":{}", self.jump_buffer));
        }
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}

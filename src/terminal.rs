use crate::paginate::Layout;
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::queue;
use std::io::{self, Write};

pub const HIDE: &str = "\x1b[?25l";
pub const SHOW: &str = "\x1b[?25h";
pub const RESET: &str = "\x1b[0m";
pub const RED: &str = "\x1b[1;31m";
pub const CYAN: &str = "\x1b[1;36m";
pub const GREEN: &str = "\x1b[1;32m";
pub const MAGENTA: &str = "\x1b[1;35m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Up,
    Down,
    PageUp,
    PageDown,
    /// Ctrl-C
    Interrupt,
    Other,
}

/// What the reader needs from a terminal.
pub trait Console {
    fn layout(&self) -> io::Result<Layout>;

    /// Blocks until a single key is pressed.
    fn read_key(&mut self) -> io::Result<Key>;

    /// Shows `prompt` and reads one line with echo and editing enabled.
    /// Returns `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Clears the screen and shows `text` from the top-left corner.
    fn draw(&mut self, text: &str) -> io::Result<()>;

    /// Shows `text` below whatever is already on screen.
    fn print(&mut self, text: &str) -> io::Result<()>;
}

/// Puts the terminal into raw mode and hides the cursor until dropped.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let guard = RawMode;
        write_flush(HIDE)?;
        Ok(guard)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = write_flush(SHOW);
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("failed to restore terminal mode: {}", e);
        }
    }
}

/// Leaves raw mode for line input; re-enters it when dropped.
struct Cooked;

impl Cooked {
    fn enter() -> io::Result<Self> {
        terminal::disable_raw_mode()?;
        let guard = Cooked;
        write_flush(SHOW)?;
        Ok(guard)
    }
}

impl Drop for Cooked {
    fn drop(&mut self) {
        if let Err(e) = terminal::enable_raw_mode() {
            log::warn!("failed to re-enter raw mode: {}", e);
        }
        let _ = write_flush(HIDE);
    }
}

fn write_flush(text: &str) -> io::Result<()> {
    let mut out = io::stdout();
    out.write_all(text.as_bytes())?;
    out.flush()
}

/// Size of the controlling terminal.
pub fn current_layout() -> io::Result<Layout> {
    let (cols, rows) = terminal::size()?;
    Ok(Layout::new(rows, cols))
}

/// The real terminal, in raw mode for as long as this value lives. Line
/// prompts swap in a cooked-mode guard that re-enters raw mode on drop.
pub struct Terminal {
    out: io::Stdout,
    _raw: RawMode,
}

impl Terminal {
    pub fn open() -> io::Result<Self> {
        let raw = RawMode::enable()?;
        Ok(Self {
            out: io::stdout(),
            _raw: raw,
        })
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        // Raw mode turns off output post-processing, so `\n` alone would not
        // return the cursor to the first column.
        self.out.write_all(text.replace('\n', "\r\n").as_bytes())?;
        self.out.flush()
    }
}

impl Console for Terminal {
    fn layout(&self) -> io::Result<Layout> {
        current_layout()
    }

    fn read_key(&mut self) -> io::Result<Key> {
        loop {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => return Ok(map_key(key)),
                Event::Resize(..) => return Ok(Key::Other),
                _ => {}
            }
        }
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let _cooked = Cooked::enter()?;
        write!(self.out, "{}{}{}", RED, prompt, RESET)?;
        self.out.flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn draw(&mut self, text: &str) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        self.write_text(text)
    }

    fn print(&mut self, text: &str) -> io::Result<()> {
        self.write_text(text)
    }
}

fn map_key(key: KeyEvent) -> Key {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Interrupt,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        _ => Key::Other,
    }
}

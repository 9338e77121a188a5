use crate::image::{self, ExportOutcome};
use crate::paginate::SUBSECTION_MARK;
use crate::state::{ReaderState, MAX_MARKS};
use crate::store::ProgressStore;
use crate::terminal::{Console, Key, CYAN, GREEN, MAGENTA, RED, RESET};
use anyhow::Result;
use std::path::PathBuf;

const SHORTCUTS: &[(char, &str)] = &[
    ('j', "Page down"),
    ('k', "Page up"),
    ('c', "Catalog"),
    ('g', "Goto"),
    ('h', "Help"),
    ('M', "Marks"),
    ('I', "Export images"),
    ('q', "Quit"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Advance,
    Retreat,
    Catalog,
    Help,
    Goto,
    Marks,
    ExportImages,
    Quit,
    Redraw,
}

impl Action {
    fn from_key(key: Key) -> Self {
        match key {
            Key::Char('j') | Key::Char(' ') | Key::Down | Key::PageDown => Action::Advance,
            Key::Char('k') | Key::Up | Key::PageUp => Action::Retreat,
            Key::Char('c') => Action::Catalog,
            Key::Char('h') => Action::Help,
            Key::Char('g') => Action::Goto,
            Key::Char('M') => Action::Marks,
            Key::Char('I') => Action::ExportImages,
            Key::Char('q') | Key::Interrupt => Action::Quit,
            _ => Action::Redraw,
        }
    }
}

fn is_quit(key: Key) -> bool {
    matches!(key, Key::Char('q') | Key::Interrupt)
}

/// Context a reading session needs besides the terminal.
pub struct Session<'a> {
    pub title: String,
    pub store: &'a ProgressStore,
    /// Images are exported to `<export_root>/<title>/`.
    pub export_root: PathBuf,
}

/// Keystroke-driven reading loop.
pub struct Reader<'a, C: Console> {
    console: &'a mut C,
    state: ReaderState,
    session: Session<'a>,
}

impl<'a, C: Console> Reader<'a, C> {
    pub fn new(console: &'a mut C, state: ReaderState, session: Session<'a>) -> Self {
        Self {
            console,
            state,
            session,
        }
    }

    pub fn into_state(self) -> ReaderState {
        self.state
    }

    /// Runs until the user quits.
    pub fn run(&mut self) -> Result<()> {
        self.welcome()?;
        loop {
            let key = self.console.read_key()?;
            match Action::from_key(key) {
                Action::Quit => return Ok(()),
                Action::Advance => self.state.advance(),
                Action::Retreat => self.state.retreat(),
                Action::Catalog => self.catalog()?,
                Action::Help => self.help()?,
                Action::Goto => self.goto()?,
                Action::Marks => self.marks()?,
                Action::ExportImages => self.export_images()?,
                Action::Redraw => {}
            }
            self.show_page()?;
        }
    }

    fn welcome(&mut self) -> Result<()> {
        let mut text = format!("{}Welcome to termread!{}\n", CYAN, RESET);
        if let Some(title) = &self.state.book_title {
            text.push_str(&format!("{}{}{}", MAGENTA, title, RESET));
            if !self.state.authors.is_empty() {
                text.push_str(&format!(" by {}", self.state.authors.join(", ")));
            }
            text.push('\n');
        }
        text.push_str(&format!(
            "{}Press any key to continue except shortcut keys:{}\n",
            CYAN, RESET
        ));
        text.push_str(&shortcut_legend());
        self.console.draw(&text)?;
        Ok(())
    }

    fn show_page(&mut self) -> Result<()> {
        let Some(page) = self.state.page_text() else {
            self.console
                .draw(&format!("{}The page number is out of range.{}\n", RED, RESET))?;
            return Ok(());
        };

        let current = self.state.current_page;
        let headings: Vec<&str> = self
            .state
            .chapters
            .iter()
            .filter(|a| a.page == current)
            .map(|a| a.title.trim_start_matches(SUBSECTION_MARK))
            .collect();

        let mut text = String::with_capacity(page.len() + 64);
        for line in page.lines() {
            let color = if headings.contains(&line.trim()) {
                MAGENTA
            } else {
                GREEN
            };
            text.push_str(&format!("{}{}{}\n", color, line, RESET));
        }

        text.push_str(&format!(
            "\n{}[{}/{}]{} {}{}{}\n",
            RED,
            current,
            self.state.last_page(),
            RESET,
            CYAN,
            self.chapter_at(current).unwrap_or(""),
            RESET
        ));
        self.console.draw(&text)?;
        Ok(())
    }

    /// Title of the chapter the page belongs to.
    fn chapter_at(&self, page: usize) -> Option<&str> {
        self.state
            .chapters
            .iter()
            .filter(|a| !a.title.starts_with(SUBSECTION_MARK))
            .take_while(|a| a.page <= page)
            .last()
            .map(|a| a.title.as_str())
    }

    fn catalog(&mut self) -> Result<()> {
        let mut entries = vec![format!(
            "{}{:<8}{}{}Title{}",
            RED, "Page", RESET, CYAN, RESET
        )];
        entries.extend(self.state.chapters.iter().map(|anchor| {
            format!("{}{:<8}{}{}{}{}", RED, anchor.page, RESET, CYAN, anchor.title, RESET)
        }));
        let footer = format!(
            "{}Page range: {}{}0-{}{}\n{}Current page: {}{}{}{}\n",
            RED,
            RESET,
            CYAN,
            self.state.last_page(),
            RESET,
            RED,
            RESET,
            CYAN,
            self.state.current_page,
            RESET
        );

        let per_screen = self.console.layout()?.row_budget();
        let screens = entries.len().div_ceil(per_screen);
        let mut screen = 0;
        let mut redraw = true;

        loop {
            if redraw {
                let start = screen * per_screen;
                let end = (start + per_screen).min(entries.len());
                let mut text = entries[start..end].join("\n");
                text.push('\n');
                text.push_str(&footer);
                self.console.draw(&text)?;
            }

            let key = self.console.read_key()?;
            if is_quit(key) {
                return Ok(());
            }
            redraw = true;
            match Action::from_key(key) {
                Action::Advance if screen + 1 < screens => screen += 1,
                Action::Retreat if screen > 0 => screen -= 1,
                Action::Advance | Action::Retreat => {}
                _ => {
                    redraw = false;
                    self.console.print(&format!(
                        "{}Press q to quit. Press j to move page down and k to move page up.{}\n",
                        RED, RESET
                    ))?;
                }
            }
        }
    }

    fn help(&mut self) -> Result<()> {
        let text = format!(
            "{}To re-read the ebook from scratch, delete its folder under {}.\nShortcut keys:{}\n{}",
            RED,
            self.session.store.root().display(),
            RESET,
            shortcut_legend()
        );
        self.console.draw(&text)?;

        while !is_quit(self.console.read_key()?) {
            self.console
                .print(&format!("{}Press q to quit.{}\n", RED, RESET))?;
        }
        Ok(())
    }

    fn goto(&mut self) -> Result<()> {
        loop {
            let Some(input) = self
                .console
                .read_line("Page number, or enter q to quit: ")?
            else {
                return Ok(());
            };
            let input = input.trim();
            if input == "q" {
                return Ok(());
            }
            if let Some(page) = parse_index(input) {
                if self.state.goto(page) {
                    return Ok(());
                }
            }
        }
    }

    fn marks(&mut self) -> Result<()> {
        loop {
            let mut text = format!(
                "{}Press q to quit, press 0 - 9 to navigate.\n\
                 Press a to add a mark at the current page.\n\
                 Press d to delete, D to delete all.\n\
                 You can add up to {} marks.\n{:<8}{:<8}Text{}\n",
                RED, MAX_MARKS, "Index", "Page", RESET
            );
            for (idx, mark) in self.state.marks.iter().enumerate() {
                text.push_str(&format!(
                    "{}{:<8}{:<8}{}{}\n",
                    RED, idx, mark.page, mark.note, RESET
                ));
            }
            self.console.draw(&text)?;

            match self.console.read_key()? {
                key if is_quit(key) => return Ok(()),
                Key::Char('a') => {
                    if let Some(note) = self.console.read_line("Add some text here: ")? {
                        self.state.add_mark(note);
                    }
                }
                Key::Char('d') => {
                    if let Some(input) = self.console.read_line("Delete: ")? {
                        if let Some(idx) = parse_index(input.trim()) {
                            self.state.delete_mark(idx);
                        }
                    }
                }
                Key::Char('D') => {
                    let confirm = self
                        .console
                        .read_line("Delete all? Enter y to confirm: ")?;
                    if confirm.as_deref().map(str::trim) == Some("y") {
                        self.state.clear_marks();
                    }
                }
                Key::Char(c) => {
                    if let Some(idx) = c.to_digit(10) {
                        if self.state.jump_to_mark(idx as usize) {
                            return Ok(());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn export_images(&mut self) -> Result<()> {
        let dir = self.session.export_root.join(&self.session.title);
        self.console.draw(&format!(
            "{}Exporting images from the book...{}\n",
            RED, RESET
        ))?;

        let outcome = self
            .session
            .store
            .load_images(&self.session.title)
            .map_err(anyhow::Error::from)
            .and_then(|images| image::export_images(&images, &dir));

        let message = match outcome {
            Ok(ExportOutcome::Exported { count, dir }) => format!(
                "Finished! {} {} saved.\nPlease check {}.",
                count,
                if count == 1 { "image" } else { "images" },
                dir.display()
            ),
            Ok(ExportOutcome::AlreadyExists(dir)) => {
                format!("Already exists!\nPlease check {}.", dir.display())
            }
            Ok(ExportOutcome::NoImages) => "Finished!\nNo image found.".to_string(),
            Err(e) => {
                log::error!("image export failed: {:#}", e);
                format!("Export failed: {:#}", e)
            }
        };
        self.console.print(&format!(
            "{}{}\nPress any key to continue.{}\n",
            RED, message, RESET
        ))?;
        self.console.read_key()?;
        Ok(())
    }
}

fn shortcut_legend() -> String {
    SHORTCUTS
        .iter()
        .map(|(key, action)| format!("{}{:<8}{}{}{}{}\n", RED, key, RESET, CYAN, action, RESET))
        .collect()
}

/// Parses a non-negative decimal index. Signs, spaces and anything else that
/// is not a plain digit string are rejected.
fn parse_index(input: &str) -> Option<usize> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    input.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::Image;
    use crate::paginate::Layout;
    use crate::state::tests::state_with_pages;
    use std::collections::VecDeque;
    use std::io;
    use tempfile::TempDir;

    /// Console fed from scripted keys and lines, recording what was shown.
    #[derive(Default)]
    struct ScriptedConsole {
        keys: VecDeque<Key>,
        lines: VecDeque<String>,
        prompts: Vec<String>,
        screens: Vec<String>,
    }

    impl ScriptedConsole {
        fn new(keys: &str, lines: &[&str]) -> Self {
            Self {
                keys: keys.chars().map(Key::Char).collect(),
                lines: lines.iter().map(|l| l.to_string()).collect(),
                ..Self::default()
            }
        }

        fn last_screen(&self) -> &str {
            self.screens.last().map(String::as_str).unwrap_or("")
        }
    }

    impl Console for ScriptedConsole {
        fn layout(&self) -> io::Result<Layout> {
            Ok(Layout::new(8, 80))
        }

        fn read_key(&mut self) -> io::Result<Key> {
            self.keys
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
        }

        fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
            self.prompts.push(prompt.to_string());
            Ok(self.lines.pop_front())
        }

        fn draw(&mut self, text: &str) -> io::Result<()> {
            self.screens.push(text.to_string());
            Ok(())
        }

        fn print(&mut self, text: &str) -> io::Result<()> {
            if let Some(screen) = self.screens.last_mut() {
                screen.push_str(text);
            }
            Ok(())
        }
    }

    struct Fixture {
        tmp: TempDir,
        store: ProgressStore,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let store = ProgressStore::new(tmp.path().join("cache"));
            Self { tmp, store }
        }

        fn session(&self) -> Session<'_> {
            Session {
                title: "Book".to_string(),
                store: &self.store,
                export_root: self.tmp.path().join("img"),
            }
        }

        fn run(&self, console: &mut ScriptedConsole, state: ReaderState) -> ReaderState {
            let mut reader = Reader::new(console, state, self.session());
            reader.run().unwrap();
            reader.into_state()
        }
    }

    #[test]
    fn paging_clamps_at_both_ends() {
        let fx = Fixture::new();
        let mut console = ScriptedConsole::new("jjjjjq", &[]);
        let state = fx.run(&mut console, state_with_pages(3));
        assert_eq!(state.current_page, 2);

        let mut console = ScriptedConsole::new("kkkjq", &[]);
        let state = fx.run(&mut console, state);
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn every_key_redraws_the_current_page() {
        let fx = Fixture::new();
        let mut console = ScriptedConsole::new("xjq", &[]);
        fx.run(&mut console, state_with_pages(3));

        // Welcome screen plus one repaint per non-quit key.
        assert_eq!(console.screens.len(), 3);
        assert!(console.screens[1].contains("page 0"));
        assert!(console.last_screen().contains("page 1"));
        assert!(console.last_screen().contains("[1/2]"));
        assert!(console.last_screen().contains("Start"));
    }

    #[test]
    fn out_of_range_page_is_reported_not_fatal() {
        let fx = Fixture::new();
        let mut state = state_with_pages(2);
        state.current_page = 7;
        let mut console = ScriptedConsole::new("xq", &[]);
        fx.run(&mut console, state);

        assert!(console.last_screen().contains("out of range"));
    }

    #[test]
    fn goto_q_leaves_the_page_alone() {
        let fx = Fixture::new();
        let mut console = ScriptedConsole::new("gq", &["q"]);
        let state = fx.run(&mut console, state_with_pages(3));
        assert_eq!(state.current_page, 0);
    }

    #[test]
    fn goto_reprompts_until_valid() {
        let fx = Fixture::new();
        let mut console = ScriptedConsole::new("gq", &["5", "-1", "+1", "two", "2"]);
        let state = fx.run(&mut console, state_with_pages(3));

        assert_eq!(state.current_page, 2);
        assert_eq!(console.prompts.len(), 5);
    }

    #[test]
    fn goto_stops_at_end_of_input() {
        let fx = Fixture::new();
        let mut console = ScriptedConsole::new("gq", &["9"]);
        let state = fx.run(&mut console, state_with_pages(3));
        assert_eq!(state.current_page, 0);
        assert_eq!(console.prompts.len(), 2);
    }

    #[test]
    fn catalog_scrolls_and_returns() {
        let fx = Fixture::new();
        let mut state = state_with_pages(30);
        state.chapters = (0..10)
            .map(|i| crate::paginate::ChapterAnchor {
                title: format!("Chapter {}", i),
                page: i * 3,
            })
            .collect();
        // Budget of 4 entries per screen: header plus chapters 0-2, then 3-6.
        let mut console = ScriptedConsole::new("cjjjjxqq", &[]);
        fx.run(&mut console, state);

        let catalog: Vec<_> = console
            .screens
            .iter()
            .filter(|s| s.contains("Page range"))
            .collect();
        assert!(catalog[0].contains("Chapter 2") && !catalog[0].contains("Chapter 3"));
        assert!(catalog[1].contains("Chapter 3") && catalog[1].contains("Chapter 6"));
        assert!(catalog.last().unwrap().contains("Chapter 9"));
        assert!(catalog.last().unwrap().contains("Press q to quit."));
    }

    #[test]
    fn help_lists_shortcuts_until_q() {
        let fx = Fixture::new();
        let mut console = ScriptedConsole::new("hzqq", &[]);
        fx.run(&mut console, state_with_pages(1));

        let help = &console.screens[1];
        assert!(help.contains("Export images"));
        assert!(help.contains("Press q to quit."));
    }

    #[test]
    fn marks_add_delete_and_jump() {
        let fx = Fixture::new();
        // Add a mark on page 2, add one on page 0, delete index 1, jump to 0.
        let mut console = ScriptedConsole::new("jjMaqkkMad0q", &["two", "zero", "1"]);
        let state = fx.run(&mut console, state_with_pages(5));

        assert_eq!(state.marks.len(), 1);
        assert_eq!(state.marks[0].note, "two");
        assert_eq!(state.current_page, 2);
    }

    #[test]
    fn marks_delete_all_needs_confirmation() {
        let fx = Fixture::new();
        let mut state = state_with_pages(5);
        state.add_mark("keep");
        let mut console = ScriptedConsole::new("MDDqq", &["n", "y"]);
        let state = fx.run(&mut console, state);

        assert!(state.marks.is_empty());
        assert_eq!(console.prompts.len(), 2);
    }

    #[test]
    fn marks_ignore_invalid_indexes() {
        let fx = Fixture::new();
        let mut state = state_with_pages(5);
        state.add_mark("keep");
        let mut console = ScriptedConsole::new("Md5qq", &["x"]);
        let state = fx.run(&mut console, state);

        assert_eq!(state.marks.len(), 1);
        assert_eq!(state.current_page, 0);
    }

    #[test]
    fn export_writes_images_once() {
        let fx = Fixture::new();
        let images = vec![Image {
            name: "cover.png".to_string(),
            data: b"png".to_vec(),
        }];
        fx.store.save_images("Book", &images).unwrap();

        let mut console = ScriptedConsole::new("I xI xq", &[]);
        fx.run(&mut console, state_with_pages(1));

        let exported = fx.tmp.path().join("img").join("Book").join("cover.png");
        assert_eq!(std::fs::read(exported).unwrap(), b"png");
        let reports: Vec<_> = console
            .screens
            .iter()
            .filter(|s| s.contains("Exporting"))
            .collect();
        assert!(reports[0].contains("1 image saved."));
        assert!(reports[1].contains("Already exists!"));
    }

    #[test]
    fn export_without_images_says_so() {
        let fx = Fixture::new();
        let mut console = ScriptedConsole::new("I q", &[]);
        fx.run(&mut console, state_with_pages(1));

        assert!(console.screens[1].contains("No image found."));
        assert!(!fx.tmp.path().join("img").join("Book").exists());
    }

    #[test]
    fn ctrl_c_quits() {
        let fx = Fixture::new();
        let mut console = ScriptedConsole::new("j", &[]);
        console.keys.push_back(Key::Interrupt);
        let state = fx.run(&mut console, state_with_pages(3));
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn parse_index_is_strict() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("042"), Some(42));
        assert_eq!(parse_index(""), None);
        assert_eq!(parse_index("+3"), None);
        assert_eq!(parse_index("3.0"), None);
        assert_eq!(parse_index("99999999999999999999999"), None);
    }
}

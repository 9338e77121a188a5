use crate::book::Book;
use crate::cli::Cli;
use crate::epub_reader::EpubData;
use crate::paginate::{self, Layout};
use crate::reader::{Reader, Session};
use crate::state::ReaderState;
use crate::store::{ProgressStore, StoreError};
use crate::terminal::{self, Terminal, RED, RESET};
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::Path;

pub fn run(cli: &Cli) -> Result<()> {
    let Some(input) = cli.input.as_deref() else {
        println!("An ebook is needed!");
        return Ok(());
    };
    if !input.exists() {
        println!("Check your file path again! {}", input.display());
        return Ok(());
    }

    let title = book_title(input)?;
    let store = ProgressStore::new(
        cli.cache_dir
            .clone()
            .unwrap_or_else(ProgressStore::default_root),
    );
    let layout = terminal::current_layout().context("Failed to read the terminal size")?;

    let state = load_or_paginate(&store, input, &title, layout, cli.reflow)?;

    let mut console = Terminal::open().context("Failed to switch the terminal to raw mode")?;
    let session = Session {
        title: title.clone(),
        store: &store,
        export_root: cli.img_dir.clone(),
    };
    let mut reader = Reader::new(&mut console, state, session);
    let outcome = reader.run();
    let state = reader.into_state();
    drop(console);

    store
        .save(&title, &state)
        .with_context(|| format!("Failed to save progress for {}", title))?;
    println!("{}\nSaved!{}", RED, RESET);

    outcome
}

/// Cached state for `title`, or a fresh pagination of the book at `input`.
///
/// A cached state is used as-is, whatever terminal size it was laid out for,
/// unless `reflow` asks for new pages.
pub fn load_or_paginate(
    store: &ProgressStore,
    input: &Path,
    title: &str,
    layout: Layout,
    reflow: bool,
) -> Result<ReaderState> {
    match store.load(title) {
        Ok(Some(mut state)) => {
            if reflow {
                let book = open_book(input)?;
                store.save_images(title, &book.images)?;
                state.reflow(paginate::paginate(&book.chapters, layout), layout);
                log::info!(
                    "re-paginated {} into {} pages for {}x{}",
                    title,
                    state.pages.len(),
                    layout.rows,
                    layout.cols
                );
            } else if state.layout != layout {
                log::info!(
                    "pages of {} were laid out for {}x{}, terminal is {}x{}; use --reflow to re-paginate",
                    title,
                    state.layout.rows,
                    state.layout.cols,
                    layout.rows,
                    layout.cols
                );
            }
            return Ok(state);
        }
        Ok(None) => {}
        Err(err @ StoreError::CorruptState { .. }) => {
            log::warn!("{}; re-reading the book", err);
        }
        Err(err) => return Err(err.into()),
    }

    let book = open_book(input)?;
    store.save_images(title, &book.images)?;

    let pagination = paginate::paginate(&book.chapters, layout);
    log::info!(
        "paginated {} chapters of {} into {} pages",
        book.chapters.len(),
        title,
        pagination.pages.len()
    );
    let state = ReaderState::new(pagination, layout, book.metadata);
    store.save(title, &state)?;
    Ok(state)
}

fn open_book(input: &Path) -> Result<Book> {
    let epub = EpubData::open(input)?;
    Book::from_source(&epub).with_context(|| format!("Failed to read {}", input.display()))
}

/// Book title used for the cache and export directories: the file name
/// without a trailing `.epub`.
pub fn book_title(input: &Path) -> Result<String> {
    let name = input
        .file_name()
        .map(OsStr::to_string_lossy)
        .context("Input file has no name")?;

    let cut = name.len().saturating_sub(".epub".len());
    let stem = if cut > 0 && name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(".epub")
    {
        &name[..cut]
    } else {
        name.as_ref()
    };
    Ok(stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn title_strips_only_the_trailing_extension() {
        let title = |p: &str| book_title(&PathBuf::from(p)).unwrap();
        assert_eq!(title("books/Dune.epub"), "Dune");
        assert_eq!(title("Loud.EPUB"), "Loud");
        assert_eq!(title("my.epub.notes.epub"), "my.epub.notes");
        assert_eq!(title("plain"), "plain");
        assert_eq!(title(".epub"), ".epub");
    }

    #[test]
    fn cached_state_is_used_without_touching_the_book() {
        let tmp = TempDir::new().unwrap();
        let store = ProgressStore::new(tmp.path());
        let mut state = crate::state::tests::state_with_pages(4);
        state.goto(3);
        store.save("Book", &state).unwrap();

        // The path does not exist: any attempt to parse it would fail.
        let missing = tmp.path().join("Book.epub");
        let loaded =
            load_or_paginate(&store, &missing, "Book", Layout::new(50, 200), false).unwrap();

        assert_eq!(loaded, state);
    }

    #[test]
    fn corrupt_state_falls_back_to_the_book() {
        let tmp = TempDir::new().unwrap();
        let store = ProgressStore::new(tmp.path());
        std::fs::create_dir_all(store.book_dir("Book")).unwrap();
        std::fs::write(store.book_dir("Book").join("state.json"), "[]").unwrap();

        // Falling back means opening the EPUB, which fails for a missing file.
        let missing = tmp.path().join("Book.epub");
        let err =
            load_or_paginate(&store, &missing, "Book", Layout::new(24, 80), false).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to open EPUB"));
    }
}

use crate::book::Metadata;
use crate::paginate::{ChapterAnchor, Layout, Pagination};
use serde::{Deserialize, Serialize};

/// Version of the on-disk state document.
pub const STATE_VERSION: u32 = 1;

/// Bookmarks kept per book; adding more evicts the oldest.
pub const MAX_MARKS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub page: usize,
    pub note: String,
}

/// Everything persisted between reading sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderState {
    pub version: u32,
    pub layout: Layout,
    #[serde(default)]
    pub book_title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub pages: Vec<String>,
    pub chapters: Vec<ChapterAnchor>,
    pub current_page: usize,
    #[serde(default)]
    pub marks: Vec<Bookmark>,
}

impl ReaderState {
    pub fn new(pagination: Pagination, layout: Layout, metadata: Metadata) -> Self {
        Self {
            version: STATE_VERSION,
            layout,
            book_title: metadata.title,
            authors: metadata.authors,
            pages: pagination.pages,
            chapters: pagination.anchors,
            current_page: 0,
            marks: Vec::new(),
        }
    }

    /// Text of the current page, or `None` when the cursor is out of range.
    pub fn page_text(&self) -> Option<&str> {
        self.pages.get(self.current_page).map(String::as_str)
    }

    pub fn last_page(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }

    pub fn advance(&mut self) {
        if self.current_page < self.last_page() {
            self.current_page += 1;
        }
    }

    pub fn retreat(&mut self) {
        if self.current_page > 0 {
            self.current_page -= 1;
        }
    }

    /// Moves to `page` if it exists.
    pub fn goto(&mut self, page: usize) -> bool {
        if page < self.pages.len() {
            self.current_page = page;
            true
        } else {
            false
        }
    }

    /// Bookmarks the current page, evicting the oldest mark when full.
    pub fn add_mark(&mut self, note: impl Into<String>) {
        if self.marks.len() >= MAX_MARKS {
            self.marks.remove(0);
        }
        self.marks.push(Bookmark {
            page: self.current_page,
            note: note.into(),
        });
    }

    pub fn delete_mark(&mut self, index: usize) -> bool {
        if index < self.marks.len() {
            self.marks.remove(index);
            true
        } else {
            false
        }
    }

    pub fn clear_marks(&mut self) {
        self.marks.clear();
    }

    /// Jumps to the page of mark `index`.
    pub fn jump_to_mark(&mut self, index: usize) -> bool {
        match self.marks.get(index) {
            Some(mark) => {
                self.current_page = mark.page;
                true
            }
            None => false,
        }
    }

    /// Replaces the pages with a fresh pagination, carrying the reading
    /// position and bookmarks over proportionally.
    pub fn reflow(&mut self, pagination: Pagination, layout: Layout) {
        let old_len = self.pages.len();
        let new_len = pagination.pages.len();
        let remap = |page: usize| -> usize {
            if old_len == 0 || new_len == 0 {
                0
            } else {
                (page * new_len / old_len).min(new_len - 1)
            }
        };

        self.current_page = remap(self.current_page);
        for mark in &mut self.marks {
            mark.page = remap(mark.page);
        }
        self.pages = pagination.pages;
        self.chapters = pagination.anchors;
        self.layout = layout;
    }

    /// Checks the structural invariants of a state read from disk.
    ///
    /// An out-of-range `current_page` is tolerated; the reader shows it as
    /// such instead of failing.
    pub fn validate(&self) -> Result<(), String> {
        if self.version != STATE_VERSION {
            return Err(format!("unsupported state version {}", self.version));
        }
        if let Some(anchor) = self.chapters.iter().find(|a| a.page > self.pages.len()) {
            return Err(format!(
                "chapter {:?} points past the last page ({} > {})",
                anchor.title,
                anchor.page,
                self.pages.len()
            ));
        }
        if self.chapters.windows(2).any(|w| w[0].page > w[1].page) {
            return Err("chapter anchors are out of order".to_string());
        }
        if self.marks.len() > MAX_MARKS {
            return Err(format!(
                "{} bookmarks exceed the limit of {}",
                self.marks.len(),
                MAX_MARKS
            ));
        }
        Ok(())
    }
}

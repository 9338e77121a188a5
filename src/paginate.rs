use crate::book::Chapter;
use crate::width::row_cost;
use serde::{Deserialize, Serialize};

/// Rows kept free below the page for the prompt and status line.
pub const FOOTER_ROWS: u16 = 4;

/// Prefix marking a subsection entry in the table of contents.
pub const SUBSECTION_MARK: &str = "\u{21B3} ";

/// Terminal size a book was paginated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub rows: u16,
    pub cols: u16,
}

impl Layout {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// Rows available to page text.
    pub fn row_budget(&self) -> usize {
        usize::from(self.rows.saturating_sub(FOOTER_ROWS).max(1))
    }
}

/// A chapter or subsection heading and the page it begins on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterAnchor {
    pub title: String,
    pub page: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub pages: Vec<String>,
    pub anchors: Vec<ChapterAnchor>,
}

/// Packs chapter lines into pages of at most `layout.row_budget()` rows.
pub fn paginate(chapters: &[Chapter], layout: Layout) -> Pagination {
    let mut pager = Pager::new(layout);

    for chapter in chapters {
        pager.begin(chapter.title.clone());
        let mut subsections = chapter.subsections.clone();

        for (idx, line) in merge_footnote_markers(split_lines(&chapter.text))
            .into_iter()
            .enumerate()
        {
            // The chapter's own title line is not one of its subsections.
            let is_title = idx == 0 && line.trim() == chapter.title.trim();
            let heading = subsections
                .iter()
                .position(|s| !is_title && s.trim() == line.trim())
                .map(|pos| subsections.remove(pos));
            if let Some(heading) = heading {
                pager.begin(format!("{}{}", SUBSECTION_MARK, heading));
            }
            pager.push_line(&line);
        }
    }

    pager.finish()
}

/// Accumulates lines into pages.
struct Pager {
    layout: Layout,
    budget: usize,
    pages: Vec<String>,
    page_text: String,
    page_rows: usize,
    anchors: Vec<ChapterAnchor>,
    /// Anchors waiting for the line they point at.
    pending: Vec<String>,
}

impl Pager {
    fn new(layout: Layout) -> Self {
        Self {
            layout,
            budget: layout.row_budget(),
            pages: Vec::new(),
            page_text: String::new(),
            page_rows: 0,
            anchors: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn begin(&mut self, title: String) {
        self.pending.push(title);
    }

    fn push_line(&mut self, line: &str) {
        let cost = row_cost(line, self.layout.cols);
        if self.page_rows > 0 && self.page_rows + cost > self.budget {
            self.flush();
        }
        self.resolve_pending(self.pages.len());

        self.page_text.push_str(line);
        self.page_text.push('\n');
        self.page_rows += cost;
    }

    fn flush(&mut self) {
        self.pages.push(std::mem::take(&mut self.page_text));
        self.page_rows = 0;
    }

    fn resolve_pending(&mut self, page: usize) {
        for title in self.pending.drain(..) {
            self.anchors.push(ChapterAnchor { title, page });
        }
    }

    fn finish(mut self) -> Pagination {
        if !self.page_text.is_empty() {
            self.flush();
        }
        self.resolve_pending(self.pages.len());
        Pagination {
            pages: self.pages,
            anchors: self.anchors,
        }
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// `[12]` alone on a line.
fn is_footnote_marker(line: &str) -> bool {
    line.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Folds lone footnote markers, and the line after them, back into the
/// line they interrupted.
fn merge_footnote_markers(lines: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(lines.len());
    let mut iter = lines.into_iter();

    while let Some(line) = iter.next() {
        match merged.last_mut() {
            Some(prev) if is_footnote_marker(&line) => {
                prev.push_str(&line);
                if let Some(next) = iter.next() {
                    prev.push_str(&next);
                }
            }
            _ => merged.push(line),
        }
    }

    merged
}

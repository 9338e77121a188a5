use std::path::Path;

/// Plain-text rendition of one chapter document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TextDocument {
    /// Heading texts in document order.
    pub headings: Vec<String>,
    /// Body with heading markers removed and images replaced by placeholders.
    pub body: String,
    pub figures: Vec<Figure>,
}

/// An image reference found in a document, with the caption line that
/// directly follows it, if any.
#[derive(Debug, PartialEq, Eq)]
pub struct Figure {
    pub file_name: String,
    pub caption: Option<String>,
}

pub fn html_to_markdown(html: &str) -> String {
    clean_markdown(&html2md::parse_html(html))
}

pub fn markdown_to_text(md: &str) -> TextDocument {
    let mut doc = TextDocument::default();
    let mut lines = Vec::new();
    // Index into `doc.figures` of images still waiting for a caption line.
    let mut uncaptioned: Vec<usize> = Vec::new();

    for line in md.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            lines.push(String::new());
            continue;
        }

        if let Some(heading) = heading_text(trimmed) {
            uncaptioned.clear();
            if !heading.is_empty() {
                doc.headings.push(heading.clone());
                lines.push(heading);
            }
            continue;
        }

        // Setext heading: the underline turns the previous line into a heading.
        if is_setext_underline(trimmed) {
            if let Some(prev) = lines.last_mut().filter(|l| !l.trim().is_empty()) {
                let heading = normalize_whitespace(prev);
                *prev = heading.clone();
                doc.headings.push(heading);
                uncaptioned.clear();
                continue;
            }
        }

        let Some(line) = strip_block_markers(line) else {
            lines.push(String::new());
            continue;
        };
        let (text, images) = replace_images(&line);
        let text = inline_text(&text);
        if images.is_empty() {
            let caption = normalize_whitespace(&text);
            for idx in uncaptioned.drain(..) {
                doc.figures[idx].caption = Some(caption.clone());
            }
        } else {
            uncaptioned.clear();
            for src in images {
                uncaptioned.push(doc.figures.len());
                doc.figures.push(Figure {
                    file_name: file_name_of(&src),
                    caption: None,
                });
            }
        }
        lines.push(text.trim_end().to_string());
    }

    doc.body = lines.join("\n").trim().to_string();
    doc
}

/// Collapses runs of whitespace (including tabs and newlines) to single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn heading_text(line: &str) -> Option<String> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim();
    Some(normalize_whitespace(&inline_text(text)))
}

fn is_setext_underline(line: &str) -> bool {
    (!line.is_empty() && line.chars().all(|c| c == '='))
        || (line.len() >= 3 && line.chars().all(|c| c == '-'))
}

const BULLET: &str = "\u{2022} ";

/// Drops quote markers and turns list bullets into `• `. Returns `None` for
/// a horizontal rule.
fn strip_block_markers(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];
    if is_horizontal_rule(trimmed) {
        return None;
    }

    let mut rest = trimmed;
    while let Some(quoted) = rest.strip_prefix('>') {
        rest = quoted.trim_start();
    }
    for bullet in ["* ", "- ", "+ "] {
        if let Some(item) = rest.strip_prefix(bullet) {
            return Some(format!("{}{}{}", indent, BULLET, item.trim_start()));
        }
    }
    Some(format!("{}{}", indent, rest))
}

fn is_horizontal_rule(line: &str) -> bool {
    let marks: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3 && ['*', '-', '_'].iter().any(|m| marks.iter().all(|c| c == m))
}

/// Reduces inline markdown to the text a reader sees: links become their
/// text, emphasis and code markers go, backslash escapes are resolved.
fn inline_text(text: &str) -> String {
    strip_markers(&strip_links(text))
}

/// `[text](href)` becomes `text`; brackets may nest, as in `[[3]](#fn3)`.
fn strip_links(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            out.push(chars[i]);
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if chars[i] == '[' {
            let link = matching(&chars, i, '[', ']').and_then(|close| {
                if chars.get(close + 1) == Some(&'(') {
                    matching(&chars, close + 1, '(', ')').map(|end| (close, end))
                } else {
                    None
                }
            });
            if let Some((close, end)) = link {
                let label: String = chars[i + 1..close].iter().collect();
                out.push_str(&strip_links(&label));
                i = end + 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Index of the bracket closing the one at `start`, skipping escaped chars.
fn matching(chars: &[char], start: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn strip_markers(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if chars.get(i + 1).is_some_and(|n| n.is_ascii_punctuation()) => {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            '*' | '`' => {}
            // Keep underscores inside words like snake_case.
            '_' if i > 0
                && chars[i - 1].is_alphanumeric()
                && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric()) =>
            {
                out.push(c)
            }
            '_' => {}
            _ => out.push(c),
        }
        i += 1;
    }

    out
}

/// Replaces every `![alt](src)` in `line` with an `[Image: alt]` placeholder
/// and returns the rewritten line together with the image sources.
fn replace_images(line: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(line.len());
    let mut sources = Vec::new();
    let mut rest = line;

    while let Some(start) = rest.find("![") {
        let Some(close) = rest[start..].find("](") else {
            break;
        };
        let alt_end = start + close;
        let src_start = alt_end + 2;
        let Some(src_len) = rest[src_start..].find(')') else {
            break;
        };

        let alt = rest[start + 2..alt_end].trim();
        let target = rest[src_start..src_start + src_len].trim();
        // `![alt](src "title")`
        let src = target.split_whitespace().next().unwrap_or("");

        out.push_str(&rest[..start]);
        if alt.is_empty() {
            out.push_str("[Image]");
        } else {
            out.push_str(&format!("[Image: {}]", alt));
        }
        if !src.is_empty() {
            sources.push(src.trim_matches(|c| c == '<' || c == '>').to_string());
        }
        rest = &rest[src_start + src_len + 1..];
    }

    out.push_str(rest);
    (out, sources)
}

fn file_name_of(src: &str) -> String {
    let path = src.split(['#', '?']).next().unwrap_or(src);
    Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

fn clean_markdown(md: &str) -> String {
    let mut result = md.replace("\r\n", "\n");

    // Collapse 3+ consecutive blank lines to 2
    while result.contains("\n\n\n") {
        result = result.replace("\n\n\n", "\n\n");
    }

    result
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

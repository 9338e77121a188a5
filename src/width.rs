/// Display width of `text` in terminal cells.
///
/// Characters in `U+0800..=U+9FA5` (which covers the common CJK block) take
/// two cells, everything else takes one.
pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

fn char_width(c: char) -> usize {
    if ('\u{0800}'..='\u{9fa5}').contains(&c) {
        2
    } else {
        1
    }
}

/// Number of terminal rows `line` occupies once the terminal wraps it at
/// `cols` columns.
pub fn row_cost(line: &str, cols: u16) -> usize {
    display_width(line).div_ceil(usize::from(cols.max(1)))
}

/// Line width used for the long-text columns of a report row.
pub const WRAP_WIDTH: usize = 60;

/// Greedy word wrap for multi-line spreadsheet cells.
///
/// Words are whitespace-separated tokens; existing line breaks count as
/// ordinary whitespace, so wrapping already-wrapped text with the same width
/// is a no-op. A word is never split: one longer than `max_width` sits alone
/// on its own line. Widths are counted in characters.
///
/// # Examples
/// ```
/// use weekly_report::wrap::wrap;
///
/// assert_eq!(wrap("one two three", 7), "one two\nthree");
/// ```
pub fn wrap(text: &str, max_width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

//! Fitting text into the bar: hard truncation, ellipsis truncation and
//! character-granular wrapping.
//!
//! All functions work on `char`s, never bytes, so CJK names and addresses
//! are cut on character boundaries. Widths come from a caller-supplied
//! measure so the same logic runs against any text backend.

/// Appended to text that has been shortened.
pub const ELLIPSIS: &str = "...";

/// Keep the first `max_chars` characters, appending [`ELLIPSIS`] if anything
/// was cut.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{ELLIPSIS}", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Shorten `text` with a trailing ellipsis until it fits `max_width`.
///
/// Text that already fits is returned unchanged. Otherwise characters are
/// stripped from the end while `text + "..."` is still too wide. If even the
/// bare ellipsis is wider than `max_width` the result is `"..."`.
pub fn truncate_with_ellipsis<F>(text: &str, max_width: f32, measure: F) -> String
where
    F: Fn(&str) -> f32,
{
    if measure(text) <= max_width {
        return text.to_string();
    }

    let mut kept = text.to_string();
    while !kept.is_empty() && measure(&format!("{kept}{ELLIPSIS}")) > max_width {
        kept.pop();
    }
    kept.push_str(ELLIPSIS);
    kept
}

/// Greedy character wrap.
///
/// Characters accumulate into a line until the next one would make it wider
/// than `max_width`; that character then starts a new line. A single
/// character wider than `max_width` still gets a line of its own.
pub fn wrap_chars<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut line = String::new();

    for ch in text.chars() {
        line.push(ch);
        if line.chars().count() > 1 && measure(&line) > max_width {
            line.pop();
            lines.push(std::mem::take(&mut line));
            line.push(ch);
        }
    }
    lines.push(line);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 10 units per ASCII character, 20 per anything wider.
    #[allow(clippy::cast_precision_loss)]
    fn measure(s: &str) -> f32 {
        s.chars()
            .map(|c| if c.is_ascii() { 10.0 } else { 20.0 })
            .sum()
    }

    #[test]
    fn truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("short", 30), "short");
        assert_eq!(truncate_chars("abcdef", 6), "abcdef");
        assert_eq!(truncate_chars("abcdefg", 6), "abcdef...");
        assert_eq!(truncate_chars("北京市东城区东华门街道", 4), "北京市东...");
    }

    #[test]
    fn ellipsis_leaves_fitting_text_alone() {
        assert_eq!(truncate_with_ellipsis("Acme", 40.0, measure), "Acme");
    }

    #[test]
    fn ellipsis_result_fits_max_width() {
        let out = truncate_with_ellipsis("某某科技有限公司", 100.0, measure);
        assert_eq!(out, "某某科...");
        assert!(measure(&out) <= 100.0);

        let out = truncate_with_ellipsis("Globex Corporation", 95.0, measure);
        assert_eq!(out, "Globex...");
        assert!(measure(&out) <= 95.0);
    }

    #[test]
    fn ellipsis_with_no_room_degrades_to_bare_ellipsis() {
        assert_eq!(truncate_with_ellipsis("abcdef", 5.0, measure), "...");
    }

    #[test]
    fn wrap_breaks_before_overflowing_character() {
        let lines = wrap_chars("abcdefghij", 40.0, measure);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
        assert!(lines.iter().all(|l| measure(l) <= 40.0));
    }

    #[test]
    fn wrap_keeps_short_text_on_one_line() {
        assert_eq!(wrap_chars("abc", 40.0, measure), vec!["abc"]);
        assert_eq!(wrap_chars("", 40.0, measure), vec![""]);
    }

    #[test]
    fn wrap_gives_oversized_character_its_own_line() {
        assert_eq!(wrap_chars("北a", 15.0, measure), vec!["北", "a"]);
    }
}

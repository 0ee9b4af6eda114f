//! Text helpers shared by log previews and stored result previews.

/// Return the longest prefix of `s` holding at most `max_chars` characters.
///
/// Never splits a UTF-8 code point.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Owned preview of `s`: truncated to `max_chars` characters with a trailing
/// ellipsis when anything was cut.
#[must_use]
pub fn preview(s: &str, max_chars: usize) -> String {
    let cut = truncate_str(s, max_chars);
    if cut.len() < s.len() {
        format!("{cut}…")
    } else {
        cut.to_owned()
    }
}

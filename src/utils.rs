use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Non-whitespace control characters plus format characters (zero-width space,
    /// joiners, BOM) that survive copy/paste from parsed PDFs and spreadsheets.
    static ref INVISIBLE: Regex = Regex::new(r"[[\p{Cc}\p{Cf}]--\s]").expect("static regex");
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").expect("static regex");
}


#[inline]
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}


#[inline]
pub fn safe_truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}


/// Canonical form of a node identifier: invisible characters removed, whitespace
/// runs collapsed to one space, ends trimmed. Applied on write and on every lookup.
pub fn normalize_id(raw: &str) -> String {
    let visible = INVISIBLE.replace_all(raw, "");
    WHITESPACE_RUN.replace_all(visible.trim(), " ").to_string()
}

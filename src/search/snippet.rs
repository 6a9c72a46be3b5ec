//! Result excerpts.
//!
//! Two tiers: a window around the first literal match in the body text with the
//! match wrapped in `<mark>`, or a plain truncated preview when there is no match
//! location. Output is always built from `body_text` and HTML-escaped.

use crate::diary::text::escape_html;
use crate::search::index::{fold_case, fold_char};

pub const CONTEXT_CHARS: usize = 40;
pub const PREVIEW_CHARS: usize = 160;
pub const ELLIPSIS: &str = "...";
pub const MARK_OPEN: &str = "<mark>";
pub const MARK_CLOSE: &str = "</mark>";

pub fn snippet(title: &str, body_text: &str, query: Option<&str>) -> String {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .and_then(|q| highlighted_excerpt(body_text, q))
        .unwrap_or_else(|| preview(title, body_text))
}

/// Tier 1: `None` when `query` does not occur in `body_text`.
pub fn highlighted_excerpt(body_text: &str, query: &str) -> Option<String> {
    let chars: Vec<char> = body_text.chars().collect();
    let (start, end) = find_case_insensitive(&chars, query)?;

    let from = start.saturating_sub(CONTEXT_CHARS);
    let to = (end + CONTEXT_CHARS).min(chars.len());

    let before: String = chars[from..start].iter().collect();
    let matched: String = chars[start..end].iter().collect();
    let after: String = chars[end..to].iter().collect();

    let mut out = String::new();
    if from > 0 {
        out.push_str(ELLIPSIS);
    }
    out.push_str(&escape_html(&before));
    out.push_str(MARK_OPEN);
    out.push_str(&escape_html(&matched));
    out.push_str(MARK_CLOSE);
    out.push_str(&escape_html(&after));
    if to < chars.len() {
        out.push_str(ELLIPSIS);
    }
    Some(out)
}

/// Tier 2: leading characters of the body, or the title when the body is empty.
pub fn preview(title: &str, body_text: &str) -> String {
    if body_text.trim().is_empty() {
        return escape_html(title);
    }
    let mut chars = body_text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    let mut out = escape_html(&head);
    if chars.next().is_some() {
        out.push_str(ELLIPSIS);
    }
    out
}

/// Char range `[start, end)` of the first case-insensitive occurrence of `needle`.
///
/// Folding may expand a char into several, so the haystack is folded char by
/// char while remembering which original char each folded one came from.
fn find_case_insensitive(haystack: &[char], needle: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = fold_case(needle).chars().collect();
    if needle.is_empty() {
        return None;
    }

    let mut lowered = Vec::with_capacity(haystack.len());
    let mut origin = Vec::with_capacity(haystack.len());
    for (i, c) in haystack.iter().enumerate() {
        for lc in fold_char(*c) {
            lowered.push(lc);
            origin.push(i);
        }
    }

    lowered
        .windows(needle.len())
        .position(|w| w == needle.as_slice())
        .map(|pos| (origin[pos], origin[pos + needle.len() - 1] + 1))
}

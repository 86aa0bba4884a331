//! Payload location — finding candidate JSON substrings in raw model text.
//!
//! Model replies mix prose, think blocks, markdown fences, and the actual
//! payload. [`find_candidates`] scans the cleaned text and yields every
//! suspected JSON span, leftmost first. An empty result is the normal
//! "no payload yet" condition, handled by the caller.

use std::sync::Arc;

/// Candidate-matching rule for [`find_candidates`].
///
/// The default looks at fenced ```json blocks first, then every outermost
/// balanced `{...}` / `[...]` span, and finally the whole trimmed text when
/// it parses as JSON on its own (a bare scalar reply has no brackets to
/// find). A custom rule replaces candidate discovery entirely.
#[derive(Clone, Default)]
pub enum MatchPattern {
    /// Fenced ```json blocks, then balanced bracket spans.
    #[default]
    Default,
    /// Caller-supplied matcher: receives the cleaned text, returns
    /// candidates in the order they should be tried.
    Custom(Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>),
}

impl std::fmt::Debug for MatchPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchPattern::Default => write!(f, "MatchPattern::Default"),
            MatchPattern::Custom(_) => write!(f, "MatchPattern::Custom(..)"),
        }
    }
}

/// Scan raw model text for candidate JSON payload strings.
///
/// The text is preprocessed first (think blocks stripped, whitespace
/// trimmed). Returns all matches in order of appearance; an empty vec when
/// nothing looks like a payload.
pub fn find_candidates(text: &str, pattern: &MatchPattern) -> Vec<String> {
    let cleaned = preprocess(text);
    match pattern {
        MatchPattern::Default => default_candidates(&cleaned),
        MatchPattern::Custom(f) => f(&cleaned),
    }
}

/// Strip `<think>`/`<thinking>` blocks and trim whitespace.
pub fn preprocess(text: &str) -> String {
    let mut result = strip_tag_variant(text, "<think>", "</think>");
    result = strip_tag_variant(&result, "<thinking>", "</thinking>");
    result.trim().to_string()
}

fn strip_tag_variant(text: &str, open: &str, close: &str) -> String {
    let mut result = text.to_string();
    while let Some(start) = result.find(open) {
        if let Some(end_offset) = result[start..].find(close) {
            let end = start + end_offset + close.len();
            result = format!("{}{}", &result[..start], &result[end..]);
        } else {
            // No closing tag — strip from open tag to end
            result = result[..start].to_string();
            break;
        }
    }
    result
}

fn default_candidates(cleaned: &str) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    let push_unique = |candidates: &mut Vec<String>, s: &str| {
        let s = s.trim();
        if !s.is_empty() && !candidates.iter().any(|c| c == s) {
            candidates.push(s.to_string());
        }
    };

    for block in fenced_json_blocks(cleaned) {
        push_unique(&mut candidates, block);
    }
    for span in balanced_spans(cleaned) {
        push_unique(&mut candidates, span);
    }
    // A reply that is one bare JSON value (`300`, `"hello"`, `true`) has no
    // brackets for the span scan to latch onto.
    if serde_json::from_str::<serde_json::Value>(cleaned.trim()).is_ok() {
        push_unique(&mut candidates, cleaned);
    }
    candidates
}

/// Collect the contents of every `` ```json `` fenced block, in order.
fn fenced_json_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut search_from = 0;
    while let Some(fence_start) = text[search_from..].find("```") {
        let after_backticks = search_from + fence_start + 3;
        let Some(line_end) = text[after_backticks..].find('\n') else {
            break;
        };
        let lang = text[after_backticks..after_backticks + line_end].trim();
        let content_start = after_backticks + line_end + 1;

        if let Some(close_offset) = text[content_start..].find("```") {
            if lang.eq_ignore_ascii_case("json") {
                blocks.push(text[content_start..content_start + close_offset].trim());
            }
            search_from = content_start + close_offset + 3;
        } else {
            break;
        }
    }
    blocks
}

/// Collect every outermost balanced `{...}` or `[...]` span, in order of
/// appearance. Nesting-aware and string-aware: brackets inside JSON string
/// literals do not count.
fn balanced_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut scan_from = 0;

    while scan_from < text.len() {
        let Some(offset) = text[scan_from..].find(['{', '[']) else {
            break;
        };
        let start = scan_from + offset;
        let open = text[start..].chars().next().unwrap_or('{');
        let close = if open == '{' { '}' } else { ']' };

        let mut depth = 0;
        let mut in_string = false;
        let mut escape_next = false;
        let mut found_end = None;

        for (i, ch) in text[start..].char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }
            if ch == '\\' && in_string {
                escape_next = true;
                continue;
            }
            if ch == '"' {
                in_string = !in_string;
                continue;
            }
            if in_string {
                continue;
            }
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth -= 1;
                if depth == 0 {
                    found_end = Some(start + i);
                    break;
                }
            }
        }

        if let Some(end) = found_end {
            spans.push(&text[start..=end]);
            scan_from = end + 1;
        } else {
            break;
        }
    }

    spans
}

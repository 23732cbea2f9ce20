//! Text surgery used by the extraction cascade.
//!
//! The scanners here track JSON string state so that braces, commas and
//! newlines inside string values (usually source code) are never touched.

use once_cell::sync::Lazy;
use regex::Regex;

static JSON_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```json[ \t]*\r?\n?(.*?)```").unwrap());

static DESCRIPTION_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""description"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());

/// Slice from the first `{` to the last `}` inclusive
pub(crate) fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Full cleaning pass: fences, trailing commas, raw control characters in strings
pub(crate) fn clean(text: &str) -> String {
    repair_json(text)
}

/// Length of the fence marker (three backticks and an optional `json` tag) at `idx`, or 0
fn fence_len(chars: &[char], idx: usize) -> usize {
    if !chars[idx..].starts_with(&['`', '`', '`']) {
        return 0;
    }
    let tag: String = chars[idx + 3..].iter().take(4).collect();
    if tag.eq_ignore_ascii_case("json") {
        7
    } else {
        3
    }
}

/// Single pass over almost-JSON text.
///
/// Outside strings: drops code fence markers, drops commas that directly
/// precede `}` or `]` and collapses runs of blank lines. Inside strings:
/// escapes raw newlines, carriage returns, tabs and other control
/// characters. String contents are otherwise copied untouched.
pub(crate) fn repair_json(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut idx = 0;

    while idx < chars.len() {
        let c = chars[idx];
        idx += 1;

        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
            continue;
        }

        match c {
            '`' => match fence_len(&chars, idx - 1) {
                0 => out.push(c),
                len => idx += len - 1,
            },
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[idx..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            '\n' => {
                if !out
                    .trim_end_matches(|ch: char| ch == ' ' || ch == '\t' || ch == '\r')
                    .ends_with('\n')
                {
                    out.push(c);
                }
            }
            c => out.push(c),
        }
    }

    out
}

/// Bodies of every ```json fenced block, largest first
pub(crate) fn json_fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks: Vec<&str> = JSON_FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|body| !body.is_empty())
        .collect();
    blocks.sort_by_key(|body| std::cmp::Reverse(body.len()));
    blocks
}

/// Every balanced top-level `{...}` span, longest first.
///
/// Quotes are only tracked once inside an object, so apostrophes and quotes
/// in surrounding prose do not confuse the scan. An object left open at the
/// end of the text (a truncated response) yields nothing.
pub(crate) fn balanced_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = idx;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=idx]);
                }
            }
            _ => {}
        }
    }

    spans.sort_by_key(|span| std::cmp::Reverse(span.len()));
    spans
}

/// Text of the first `"description": "..."` field, unescaped when possible
pub(crate) fn description_field(text: &str) -> Option<String> {
    let raw = DESCRIPTION_FIELD.captures(text)?.get(1)?.as_str();
    let quoted = format!("\"{}\"", raw);
    Some(serde_json::from_str::<String>(&quoted).unwrap_or_else(|_| raw.to_string()))
}

//! Parsing utilities for LLM responses.
//!
//! LLM output that should be JSON frequently arrives wrapped in markdown
//! code fences or surrounded by commentary. `parse_llm_json` tries, in
//! order: fence stripping + direct parse, then the first balanced JSON
//! object or array found anywhere in the content.

use serde_json::Value;

/// Strip a surrounding markdown code fence (with optional language tag).
pub fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```") {
        // Drop the first line (the fence and optional language tag).
        cleaned = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest,
        };
    }
    if let Some(rest) = cleaned.trim_end().strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// Parse JSON out of an LLM response.
///
/// Returns `None` when no valid JSON object or array can be found.
pub fn parse_llm_json(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }

    let cleaned = strip_code_fences(text);

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Some(value);
    }

    // Fall back to the first balanced object/array embedded in the text.
    extract_balanced(cleaned, '{', '}')
        .or_else(|| extract_balanced(cleaned, '[', ']'))
        .and_then(|fragment| serde_json::from_str(fragment).ok())
}

/// Find the first balanced `open..close` fragment, respecting strings.
fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

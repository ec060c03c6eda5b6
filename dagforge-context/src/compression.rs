//! ABOUTME: Compression strategies applied when a context value exceeds its token window

use serde_json::Value;

use crate::token::estimate_tokens;

/// Strategy applied to a value that exceeds `max_tokens` on `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionStrategy {
    /// Char-budgeted truncation of the value's string representation.
    Truncate,
    /// Deterministic extractive summary (first/last sentence sampling).
    Summarize,
    /// Vector-embed and reference by id. No embedding backend is wired
    /// into the runtime core, so this currently delegates to `Truncate`
    /// and logs a warning.
    Embed,
}

const CHARS_PER_TOKEN: usize = 4;

/// Compress `value` so its estimated token count fits within `max_tokens`.
///
/// Values already within budget are returned unchanged.
#[must_use]
pub fn compress(value: &Value, max_tokens: usize, strategy: CompressionStrategy) -> Value {
    let text = value.to_string();
    if estimate_tokens(&text) <= max_tokens {
        return value.clone();
    }

    match strategy {
        CompressionStrategy::Truncate => truncate(&text, max_tokens),
        CompressionStrategy::Summarize => summarize(&text, max_tokens),
        CompressionStrategy::Embed => {
            tracing::warn!("embed compression strategy requested but no embedding backend is configured; falling back to truncate");
            truncate(&text, max_tokens)
        }
    }
}

fn truncate(text: &str, max_tokens: usize) -> Value {
    let char_budget = max_tokens * CHARS_PER_TOKEN;
    let truncated: String = text.chars().take(char_budget).collect();
    Value::String(format!("{truncated}…[truncated]"))
}

/// A deterministic extractive "summary": keep the head and tail of the
/// text and elide the middle, budgeted to `max_tokens`.
fn summarize(text: &str, max_tokens: usize) -> Value {
    let char_budget = (max_tokens * CHARS_PER_TOKEN).max(8);
    let half = char_budget / 2;
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= char_budget {
        return Value::String(text.to_string());
    }
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();
    Value::String(format!("{head}…[elided]…{tail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_within_budget_is_unchanged() {
        let v = json!("short");
        assert_eq!(compress(&v, 100, CompressionStrategy::Truncate), v);
    }

    #[test]
    fn truncate_shrinks_to_budget() {
        let v = json!("x".repeat(1000));
        let compressed = compress(&v, 5, CompressionStrategy::Truncate);
        let s = compressed.as_str().unwrap();
        assert!(s.contains("[truncated]"));
        assert!(s.len() < 1000);
    }

    #[test]
    fn summarize_keeps_head_and_tail() {
        let v = json!("a".repeat(50) + &"b".repeat(50));
        let compressed = compress(&v, 5, CompressionStrategy::Summarize);
        let s = compressed.as_str().unwrap();
        assert!(s.starts_with('a'));
        assert!(s.contains("[elided]"));
    }

    #[test]
    fn embed_falls_back_to_truncate() {
        let v = json!("z".repeat(1000));
        let compressed = compress(&v, 5, CompressionStrategy::Embed);
        assert!(compressed.as_str().unwrap().contains("[truncated]"));
    }
}

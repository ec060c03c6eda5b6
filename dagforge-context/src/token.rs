//! ABOUTME: Token counting for the context store's window enforcement
//! ABOUTME: Falls back to a 4-chars-per-token heuristic when no tokenizer is wired

/// Characters per token in the absence of a real tokenizer.
const CHARS_PER_TOKEN: usize = 4;

/// Count tokens in serialized JSON text using the fallback heuristic.
///
/// A real tokenizer can be substituted by the host; the runtime core only
/// guarantees this estimate, which is deliberately crude but stable and
/// allocation-free for every value shape the store sees.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN).max(if text.is_empty() { 0 } else { 1 })
}

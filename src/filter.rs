//! Relevance filter for retrieved chunks.
//!
//! Bibliography pages score well against almost any question because they
//! are dense with topical terms. Chunks that look like reference lists are
//! dropped before the prompt is built.

use crate::models::RetrievalResult;

/// `true` when the chunk looks like bibliography noise.
///
/// Matching is case-insensitive. A chunk mentioning "references" is kept if
/// it also mentions "vulnerability"; any chunk with a `doi.org` link is
/// dropped.
pub fn is_noise(text: &str) -> bool {
    let lower = text.to_lowercase();
    (lower.contains("references") && !lower.contains("vulnerability")) || lower.contains("doi.org")
}

/// Keep the first `limit` non-noise results, in ranked order.
///
/// If every result is noise, the unfiltered ranking is used instead.
pub fn select_context(results: Vec<RetrievalResult>, limit: usize) -> Vec<RetrievalResult> {
    let (kept, dropped): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| !is_noise(&r.text));

    let mut selected = if kept.is_empty() {
        if !dropped.is_empty() {
            tracing::debug!(
                dropped = dropped.len(),
                "every result filtered as noise; using unfiltered ranking"
            );
        }
        dropped
    } else {
        kept
    };

    selected.truncate(limit);
    selected
}

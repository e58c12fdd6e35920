//! Keyword-overlap relevance scoring.

use ava_core::Memory;
use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "your", "all", "any", "can", "had", "her",
    "was", "one", "our", "out", "has", "have", "him", "his", "how", "its", "let", "she", "that",
    "this", "with", "what", "when", "where", "who", "why", "will", "would", "there", "their",
    "them", "then", "than", "been", "from", "into", "about", "just", "like", "some", "very",
];

/// Lowercased content words of at least three characters.
pub fn keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Overlap between the query keywords and a memory. Theme matches count double.
pub fn score(query: &HashSet<String>, memory: &Memory) -> usize {
    if query.is_empty() {
        return 0;
    }
    let content = keywords(&memory.content);
    let content_hits = query.intersection(&content).count();
    let theme_hits = memory
        .themes
        .iter()
        .filter(|t| query.contains(&t.to_lowercase()))
        .count();
    content_hits + 2 * theme_hits
}

/// Indices of the `limit` most relevant memories, best first.
/// Ties go to higher importance, then to the more recent memory.
pub fn rank(query: &str, memories: &[Memory], limit: usize) -> Vec<usize> {
    let query = keywords(query);
    let mut scored: Vec<(usize, usize)> = memories
        .iter()
        .enumerate()
        .map(|(i, m)| (i, score(&query, m)))
        .filter(|(_, s)| *s > 0)
        .collect();

    scored.sort_by(|(ia, sa), (ib, sb)| {
        let (a, b) = (&memories[*ia], &memories[*ib]);
        sb.cmp(sa)
            .then(b.importance.total_cmp(&a.importance))
            .then(b.created_at.cmp(&a.created_at))
    });
    scored.truncate(limit);
    scored.into_iter().map(|(i, _)| i).collect()
}

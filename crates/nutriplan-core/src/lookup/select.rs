//! Candidate disambiguation for knowledge-base search results.

use std::sync::LazyLock;

use regex::Regex;

static FOOD_NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)Alimentos\s*\(por 100 gramos\):\s*(.+)").ok());

/// Food name a document declares on its `Alimentos (por 100 gramos):` line.
pub fn declared_food_name(document: &str) -> Option<&str> {
    FOOD_NAME_RE
        .as_ref()?
        .captures(document)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// Similarity in `[0, 1]` between two strings: twice the number of matched
/// characters over the total length, matching blocks found by repeatedly
/// taking the longest common substring.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(&a, &b) as f64 / total as f64
}

fn matched_chars(a: &[char], b: &[char]) -> usize {
    let (start_a, start_b, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matched_chars(&a[..start_a], &b[..start_b])
        + matched_chars(&a[start_a + len..], &b[start_b + len..])
}

fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut row = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                row[j + 1] = prev[j] + 1;
                if row[j + 1] > best.2 {
                    best = (i + 1 - row[j + 1], j + 1 - row[j + 1], row[j + 1]);
                }
            }
        }
        prev = row;
    }
    best
}

/// Index of the candidate whose declared food name is closest to `query`.
///
/// Candidates without a declared name are skipped; when none declares one
/// (or the list is empty) the first candidate wins. Returns `None` only for
/// an empty list.
pub fn select_best_candidate(query: &str, candidates: &[String]) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    let query = query.to_lowercase();
    let mut best: Option<(usize, f64)> = None;
    for (i, doc) in candidates.iter().enumerate() {
        let Some(name) = declared_food_name(doc) else {
            continue;
        };
        let ratio = similarity_ratio(&name.to_lowercase(), &query);
        if best.is_none_or(|(_, r)| ratio > r) {
            best = Some((i, ratio));
        }
    }
    Some(best.map_or(0, |(i, _)| i))
}

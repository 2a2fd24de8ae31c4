//! Deterministic task fingerprinting.
//!
//! A fingerprint is the (full hash, normalized hash, keyword set) triple
//! computed from a task description and its file list. The full hash is
//! sensitive to surface form; the normalized hash survives case,
//! punctuation, and word-order changes. Keywords feed the prior-art
//! searches and the local similarity estimate.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Words carrying no task-identity signal. Dropped during normalization
/// and keyword extraction. Must stay sorted: lookup is a binary search.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "did", "do", "does", "for",
    "from", "had", "has", "have", "if", "in", "into", "is", "it", "its", "may", "not", "of", "on",
    "or", "our", "so", "that", "the", "their", "then", "there", "these", "this", "those", "to",
    "was", "were", "what", "when", "will", "with", "you", "your",
];

const FILE_SECTION_MARKER: &str = "\n---files---\n";

/// Minimum token length for a keyword. Shorter tokens are noise unless
/// they carry a `.` or `_` (path or identifier fragments).
const MIN_KEYWORD_LEN: usize = 3;

/// Tokens longer than this rank as priority keywords for query building.
const PRIORITY_LEN: usize = 5;

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Hex-encoded SHA-256 over the raw description + sorted file list.
    pub full_hash: String,
    /// Hex-encoded SHA-256 over the normalized form of the same input.
    pub normalized_hash: String,
    /// Significant description tokens, deduplicated and sorted.
    pub keywords: Vec<String>,
}

impl Fingerprint {
    /// First `len` characters of the normalized hash, used as the
    /// store's similarity-bucket key.
    pub fn normalized_prefix(&self, len: usize) -> &str {
        let end = len.min(self.normalized_hash.len());
        &self.normalized_hash[..end]
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compute the fingerprint of a task.
///
/// Both hashes are pure functions of `(description, sorted(files))`:
/// file ordering never affects the result. Keywords are drawn from the
/// description only, never from file paths.
pub fn fingerprint(description: &str, files: &[String]) -> Fingerprint {
    let mut sorted_files: Vec<&str> = files.iter().map(String::as_str).collect();
    sorted_files.sort_unstable();

    let input = format!(
        "{}{}{}",
        description,
        FILE_SECTION_MARKER,
        sorted_files.join("\n")
    );

    Fingerprint {
        full_hash: sha256_hex(&input),
        normalized_hash: sha256_hex(&normalize(&input)),
        keywords: extract_keywords(description),
    }
}

/// Canonicalize text for order-insensitive hashing: lowercase, replace
/// every non-alphanumeric rune with a space, drop stop-words, sort the
/// surviving tokens, and rejoin with single spaces.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut tokens: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| !is_stop_word(w))
        .collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Extract significant keywords from a task description.
///
/// Tokens are lowercased and trimmed of edge punctuation; interior `.`
/// and `_` survive so path- and identifier-like tokens (`auth.go`,
/// `user_service`) stay intact. A token qualifies when it carries `.`
/// or `_`, or is at least three characters and not a stop-word.
pub fn extract_keywords(description: &str) -> Vec<String> {
    let lower = description.to_lowercase();
    let mut keywords: Vec<String> = Vec::new();

    for raw in lower.split_whitespace() {
        let token = raw.trim_matches(|c: char| !c.is_alphanumeric());
        if token.is_empty() {
            continue;
        }

        let significant = token.contains(['.', '_'])
            || (token.chars().count() >= MIN_KEYWORD_LEN && !is_stop_word(token));
        if significant {
            keywords.push(token.to_string());
        }
    }

    keywords.sort_unstable();
    keywords.dedup();
    keywords
}

/// Rank keywords for external query building and take the first `n`.
///
/// Path- or identifier-like tokens come first, then tokens longer than
/// five characters, then the rest; ties keep lexicographic order.
pub fn priority_keywords(keywords: &[String], n: usize) -> Vec<String> {
    let mut ranked: Vec<&String> = keywords.iter().collect();
    ranked.sort_by_key(|k| {
        let file_like = k.contains(['.', '_']);
        let long = k.chars().count() > PRIORITY_LEN;
        (
            std::cmp::Reverse(file_like),
            std::cmp::Reverse(long),
        )
    });
    ranked.into_iter().take(n).cloned().collect()
}

/// Intersection-over-union of two keyword sets.
///
/// Defined as 1.0 when both sets are empty and 0.0 when exactly one is.
/// Symmetric for all inputs.
pub fn jaccard_similarity(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Local, no-I/O similarity estimate between two fingerprints.
///
/// Equal full hashes or equal normalized hashes both mean "same task"
/// (the latter despite surface differences) and score 1.0; otherwise
/// the keyword Jaccard similarity is a cheap approximation. This never
/// calls an external scorer.
pub fn compare_tasks(a: &Fingerprint, b: &Fingerprint) -> f64 {
    if a.full_hash == b.full_hash || a.normalized_hash == b.normalized_hash {
        return 1.0;
    }
    jaccard_similarity(&a.keywords, &b.keywords)
}

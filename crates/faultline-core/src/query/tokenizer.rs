//! Keyword extraction from issue text.
//!
//! Candidates come from quoted substrings, identifier-shaped tokens, and
//! `...Error`/`...Exception`/`...Warning` names. Every candidate is lowercased
//! and split on punctuation so each returned keyword is a literal substring of
//! the lowercased input.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::query::guards::MIN_KEYWORD_LENGTH;

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"`([^`\n]{1,120})`|"([^"\n]{1,120})"|'([^'\n]{1,120})'"#).unwrap());

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z_][a-zA-Z0-9_.]{2,}").unwrap());

static EXCEPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][A-Za-z0-9]*(?:Error|Exception|Warning)\b").unwrap());

static SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_]+").unwrap());

const STOPWORDS: &[&str] = &[
    // generic English
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "his", "how", "its", "may", "new", "now", "old", "see",
    "two", "way", "who", "did", "get", "got", "let", "put", "say", "she", "too", "use", "used",
    "using", "that", "this", "with", "from", "they", "will", "would", "there", "their", "what",
    "when", "where", "which", "while", "about", "after", "before", "should", "could", "been",
    "being", "into", "than", "then", "them", "these", "those", "some", "such", "only", "also",
    "just", "like", "more", "most", "other", "over", "same", "very", "does", "doesn", "don",
    "isn", "wasn", "aren", "here", "each", "because", "instead", "expected", "actual",
    "behavior", "behaviour", "issue", "problem", "example", "following", "currently", "seems",
    "however", "thanks", "please", "still", "even", "make", "makes", "made", "work", "works",
    "working", "case", "cases", "want", "need", "needs", "happen", "happens", "correct",
    "incorrect", "wrong", "way", "why", "yes", "without", "within", "between", "through",
    // programming generic
    "def", "class", "self", "cls", "return", "returns", "none", "null", "nil", "true", "false",
    "import", "function", "method", "var", "const", "int", "str", "string", "bool", "list",
    "dict", "type", "value", "values", "object", "code", "file", "files", "line", "lines",
    "error", "errors", "exception", "warning", "traceback", "call", "calls", "called", "args",
    "kwargs", "param", "params", "test", "tests", "bug", "fix", "raise", "raises", "raised",
    "python", "version", "http", "https", "www", "com", "github", "org",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

fn push_parts(candidate: &str, out: &mut Vec<String>) {
    let lowered = candidate.to_lowercase();
    for part in SPLIT_RE.split(&lowered) {
        if part.len() < MIN_KEYWORD_LENGTH {
            continue;
        }
        if part.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if is_stopword(part) {
            continue;
        }
        out.push(part.to_string());
    }
}

/// Extract up to `limit` ranked, unique keywords from `text`.
///
/// Ranking is frequency (across all candidate sources) descending, then
/// length descending, then lexicographic for a stable order.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    if text.trim().is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut tokens: Vec<String> = Vec::new();
    for caps in QUOTED_RE.captures_iter(text) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
            push_parts(m.as_str(), &mut tokens);
        }
    }
    for m in IDENTIFIER_RE.find_iter(text) {
        push_parts(m.as_str(), &mut tokens);
    }
    for m in EXCEPTION_RE.find_iter(text) {
        push_parts(m.as_str(), &mut tokens);
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| b.0.len().cmp(&a.0.len()))
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.into_iter().take(limit).map(|(t, _)| t).collect()
}

/// Split arbitrary text into lowercase identifier tokens (no filtering).
pub fn identifier_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

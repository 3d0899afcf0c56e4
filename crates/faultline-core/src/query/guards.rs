//! Shared guardrails for localization caps and text bounds.

// Query extraction
pub const DEFAULT_MAX_KEYWORDS: usize = 16;
pub const MAX_KEYWORDS: usize = 64;
pub const MIN_KEYWORD_LENGTH: usize = 3;

// Candidate collection
pub const DEFAULT_MAX_CANDIDATE_FILES: usize = 2000;
pub const MAX_CANDIDATE_FILES: usize = 50_000;
pub const DEFAULT_MAX_FILE_BYTES: u64 = 500 * 1024;
pub const MAX_FILE_BYTES: u64 = 16 * 1024 * 1024;
pub const DEFAULT_MAX_HITS_PER_KEYWORD: usize = 10;
pub const MIN_HITS_PER_KEYWORD: usize = 8;
pub const MAX_HITS_PER_KEYWORD: usize = 12;
pub const MAX_SAMPLES_PER_FILE: usize = 6;
pub const MAX_PREVIEW_CHARS: usize = 200;

// Lexical and structural stages
pub const DEFAULT_LEXICAL_TOP_K: usize = 20;
pub const MAX_LEXICAL_TOP_K: usize = 200;
pub const DEFAULT_STRUCTURAL_FILES: usize = 8;
pub const MAX_STRUCTURAL_FILES: usize = 64;
pub const DEFAULT_MAX_SYMBOLS_PER_FILE: usize = 10;
pub const MAX_SYMBOLS_PER_FILE: usize = 200;
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 5_000;
pub const MAX_TOOL_TIMEOUT_MS: u64 = 60_000;

// Centrality
pub const DEFAULT_PAGERANK_ITERATIONS: usize = 20;
pub const MAX_PAGERANK_ITERATIONS: usize = 200;
pub const DEFAULT_DAMPING: f64 = 0.85;

// Prompt rendering
pub const DEFAULT_PROMPT_FILES: usize = 5;
pub const DEFAULT_PROMPT_SYMBOLS: usize = 8;
pub const MAX_PROMPT_ITEMS: usize = 50;

// LLM reranking
pub const MAX_RERANK_RESULTS: usize = 5;
pub const DEFAULT_LLM_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_ISSUE_CHARS: usize = 4_000;
pub const MAX_LLM_TIMEOUT_MS: u64 = 300_000;

pub fn clamp_int(value: i64, minimum: i64, maximum: i64) -> i64 {
    value.max(minimum).min(maximum)
}

pub fn clamp_limit(value: usize, maximum: usize) -> usize {
    clamp_int(value as i64, 1, maximum as i64) as usize
}

pub fn clamp_range(value: usize, minimum: usize, maximum: usize) -> usize {
    clamp_int(value as i64, minimum as i64, maximum as i64) as usize
}

pub fn clamp_millis(value: u64, maximum: u64) -> u64 {
    value.clamp(1, maximum)
}

/// Trim and cut `text` to at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let stripped = text.trim();
    match stripped.char_indices().nth(max_chars) {
        Some((byte_index, _)) => stripped[..byte_index].to_string(),
        None => stripped.to_string(),
    }
}

/// Parse a boolean-ish environment flag, returning `None` when unset.
pub fn env_flag(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let v = val.trim().to_lowercase();
    if matches!(v.as_str(), "0" | "false" | "no" | "off") {
        Some(false)
    } else if matches!(v.as_str(), "1" | "true" | "yes" | "on") {
        Some(true)
    } else {
        None
    }
}

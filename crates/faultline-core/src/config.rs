//! Tunable caps for a localization call.
//!
//! Every field has a default, so callers may deserialize partial JSON.
//! `from_env` layers `FAULTLINE_*` overrides on top of the defaults.

use serde::{Deserialize, Serialize};

use crate::query::guards::{
    clamp_limit, clamp_millis, clamp_range, env_flag, DEFAULT_DAMPING, DEFAULT_LEXICAL_TOP_K,
    DEFAULT_LLM_TIMEOUT_MS, DEFAULT_MAX_CANDIDATE_FILES, DEFAULT_MAX_FILE_BYTES,
    DEFAULT_MAX_HITS_PER_KEYWORD, DEFAULT_MAX_ISSUE_CHARS, DEFAULT_MAX_KEYWORDS,
    DEFAULT_MAX_SYMBOLS_PER_FILE, DEFAULT_PAGERANK_ITERATIONS, DEFAULT_PROMPT_FILES,
    DEFAULT_PROMPT_SYMBOLS, DEFAULT_STRUCTURAL_FILES, DEFAULT_TOOL_TIMEOUT_MS, MAX_CANDIDATE_FILES,
    MAX_FILE_BYTES, MAX_HITS_PER_KEYWORD, MAX_KEYWORDS, MAX_LEXICAL_TOP_K, MAX_LLM_TIMEOUT_MS,
    MAX_PAGERANK_ITERATIONS, MAX_PROMPT_ITEMS, MAX_STRUCTURAL_FILES, MAX_SYMBOLS_PER_FILE,
    MAX_TOOL_TIMEOUT_MS, MIN_HITS_PER_KEYWORD,
};

pub const DEFAULT_STRUCTURAL_TOOL: &str = "tree-sitter";

/// Chat-completion endpoint used by the optional reranker.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub max_issue_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            model: String::new(),
            api_key: None,
            timeout_ms: DEFAULT_LLM_TIMEOUT_MS,
            max_issue_chars: DEFAULT_MAX_ISSUE_CHARS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalizeConfig {
    pub max_keywords: usize,
    pub max_candidate_files: usize,
    pub max_file_bytes: u64,
    pub max_hits_per_keyword: usize,
    pub lexical_top_k: usize,
    pub structural_files: usize,
    pub max_symbols_per_file: usize,
    pub prompt_files: usize,
    pub prompt_symbols: usize,
    pub pagerank_iterations: usize,
    pub damping: f64,
    pub structural_tool: String,
    /// `Some(_)` replaces the capability probe.
    pub structural_tool_available: Option<bool>,
    pub tool_timeout_ms: u64,
    pub llm: Option<LlmConfig>,
}

impl Default for LocalizeConfig {
    fn default() -> Self {
        Self {
            max_keywords: DEFAULT_MAX_KEYWORDS,
            max_candidate_files: DEFAULT_MAX_CANDIDATE_FILES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_hits_per_keyword: DEFAULT_MAX_HITS_PER_KEYWORD,
            lexical_top_k: DEFAULT_LEXICAL_TOP_K,
            structural_files: DEFAULT_STRUCTURAL_FILES,
            max_symbols_per_file: DEFAULT_MAX_SYMBOLS_PER_FILE,
            prompt_files: DEFAULT_PROMPT_FILES,
            prompt_symbols: DEFAULT_PROMPT_SYMBOLS,
            pagerank_iterations: DEFAULT_PAGERANK_ITERATIONS,
            damping: DEFAULT_DAMPING,
            structural_tool: DEFAULT_STRUCTURAL_TOOL.to_string(),
            structural_tool_available: None,
            tool_timeout_ms: DEFAULT_TOOL_TIMEOUT_MS,
            llm: None,
        }
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn env_string(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl LocalizeConfig {
    /// Defaults overlaid with `FAULTLINE_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_number("FAULTLINE_MAX_FILES") {
            config.max_candidate_files = v;
        }
        if let Some(v) = env_number("FAULTLINE_MAX_FILE_BYTES") {
            config.max_file_bytes = v;
        }
        if let Some(v) = env_number("FAULTLINE_TOP_K") {
            config.lexical_top_k = v;
        }
        if let Some(v) = env_number("FAULTLINE_STRUCTURAL_FILES") {
            config.structural_files = v;
        }
        if let Some(v) = env_number("FAULTLINE_MAX_SYMBOLS") {
            config.max_symbols_per_file = v;
        }
        if let Some(v) = env_string("FAULTLINE_STRUCTURAL_TOOL") {
            config.structural_tool = v;
        }
        if let Some(v) = env_flag("FAULTLINE_STRUCTURAL") {
            config.structural_tool_available = Some(v);
        }
        if let Some(v) = env_number("FAULTLINE_TOOL_TIMEOUT_MS") {
            config.tool_timeout_ms = v;
        }
        if let (Some(endpoint), Some(model)) = (
            env_string("FAULTLINE_LLM_ENDPOINT"),
            env_string("FAULTLINE_LLM_MODEL"),
        ) {
            config.llm = Some(LlmConfig {
                endpoint,
                model,
                api_key: env_string("FAULTLINE_LLM_API_KEY"),
                ..LlmConfig::default()
            });
        }
        config.clamped()
    }

    /// Parse a (possibly partial) JSON config document.
    pub fn from_json(raw: &str) -> crate::errors::FaultlineResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        Ok(config.clamped())
    }

    /// Force every cap into its guarded range.
    pub fn clamped(mut self) -> Self {
        self.max_keywords = clamp_limit(self.max_keywords, MAX_KEYWORDS);
        self.max_candidate_files = clamp_limit(self.max_candidate_files, MAX_CANDIDATE_FILES);
        self.max_file_bytes = self.max_file_bytes.clamp(1, MAX_FILE_BYTES);
        self.max_hits_per_keyword = clamp_range(
            self.max_hits_per_keyword,
            MIN_HITS_PER_KEYWORD,
            MAX_HITS_PER_KEYWORD,
        );
        self.lexical_top_k = clamp_limit(self.lexical_top_k, MAX_LEXICAL_TOP_K);
        self.structural_files = clamp_limit(self.structural_files, MAX_STRUCTURAL_FILES);
        self.max_symbols_per_file = clamp_limit(self.max_symbols_per_file, MAX_SYMBOLS_PER_FILE);
        self.prompt_files = clamp_limit(self.prompt_files, MAX_PROMPT_ITEMS);
        self.prompt_symbols = clamp_limit(self.prompt_symbols, MAX_PROMPT_ITEMS);
        self.pagerank_iterations = clamp_limit(self.pagerank_iterations, MAX_PAGERANK_ITERATIONS);
        if !(self.damping > 0.0 && self.damping < 1.0) {
            self.damping = DEFAULT_DAMPING;
        }
        self.tool_timeout_ms = clamp_millis(self.tool_timeout_ms, MAX_TOOL_TIMEOUT_MS);
        if let Some(llm) = self.llm.as_mut() {
            llm.timeout_ms = clamp_millis(llm.timeout_ms, MAX_LLM_TIMEOUT_MS);
            llm.max_issue_chars = llm.max_issue_chars.max(1);
        }
        self
    }
}

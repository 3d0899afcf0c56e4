//! Shared typed models used across collection, graph, and ranking stages.
//!
//! Everything here is built fresh per localization call and serialized
//! into the [`RankingResult`] handed back to the caller.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Method identifiers
// ---------------------------------------------------------------------------

pub const METHOD_ID: &str = "bm25-refgraph-pagerank-v1";
pub const METHOD_ID_RERANKED: &str = "bm25-refgraph-pagerank-v1+llm-rerank";

// ---------------------------------------------------------------------------
// 1. Request
// ---------------------------------------------------------------------------

/// Inputs of one localization call. Ground truth never appears here.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizeRequest {
    pub repo_root: PathBuf,
    pub issue_text: String,
    #[serde(default)]
    pub hint: Option<String>,
}

impl LocalizeRequest {
    pub fn new(repo_root: impl Into<PathBuf>, issue_text: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            issue_text: issue_text.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Issue text followed by the hint, if any.
    pub fn query_text(&self) -> String {
        match self.hint.as_deref().map(str::trim) {
            Some(hint) if !hint.is_empty() => format!("{}\n{}", self.issue_text, hint),
            _ => self.issue_text.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Candidate files
// ---------------------------------------------------------------------------

/// One keyword hit kept as context for a candidate file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleLine {
    pub query: String,
    pub line: usize,
    pub preview: String,
}

/// A file selected by the collector and scored by the lexical ranker.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFile {
    pub path: String,
    pub hit_count: usize,
    pub sample_lines: Vec<SampleLine>,
    /// Identifier-token count of the file.
    pub length: usize,
    pub term_frequencies: BTreeMap<String, usize>,
    pub lexical_score: f64,
}

// ---------------------------------------------------------------------------
// 3. Symbols
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Symbol,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Symbol => "symbol",
        }
    }

    /// Map a tag-tool kind label onto the closed kind set.
    pub fn from_tag_kind(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "function" | "func" | "def" | "fn" | "f" => SymbolKind::Function,
            "method" | "member" | "m" => SymbolKind::Method,
            "class" | "struct" | "interface" | "trait" | "enum" | "type" | "module" | "c" => {
                SymbolKind::Class
            }
            _ => SymbolKind::Symbol,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolSource {
    Structural,
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub id: String,
    pub file_path: String,
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based.
    pub line: usize,
    /// 1-based.
    pub column: usize,
    pub source: SymbolSource,
    /// Trimmed text of the declaration line.
    pub declaration: String,
}

/// Derive a deterministic symbol id from its location and extraction index.
pub fn symbol_id(file_path: &str, name: &str, line: usize, index: usize) -> String {
    let key = format!("{file_path}:{name}:{line}:{index}");
    format!("s{index:04}-{:08x}", crc32fast::hash(key.as_bytes()))
}

// ---------------------------------------------------------------------------
// 4. Reference graph
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    IntraFile,
    CrossFile,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub file_path: String,
    pub name: String,
    pub centrality: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<ReferenceEdge>,
}

// ---------------------------------------------------------------------------
// 5. Scores and ranked output
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolScores {
    pub fault_score: f64,
    pub graph_score: f64,
    pub keyword_proximity: f64,
    pub rank: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSymbol {
    pub symbol: Symbol,
    pub scores: SymbolScores,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedFile {
    pub path: String,
    pub rank: f64,
    pub fault_score: f64,
    pub best_symbol_rank: f64,
    pub lexical_score: f64,
    pub hit_count: usize,
    pub symbol_count: usize,
}

/// Read-only output of one localization call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingResult {
    pub engine: String,
    pub method_id: String,
    pub keywords: Vec<String>,
    pub top_files: Vec<RankedFile>,
    pub top_symbols: Vec<RankedSymbol>,
    pub graph: GraphSummary,
    /// `Some` only when an LLM rerank was attempted and succeeded.
    pub reranked_files: Option<Vec<String>>,
    pub target_files: Vec<String>,
    pub report: String,
}

impl RankingResult {
    pub fn to_json(&self) -> crate::errors::FaultlineResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

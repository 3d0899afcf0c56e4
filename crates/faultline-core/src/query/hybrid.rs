//! Multi-signal fusion of lexical, centrality, and keyword-proximity scores.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;

use crate::models::{CandidateFile, RankedFile, RankedSymbol, Symbol, SymbolScores};
use crate::query::tokenizer::identifier_tokens;

pub const FAULT_WEIGHT: f64 = 0.45;
pub const GRAPH_WEIGHT: f64 = 0.35;
pub const PROXIMITY_WEIGHT: f64 = 0.20;

pub const FILE_BEST_SYMBOL_WEIGHT: f64 = 0.6;
pub const FILE_FAULT_WEIGHT: f64 = 0.4;

const MAX_KEYWORD_TOKENS: usize = 32;
const PROXIMITY_DENOMINATOR_CAP: usize = 6;
const MIN_TOKEN_LENGTH: usize = 3;

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Lexical score of each candidate divided by the maximum among them.
pub fn fault_scores(candidates: &[CandidateFile]) -> IndexMap<String, f64> {
    let max = candidates
        .iter()
        .map(|c| c.lexical_score)
        .fold(0.0_f64, f64::max);
    candidates
        .iter()
        .map(|c| {
            let score = if max > 0.0 { c.lexical_score / max } else { 0.0 };
            (c.path.clone(), score)
        })
        .collect()
}

/// Tokens from the sample previews, then the basename, in first-seen order.
pub fn keyword_token_set(candidate: &CandidateFile) -> Vec<String> {
    let basename = Path::new(&candidate.path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    let texts = candidate
        .sample_lines
        .iter()
        .map(|s| s.preview.as_str())
        .chain(std::iter::once(basename.as_str()));
    for text in texts {
        for token in identifier_tokens(text) {
            if tokens.len() >= MAX_KEYWORD_TOKENS {
                return tokens;
            }
            if token.chars().count() >= MIN_TOKEN_LENGTH && seen.insert(token.clone()) {
                tokens.push(token);
            }
        }
    }
    tokens
}

/// Share of `tokens` found in the symbol's name or declaration.
///
/// The denominator is `min(len, 6)`, so a handful of matches saturates the
/// signal in files with many tokens.
pub fn keyword_proximity(tokens: &[String], symbol: &Symbol) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let name = symbol.name.to_lowercase();
    let declaration = symbol.declaration.to_lowercase();
    let matched = tokens
        .iter()
        .filter(|t| name.contains(t.as_str()) || declaration.contains(t.as_str()))
        .count();
    let denominator = tokens.len().min(PROXIMITY_DENOMINATOR_CAP) as f64;
    (matched as f64 / denominator).min(1.0)
}

/// Fuse signals into ordered file and symbol rankings.
///
/// `centrality` holds normalized scores keyed by symbol id; symbols missing
/// from it get a graph score of zero.
pub fn fuse_rankings(
    candidates: &[CandidateFile],
    symbols: &[Symbol],
    centrality: &IndexMap<String, f64>,
) -> (Vec<RankedFile>, Vec<RankedSymbol>) {
    let faults = fault_scores(candidates);
    let token_sets: IndexMap<&str, Vec<String>> = candidates
        .iter()
        .map(|c| (c.path.as_str(), keyword_token_set(c)))
        .collect();

    let mut ranked_symbols: Vec<RankedSymbol> = symbols
        .iter()
        .map(|symbol| {
            let fault_score = faults.get(&symbol.file_path).copied().unwrap_or(0.0);
            let graph_score = centrality.get(&symbol.id).copied().unwrap_or(0.0);
            let keyword_proximity = token_sets
                .get(symbol.file_path.as_str())
                .map_or(0.0, |tokens| keyword_proximity(tokens, symbol));
            let rank = FAULT_WEIGHT * fault_score
                + GRAPH_WEIGHT * graph_score
                + PROXIMITY_WEIGHT * keyword_proximity;
            RankedSymbol {
                symbol: symbol.clone(),
                scores: SymbolScores {
                    fault_score,
                    graph_score,
                    keyword_proximity,
                    rank,
                },
            }
        })
        .collect();

    ranked_symbols.sort_by(|a, b| {
        desc(a.scores.rank, b.scores.rank)
            .then_with(|| a.symbol.file_path.cmp(&b.symbol.file_path))
            .then_with(|| a.symbol.line.cmp(&b.symbol.line))
            .then_with(|| a.symbol.id.cmp(&b.symbol.id))
    });

    let mut best: IndexMap<&str, (f64, usize)> = IndexMap::new();
    for ranked in &ranked_symbols {
        let entry = best
            .entry(ranked.symbol.file_path.as_str())
            .or_insert((f64::MIN, 0));
        entry.0 = entry.0.max(ranked.scores.rank);
        entry.1 += 1;
    }

    let mut ranked_files: Vec<RankedFile> = candidates
        .iter()
        .map(|candidate| {
            let fault_score = faults.get(&candidate.path).copied().unwrap_or(0.0);
            let (best_symbol_rank, symbol_count, rank) = match best.get(candidate.path.as_str()) {
                Some(&(best_rank, count)) => (
                    best_rank,
                    count,
                    FILE_BEST_SYMBOL_WEIGHT * best_rank + FILE_FAULT_WEIGHT * fault_score,
                ),
                None => (0.0, 0, 0.0),
            };
            RankedFile {
                path: candidate.path.clone(),
                rank,
                fault_score,
                best_symbol_rank,
                lexical_score: candidate.lexical_score,
                hit_count: candidate.hit_count,
                symbol_count,
            }
        })
        .collect();

    ranked_files.sort_by(|a, b| {
        desc(a.rank, b.rank)
            .then_with(|| desc(a.lexical_score, b.lexical_score))
            .then_with(|| b.hit_count.cmp(&a.hit_count))
            .then_with(|| a.path.cmp(&b.path))
    });

    (ranked_files, ranked_symbols)
}

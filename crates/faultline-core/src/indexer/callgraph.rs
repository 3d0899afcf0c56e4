//! Reference graph construction between extracted symbols.
//!
//! Each symbol owns a segment of its file: from its declaration line up to
//! the line before the next symbol in the same file (or EOF). A symbol
//! references another when the other's name appears as a whole token in that
//! segment. Matching is textual and case-insensitive, so the graph is an
//! approximation of the call graph that needs no parser.

use indexmap::IndexMap;

use crate::models::{EdgeKind, ReferenceEdge, Symbol};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const INTRA_FILE_WEIGHT: f64 = 1.0;
pub const CROSS_FILE_WEIGHT: f64 = 1.2;
const MIN_REFERENCE_NAME_LENGTH: usize = 3;

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// Inclusive 1-based line range owned by a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
}

/// Compute the segment of every symbol in one file.
///
/// `members` are indices into `symbols` for a single file. The result is
/// keyed by the same indices.
fn file_segments(
    symbols: &[Symbol],
    members: &[usize],
    total_lines: usize,
) -> Vec<(usize, Segment)> {
    let mut ordered = members.to_vec();
    ordered.sort_by(|&a, &b| symbols[a].line.cmp(&symbols[b].line).then_with(|| a.cmp(&b)));

    let mut out = Vec::with_capacity(ordered.len());
    for (pos, &idx) in ordered.iter().enumerate() {
        let start = symbols[idx].line.clamp(1, total_lines.max(1));
        let raw_end = match ordered.get(pos + 1) {
            Some(&next) => symbols[next].line.saturating_sub(1),
            None => total_lines,
        };
        let end = raw_end.min(total_lines).max(start);
        out.push((idx, Segment { start, end }));
    }
    out
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Count non-overlapping whole-token occurrences of `needle` in `haystack`.
/// Both are expected to be lowercased already.
pub fn count_token_matches(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut from = 0;
    while let Some(offset) = haystack[from..].find(needle) {
        let start = from + offset;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !is_token_char(c));
        let after_ok = haystack[end..].chars().next().is_none_or(|c| !is_token_char(c));
        if before_ok && after_ok {
            count += 1;
            from = end;
        } else {
            // step past the first char of this occurrence
            from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
        }
    }
    count
}

// ---------------------------------------------------------------------------
// Edge construction
// ---------------------------------------------------------------------------

/// Build weighted reference edges between `symbols`.
///
/// `sources` maps a file path to its text; symbols whose file is missing
/// from it own no segment and only act as reference targets.
pub fn build_reference_edges(
    symbols: &[Symbol],
    sources: &IndexMap<String, String>,
) -> Vec<ReferenceEdge> {
    let mut by_file: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (idx, symbol) in symbols.iter().enumerate() {
        by_file.entry(symbol.file_path.as_str()).or_default().push(idx);
    }

    let targets: Vec<(usize, String)> = symbols
        .iter()
        .enumerate()
        .filter(|(_, s)| s.name.chars().count() >= MIN_REFERENCE_NAME_LENGTH)
        .map(|(idx, s)| (idx, s.name.to_lowercase()))
        .collect();

    let mut accumulated: IndexMap<(usize, usize), f64> = IndexMap::new();

    for (file_path, members) in &by_file {
        let Some(text) = sources.get(*file_path) else {
            continue;
        };
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            continue;
        }

        for (from, segment) in file_segments(symbols, members, lines.len()) {
            let body = lines[segment.start - 1..segment.end].join("\n").to_lowercase();
            for (to, name) in &targets {
                if *to == from {
                    continue;
                }
                let matches = count_token_matches(&body, name);
                if matches == 0 {
                    continue;
                }
                let weight = if symbols[*to].file_path == symbols[from].file_path {
                    INTRA_FILE_WEIGHT
                } else {
                    CROSS_FILE_WEIGHT
                };
                *accumulated.entry((from, *to)).or_insert(0.0) += weight * matches as f64;
            }
        }
    }

    accumulated
        .into_iter()
        .map(|((from, to), weight)| ReferenceEdge {
            from: symbols[from].id.clone(),
            to: symbols[to].id.clone(),
            kind: if symbols[from].file_path == symbols[to].file_path {
                EdgeKind::IntraFile
            } else {
                EdgeKind::CrossFile
            },
            weight,
        })
        .collect()
}

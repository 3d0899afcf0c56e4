//! Plain-text rendering of a ranking, suitable for prompting or logs.

use std::fmt::Write;

use crate::models::{RankedFile, RankedSymbol};

pub struct ReportInput<'a> {
    pub method_id: &'a str,
    pub engine: &'a str,
    pub keywords: &'a [String],
    pub files: &'a [RankedFile],
    pub symbols: &'a [RankedSymbol],
    pub target_files: &'a [String],
}

pub fn render_report(input: &ReportInput<'_>, max_files: usize, max_symbols: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "method: {}", input.method_id);
    let _ = writeln!(out, "engine: {}", input.engine);
    if input.keywords.is_empty() {
        let _ = writeln!(out, "keywords: (none)");
    } else {
        let _ = writeln!(out, "keywords: {}", input.keywords.join(", "));
    }

    let _ = writeln!(out, "\ntop files:");
    if input.files.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for (i, file) in input.files.iter().take(max_files).enumerate() {
        let _ = writeln!(
            out,
            "  {}. {} rank={:.3} fault={:.3} lexical={:.3} hits={} symbols={}",
            i + 1,
            file.path,
            file.rank,
            file.fault_score,
            file.lexical_score,
            file.hit_count,
            file.symbol_count,
        );
    }

    let _ = writeln!(out, "\ntop symbols:");
    if input.symbols.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for (i, ranked) in input.symbols.iter().take(max_symbols).enumerate() {
        let s = &ranked.symbol;
        let _ = writeln!(
            out,
            "  {}. {} {} {}:{} rank={:.3} fault={:.3} graph={:.3} proximity={:.3}",
            i + 1,
            s.kind.as_str(),
            s.name,
            s.file_path,
            s.line,
            ranked.scores.rank,
            ranked.scores.fault_score,
            ranked.scores.graph_score,
            ranked.scores.keyword_proximity,
        );
    }

    if !input.target_files.is_empty() {
        let _ = writeln!(out, "\ntarget files:");
        for path in input.target_files {
            let _ = writeln!(out, "  - {path}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{symbol_id, Symbol, SymbolKind, SymbolScores, SymbolSource, METHOD_ID};

    fn file(path: &str, rank: f64) -> RankedFile {
        RankedFile {
            path: path.to_string(),
            rank,
            fault_score: 1.0,
            best_symbol_rank: rank,
            lexical_score: 3.5,
            hit_count: 2,
            symbol_count: 1,
        }
    }

    #[test]
    fn renders_sections_and_limits() {
        let files = vec![file("src/router.py", 0.9), file("src/views.py", 0.5)];
        let symbols = vec![RankedSymbol {
            symbol: Symbol {
                id: symbol_id("src/router.py", "translate_url", 1, 0),
                file_path: "src/router.py".to_string(),
                name: "translate_url".to_string(),
                kind: SymbolKind::Function,
                line: 1,
                column: 5,
                source: SymbolSource::Fallback,
                declaration: "def translate_url(url):".to_string(),
            },
            scores: SymbolScores {
                fault_score: 1.0,
                graph_score: 1.0,
                keyword_proximity: 0.5,
                rank: 0.9,
            },
        }];
        let keywords = vec!["translate_url".to_string()];
        let targets = vec!["src/router.py".to_string()];
        let report = render_report(
            &ReportInput {
                method_id: METHOD_ID,
                engine: "fallback-regex",
                keywords: &keywords,
                files: &files,
                symbols: &symbols,
                target_files: &targets,
            },
            1,
            8,
        );
        assert!(report.contains("method: bm25-refgraph-pagerank-v1"));
        assert!(report.contains("engine: fallback-regex"));
        assert!(report.contains("1. src/router.py rank=0.900"));
        assert!(!report.contains("src/views.py"));
        assert!(report.contains("function translate_url src/router.py:1"));
        assert!(report.contains("  - src/router.py"));
    }

    #[test]
    fn empty_ranking_renders_placeholders() {
        let report = render_report(
            &ReportInput {
                method_id: METHOD_ID,
                engine: "structural",
                keywords: &[],
                files: &[],
                symbols: &[],
                target_files: &[],
            },
            5,
            8,
        );
        assert!(report.contains("keywords: (none)"));
        assert_eq!(report.matches("(none)").count(), 3);
    }
}

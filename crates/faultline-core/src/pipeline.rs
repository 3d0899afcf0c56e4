//! End-to-end localization: keywords, lexical candidates, symbols, reference
//! graph, centrality, fusion, and the optional LLM rerank.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::LocalizeConfig;
use crate::errors::FaultlineResult;
use crate::indexer::callgraph::build_reference_edges;
use crate::indexer::filesystem::{
    collect_hits, detect_language, iter_repo_files, read_text, scan_files,
};
use crate::indexer::pagerank::compute_centrality;
use crate::indexer::symbols::{ExtractedSymbol, SymbolExtractor};
use crate::models::{
    symbol_id, CandidateFile, GraphNode, GraphSummary, LocalizeRequest, RankedFile,
    RankingResult, ReferenceEdge, Symbol, METHOD_ID, METHOD_ID_RERANKED,
};
use crate::query::guards::MAX_RERANK_RESULTS;
use crate::query::hybrid::fuse_rankings;
use crate::query::report::{render_report, ReportInput};
use crate::query::rerank::{LlmReranker, Reranker};
use crate::query::search::rank_candidates;
use crate::query::tokenizer::extract_keywords;

/// Extract symbols from the top candidate source files.
///
/// Returns the symbols with global ids plus the text of every file that was
/// read, keyed by relative path.
fn extract_candidate_symbols(
    request: &LocalizeRequest,
    candidates: &[CandidateFile],
    extractor: &SymbolExtractor,
    config: &LocalizeConfig,
) -> (Vec<Symbol>, IndexMap<String, String>) {
    let selected: Vec<&CandidateFile> = candidates
        .iter()
        .filter(|c| detect_language(&c.path).is_some())
        .take(config.structural_files)
        .collect();

    let per_file: Vec<(String, String, Vec<ExtractedSymbol>)> = selected
        .par_iter()
        .filter_map(|candidate| {
            let absolute = request.repo_root.join(&candidate.path);
            let Some(text) = read_text(&absolute) else {
                debug!(path = %candidate.path, "candidate unreadable at extraction time");
                return None;
            };
            let extracted = extractor.extract(&absolute, &text, config.max_symbols_per_file);
            Some((candidate.path.clone(), text, extracted))
        })
        .collect();

    let mut symbols = Vec::new();
    let mut sources = IndexMap::new();
    for (path, text, extracted) in per_file {
        let lines: Vec<&str> = text.lines().collect();
        for item in extracted {
            let index = symbols.len();
            let declaration = lines
                .get(item.line.saturating_sub(1))
                .map(|l| l.trim().to_string())
                .unwrap_or_default();
            symbols.push(Symbol {
                id: symbol_id(&path, &item.name, item.line, index),
                file_path: path.clone(),
                name: item.name,
                kind: item.kind,
                line: item.line,
                column: item.column,
                source: item.source,
                declaration,
            });
        }
        sources.insert(path, text);
    }
    (symbols, sources)
}

fn top_paths<'a>(paths: impl Iterator<Item = &'a str>) -> Vec<String> {
    paths.take(MAX_RERANK_RESULTS).map(str::to_string).collect()
}

fn graph_summary(
    symbols: &[Symbol],
    centrality: &IndexMap<String, f64>,
    edges: Vec<ReferenceEdge>,
) -> GraphSummary {
    GraphSummary {
        nodes: symbols
            .iter()
            .map(|s| GraphNode {
                id: s.id.clone(),
                file_path: s.file_path.clone(),
                name: s.name.clone(),
                centrality: centrality.get(&s.id).copied().unwrap_or(0.0),
            })
            .collect(),
        edges,
    }
}

/// Keep reranked paths that name a candidate, first occurrence only.
/// `None` when nothing survives.
fn retain_candidates(paths: Vec<String>, candidates: &[CandidateFile]) -> Option<Vec<String>> {
    let mut kept: Vec<String> = Vec::new();
    for path in paths {
        if kept.contains(&path) {
            continue;
        }
        if candidates.iter().any(|c| c.path == path) {
            kept.push(path);
        } else {
            debug!(path = %path, "dropping reranked path outside candidates");
        }
    }
    if kept.is_empty() {
        None
    } else {
        Some(kept)
    }
}

/// Choose target files: the LLM answer when present, the lexical top
/// when an LLM was configured but gave nothing, the fused top otherwise.
fn select_targets(
    reranked: Option<&Vec<String>>,
    llm_configured: bool,
    candidates: &[CandidateFile],
    files: &[RankedFile],
) -> Vec<String> {
    match reranked {
        Some(paths) => paths.clone(),
        None if llm_configured => top_paths(candidates.iter().map(|c| c.path.as_str())),
        None => top_paths(files.iter().map(|f| f.path.as_str())),
    }
}

/// Rank files and symbols of `request.repo_root` by their likelihood of
/// needing a change to resolve `request.issue_text`.
///
/// Only an unreadable repository root is an error; every other failure
/// degrades to a smaller or empty ranking.
pub fn localize(request: &LocalizeRequest, config: &LocalizeConfig) -> FaultlineResult<RankingResult> {
    let started = Instant::now();
    let config = config.clone().clamped();

    let extractor = SymbolExtractor::probe(
        &config.structural_tool,
        Duration::from_millis(config.tool_timeout_ms),
        config.structural_tool_available,
    );
    let query = request.query_text();
    let keywords = extract_keywords(&query, config.max_keywords);
    info!(
        repo = %request.repo_root.display(),
        engine = extractor.name(),
        keywords = keywords.len(),
        "localize start"
    );

    let files = iter_repo_files(
        &request.repo_root,
        config.max_candidate_files,
        config.max_file_bytes,
    )?;
    let scans = scan_files(&files, &keywords, config.max_hits_per_keyword);
    let hits = collect_hits(&scans, &keywords, config.max_hits_per_keyword);
    let candidates = rank_candidates(&scans, &hits, &keywords, &query, config.lexical_top_k);
    debug!(
        walked = files.len(),
        scanned = scans.len(),
        candidates = candidates.len(),
        "lexical stage done"
    );

    let (symbols, sources) = extract_candidate_symbols(request, &candidates, &extractor, &config);
    let edges = build_reference_edges(&symbols, &sources);
    let node_ids: Vec<String> = symbols.iter().map(|s| s.id.clone()).collect();
    let centrality = compute_centrality(&node_ids, &edges, config.pagerank_iterations, config.damping);
    debug!(symbols = symbols.len(), edges = edges.len(), "graph stage done");

    let (top_files, top_symbols) = fuse_rankings(&candidates, &symbols, &centrality);

    let reranked = match (&config.llm, candidates.is_empty()) {
        (Some(llm), false) => match LlmReranker::new(llm.clone()) {
            Ok(reranker) => {
                let paths: Vec<String> = candidates.iter().map(|c| c.path.clone()).collect();
                reranker
                    .rerank(&query, &paths)
                    .and_then(|ranked| retain_candidates(ranked, &candidates))
            }
            Err(e) => {
                warn!(error = %e, "llm reranker unavailable");
                None
            }
        },
        _ => None,
    };
    let target_files = select_targets(
        reranked.as_ref(),
        config.llm.is_some(),
        &candidates,
        &top_files,
    );
    let method_id = if reranked.is_some() {
        METHOD_ID_RERANKED
    } else {
        METHOD_ID
    };

    let report = render_report(
        &ReportInput {
            method_id,
            engine: extractor.name(),
            keywords: &keywords,
            files: &top_files,
            symbols: &top_symbols,
            target_files: &target_files,
        },
        config.prompt_files,
        config.prompt_symbols,
    );

    info!(
        files = top_files.len(),
        symbols = top_symbols.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "localize done"
    );

    Ok(RankingResult {
        engine: extractor.name().to_string(),
        method_id: method_id.to_string(),
        keywords,
        top_files,
        top_symbols,
        graph: graph_summary(&symbols, &centrality, edges),
        reranked_files: reranked,
        target_files,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::errors::FaultlineError;
    use crate::query::rerank::tests::{chat_body, serve_once};
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn offline_config() -> LocalizeConfig {
        LocalizeConfig {
            structural_tool_available: Some(false),
            ..LocalizeConfig::default()
        }
    }

    const ISSUE: &str =
        "translate_url() creates an incorrect URL when optional named groups are missing";

    fn router_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "src/router.py",
            "def translate_url(url):\n    return url\n\n\
             def reverse_helper(name):\n    return translate_url(name)\n\n\
             def unrelated_boilerplate():\n    return 42\n",
        );
        write(
            dir.path(),
            "src/views.py",
            "from router import translate_url\n\n\
             def render_link(name):\n    return translate_url(name)\n",
        );
        write(
            dir.path(),
            "src/settings.py",
            "DEBUG = True\n\ndef load_settings():\n    return {}\n",
        );
        write(
            dir.path(),
            "tests/test_router.py",
            "def test_translate_url():\n    assert translate_url('x') == translate_url('x')\n",
        );
        dir
    }

    #[test]
    fn localizes_translate_url() {
        let dir = router_repo();
        let request = LocalizeRequest::new(dir.path(), ISSUE);
        let result = localize(&request, &offline_config()).unwrap();

        assert_eq!(result.engine, "fallback-regex");
        assert_eq!(result.method_id, METHOD_ID);
        assert!(result.keywords.contains(&"translate_url".to_string()));
        assert_eq!(result.top_files[0].path, "src/router.py");
        assert_eq!(result.top_symbols[0].symbol.name, "translate_url");
        assert_eq!(result.target_files[0], "src/router.py");
        assert!(result.reranked_files.is_none());
        assert!(result.top_files.iter().all(|f| !f.path.starts_with("tests/")));
        assert!(result.report.contains("src/router.py"));
    }

    #[test]
    fn callers_and_callee_outrank_boilerplate_in_graph() {
        let dir = router_repo();
        let result = localize(&LocalizeRequest::new(dir.path(), ISSUE), &offline_config()).unwrap();
        let centrality = |name: &str| {
            result
                .graph
                .nodes
                .iter()
                .find(|n| n.name == name)
                .map(|n| n.centrality)
                .unwrap()
        };
        assert_eq!(centrality("translate_url"), 1.0);
        assert!(centrality("translate_url") > centrality("unrelated_boilerplate"));
        assert!(centrality("render_link") >= centrality("unrelated_boilerplate"));
        assert!(result
            .graph
            .nodes
            .iter()
            .all(|n| (0.0..=1.0).contains(&n.centrality)));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let dir = router_repo();
        let request = LocalizeRequest::new(dir.path(), ISSUE);
        let first = localize(&request, &offline_config()).unwrap().to_json().unwrap();
        let second = localize(&request, &offline_config()).unwrap().to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn source_file_beats_documentation() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "src/fields.py",
            "class DecimalField:\n    def to_python(self, value):\n        return float(value)\n",
        );
        write(
            dir.path(),
            "docs/fields.md",
            "DecimalField docs.\nDecimalField.to_python converts.\nDecimalField to_python \
             DecimalField to_python DecimalField to_python.\n",
        );
        let request = LocalizeRequest::new(
            dir.path(),
            "DecimalField.to_python() raises TypeError for dictionary input",
        );
        let result = localize(&request, &offline_config()).unwrap();
        assert_eq!(result.top_files[0].path, "src/fields.py");
        let docs = result
            .top_files
            .iter()
            .find(|f| f.path == "docs/fields.md")
            .unwrap();
        assert_eq!(docs.rank, 0.0);
        assert_eq!(docs.symbol_count, 0);
    }

    #[test]
    fn unreadable_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = localize(&LocalizeRequest::new(&missing, ISSUE), &offline_config()).unwrap_err();
        assert!(matches!(err, FaultlineError::RepoUnreadable { .. }));
    }

    #[test]
    fn no_candidates_yields_empty_ranking() {
        let dir = router_repo();
        let request = LocalizeRequest::new(dir.path(), "kaleidoscope zeppelin");
        let result = localize(&request, &offline_config()).unwrap();
        assert!(result.top_files.is_empty());
        assert!(result.top_symbols.is_empty());
        assert!(result.target_files.is_empty());
        assert!(result.graph.nodes.is_empty());
    }

    #[test]
    fn hint_contributes_keywords() {
        let dir = router_repo();
        let request = LocalizeRequest::new(dir.path(), "kaleidoscope").with_hint("load_settings");
        let result = localize(&request, &offline_config()).unwrap();
        assert_eq!(result.top_files[0].path, "src/settings.py");
    }

    #[test]
    fn llm_failure_falls_back_to_lexical_top() {
        let dir = router_repo();
        let config = LocalizeConfig {
            llm: Some(LlmConfig {
                endpoint: "http://127.0.0.1:1/v1/chat/completions".to_string(),
                model: "m".to_string(),
                timeout_ms: 2_000,
                ..LlmConfig::default()
            }),
            ..offline_config()
        };
        let result = localize(&LocalizeRequest::new(dir.path(), ISSUE), &config).unwrap();
        assert!(result.reranked_files.is_none());
        assert_eq!(result.method_id, METHOD_ID);
        assert_eq!(result.target_files, lexical_top(&result));
    }

    fn lexical_top(result: &RankingResult) -> Vec<String> {
        let mut lexical = result.top_files.clone();
        lexical.sort_by(|a, b| {
            b.lexical_score
                .partial_cmp(&a.lexical_score)
                .unwrap()
                .then_with(|| a.path.cmp(&b.path))
        });
        lexical.iter().take(5).map(|f| f.path.clone()).collect()
    }

    fn llm_config(endpoint: String) -> LocalizeConfig {
        LocalizeConfig {
            llm: Some(LlmConfig {
                endpoint,
                model: "m".to_string(),
                timeout_ms: 5_000,
                ..LlmConfig::default()
            }),
            ..offline_config()
        }
    }

    #[test]
    fn llm_answer_becomes_targets() {
        let dir = router_repo();
        let endpoint = serve_once(
            "HTTP/1.1 200 OK",
            chat_body("Most likely: [\"src/views.py\", \"src/router.py\"] in that order."),
        );
        let result = localize(&LocalizeRequest::new(dir.path(), ISSUE), &llm_config(endpoint)).unwrap();
        assert_eq!(result.method_id, METHOD_ID_RERANKED);
        assert_eq!(
            result.reranked_files.as_deref(),
            Some(&["src/views.py".to_string(), "src/router.py".to_string()][..])
        );
        assert_eq!(Some(&result.target_files), result.reranked_files.as_ref());
        assert!(result.report.contains(METHOD_ID_RERANKED));
    }

    #[test]
    fn llm_paths_outside_candidates_are_dropped() {
        let dir = router_repo();
        let endpoint = serve_once(
            "HTTP/1.1 200 OK",
            chat_body("[\"src/ghost.py\", \"src/views.py\", \"src/views.py\"]"),
        );
        let result = localize(&LocalizeRequest::new(dir.path(), ISSUE), &llm_config(endpoint)).unwrap();
        assert_eq!(result.method_id, METHOD_ID_RERANKED);
        assert_eq!(result.target_files, vec!["src/views.py".to_string()]);
    }

    #[test]
    fn llm_answer_with_only_unknown_paths_falls_back() {
        let dir = router_repo();
        let endpoint = serve_once("HTTP/1.1 200 OK", chat_body("[\"src/ghost.py\"]"));
        let result = localize(&LocalizeRequest::new(dir.path(), ISSUE), &llm_config(endpoint)).unwrap();
        assert!(result.reranked_files.is_none());
        assert_eq!(result.method_id, METHOD_ID);
        assert_eq!(result.target_files, lexical_top(&result));
    }
}

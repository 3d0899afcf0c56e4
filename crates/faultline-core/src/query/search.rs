//! BM25 lexical ranking of candidate files with path-affinity bonuses.
//!
//! The IDF term is fixed at 1, so the ranking rewards term-frequency
//! saturation rather than rarity. Path bonuses are additive and uncapped.

use std::cmp::Ordering;
use std::path::Path;

use crate::indexer::filesystem::{FileScan, HitSummary};
use crate::models::CandidateFile;

pub const BM25_K1: f64 = 1.5;
pub const BM25_B: f64 = 0.75;

pub const PATH_CONTAINS_BONUS: f64 = 5.0;
pub const BASENAME_AFFINITY_BONUS: f64 = 3.0;
pub const SEGMENT_IN_ISSUE_BONUS: f64 = 2.0;
const MIN_SEGMENT_LENGTH: usize = 4;

/// BM25 contribution of one document, with idf = 1 for every term.
pub fn bm25_score(
    term_frequencies: impl IntoIterator<Item = usize>,
    doc_length: usize,
    avg_doc_length: f64,
) -> f64 {
    let avgdl = if avg_doc_length > 0.0 {
        avg_doc_length
    } else {
        1.0
    };
    let norm = BM25_K1 * (1.0 - BM25_B + BM25_B * doc_length as f64 / avgdl);
    term_frequencies
        .into_iter()
        .filter(|&f| f > 0)
        .map(|f| {
            let f = f as f64;
            (f * (BM25_K1 + 1.0)) / (f + norm)
        })
        .sum()
}

fn lowercase_basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Path-affinity bonus for `path` given the extracted identifiers and the
/// raw (case-preserved) issue text.
pub fn path_bonus(path: &str, identifiers: &[String], raw_issue: &str) -> f64 {
    let mut bonus = 0.0;
    let lowered = path.to_lowercase();

    if identifiers.iter().any(|id| lowered.contains(id.as_str())) {
        bonus += PATH_CONTAINS_BONUS;
    }

    let basename = lowercase_basename(path);
    if !basename.is_empty()
        && identifiers
            .iter()
            .any(|id| basename.contains(id.as_str()) || id.contains(basename.as_str()))
    {
        bonus += BASENAME_AFFINITY_BONUS;
    }

    for segment in path.split('/') {
        if segment.chars().count() >= MIN_SEGMENT_LENGTH && raw_issue.contains(segment) {
            bonus += SEGMENT_IN_ISSUE_BONUS;
        }
    }

    bonus
}

/// Score every scanned file and return the top `top_k` candidates.
///
/// `scans` and `hits` are parallel slices (walk order). A file is a
/// candidate when it contains a keyword token or earns a path bonus.
pub fn rank_candidates(
    scans: &[FileScan],
    hits: &[HitSummary],
    keywords: &[String],
    raw_issue: &str,
    top_k: usize,
) -> Vec<CandidateFile> {
    let mut candidates: Vec<(CandidateFile, f64)> = scans
        .iter()
        .zip(hits.iter())
        .filter_map(|(scan, hit)| {
            let bonus = path_bonus(&scan.rel_path, keywords, raw_issue);
            if scan.term_frequencies.is_empty() && bonus == 0.0 {
                return None;
            }
            Some((
                CandidateFile {
                    path: scan.rel_path.clone(),
                    hit_count: hit.hit_count,
                    sample_lines: hit.samples.clone(),
                    length: scan.length,
                    term_frequencies: scan.term_frequencies.clone(),
                    lexical_score: 0.0,
                },
                bonus,
            ))
        })
        .collect();

    if candidates.is_empty() {
        return Vec::new();
    }

    let avg_doc_length = candidates.iter().map(|(c, _)| c.length as f64).sum::<f64>()
        / candidates.len() as f64;

    for (candidate, bonus) in candidates.iter_mut() {
        let bm25 = bm25_score(
            candidate.term_frequencies.values().copied(),
            candidate.length,
            avg_doc_length,
        );
        candidate.lexical_score = bm25 + *bonus;
    }

    let mut ranked: Vec<CandidateFile> = candidates.into_iter().map(|(c, _)| c).collect();
    ranked.sort_by(|a, b| {
        b.lexical_score
            .partial_cmp(&a.lexical_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    ranked.truncate(top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::filesystem::{collect_hits, scan_source};

    fn kw(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bm25_matches_formula() {
        // f=2, |d|=avgdl: 2*2.5 / (2 + 1.5) = 1.428571...
        let score = bm25_score([2], 10, 10.0);
        assert!((score - 5.0 / 3.5).abs() < 1e-12);
    }

    #[test]
    fn bm25_saturates_with_frequency() {
        let low = bm25_score([1], 10, 10.0);
        let high = bm25_score([100], 10, 10.0);
        assert!(high > low);
        assert!(high < BM25_K1 + 1.0);
    }

    #[test]
    fn bm25_penalizes_long_documents() {
        assert!(bm25_score([3], 5, 10.0) > bm25_score([3], 50, 10.0));
    }

    #[test]
    fn bm25_zero_avgdl_uses_one() {
        let score = bm25_score([1], 0, 0.0);
        assert!(score.is_finite());
        assert!(score > 0.0);
    }

    #[test]
    fn path_bonus_components() {
        let ids = kw(&["router"]);
        // contains (+5), basename contains (+3), "router.py" in issue (+2), "src" too short
        let bonus = path_bonus("src/router.py", &ids, "bug in router.py");
        assert_eq!(bonus, 10.0);
    }

    #[test]
    fn path_bonus_mutual_substring() {
        let ids = kw(&["legacy_io.py_v2"]);
        // basename "io.py" is a substring of the identifier
        assert_eq!(path_bonus("pkg/io.py", &ids, ""), 3.0);
        // the extension keeps the basename out of longer identifiers
        let ids = kw(&["translate_url_helpers"]);
        assert_eq!(path_bonus("pkg/translate_url.py", &ids, ""), 0.0);
    }

    #[test]
    fn short_basename_earns_no_bonus() {
        let keywords = kw(&["translate_url", "groups"]);
        assert_eq!(path_bonus("src/at.py", &keywords, ""), 0.0);

        let scans = vec![
            scan_source("src/at.py", "x = 1\n", &keywords, 10),
            scan_source("src/views.py", "return translate_url(name)\n", &keywords, 10),
        ];
        let hits = collect_hits(&scans, &keywords, 10);
        let ranked = rank_candidates(&scans, &hits, &keywords, "", 20);
        let paths: Vec<&str> = ranked.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["src/views.py"]);
    }

    #[test]
    fn path_bonus_segments_are_case_sensitive_and_uncapped() {
        let ids = kw(&["zzz"]);
        let bonus = path_bonus("django/forms/django/x.py", &ids, "django forms");
        assert_eq!(bonus, 6.0);
        assert_eq!(path_bonus("Django/x.py", &ids, "django"), 0.0);
    }

    #[test]
    fn rank_candidates_orders_by_score_then_path() {
        let keywords = kw(&["alpha"]);
        let scans = vec![
            scan_source("m1.py", "alpha", &keywords, 10),
            scan_source("m0.py", "alpha", &keywords, 10),
            scan_source("m2.py", "alpha alpha alpha", &keywords, 10),
            scan_source("none.py", "nothing here", &keywords, 10),
        ];
        let hits = collect_hits(&scans, &keywords, 10);
        let ranked = rank_candidates(&scans, &hits, &keywords, "", 20);
        let paths: Vec<&str> = ranked.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["m2.py", "m0.py", "m1.py"]);
    }

    #[test]
    fn rank_candidates_truncates_to_top_k() {
        let keywords = kw(&["alpha"]);
        let scans: Vec<FileScan> = (0..5)
            .map(|i| scan_source(&format!("f{i}.py"), "alpha", &keywords, 10))
            .collect();
        let hits = collect_hits(&scans, &keywords, 10);
        assert_eq!(rank_candidates(&scans, &hits, &keywords, "", 2).len(), 2);
    }

    #[test]
    fn no_candidates_yields_empty() {
        let keywords = kw(&["alpha"]);
        let scans = vec![scan_source("x.py", "beta", &keywords, 10)];
        let hits = collect_hits(&scans, &keywords, 10);
        assert!(rank_candidates(&scans, &hits, &keywords, "", 20).is_empty());
    }
}

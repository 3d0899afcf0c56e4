//! Repository walking and keyword hit collection.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

use crate::errors::{FaultlineError, FaultlineResult};
use crate::models::SampleLine;
use crate::query::guards::{truncate_chars, MAX_PREVIEW_CHARS, MAX_SAMPLES_PER_FILE};
use crate::query::tokenizer::identifier_tokens;

const LANGUAGE_BY_EXTENSION: &[(&str, &str)] = &[
    (".py", "python"),
    (".pyi", "python"),
    (".java", "java"),
    (".kt", "kotlin"),
    (".cs", "csharp"),
    (".ts", "typescript"),
    (".tsx", "typescript"),
    (".js", "javascript"),
    (".jsx", "javascript"),
    (".mjs", "javascript"),
    (".go", "go"),
    (".rs", "rust"),
    (".rb", "ruby"),
    (".php", "php"),
    (".c", "c"),
    (".h", "c"),
    (".cc", "cpp"),
    (".cpp", "cpp"),
    (".hpp", "cpp"),
];

const IGNORED_DIRS: &[&str] = &[
    // VCS metadata
    ".git",
    ".hg",
    ".svn",
    // caches
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    ".tox",
    ".cache",
    ".idea",
    ".vscode",
    // build output
    "build",
    "dist",
    "target",
    "out",
    ".next",
    "coverage",
    // vendored / environments
    "node_modules",
    "vendor",
    "third_party",
    ".venv",
    "venv",
    "site-packages",
    // generated
    "generated",
    "__generated__",
    // tests
    "tests",
    "test",
    "__tests__",
];

const BINARY_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico", ".webp", ".pdf", ".zip", ".gz", ".tar",
    ".tgz", ".bz2", ".xz", ".7z", ".jar", ".class", ".so", ".dll", ".dylib", ".exe", ".o", ".a",
    ".pyc", ".pyo", ".whl", ".woff", ".woff2", ".ttf", ".otf", ".eot", ".mp3", ".mp4", ".mov",
    ".avi", ".wav", ".sqlite", ".db", ".bin", ".lock",
];

fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
}

pub fn detect_language(path: &str) -> Option<&'static str> {
    let ext = extension_of(path)?;
    LANGUAGE_BY_EXTENSION
        .iter()
        .find(|(e, _)| *e == ext.as_str())
        .map(|(_, lang)| *lang)
}

fn is_binary_extension(path: &str) -> bool {
    extension_of(path)
        .map(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// An eligible file found by the walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoFile {
    pub absolute: PathBuf,
    /// Forward-slash path relative to the repository root.
    pub rel_path: String,
}

fn relative_path(path: &Path, repo_root: &Path) -> String {
    path.strip_prefix(repo_root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Breadth-first walk of `repo_root`, sorted per directory, stopping at
/// `max_files` eligible files.
///
/// Fails only when the root itself cannot be read.
pub fn iter_repo_files(
    repo_root: &Path,
    max_files: usize,
    max_file_bytes: u64,
) -> FaultlineResult<Vec<RepoFile>> {
    let root_entries = std::fs::read_dir(repo_root).map_err(|source| {
        FaultlineError::RepoUnreadable {
            path: repo_root.to_path_buf(),
            source,
        }
    })?;

    let mut result = Vec::new();
    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    let mut pending = Some(root_entries);

    loop {
        let entries = match pending.take() {
            Some(entries) => entries,
            None => {
                let Some(dir) = queue.pop_front() else {
                    break;
                };
                match std::fs::read_dir(&dir) {
                    Ok(entries) => entries,
                    Err(e) => {
                        debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                        continue;
                    }
                }
            }
        };

        let mut children: Vec<(String, PathBuf, bool)> = entries
            .flatten()
            .filter_map(|entry| {
                let file_type = entry.file_type().ok()?;
                if file_type.is_symlink() {
                    return None;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                Some((name, entry.path(), file_type.is_dir()))
            })
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, path, is_dir) in children {
            if is_dir {
                if !IGNORED_DIRS.contains(&name.as_str()) {
                    queue.push_back(path);
                }
                continue;
            }
            let rel_path = relative_path(&path, repo_root);
            if is_binary_extension(&rel_path) {
                continue;
            }
            match path.metadata() {
                Ok(meta) if meta.len() <= max_file_bytes => {}
                Ok(_) => {
                    debug!(path = %rel_path, "skipping oversized file");
                    continue;
                }
                Err(_) => continue,
            }
            result.push(RepoFile {
                absolute: path,
                rel_path,
            });
            if result.len() >= max_files {
                debug!(max_files, "file ceiling reached");
                return Ok(result);
            }
        }
    }

    Ok(result)
}

/// Read a file as UTF-8 text, rejecting binary content.
pub fn read_text(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    if bytes.iter().take(8192).any(|&b| b == 0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}

/// Term statistics and keyword-matching lines for one file.
#[derive(Clone, Debug)]
pub struct FileScan {
    pub rel_path: String,
    pub length: usize,
    pub term_frequencies: BTreeMap<String, usize>,
    /// Per keyword (in keyword order), matching `(line, preview)` pairs.
    pub keyword_lines: Vec<(String, Vec<(usize, String)>)>,
}

/// Tokenize `source` and count exact keyword token matches.
///
/// At most `max_lines_per_keyword` matching lines are kept per keyword.
pub fn scan_source(
    rel_path: &str,
    source: &str,
    keywords: &[String],
    max_lines_per_keyword: usize,
) -> FileScan {
    let mut length = 0usize;
    let mut term_frequencies: BTreeMap<String, usize> = BTreeMap::new();
    let mut keyword_lines: Vec<(String, Vec<(usize, String)>)> =
        keywords.iter().map(|k| (k.clone(), Vec::new())).collect();

    for (index, line) in source.lines().enumerate() {
        let mut matched_here: Vec<usize> = Vec::new();
        for token in identifier_tokens(line) {
            length += 1;
            if let Some(position) = keywords.iter().position(|k| *k == token) {
                *term_frequencies.entry(token).or_insert(0) += 1;
                if !matched_here.contains(&position) {
                    matched_here.push(position);
                }
            }
        }
        for position in matched_here {
            let lines = &mut keyword_lines[position].1;
            if lines.len() < max_lines_per_keyword {
                lines.push((index + 1, truncate_chars(line, MAX_PREVIEW_CHARS)));
            }
        }
    }

    FileScan {
        rel_path: rel_path.to_string(),
        length,
        term_frequencies,
        keyword_lines,
    }
}

/// Scan every file in parallel; unreadable or binary files are dropped.
///
/// Output order follows `files`.
pub fn scan_files(
    files: &[RepoFile],
    keywords: &[String],
    max_lines_per_keyword: usize,
) -> Vec<FileScan> {
    files
        .par_iter()
        .filter_map(|file| {
            let source = read_text(&file.absolute)?;
            Some(scan_source(
                &file.rel_path,
                &source,
                keywords,
                max_lines_per_keyword,
            ))
        })
        .collect()
}

/// Keyword hit counts and samples after applying the global per-keyword budget.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HitSummary {
    pub hit_count: usize,
    pub samples: Vec<SampleLine>,
}

/// Reduce per-file matches in walk order, allowing each keyword at most
/// `max_hits_per_keyword` hits across the whole tree.
pub fn collect_hits(
    scans: &[FileScan],
    keywords: &[String],
    max_hits_per_keyword: usize,
) -> Vec<HitSummary> {
    let mut remaining: Vec<usize> = vec![max_hits_per_keyword; keywords.len()];
    scans
        .iter()
        .map(|scan| {
            let mut summary = HitSummary::default();
            for (position, (keyword, lines)) in scan.keyword_lines.iter().enumerate() {
                for (line, preview) in lines {
                    if remaining[position] == 0 {
                        break;
                    }
                    remaining[position] -= 1;
                    summary.hit_count += 1;
                    if summary.samples.len() < MAX_SAMPLES_PER_FILE {
                        summary.samples.push(SampleLine {
                            query: keyword.clone(),
                            line: *line,
                            preview: preview.clone(),
                        });
                    }
                }
            }
            summary
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn detect_language_by_extension() {
        assert_eq!(detect_language("src/app.py"), Some("python"));
        assert_eq!(detect_language("Main.JAVA"), Some("java"));
        assert_eq!(detect_language("docs/fields.md"), None);
    }

    #[test]
    fn walk_is_breadth_first_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.py", "x");
        write(dir.path(), "a.py", "x");
        write(dir.path(), "pkg/deep.py", "x");
        let files = iter_repo_files(dir.path(), 100, 1024).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "b.py", "pkg/deep.py"]);
    }

    #[test]
    fn walk_skips_denied_dirs_binaries_and_large_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/keep.py", "x");
        write(dir.path(), ".git/config", "x");
        write(dir.path(), "node_modules/lib/index.js", "x");
        write(dir.path(), "tests/test_keep.py", "x");
        write(dir.path(), "logo.png", "x");
        write(dir.path(), "big.py", &"y".repeat(2048));
        let files = iter_repo_files(dir.path(), 100, 1024).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["src/keep.py"]);
    }

    #[test]
    fn walk_respects_file_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write(dir.path(), &format!("f{i}.py"), "x");
        }
        let files = iter_repo_files(dir.path(), 3, 1024).unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn unreadable_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = iter_repo_files(&missing, 10, 1024).unwrap_err();
        assert!(matches!(err, FaultlineError::RepoUnreadable { .. }));
    }

    #[test]
    fn scan_counts_exact_tokens() {
        let keywords = vec!["translate_url".to_string(), "groups".to_string()];
        let source = "def translate_url(url):\n    return translate_url_helper(url)\n# groups\n";
        let scan = scan_source("router.py", source, &keywords, 10);
        assert_eq!(scan.term_frequencies.get("translate_url"), Some(&1));
        assert_eq!(scan.term_frequencies.get("groups"), Some(&1));
        assert_eq!(scan.keyword_lines[0].1, vec![(1, "def translate_url(url):".to_string())]);
        assert_eq!(scan.length, 7);
    }

    #[test]
    fn hit_budget_is_global_per_keyword() {
        let keywords = vec!["alpha".to_string()];
        let scans: Vec<FileScan> = (0..3)
            .map(|i| scan_source(&format!("f{i}.py"), "alpha\nalpha\nalpha\nalpha\n", &keywords, 12))
            .collect();
        let hits = collect_hits(&scans, &keywords, 10);
        assert_eq!(hits[0].hit_count, 4);
        assert_eq!(hits[1].hit_count, 4);
        assert_eq!(hits[2].hit_count, 2);
        assert!(hits.iter().all(|h| h.samples.len() <= MAX_SAMPLES_PER_FILE));
    }

    #[test]
    fn previews_are_truncated() {
        let keywords = vec!["needle".to_string()];
        let long_line = format!("needle {}", "x".repeat(500));
        let scan = scan_source("f.py", &long_line, &keywords, 10);
        assert_eq!(scan.keyword_lines[0].1[0].1.chars().count(), MAX_PREVIEW_CHARS);
    }
}

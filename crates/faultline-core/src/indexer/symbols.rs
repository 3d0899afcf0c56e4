//! Symbol extraction for the top candidate files.
//!
//! Two engines exist. The structural engine shells out to an external tag
//! tool (`<tool> tags <file>`, tab-separated `name kind line[:col]` output).
//! The fallback engine scans lines against an ordered table of declaration
//! patterns, first match per line wins. The structural engine degrades to the
//! fallback per file whenever the tool misbehaves.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, warn};

use crate::errors::{FaultlineError, FaultlineResult};
use crate::models::{SymbolKind, SymbolSource};

// ---------------------------------------------------------------------------
// Extracted types
// ---------------------------------------------------------------------------

/// A declaration found in one file, before ids are assigned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub line: usize,
    pub column: usize,
    pub source: SymbolSource,
}

// ---------------------------------------------------------------------------
// Fallback declaration table
// ---------------------------------------------------------------------------

/// Ordered `(kind, pattern)` rules. Capture group 1 is the symbol name.
/// Adding a language means appending rows.
const DECLARATION_RULES: &[(SymbolKind, &str)] = &[
    // Python
    (SymbolKind::Class, r"^\s*class\s+([A-Za-z_][A-Za-z0-9_]*)"),
    (SymbolKind::Method, r"^\s+(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\("),
    (SymbolKind::Function, r"^(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\("),
    // JavaScript / TypeScript
    (
        SymbolKind::Class,
        r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:class|interface)\s+([A-Za-z_$][A-Za-z0-9_$]*)",
    ),
    (
        SymbolKind::Function,
        r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][A-Za-z0-9_$]*)\s*\(",
    ),
    (
        SymbolKind::Function,
        r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][A-Za-z0-9_$]*)\s*(?::[^=]+)?=>",
    ),
    // Go
    (
        SymbolKind::Method,
        r"^func\s*\([^)]*\)\s*([A-Za-z_][A-Za-z0-9_]*)\s*[\[(]",
    ),
    (SymbolKind::Function, r"^func\s+([A-Za-z_][A-Za-z0-9_]*)\s*[\[(]"),
    (
        SymbolKind::Class,
        r"^type\s+([A-Za-z_][A-Za-z0-9_]*)\s+(?:struct|interface)\b",
    ),
    // Rust
    (
        SymbolKind::Function,
        r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+\S+\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)",
    ),
    (
        SymbolKind::Class,
        r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|union)\s+([A-Za-z_][A-Za-z0-9_]*)",
    ),
    // Java / C# / Kotlin
    (
        SymbolKind::Class,
        r"^\s*(?:(?:public|private|protected|internal|static|final|abstract|sealed|partial|data|open)\s+)*(?:class|interface|enum|record|object)\s+([A-Za-z_][A-Za-z0-9_]*)",
    ),
    (
        SymbolKind::Method,
        r"^\s+(?:(?:public|private|protected|internal|static|final|abstract|synchronized|override|virtual|async)\s+)+[A-Za-z0-9_<>\[\],.? ]+\s+([A-Za-z_][A-Za-z0-9_]*)\s*\([^;]*$",
    ),
    (SymbolKind::Function, r"^\s*(?:[a-z]+\s+)*fun\s+(?:<[^>]*>\s*)?([A-Za-z_][A-Za-z0-9_]*)\s*\("),
    // Ruby
    (SymbolKind::Class, r"^\s*(?:class|module)\s+([A-Z][A-Za-z0-9_]*)"),
    (SymbolKind::Method, r"^\s*def\s+(?:self\.)?([A-Za-z_][A-Za-z0-9_]*[?!]?)"),
    // PHP
    (
        SymbolKind::Method,
        r"^\s+(?:(?:public|private|protected|static|final|abstract)\s+)+function\s+&?([A-Za-z_][A-Za-z0-9_]*)\s*\(",
    ),
    (SymbolKind::Function, r"^\s*function\s+&?([A-Za-z_][A-Za-z0-9_]*)\s*\("),
    // C / C++
    (
        SymbolKind::Class,
        r"^\s*(?:typedef\s+)?(?:struct|class|union)\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:[:{]|$)",
    ),
    (
        SymbolKind::Function,
        r"^[A-Za-z_][A-Za-z0-9_\s\*&:<>,]*?[\s\*&]([A-Za-z_][A-Za-z0-9_:~]*)\s*\([^;]*\)\s*(?:const\s*)?\{?\s*$",
    ),
];

static COMPILED_RULES: LazyLock<Vec<(SymbolKind, Regex)>> = LazyLock::new(|| {
    DECLARATION_RULES
        .iter()
        .map(|(kind, pattern)| (*kind, Regex::new(pattern).unwrap()))
        .collect()
});

const NON_SYMBOL_NAMES: &[&str] = &[
    "if", "for", "while", "switch", "return", "catch", "else", "new", "sizeof", "main",
];

/// Line-by-line extraction against the declaration table.
pub fn fallback_symbols(source: &str, max_symbols: usize) -> Vec<ExtractedSymbol> {
    let mut symbols = Vec::new();
    for (index, line) in source.lines().enumerate() {
        if symbols.len() >= max_symbols {
            break;
        }
        let hit = COMPILED_RULES
            .iter()
            .find_map(|(kind, re)| re.captures(line).map(|caps| (*kind, caps)));
        let Some((kind, caps)) = hit else {
            continue;
        };
        let Some(name) = caps.get(1) else {
            continue;
        };
        if NON_SYMBOL_NAMES.contains(&name.as_str()) {
            continue;
        }
        symbols.push(ExtractedSymbol {
            name: name.as_str().to_string(),
            kind,
            line: index + 1,
            column: line[..name.start()].chars().count() + 1,
            source: SymbolSource::Fallback,
        });
    }
    symbols
}

// ---------------------------------------------------------------------------
// Structural tool
// ---------------------------------------------------------------------------

/// Parse `name\tkind\tline[:col]` rows; malformed rows are skipped.
pub fn parse_tag_output(output: &str) -> Vec<ExtractedSymbol> {
    let mut symbols: Vec<ExtractedSymbol> = output
        .lines()
        .filter_map(|row| {
            let fields: Vec<&str> = row.split('\t').collect();
            if fields.len() < 3 {
                return None;
            }
            let name = fields[0].trim();
            if name.is_empty() {
                return None;
            }
            let (line_raw, col_raw) = match fields[2].trim().split_once(':') {
                Some((l, c)) => (l, Some(c)),
                None => (fields[2].trim(), None),
            };
            let line: usize = line_raw.trim().parse().ok()?;
            let column: usize = col_raw
                .and_then(|c| c.trim().parse().ok())
                .unwrap_or(1);
            Some(ExtractedSymbol {
                name: name.to_string(),
                kind: SymbolKind::from_tag_kind(fields[1]),
                line: line.max(1),
                column: column.max(1),
                source: SymbolSource::Structural,
            })
        })
        .collect();
    symbols.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.column.cmp(&b.column)));
    symbols
}

/// Run `program args...`, killing it once `timeout` elapses.
fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> FaultlineResult<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| FaultlineError::Tool(format!("failed to spawn {program}: {e}")))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| FaultlineError::Tool("stdout not captured".to_string()))?;
    let reader = std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stdout.read_to_string(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                // Only the direct child is signalled; tools should exec.
                if let Err(e) = child.kill() {
                    debug!(program, error = %e, "failed to kill timed out tool");
                }
                if let Err(e) = child.wait() {
                    debug!(program, error = %e, "failed to reap timed out tool");
                }
                return Err(FaultlineError::Tool(format!(
                    "{program} timed out after {}ms",
                    timeout.as_millis()
                )));
            }
            None => std::thread::sleep(Duration::from_millis(10)),
        }
    };

    let output = reader
        .join()
        .map_err(|_| FaultlineError::Tool("stdout reader panicked".to_string()))?;
    if !status.success() {
        return Err(FaultlineError::Tool(format!("{program} exited with {status}")));
    }
    Ok(output)
}

/// Extraction engine, chosen once per localization call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolExtractor {
    Structural { tool: String, timeout: Duration },
    FallbackRegex,
}

impl SymbolExtractor {
    /// Pick the structural engine when `<tool> --version` succeeds in time.
    ///
    /// `available = Some(_)` skips the probe.
    pub fn probe(tool: &str, timeout: Duration, available: Option<bool>) -> Self {
        let usable = match available {
            Some(flag) => flag,
            None => match run_with_timeout(tool, &["--version"], timeout) {
                Ok(_) => true,
                Err(e) => {
                    debug!(tool, error = %e, "structural tool unavailable");
                    false
                }
            },
        };
        if usable {
            SymbolExtractor::Structural {
                tool: tool.to_string(),
                timeout,
            }
        } else {
            SymbolExtractor::FallbackRegex
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SymbolExtractor::Structural { .. } => "structural",
            SymbolExtractor::FallbackRegex => "fallback-regex",
        }
    }

    /// Extract at most `max_symbols` symbols from one file.
    pub fn extract(&self, path: &Path, source: &str, max_symbols: usize) -> Vec<ExtractedSymbol> {
        if let SymbolExtractor::Structural { tool, timeout } = self {
            let path_arg = path.to_string_lossy();
            match run_with_timeout(tool, &["tags", &*path_arg], *timeout) {
                Ok(output) => {
                    let mut symbols = parse_tag_output(&output);
                    if !symbols.is_empty() {
                        symbols.truncate(max_symbols);
                        return symbols;
                    }
                    debug!(path = %path.display(), "tag tool returned no symbols, using fallback");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "tag tool failed, using fallback");
                }
            }
        }
        fallback_symbols(source, max_symbols)
    }
}

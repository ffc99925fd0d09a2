//! Pair pipeline: reads the pair list, scores each pair, writes results
//!
//! Pairs are independent, so scoring may run on a worker pool, but results
//! are always written in input order to the single output sink.
//!
//! # Error handling
//!
//! - Malformed list line: diagnostic, line skipped
//! - Source file with a syntax error: compared as raw text
//! - Missing or unreadable source file: fatal or skipped, per [`MissingFilePolicy`]

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::config::{CompareConfig, MissingFilePolicy, OutputFormat};
use crate::normalizer::canonical_form;
use crate::similarity::normalized_distance;
use crate::{Error, Result};

// ── Pair list ─────────────────────────────────────────────

/// One record of the pair list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    /// 1-based line in the pair list
    pub line: usize,
    pub left: PathBuf,
    pub right: PathBuf,
}

/// A problem tied to a line of the pair list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub origin: PathBuf,
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}: {}", self.origin.display(), self.line, self.message)
    }
}

/// Parsed pair list with the diagnostics for lines that were not usable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairList {
    pub pairs: Vec<FilePair>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Split pair-list text into records
///
/// Each line needs two whitespace-separated paths. Shorter lines are
/// skipped with a diagnostic; tokens past the second are ignored with one.
pub fn parse_pair_list(text: &str, origin: &Path) -> PairList {
    let mut list = PairList::default();

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();

        match tokens.as_slice() {
            [left, right, rest @ ..] => {
                if !rest.is_empty() {
                    let diagnostic = Diagnostic {
                        origin: origin.to_path_buf(),
                        line: line_no,
                        message: format!("ignoring {} extra token(s) after the pair", rest.len()),
                    };
                    warn!("{}", diagnostic);
                    list.diagnostics.push(diagnostic);
                }
                list.pairs.push(FilePair {
                    line: line_no,
                    left: PathBuf::from(left),
                    right: PathBuf::from(right),
                });
            }
            _ => {
                let diagnostic = Diagnostic {
                    origin: origin.to_path_buf(),
                    line: line_no,
                    message: format!("expected two file paths, found {}; line skipped", tokens.len()),
                };
                warn!("{}", diagnostic);
                list.diagnostics.push(diagnostic);
            }
        }
    }

    list
}

/// Read and parse a pair list file
pub fn load_pair_list(path: &Path) -> Result<PairList> {
    let text = read_source(path)?;
    Ok(parse_pair_list(&text, path))
}

// ── Scoring ───────────────────────────────────────────────

/// Score of one pair
#[derive(Debug, Clone, PartialEq)]
pub struct PairScore {
    pub pair: FilePair,
    pub score: f64,
    /// Sides that did not parse and were compared as raw text
    pub raw_fallbacks: usize,
}

/// Read both files of a pair, canonicalize them and score them
///
/// # Errors
/// `Io` when either file cannot be read.
pub fn score_pair(pair: &FilePair) -> Result<PairScore> {
    let (left, left_raw) = canonical_file(&pair.left)?;
    let (right, right_raw) = canonical_file(&pair.right)?;
    let score = normalized_distance(&left, &right);
    debug!(
        left = %pair.left.display(),
        right = %pair.right.display(),
        score,
        "scored pair"
    );
    Ok(PairScore {
        pair: pair.clone(),
        score,
        raw_fallbacks: usize::from(left_raw) + usize::from(right_raw),
    })
}

/// Canonical text of a file, and whether it fell back to raw text
fn canonical_file(path: &Path) -> Result<(String, bool)> {
    let source = read_source(path)?;
    info_span!("source", path = %path.display()).in_scope(|| canonical_form(&source))
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Batch ─────────────────────────────────────────────────

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Score lines written
    pub scored: usize,
    /// Pair-list lines that produced no pair
    pub skipped_lines: Vec<Diagnostic>,
    /// Pairs skipped because a file could not be read; `origin` is the
    /// pair list when produced by [`run`], empty from [`run_batch`]
    pub skipped_pairs: Vec<Diagnostic>,
    /// Source files compared as raw text because they did not parse
    pub raw_fallbacks: usize,
}

#[derive(Serialize)]
struct ScoreRecord<'a> {
    left: &'a Path,
    right: &'a Path,
    score: f64,
}

/// Score every pair and write one line per scored pair, in input order
///
/// With `MissingFilePolicy::Fail` the lines for pairs before the failing
/// one are written and flushed before the error is returned.
pub fn run_batch<W: Write>(pairs: &[FilePair], config: &CompareConfig, sink: &mut W) -> Result<BatchReport> {
    config.validate()?;
    let results = score_all(pairs, config)?;

    let mut report = BatchReport::default();
    for (pair, result) in pairs.iter().zip(results) {
        match result {
            Ok(scored) => {
                write_score(sink, config, &scored)?;
                report.scored += 1;
                report.raw_fallbacks += scored.raw_fallbacks;
            }
            Err(err @ Error::Io { .. }) if config.missing_files == MissingFilePolicy::Skip => {
                let diagnostic = Diagnostic {
                    origin: PathBuf::new(),
                    line: pair.line,
                    message: format!("pair skipped: {}", err),
                };
                warn!("line {}: {}", pair.line, diagnostic.message);
                report.skipped_pairs.push(diagnostic);
            }
            Err(err) => {
                sink.flush()?;
                return Err(err);
            }
        }
    }
    sink.flush()?;
    Ok(report)
}

fn score_all(pairs: &[FilePair], config: &CompareConfig) -> Result<Vec<Result<PairScore>>> {
    if config.jobs == 1 || pairs.len() < 2 {
        return Ok(pairs.iter().map(score_pair).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()
        .map_err(|e| Error::ConfigError(format!("failed to start worker pool: {}", e)))?;
    // par_iter().collect() keeps input order
    Ok(pool.install(|| pairs.par_iter().map(score_pair).collect()))
}

fn write_score<W: Write>(sink: &mut W, config: &CompareConfig, scored: &PairScore) -> Result<()> {
    match config.format {
        OutputFormat::Text => writeln!(sink, "{}", config.format_score(scored.score))?,
        OutputFormat::Jsonl => {
            let record = ScoreRecord {
                left: &scored.pair.left,
                right: &scored.pair.right,
                score: scored.score,
            };
            let json = serde_json::to_string(&record)
                .map_err(|e| Error::Output(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
            writeln!(sink, "{}", json)?;
        }
    }
    Ok(())
}

/// Full batch: load the pair list, score it and write `output`
///
/// The output file is created or truncated before scoring starts.
pub fn run(input: &Path, output: &Path, config: &CompareConfig) -> Result<BatchReport> {
    let list = load_pair_list(input)?;
    let file = File::create(output).map_err(|source| Error::Io {
        path: output.to_path_buf(),
        source,
    })?;
    let mut sink = BufWriter::new(file);

    let mut report = run_batch(&list.pairs, config, &mut sink)?;
    for diagnostic in &mut report.skipped_pairs {
        diagnostic.origin = input.to_path_buf();
    }
    report.skipped_lines = list.diagnostics;

    info!(
        scored = report.scored,
        skipped_lines = report.skipped_lines.len(),
        skipped_pairs = report.skipped_pairs.len(),
        raw_fallbacks = report.raw_fallbacks,
        "batch complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn pair(line: usize, left: &Path, right: &Path) -> FilePair {
        FilePair {
            line,
            left: left.to_path_buf(),
            right: right.to_path_buf(),
        }
    }

    fn output_lines(buf: &[u8]) -> Vec<String> {
        String::from_utf8(buf.to_vec())
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    // ── Pair list ──────────────────────────────────────

    #[test]
    fn test_parse_pair_list_basic() {
        let list = parse_pair_list("a.py b.py\nc.py\td.py\n", Path::new("input.txt"));
        assert_eq!(list.pairs.len(), 2);
        assert_eq!(list.pairs[1].left, PathBuf::from("c.py"));
        assert_eq!(list.pairs[1].line, 2);
        assert!(list.diagnostics.is_empty());
    }

    #[test]
    fn test_parse_pair_list_short_line_skipped() {
        let list = parse_pair_list("a.py b.py\nlonely.py\n", Path::new("input.txt"));
        assert_eq!(list.pairs.len(), 1);
        assert_eq!(list.diagnostics.len(), 1);
        assert_eq!(list.diagnostics[0].line, 2);
        assert!(list.diagnostics[0].to_string().starts_with("input.txt:2:"));
    }

    #[test]
    fn test_parse_pair_list_blank_line_skipped() {
        let list = parse_pair_list("\na.py b.py\n", Path::new("input.txt"));
        assert_eq!(list.pairs.len(), 1);
        assert_eq!(list.pairs[0].line, 2);
        assert_eq!(list.diagnostics[0].line, 1);
    }

    #[test]
    fn test_parse_pair_list_extra_tokens_use_first_two() {
        let list = parse_pair_list("a.py b.py c.py\n", Path::new("input.txt"));
        assert_eq!(list.pairs.len(), 1);
        assert_eq!(list.pairs[0].right, PathBuf::from("b.py"));
        assert_eq!(list.diagnostics.len(), 1);
    }

    #[test]
    fn test_load_pair_list_missing() {
        let err = load_pair_list(Path::new("/nonexistent/pairs.txt")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    // ── Scoring ────────────────────────────────────────

    #[test]
    fn test_score_pair_identical_files() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.py", "def f():\n    return 1\n");
        let scored = score_pair(&pair(1, &a, &a)).unwrap();
        assert_eq!(scored.score, 0.0);
        assert_eq!(scored.raw_fallbacks, 0);
    }

    #[test]
    fn test_score_pair_counts_raw_fallbacks() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "good.py", "x = 1\n");
        let bad = write(&dir, "bad.py", "def (:\n");
        let scored = score_pair(&pair(1, &good, &bad)).unwrap();
        assert_eq!(scored.raw_fallbacks, 1);
        assert!(scored.score > 0.0);
    }

    #[test]
    fn test_score_pair_is_symmetric() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.py", "def f(x):\n    return x + 1\n");
        let b = write(&dir, "b.py", "class K:\n    def g(self):\n        pass\n");
        let ab = score_pair(&pair(1, &a, &b)).unwrap().score;
        let ba = score_pair(&pair(1, &b, &a)).unwrap().score;
        assert_eq!(ab, ba);
    }

    // ── Batch ──────────────────────────────────────────

    #[test]
    fn test_run_batch_writes_in_input_order() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.py", "x = 1\n");
        let b = write(&dir, "b.py", "y = 2\n");
        let pairs = vec![pair(1, &a, &a), pair(2, &a, &b), pair(3, &b, &b)];

        let mut out = Vec::new();
        let report = run_batch(&pairs, &CompareConfig::default(), &mut out).unwrap();
        assert_eq!(report.scored, 3);
        let lines = output_lines(&out);
        assert_eq!(lines[0], "0.0");
        assert_ne!(lines[1], "0.0");
        assert_eq!(lines[2], "0.0");
    }

    #[test]
    fn test_run_batch_parallel_matches_sequential() {
        let dir = TempDir::new().unwrap();
        let files: Vec<PathBuf> = (0..6)
            .map(|i| write(&dir, &format!("f{}.py", i), &"v = 1\n".repeat(i + 1)))
            .collect();
        let pairs: Vec<FilePair> = files
            .iter()
            .enumerate()
            .map(|(i, f)| pair(i + 1, f, &files[0]))
            .collect();

        let mut sequential = Vec::new();
        run_batch(&pairs, &CompareConfig::default(), &mut sequential).unwrap();

        let parallel_config = CompareConfig {
            jobs: 4,
            ..CompareConfig::default()
        };
        let mut parallel = Vec::new();
        run_batch(&pairs, &parallel_config, &mut parallel).unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_run_batch_missing_file_fails_after_earlier_lines() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.py", "x = 1\n");
        let missing = dir.path().join("missing.py");
        let pairs = vec![pair(1, &a, &a), pair(2, &a, &missing), pair(3, &a, &a)];

        let mut out = Vec::new();
        let err = run_batch(&pairs, &CompareConfig::default(), &mut out).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(output_lines(&out), vec!["0.0"]);
    }

    #[test]
    fn test_run_batch_missing_file_skipped() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.py", "x = 1\n");
        let missing = dir.path().join("missing.py");
        let pairs = vec![pair(1, &a, &a), pair(2, &a, &missing), pair(3, &a, &a)];
        let config = CompareConfig {
            missing_files: MissingFilePolicy::Skip,
            ..CompareConfig::default()
        };

        let mut out = Vec::new();
        let report = run_batch(&pairs, &config, &mut out).unwrap();
        assert_eq!(report.scored, 2);
        assert_eq!(report.skipped_pairs.len(), 1);
        assert_eq!(report.skipped_pairs[0].line, 2);
        assert_eq!(output_lines(&out).len(), 2);
    }

    #[test]
    fn test_run_batch_jsonl_records() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.py", "x = 1\n");
        let config = CompareConfig {
            format: OutputFormat::Jsonl,
            ..CompareConfig::default()
        };

        let mut out = Vec::new();
        run_batch(&[pair(1, &a, &a)], &config, &mut out).unwrap();
        let record: serde_json::Value = serde_json::from_str(&output_lines(&out)[0]).unwrap();
        assert_eq!(record["score"], 0.0);
        assert_eq!(record["left"], a.to_str().unwrap());
    }

    #[test]
    fn test_run_skips_short_line_and_writes_one_score() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.py", "def foo():\n    return 1\n");
        let b = write(&dir, "b.py", "def fun():\n    return 1\n");
        let list = write(
            &dir,
            "pairs.txt",
            &format!("{} {}\n{}\n", a.display(), b.display(), a.display()),
        );
        let output = dir.path().join("scores.txt");

        let report = run(&list, &output, &CompareConfig::default()).unwrap();
        assert_eq!(report.scored, 1);
        assert_eq!(report.skipped_lines.len(), 1);
        assert_eq!(report.skipped_lines[0].line, 2);
        assert_eq!(fs::read_to_string(&output).unwrap(), "0.0\n");
    }

    #[test]
    fn test_run_empty_list_truncates_output() {
        let dir = TempDir::new().unwrap();
        let list = write(&dir, "pairs.txt", "");
        let output = write(&dir, "scores.txt", "stale\n");

        let report = run(&list, &output, &CompareConfig::default()).unwrap();
        assert_eq!(report.scored, 0);
        assert_eq!(fs::read_to_string(&output).unwrap(), "");
    }
}

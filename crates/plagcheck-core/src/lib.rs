//! plagcheck core - structural similarity between Python source files
//!
//! Scores how alike two files are after stripping the differences a
//! copier can introduce cheaply: names, declaration order, docstrings,
//! comments and layout.
//!
//! # Architecture
//!
//! ```text
//! Python text → Parser → Tree → Normalizer → Canonical Text
//!                                               ↓
//!                                         Similarity → score in [0, 1]
//!                                               ↑
//!                        Pair list → Pipeline ──┘ → one line per pair
//! ```
//!
//! # Guarantees
//!
//! - **Deterministic**: same input always produces identical output
//! - **Symmetric**: `score(a, b) == score(b, a)`
//! - **Bounded**: every score lies in `[0, 1]`; `0.0` means identical canonical text
//! - **Ordered**: batch output follows pair-list order, even when scored in parallel

pub mod config;
pub mod error;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod similarity;

pub use config::{CompareConfig, MissingFilePolicy, OutputFormat};
pub use error::{Error, Result};
pub use normalizer::{canonical_form, canonicalize, normalize};
pub use pipeline::{run, run_batch, BatchReport, Diagnostic, FilePair, PairList};
pub use similarity::{compare_sources, levenshtein, normalized_distance};

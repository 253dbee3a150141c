//! Strategy A: structure-and-keyword heuristic scoring.
//!
//! Parses the markup as an element tree, tallies element kinds and path
//! point density, matches category keywords against the raw text, and
//! combines the three signals into a per-category score map.

use thiserror::Error;

pub mod keywords;
pub mod scorer;
pub mod structure;

pub use keywords::keyword_score;
pub use scorer::{analyze, complexity_weight, suggest_category, Suggestion};
pub use structure::{structural_counts, StructuralCounts};

/// The raw markup could not be parsed as an element tree. Recoverable: the
/// caller reports it per item and moves on. Per-path drawing-string
/// failures never surface here; they degrade to a zero point count inside
/// [`structure::structural_counts`].
#[derive(Debug, Error)]
#[error("failed to parse markup document: {0}")]
pub struct MarkupParseError(#[from] roxmltree::Error);

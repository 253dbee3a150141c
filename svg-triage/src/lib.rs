//! Categorization front door: pick a strategy, get a per-category score map
//! or a single best suggestion.
//!
//! Two stateless strategies are offered directly; the trainable classifier
//! lives in [`model`] (re-exported as [`TypingModel`]) because it carries
//! state and its own lifecycle.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use thiserror::Error;
use tracing::debug;

pub use triage_heuristics::{MarkupParseError, Suggestion};
pub use triage_model as model;
pub use triage_model::{ModelError, TrainingOptions, TrainingReport, TypingModel};
pub use triage_types as types;
pub use triage_types::{Category, ScoreMap, ShapeIntent};
pub use triage_vision::ShapeCounts;

/// How a document is scored against the category set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Element-tree heuristics: keywords, complexity band, structure mix.
    Heuristic,
    /// Rasterize-and-classify contour analysis.
    ContourVision,
}

#[derive(Debug, Error)]
pub enum TriageError {
    #[error(transparent)]
    Parse(#[from] MarkupParseError),
}

/// Score every configured category for one document with the chosen
/// strategy. The vision strategy degrades to an empty map on internal
/// failures; the heuristic strategy surfaces a document parse failure.
pub fn analyze(
    markup: &str,
    categories: &[Category],
    strategy: Strategy,
) -> Result<ScoreMap, TriageError> {
    debug!(?strategy, categories = categories.len(), "analyzing document");
    match strategy {
        Strategy::Heuristic => Ok(triage_heuristics::analyze(markup, categories)?),
        Strategy::ContourVision => Ok(triage_vision::analyze(markup, categories)),
    }
}

/// Best-scoring category for one document, or `None` when no categories are
/// configured or the strategy produced no scores. Ties break by ascending
/// category name.
pub fn suggest_category(
    markup: &str,
    categories: &[Category],
    strategy: Strategy,
) -> Result<Option<Suggestion>, TriageError> {
    let scores = analyze(markup, categories, strategy)?;
    Ok(scores
        .iter()
        .max_by_key(|(name, score)| (OrderedFloat(**score), Reverse(name.as_str())))
        .map(|(name, score)| Suggestion {
            category: name.clone(),
            confidence: *score,
        }))
}

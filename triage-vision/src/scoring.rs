//! Category scoring from the detected shape composition.

use triage_types::{Category, ScoreMap, ShapeIntent};

use crate::ShapeCounts;

/// Flat score for text-intent categories; no OCR is performed, so this is
/// a coarse proxy, not recognition.
const TEXT_SCORE: f64 = 0.3;
/// Flat score for freeform-intent categories when the composition looks
/// like one organic silhouette (few shapes, non-empty "other" bucket).
const FREEFORM_SCORE: f64 = 0.6;
const FREEFORM_MISS_SCORE: f64 = 0.15;
/// A freeform composition is "small" up to this many shapes.
const FREEFORM_MAX_SHAPES: usize = 3;
/// Shape-count normalization for composite scoring.
const COMPOSITE_COUNT_NORM: f64 = 3.0;

/// Score for a pure-ratio intent: 1.0 when every detected shape matches,
/// 0.9 for a majority, otherwise proportional.
fn ratio_score(matching: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let ratio = matching as f64 / total as f64;
    if matching == total {
        1.0
    } else if ratio > 0.5 {
        0.9
    } else {
        0.7 * ratio
    }
}

fn composite_score(counts: &ShapeCounts) -> f64 {
    let buckets = [counts.circles, counts.rectangles, counts.triangles];
    let variety = buckets.iter().filter(|&&b| b > 0).count() as f64 / buckets.len() as f64;
    let count_term = (counts.total() as f64 / COMPOSITE_COUNT_NORM).min(1.0);
    (variety.min(1.0) + count_term) / 2.0
}

fn freeform_score(counts: &ShapeCounts) -> f64 {
    if counts.total() <= FREEFORM_MAX_SHAPES && counts.other > 0 {
        FREEFORM_SCORE
    } else {
        FREEFORM_MISS_SCORE
    }
}

/// Score every category against the detected shape composition. Zero
/// detected shapes scores 0 for every category.
pub fn score_shapes(counts: &ShapeCounts, categories: &[Category]) -> ScoreMap {
    let mut scores = ScoreMap::new();
    let total = counts.total();

    for category in categories {
        let score = if total == 0 {
            0.0
        } else {
            match category.intent {
                ShapeIntent::Round => ratio_score(counts.circles, total),
                ShapeIntent::Square => ratio_score(counts.rectangles, total),
                ShapeIntent::Triangular => ratio_score(counts.triangles, total),
                ShapeIntent::TextLike => TEXT_SCORE,
                ShapeIntent::Composite => composite_score(counts),
                ShapeIntent::Freeform => freeform_score(counts),
                ShapeIntent::Generic => 0.5 * (counts.recognized() as f64 / total as f64),
            }
        };
        scores.insert(category.key(), score);
    }

    scores
}

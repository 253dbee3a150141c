//! Strategy A scoring: per category, a weighted combination of the keyword
//! score, a complexity-band weight and an intent-driven structure weight.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use tracing::debug;
use triage_types::{Category, ScoreMap, ShapeIntent};

use crate::keywords::keyword_score;
use crate::structure::{structural_counts, StructuralCounts};
use crate::MarkupParseError;

const KEYWORD_WEIGHT: f64 = 0.4;
const COMPLEXITY_WEIGHT: f64 = 0.4;
const STRUCTURE_WEIGHT: f64 = 0.2;

/// Normalization constant for the composite count term: documents with ten
/// or more counted elements saturate it.
const COMPOSITE_COUNT_NORM: f64 = 10.0;

/// The winning category of a [`suggest_category`] call. The confidence is
/// the winning score itself, not a calibrated probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub category: String,
    pub confidence: f64,
}

/// Score every category against one document. An empty category set yields
/// an empty map; only a whole-document parse failure is an error.
pub fn analyze(markup: &str, categories: &[Category]) -> Result<ScoreMap, MarkupParseError> {
    if categories.is_empty() {
        return Ok(ScoreMap::new());
    }

    let counts = structural_counts(markup)?;
    let complexity = counts.complexity_score();
    debug!(complexity, total_elements = counts.total_elements(), "analyzing document");

    let mut scores = ScoreMap::new();
    for category in categories {
        let kw = keyword_score(markup, category);
        let cw = complexity_weight(complexity, category.complexity_range);
        let sw = structure_weight(&counts, category.intent);
        scores.insert(
            category.key(),
            KEYWORD_WEIGHT * kw + COMPLEXITY_WEIGHT * cw + STRUCTURE_WEIGHT * sw,
        );
    }
    Ok(scores)
}

/// Suggest the highest-scoring category. Equal top scores are broken by
/// ascending category name so suggestions are reproducible. `None` when no
/// categories are configured.
pub fn suggest_category(
    markup: &str,
    categories: &[Category],
) -> Result<Option<Suggestion>, MarkupParseError> {
    let scores = analyze(markup, categories)?;
    Ok(scores
        .iter()
        .max_by_key(|(name, score)| (OrderedFloat(**score), Reverse(name.as_str())))
        .map(|(name, score)| Suggestion {
            category: name.clone(),
            confidence: *score,
        }))
}

/// Weight for how well the document's complexity fits the category's
/// expected band: 1.0 inside `[min, max]`, falling off linearly outside and
/// reaching zero at `2*min` below and `2*max` above. No band means no
/// expectation (neutral 1.0).
pub fn complexity_weight(complexity: f64, range: Option<(f64, f64)>) -> f64 {
    let Some((min, max)) = range else {
        return 1.0;
    };

    if complexity < min {
        if min == 0.0 {
            1.0
        } else {
            (1.0 - (min - complexity) / min).max(0.0)
        }
    } else if complexity > max {
        (1.0 - (complexity - max) / max).max(0.0)
    } else {
        1.0
    }
}

/// Structure weight for one category, selected by its explicit shape
/// intent. All weights are clamped to [0, 1]; an empty document scores 0
/// under every rule.
pub fn structure_weight(counts: &StructuralCounts, intent: ShapeIntent) -> f64 {
    let total = counts.total_elements();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;

    let weight = match intent {
        ShapeIntent::Round => counts.round_shapes as f64 / total,
        ShapeIntent::Square => counts.rect_shapes as f64 / total,
        ShapeIntent::Triangular => counts.poly_shapes as f64 / total,
        ShapeIntent::TextLike => {
            if counts.text > 0 {
                1.0
            } else {
                0.0
            }
        }
        ShapeIntent::Composite => {
            let kinds = [counts.paths, counts.groups, counts.basic_shapes, counts.text];
            let diversity = kinds.iter().filter(|&&k| k > 0).count() as f64 / kinds.len() as f64;
            let count_term = (total / COMPOSITE_COUNT_NORM).min(1.0);
            (diversity + count_term) / 2.0
        }
        ShapeIntent::Freeform | ShapeIntent::Generic => {
            (counts.paths + counts.basic_shapes) as f64 / total
        }
    };

    weight.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_types::Category;

    #[test]
    fn empty_category_set_yields_empty_map() {
        let scores = analyze("<svg><circle r=\"1\"/></svg>", &[]).unwrap();
        assert!(scores.is_empty());
        assert_eq!(suggest_category("<svg/>", &[]).unwrap(), None);
    }

    #[test]
    fn complexity_weight_is_one_inside_band_inclusive() {
        assert_eq!(complexity_weight(10.0, Some((10.0, 50.0))), 1.0);
        assert_eq!(complexity_weight(30.0, Some((10.0, 50.0))), 1.0);
        assert_eq!(complexity_weight(50.0, Some((10.0, 50.0))), 1.0);
        assert_eq!(complexity_weight(123.0, None), 1.0);
    }

    #[test]
    fn complexity_weight_falls_off_linearly_outside_band() {
        // Below: zero no later than 2*min below, i.e. at complexity 0.
        let w1 = complexity_weight(8.0, Some((10.0, 50.0)));
        let w2 = complexity_weight(4.0, Some((10.0, 50.0)));
        assert!(w1 > w2);
        assert!((w1 - 0.8).abs() < 1e-9);
        assert_eq!(complexity_weight(0.0, Some((10.0, 50.0))), 0.0);

        // Above: zero at 2*max.
        let w3 = complexity_weight(60.0, Some((10.0, 50.0)));
        let w4 = complexity_weight(90.0, Some((10.0, 50.0)));
        assert!(w3 > w4);
        assert!((w3 - 0.8).abs() < 1e-9);
        assert_eq!(complexity_weight(100.0, Some((10.0, 50.0))), 0.0);
        assert_eq!(complexity_weight(150.0, Some((10.0, 50.0))), 0.0);
    }

    #[test]
    fn complexity_weight_guards_zero_minimum() {
        assert_eq!(complexity_weight(0.0, Some((0.0, 30.0))), 1.0);
        assert_eq!(complexity_weight(3.0, Some((0.0, 30.0))), 1.0);
    }

    #[test]
    fn worked_round_things_scenario() {
        // One circle, keyword present once: 0.4*0.2 + 0.4*1.0 + 0.2*1.0.
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg" class="round"><circle r="5"/></svg>"#;
        let category = Category::new("c1", "round things")
            .with_keywords(&["round"])
            .with_complexity_range(0.0, 30.0);
        assert_eq!(category.intent, triage_types::ShapeIntent::Round);

        let scores = analyze(markup, std::slice::from_ref(&category)).unwrap();
        let score = scores["round things"];
        assert!((score - 0.68).abs() < 1e-9, "got {score}");

        let suggestion = suggest_category(markup, &[category]).unwrap().unwrap();
        assert_eq!(suggestion.category, "round things");
        assert!((suggestion.confidence - 0.68).abs() < 1e-9);
    }

    #[test]
    fn score_ties_break_by_ascending_name() {
        // Two categories with identical configuration always tie.
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg"><circle r="5"/></svg>"#;
        let a = Category::new("a", "zebra shapes").with_intent(triage_types::ShapeIntent::Round);
        let b = Category::new("b", "apple shapes").with_intent(triage_types::ShapeIntent::Round);
        let suggestion = suggest_category(markup, &[a, b]).unwrap().unwrap();
        assert_eq!(suggestion.category, "apple shapes");
    }

    #[test]
    fn text_intent_is_binary_on_text_presence() {
        let with_text = structural_counts(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><text>hi</text></svg>"#,
        )
        .unwrap();
        let without = structural_counts(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="1" height="1"/></svg>"#,
        )
        .unwrap();
        assert_eq!(structure_weight(&with_text, ShapeIntent::TextLike), 1.0);
        assert_eq!(structure_weight(&without, ShapeIntent::TextLike), 0.0);
    }

    #[test]
    fn composite_intent_rewards_diversity_and_count() {
        let busy = structural_counts(
            r#"<svg xmlns="http://www.w3.org/2000/svg">
                <g><path d="M0 0 L1 1"/><path d="M0 0 L2 2"/></g>
                <rect width="1" height="1"/><circle r="1"/>
                <text>t</text><g><circle r="2"/></g>
            </svg>"#,
        )
        .unwrap();
        let sparse = structural_counts(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><circle r="1"/></svg>"#,
        )
        .unwrap();
        let busy_w = structure_weight(&busy, ShapeIntent::Composite);
        let sparse_w = structure_weight(&sparse, ShapeIntent::Composite);
        assert!(busy_w > sparse_w);
        // All four kinds present, 8 elements: (1.0 + 0.8) / 2.
        assert!((busy_w - 0.9).abs() < 1e-9, "got {busy_w}");
    }

    #[test]
    fn empty_document_scores_zero_structure_weight() {
        let counts = structural_counts(r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#).unwrap();
        for intent in [
            ShapeIntent::Round,
            ShapeIntent::Composite,
            ShapeIntent::Generic,
        ] {
            assert_eq!(structure_weight(&counts, intent), 0.0);
        }
    }
}

//! End-to-end categorization runs through the public facade.

use svg_triage::{
    analyze, suggest_category, Category, ShapeIntent, Strategy, TrainingOptions, TypingModel,
};
use triage_types::{MarkupSource, TrainingExample, TypingConfig, TypingStep};

const ROUND_BADGE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100" class="round badge"><circle cx="50" cy="50" r="35" fill="black"/></svg>"#;
const LOGO_GRID: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
    <g><rect x="10" y="10" width="30" height="30" fill="black"/></g>
    <g><rect x="60" y="10" width="30" height="30" fill="black"/></g>
    <g><rect x="10" y="60" width="30" height="30" fill="black"/></g>
    <text x="20" y="95">grid</text>
</svg>"#;

fn catalog() -> Vec<Category> {
    vec![
        Category::new("c1", "round badges")
            .with_keywords(&["round", "badge", "circle"])
            .with_complexity_range(0.0, 30.0),
        Category::new("c2", "square plaques")
            .with_keywords(&["square", "plaque"])
            .with_complexity_range(0.0, 40.0),
        Category::new("c3", "composite logos")
            .with_keywords(&["logo", "grid"])
            .with_intent(ShapeIntent::Composite),
    ]
}

#[test]
fn heuristics_prefer_the_round_category_for_a_round_badge() {
    let suggestion = suggest_category(ROUND_BADGE, &catalog(), Strategy::Heuristic)
        .unwrap()
        .unwrap();
    assert_eq!(suggestion.category, "round badges");
    assert!(suggestion.confidence > 0.5, "got {}", suggestion.confidence);
}

#[test]
fn heuristics_prefer_the_composite_category_for_a_busy_logo() {
    let scores = analyze(LOGO_GRID, &catalog(), Strategy::Heuristic).unwrap();
    assert_eq!(scores.len(), 3);
    assert!(scores["composite logos"] > scores["round badges"]);
}

#[test]
fn vision_prefers_the_round_category_for_a_round_badge() {
    let suggestion = suggest_category(ROUND_BADGE, &catalog(), Strategy::ContourVision)
        .unwrap()
        .unwrap();
    assert_eq!(suggestion.category, "round badges");
}

#[test]
fn both_strategies_score_every_configured_category() {
    for strategy in [Strategy::Heuristic, Strategy::ContourVision] {
        let scores = analyze(ROUND_BADGE, &catalog(), strategy).unwrap();
        assert_eq!(scores.len(), 3, "strategy {strategy:?}");
        assert!(scores.values().all(|&s| (0.0..=1.0).contains(&s)));
    }
}

#[test]
fn suggestions_are_deterministic_across_runs() {
    let first = suggest_category(ROUND_BADGE, &catalog(), Strategy::Heuristic).unwrap();
    for _ in 0..3 {
        let again = suggest_category(ROUND_BADGE, &catalog(), Strategy::Heuristic).unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn trained_model_is_usable_through_the_facade() {
    let mut config = TypingConfig {
        steps: vec![TypingStep::new("shape", "Shape", &["round", "square"])],
        sub_item: None,
    };
    config.normalize_orders();

    let square = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><rect x="15" y="15" width="70" height="70" fill="black"/></svg>"#;
    let examples = vec![
        TrainingExample {
            file_name: "round.svg".into(),
            source: MarkupSource::Inline(ROUND_BADGE.into()),
            results: [("shape".to_string(), "round".to_string())].into(),
        },
        TrainingExample {
            file_name: "square.svg".into(),
            source: MarkupSource::Inline(square.into()),
            results: [("shape".to_string(), "square".to_string())].into(),
        },
    ];

    let mut model = TypingModel::new(config);
    let options = TrainingOptions {
        epochs: 200,
        learning_rate: 0.2,
        validation_split: 0.0,
        patience: 200,
        seed: 5,
        image_size: 16,
        hidden_dim: 16,
    };
    let report = model.train(&examples, &options).unwrap();
    assert!(report.failures.is_empty());

    assert_eq!(model.predict(ROUND_BADGE).unwrap()["shape"], "round");
    assert_eq!(model.predict(square).unwrap()["shape"], "square");
}

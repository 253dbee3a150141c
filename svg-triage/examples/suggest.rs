//! Score an SVG file against a small demo category set with both
//! strategies.
//!
//! Usage: cargo run --example suggest -- path/to/file.svg

use svg_triage::{analyze, suggest_category, Category, ShapeIntent, Strategy};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: suggest <file.svg>"))?;
    let markup = std::fs::read_to_string(&path)?;

    let categories = vec![
        Category::new("c1", "round badges")
            .with_keywords(&["round", "badge", "circle"])
            .with_complexity_range(0.0, 30.0),
        Category::new("c2", "square plaques")
            .with_keywords(&["square", "plaque"])
            .with_complexity_range(0.0, 40.0),
        Category::new("c3", "composite logos")
            .with_keywords(&["logo"])
            .with_intent(ShapeIntent::Composite),
    ];

    for strategy in [Strategy::Heuristic, Strategy::ContourVision] {
        println!("{strategy:?}:");
        for (name, score) in analyze(&markup, &categories, strategy)? {
            println!("  {name}: {score:.3}");
        }
        if let Some(s) = suggest_category(&markup, &categories, strategy)? {
            println!("  -> {} ({:.3})", s.category, s.confidence);
        }
    }

    Ok(())
}

//! Shared configuration types for the SVG triage pipeline: categories with
//! their scoring hints, the multi-step labeling configuration consumed by
//! the learned classifier, and training-example handles.
//!
//! The analysis crates never cache these across calls; the caller owns the
//! current snapshot and passes it into every analysis invocation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Category-name (lowercase) to score mapping produced by a heuristic
/// strategy. A `BTreeMap` so iteration order is stable across runs, which
/// makes suggestion tie-breaking reproducible.
pub type ScoreMap = BTreeMap<String, f64>;

/// Explicit shape-intent tag assigned to a category by configuration.
///
/// Selects which structural scoring rule applies to the category in both
/// heuristic strategies. Replaces the original behavior of sniffing tokens
/// out of the category display name at score time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShapeIntent {
    /// Circles and ellipses dominate.
    Round,
    /// Rectangles dominate.
    Square,
    /// Triangles dominate.
    Triangular,
    /// Presence of text elements is the signal. No OCR is performed.
    TextLike,
    /// Many elements of mixed kinds (illustrations, scenes).
    Composite,
    /// Organic silhouettes (hearts, arrows): few shapes, none of the
    /// canonical kinds. A coarse proxy, not true recognition.
    Freeform,
    /// No specific expectation; generic shape/path rules apply.
    #[default]
    Generic,
}

impl ShapeIntent {
    /// Infer an intent from a category display name, reproducing the token
    /// matching of legacy category sets. New configuration should assign
    /// the intent explicitly instead of relying on this.
    pub fn from_name(name: &str) -> Self {
        let name = name.to_lowercase();
        let has = |tokens: &[&str]| tokens.iter().any(|t| name.contains(t));

        if has(&["round", "circle", "circular"]) {
            ShapeIntent::Round
        } else if has(&["square", "rect", "rectangular"]) {
            ShapeIntent::Square
        } else if has(&["triangle", "triangular"]) {
            ShapeIntent::Triangular
        } else if has(&["text", "letter", "word"]) {
            ShapeIntent::TextLike
        } else if has(&["multi", "shape", "complex", "mixed"]) {
            ShapeIntent::Composite
        } else if has(&["heart", "arrow"]) {
            ShapeIntent::Freeform
        } else {
            ShapeIntent::Generic
        }
    }
}

/// A label the operator can assign to a file, plus the hints the heuristic
/// strategies score it with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Stable unique identifier.
    pub id: String,
    /// Display name; lower-cased for all matching and used as the score
    /// map key.
    pub name: String,
    /// Keywords matched against raw markup text (case-insensitive,
    /// whole-word).
    pub keywords: Vec<String>,
    /// Expected complexity band `(min, max)`; only Strategy A reads this.
    /// `None` means no expectation (neutral weight).
    pub complexity_range: Option<(f64, f64)>,
    /// Which structural scoring rule applies.
    pub intent: ShapeIntent,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let intent = ShapeIntent::from_name(&name);
        Category {
            id: id.into(),
            name,
            keywords: Vec::new(),
            complexity_range: None,
            intent,
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_lowercase()).collect();
        self
    }

    pub fn with_complexity_range(mut self, min: f64, max: f64) -> Self {
        self.complexity_range = Some((min, max));
        self
    }

    pub fn with_intent(mut self, intent: ShapeIntent) -> Self {
        self.intent = intent;
        self
    }

    /// Lowercase matching key; this is the key used in every [`ScoreMap`].
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// One option of a labeling step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOption {
    pub value: String,
    pub order: usize,
}

/// One decision point in the multi-step labeling workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingStep {
    pub id: String,
    pub name: String,
    pub options: Vec<StepOption>,
    pub order: usize,
}

impl TypingStep {
    pub fn new(id: impl Into<String>, name: impl Into<String>, values: &[&str]) -> Self {
        TypingStep {
            id: id.into(),
            name: name.into(),
            options: values
                .iter()
                .enumerate()
                .map(|(order, v)| StepOption {
                    value: v.to_string(),
                    order,
                })
                .collect(),
            order: 0,
        }
    }

    /// Option values in configured order.
    pub fn sorted_option_values(&self) -> Vec<&str> {
        let mut opts: Vec<&StepOption> = self.options.iter().collect();
        opts.sort_by_key(|o| o.order);
        opts.into_iter().map(|o| o.value.as_str()).collect()
    }

    /// Index of `value` within the ordered option list.
    pub fn option_index(&self, value: &str) -> Option<usize> {
        self.sorted_option_values().iter().position(|v| *v == value)
    }

    /// The default-fill value for unanswered examples: the first configured
    /// option.
    pub fn default_value(&self) -> Option<&str> {
        self.sorted_option_values().first().copied()
    }
}

/// Names the variable-length sub-item step and its "another sub-item?" flag
/// step, with a hard iteration cap so expansion and prediction always
/// terminate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubItemSpec {
    /// Step answered once per sub-item.
    pub item_step: String,
    /// Flag step whose affirmative answer requests another round. Its first
    /// configured option must be the negative answer, so the default-fill
    /// policy stops the loop for unanswered examples.
    pub flag_step: String,
    /// The flag answer that continues the loop.
    pub affirmative: String,
    /// Maximum number of rounds, enforced in training and prediction.
    pub max_rounds: usize,
}

impl SubItemSpec {
    pub const DEFAULT_MAX_ROUNDS: usize = 5;

    pub fn new(
        item_step: impl Into<String>,
        flag_step: impl Into<String>,
        affirmative: impl Into<String>,
    ) -> Self {
        SubItemSpec {
            item_step: item_step.into(),
            flag_step: flag_step.into(),
            affirmative: affirmative.into(),
            max_rounds: Self::DEFAULT_MAX_ROUNDS,
        }
    }

    /// Results-map key for the item step in round `round` (1-based). Round
    /// one keeps the bare step id for compatibility with stored results.
    pub fn item_key(&self, round: usize) -> String {
        if round <= 1 {
            self.item_step.clone()
        } else {
            format!("{}_{}", self.item_step, round)
        }
    }

    /// Results-map key for the flag step in round `round` (always indexed).
    pub fn flag_key(&self, round: usize) -> String {
        format!("{}_{}", self.flag_step, round)
    }
}

/// The full labeling-step configuration read before training or prediction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypingConfig {
    pub steps: Vec<TypingStep>,
    pub sub_item: Option<SubItemSpec>,
}

impl TypingConfig {
    /// Steps in configured order.
    pub fn sorted_steps(&self) -> Vec<&TypingStep> {
        let mut steps: Vec<&TypingStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.order);
        steps
    }

    pub fn step(&self, id: &str) -> Option<&TypingStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Restore the dense zero-based order invariant after any insert,
    /// delete or reorder: step orders become a permutation of `0..n`
    /// preserving relative order, and the same holds for each step's
    /// options.
    pub fn normalize_orders(&mut self) {
        self.steps.sort_by_key(|s| s.order);
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.order = i;
            step.options.sort_by_key(|o| o.order);
            for (j, opt) in step.options.iter_mut().enumerate() {
                opt.order = j;
            }
        }
    }
}

/// Where a training example's markup comes from. File-backed markup is read
/// lazily so a bad file only fails its own example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarkupSource {
    Inline(String),
    Path(PathBuf),
}

impl MarkupSource {
    pub fn load(&self) -> std::io::Result<String> {
        match self {
            MarkupSource::Inline(text) => Ok(text.clone()),
            MarkupSource::Path(path) => std::fs::read_to_string(path),
        }
    }
}

/// One manually confirmed example for supervised training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    pub file_name: String,
    pub source: MarkupSource,
    /// Step id (possibly round-indexed, see [`SubItemSpec`]) to the chosen
    /// option value.
    pub results: BTreeMap<String, String>,
}

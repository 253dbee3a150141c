//! The learned classifier: a trainable multi-output model mapping a
//! rasterized view of the markup to one predicted option per configured
//! labeling step.
//!
//! Training consumes manually confirmed examples, expanding variable-length
//! sub-item answers into extra rows; prediction replays the same bounded
//! expansion loop. The trained model round-trips through an opaque JSON
//! artifact.

use anyhow::Context;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use triage_types::{TrainingExample, TypingConfig};

mod dataset;
mod network;

pub use dataset::{expand_labels, image_features, ItemFailure};
pub use network::MultiHeadNetwork;

#[derive(Debug, Error)]
pub enum ModelError {
    /// Prediction was requested before any training or loading.
    #[error("model has not been trained yet")]
    NotTrained,
    #[error("no usable training rows (every example failed preparation)")]
    NoTrainingData,
    #[error("step {step:?} has no configured options")]
    EmptyStep { step: String },
    #[error("value {value:?} is not an option of step {step:?}")]
    UnknownOption { step: String, value: String },
    #[error(transparent)]
    Render(#[from] svg_raster::RenderError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Training hyperparameters. The defaults are sized for small manually
/// labeled example sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOptions {
    pub epochs: usize,
    pub learning_rate: f32,
    /// Fraction of rows held out for validation; 0 disables the split and
    /// early stopping monitors the training loss instead.
    pub validation_split: f64,
    /// Epochs without improvement before stopping early.
    pub patience: usize,
    pub seed: u64,
    /// Square raster edge for the model input.
    pub image_size: u32,
    pub hidden_dim: usize,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        TrainingOptions {
            epochs: 100,
            learning_rate: 0.05,
            validation_split: 0.2,
            patience: 20,
            seed: 42,
            image_size: 64,
            hidden_dim: 64,
        }
    }
}

/// Loss/accuracy curve point for one epoch, for the caller to display or
/// persist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

/// Outcome of one training batch.
#[derive(Debug)]
pub struct TrainingReport {
    pub history: Vec<EpochStats>,
    /// Examples skipped during preparation, with reasons.
    pub failures: Vec<ItemFailure>,
    /// Expanded row count actually trained on.
    pub rows: usize,
    pub stopped_early: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HeadSpec {
    step_id: String,
    option_values: Vec<String>,
    loss_weight: f32,
}

/// A trainable (and persistable) multi-step classifier bound to one
/// labeling-step configuration. Changing the steps requires retraining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingModel {
    config: TypingConfig,
    image_size: u32,
    heads: Vec<HeadSpec>,
    network: Option<MultiHeadNetwork>,
}

impl TypingModel {
    pub fn new(config: TypingConfig) -> Self {
        TypingModel {
            config,
            image_size: 0,
            heads: Vec::new(),
            network: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.network.is_some()
    }

    pub fn config(&self) -> &TypingConfig {
        &self.config
    }

    /// Ordered `(step, option count)` capability list with per-head loss
    /// weights: every head is scaled by `1/sqrt(option count)`, and the
    /// sub-item step carries double weight.
    fn build_heads(&self) -> Vec<HeadSpec> {
        self.config
            .sorted_steps()
            .iter()
            .map(|step| {
                let options: Vec<String> = step
                    .sorted_option_values()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                let emphasis = match &self.config.sub_item {
                    Some(spec) if spec.item_step == step.id => 2.0,
                    _ => 1.0,
                };
                HeadSpec {
                    step_id: step.id.clone(),
                    loss_weight: emphasis / (options.len().max(1) as f32).sqrt(),
                    option_values: options,
                }
            })
            .collect()
    }

    /// Train on a batch of confirmed examples. Items that fail preparation
    /// are skipped and reported; only a batch with no usable rows at all is
    /// an error. Early stopping restores the best weights seen.
    pub fn train(
        &mut self,
        examples: &[TrainingExample],
        options: &TrainingOptions,
    ) -> Result<TrainingReport, ModelError> {
        let heads = self.build_heads();
        let (data, failures) = dataset::prepare(examples, &self.config, options.image_size);
        if data.features.is_empty() {
            return Err(ModelError::NoTrainingData);
        }

        let head_weights: Vec<f32> = heads.iter().map(|h| h.loss_weight).collect();
        let head_sizes: Vec<usize> = heads.iter().map(|h| h.option_values.len()).collect();
        let input_dim = data.features[0].len();

        // Shuffled validation split at row granularity.
        let mut order: Vec<usize> = (0..data.features.len()).collect();
        let mut rng = StdRng::seed_from_u64(options.seed);
        order.shuffle(&mut rng);
        let val_count = ((data.features.len() as f64) * options.validation_split).round() as usize;
        let val_count = val_count.min(data.features.len().saturating_sub(1));
        let (val_idx, train_idx) = order.split_at(val_count);

        let pick = |idx: &[usize]| -> (Vec<DVector<f32>>, Vec<Vec<usize>>) {
            (
                idx.iter().map(|&i| data.features[i].clone()).collect(),
                idx.iter().map(|&i| data.labels[i].clone()).collect(),
            )
        };
        let (train_x, train_y) = pick(train_idx);
        let (val_x, val_y) = pick(val_idx);

        info!(
            rows = data.features.len(),
            train = train_x.len(),
            val = val_x.len(),
            failed = failures.len(),
            heads = heads.len(),
            "starting training"
        );

        let mut network =
            MultiHeadNetwork::new(input_dim, options.hidden_dim, &head_sizes, options.seed);
        let mut history = Vec::with_capacity(options.epochs);
        let mut best: Option<(f64, MultiHeadNetwork)> = None;
        let mut since_best = 0usize;
        let mut stopped_early = false;

        for epoch in 0..options.epochs {
            let train_stats =
                network.train_epoch(&train_x, &train_y, &head_weights, options.learning_rate);
            // Monitor validation when held out, training loss otherwise.
            let monitor_stats = if val_x.is_empty() {
                network.evaluate(&train_x, &train_y, &head_weights)
            } else {
                network.evaluate(&val_x, &val_y, &head_weights)
            };

            history.push(EpochStats {
                epoch,
                loss: train_stats.loss,
                accuracy: train_stats.accuracy,
                val_loss: monitor_stats.loss,
                val_accuracy: monitor_stats.accuracy,
            });
            debug!(
                epoch,
                loss = train_stats.loss,
                val_loss = monitor_stats.loss,
                "epoch complete"
            );

            match &best {
                Some((best_loss, _)) if monitor_stats.loss >= *best_loss => {
                    since_best += 1;
                    if since_best >= options.patience {
                        info!(epoch, "early stopping, restoring best weights");
                        stopped_early = true;
                        break;
                    }
                }
                _ => {
                    best = Some((monitor_stats.loss, network.clone()));
                    since_best = 0;
                }
            }
        }

        if let Some((_, best_network)) = best {
            network = best_network;
        }

        self.image_size = options.image_size;
        self.heads = heads;
        self.network = Some(network);

        Ok(TrainingReport {
            history,
            failures,
            rows: data.features.len(),
            stopped_early,
        })
    }

    /// Predict one option value per step, replaying the bounded sub-item
    /// loop: while the flag head answers affirmatively, another round of
    /// round-indexed keys is predicted, up to the configured cap.
    pub fn predict(&self, markup: &str) -> Result<BTreeMap<String, String>, ModelError> {
        let network = self.network.as_ref().ok_or(ModelError::NotTrained)?;
        let features = dataset::image_features(markup, self.image_size)?;

        let mut results = BTreeMap::new();
        let max_rounds = self
            .config
            .sub_item
            .as_ref()
            .map(|s| s.max_rounds.max(1))
            .unwrap_or(1);

        for round in 1..=max_rounds {
            let picks = network.predict(&features);
            let mut another = false;

            for (head, &choice) in self.heads.iter().zip(&picks) {
                let value = head
                    .option_values
                    .get(choice)
                    .cloned()
                    .unwrap_or_default();
                match &self.config.sub_item {
                    Some(spec) if spec.item_step == head.step_id => {
                        results.insert(spec.item_key(round), value);
                    }
                    Some(spec) if spec.flag_step == head.step_id => {
                        another = value == spec.affirmative;
                        results.insert(spec.flag_key(round), value);
                    }
                    _ => {
                        // Non-repeating steps are answered once.
                        if round == 1 {
                            results.insert(head.step_id.clone(), value);
                        }
                    }
                }
            }

            if !another {
                break;
            }
        }

        Ok(results)
    }

    /// Persist the trained model as an opaque JSON artifact.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string(self).context("failed to serialize model")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write model to {}", path.display()))?;
        info!(path = %path.display(), "model saved");
        Ok(())
    }

    /// Load a previously saved model artifact.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model from {}", path.display()))?;
        let model: TypingModel =
            serde_json::from_str(&json).context("failed to deserialize model")?;
        info!(path = %path.display(), trained = model.is_trained(), "model loaded");
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_types::{MarkupSource, SubItemSpec, TypingStep};

    const CIRCLE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><circle cx="50" cy="50" r="40" fill="black"/></svg>"#;
    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100"><rect x="10" y="10" width="80" height="80" fill="black"/></svg>"#;

    fn shape_config() -> TypingConfig {
        let mut config = TypingConfig {
            steps: vec![TypingStep::new("shape", "Shape", &["circle", "square"])],
            sub_item: None,
        };
        config.normalize_orders();
        config
    }

    fn examples() -> Vec<TrainingExample> {
        vec![
            TrainingExample {
                file_name: "circle.svg".into(),
                source: MarkupSource::Inline(CIRCLE.into()),
                results: [("shape".to_string(), "circle".to_string())].into(),
            },
            TrainingExample {
                file_name: "square.svg".into(),
                source: MarkupSource::Inline(SQUARE.into()),
                results: [("shape".to_string(), "square".to_string())].into(),
            },
        ]
    }

    fn quick_options() -> TrainingOptions {
        TrainingOptions {
            epochs: 200,
            learning_rate: 0.2,
            validation_split: 0.0,
            patience: 200,
            seed: 7,
            image_size: 16,
            hidden_dim: 16,
        }
    }

    #[test]
    fn predict_before_training_is_an_error() {
        let model = TypingModel::new(shape_config());
        assert!(matches!(model.predict(CIRCLE), Err(ModelError::NotTrained)));
    }

    #[test]
    fn trains_and_reproduces_confirmed_labels() {
        let mut model = TypingModel::new(shape_config());
        let report = model.train(&examples(), &quick_options()).unwrap();

        assert_eq!(report.rows, 2);
        assert!(report.failures.is_empty());
        assert!(!report.history.is_empty());
        // The curve must improve over training.
        let first = report.history.first().unwrap().loss;
        let last = report.history.last().unwrap().loss;
        assert!(last < first, "loss did not improve: {first} -> {last}");

        let prediction = model.predict(CIRCLE).unwrap();
        assert_eq!(prediction["shape"], "circle");
        let prediction = model.predict(SQUARE).unwrap();
        assert_eq!(prediction["shape"], "square");
    }

    #[test]
    fn batch_continues_past_broken_examples() {
        let mut bad = examples();
        bad.push(TrainingExample {
            file_name: "broken.svg".into(),
            source: MarkupSource::Inline("<svg><rect".into()),
            results: BTreeMap::new(),
        });

        let mut model = TypingModel::new(shape_config());
        let report = model.train(&bad, &quick_options()).unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file_name, "broken.svg");
    }

    #[test]
    fn all_examples_failing_is_an_error() {
        let broken = vec![TrainingExample {
            file_name: "broken.svg".into(),
            source: MarkupSource::Inline("<svg><rect".into()),
            results: BTreeMap::new(),
        }];
        let mut model = TypingModel::new(shape_config());
        assert!(matches!(
            model.train(&broken, &quick_options()),
            Err(ModelError::NoTrainingData)
        ));
    }

    #[test]
    fn save_load_round_trip_preserves_predictions() {
        let mut model = TypingModel::new(shape_config());
        model.train(&examples(), &quick_options()).unwrap();

        let dir = std::env::temp_dir().join(format!("typing-model-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.json");
        model.save(&path).unwrap();
        let restored = TypingModel::load(&path).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(model.predict(CIRCLE).unwrap(), restored.predict(CIRCLE).unwrap());
        assert_eq!(model.predict(SQUARE).unwrap(), restored.predict(SQUARE).unwrap());
    }

    #[test]
    fn prediction_replays_the_sub_item_loop_with_indexed_keys() {
        let mut config = TypingConfig {
            steps: vec![
                TypingStep::new("cutout", "Cutout", &["none", "star"]),
                TypingStep::new("additional_cutout", "Another?", &["no", "yes"]),
            ],
            sub_item: Some(SubItemSpec::new("cutout", "additional_cutout", "yes")),
        };
        config.normalize_orders();

        let ex = vec![TrainingExample {
            file_name: "circle.svg".into(),
            source: MarkupSource::Inline(CIRCLE.into()),
            results: [
                ("cutout".to_string(), "star".to_string()),
                ("additional_cutout_1".to_string(), "no".to_string()),
            ]
            .into(),
        }];

        let mut model = TypingModel::new(config);
        model.train(&ex, &quick_options()).unwrap();
        let prediction = model.predict(CIRCLE).unwrap();

        // Round-one keys are always present; the flag key is indexed.
        assert!(prediction.contains_key("cutout"));
        assert!(prediction.contains_key("additional_cutout_1"));
        // The same image predicts the same flag every round, so the cap is
        // what guarantees termination; the key count stays bounded.
        assert!(prediction.len() <= 2 * SubItemSpec::DEFAULT_MAX_ROUNDS);
    }
}

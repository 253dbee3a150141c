//! Training-data preparation: image feature extraction and the expansion of
//! one confirmed example into one or more training rows.

use nalgebra::DVector;
use tracing::{debug, warn};
use triage_types::{TrainingExample, TypingConfig};

use crate::ModelError;

/// Flatten a rasterized RGB view of the markup into a normalized feature
/// vector (row-major, channels interleaved, values in [0, 1]).
pub fn image_features(markup: &str, size: u32) -> Result<DVector<f32>, ModelError> {
    let img = svg_raster::rasterize_rgb(markup, size)?;
    let data: Vec<f32> = img.as_raw().iter().map(|&b| b as f32 / 255.0).collect();
    Ok(DVector::from_vec(data))
}

/// Expand one example into per-round label rows.
///
/// Without a sub-item spec this is a single row. With one, round `i` reads
/// the round-indexed keys for the item and flag steps and the plain keys
/// for everything else; expansion continues while the raw results hold the
/// affirmative flag answer, hard-capped at `max_rounds`. Missing answers
/// default to the step's first configured option.
pub fn expand_labels(
    example: &TrainingExample,
    config: &TypingConfig,
) -> Result<Vec<Vec<usize>>, ModelError> {
    let steps = config.sorted_steps();
    let mut rows = Vec::new();
    let max_rounds = config
        .sub_item
        .as_ref()
        .map(|s| s.max_rounds.max(1))
        .unwrap_or(1);

    for round in 1..=max_rounds {
        let mut row = Vec::with_capacity(steps.len());
        for step in &steps {
            let key = match &config.sub_item {
                Some(spec) if step.id == spec.item_step => spec.item_key(round),
                Some(spec) if step.id == spec.flag_step => spec.flag_key(round),
                _ => step.id.clone(),
            };
            let value = match example.results.get(&key) {
                Some(v) => v.as_str(),
                None => step.default_value().ok_or_else(|| ModelError::EmptyStep {
                    step: step.id.clone(),
                })?,
            };
            let label = step
                .option_index(value)
                .ok_or_else(|| ModelError::UnknownOption {
                    step: step.id.clone(),
                    value: value.to_string(),
                })?;
            row.push(label);
        }
        rows.push(row);

        let another = match &config.sub_item {
            Some(spec) => example
                .results
                .get(&spec.flag_key(round))
                .is_some_and(|v| v == &spec.affirmative),
            None => false,
        };
        if !another {
            break;
        }
        if round == max_rounds {
            warn!(
                file = %example.file_name,
                max_rounds, "sub-item expansion hit the round cap"
            );
        }
    }

    Ok(rows)
}

/// Expanded training rows: each row shares the image features of its source
/// example and carries one label index per configured step.
#[derive(Debug, Default)]
pub struct Dataset {
    pub features: Vec<DVector<f32>>,
    pub labels: Vec<Vec<usize>>,
}

/// A per-item failure recorded while preparing a batch.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub file_name: String,
    pub reason: String,
}

/// Build the dataset for a batch of examples. A failing item (unreadable
/// file, unrenderable markup, answer value not among a step's options) is
/// skipped and reported; the batch continues.
pub fn prepare(
    examples: &[TrainingExample],
    config: &TypingConfig,
    image_size: u32,
) -> (Dataset, Vec<ItemFailure>) {
    let mut dataset = Dataset::default();
    let mut failures = Vec::new();

    for example in examples {
        let prepared = example
            .source
            .load()
            .map_err(ModelError::from)
            .and_then(|markup| image_features(&markup, image_size))
            .and_then(|features| Ok((features, expand_labels(example, config)?)));

        match prepared {
            Ok((features, rows)) => {
                debug!(file = %example.file_name, rows = rows.len(), "prepared example");
                for row in rows {
                    dataset.features.push(features.clone());
                    dataset.labels.push(row);
                }
            }
            Err(err) => {
                warn!(file = %example.file_name, %err, "skipping example");
                failures.push(ItemFailure {
                    file_name: example.file_name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    (dataset, failures)
}

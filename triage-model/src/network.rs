//! The multi-output network: a shared dense hidden layer feeding one
//! softmax head per labeling step. Weights live in `nalgebra` matrices and
//! the gradients are computed by hand; the whole struct serializes, which
//! is what makes the trained artifact round-trippable.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Dense {
    weights: DMatrix<f32>,
    bias: DVector<f32>,
}

impl Dense {
    fn glorot(rows: usize, cols: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (rows + cols) as f32).sqrt();
        Dense {
            weights: DMatrix::from_fn(rows, cols, |_, _| rng.gen_range(-limit..limit)),
            bias: DVector::zeros(rows),
        }
    }

    fn forward(&self, input: &DVector<f32>) -> DVector<f32> {
        &self.weights * input + &self.bias
    }
}

fn relu(v: &DVector<f32>) -> DVector<f32> {
    v.map(|x| x.max(0.0))
}

fn softmax(logits: &DVector<f32>) -> DVector<f32> {
    let max = logits.max();
    let exps = logits.map(|x| (x - max).exp());
    let sum = exps.sum();
    exps / sum
}

/// Per-epoch aggregates for one dataset pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassStats {
    /// Mean weighted cross-entropy across rows and heads.
    pub loss: f64,
    /// Fraction of (row, head) pairs predicted correctly.
    pub accuracy: f64,
}

/// Shared hidden layer plus one classification head per labeling step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiHeadNetwork {
    input_dim: usize,
    hidden: Dense,
    heads: Vec<Dense>,
}

impl MultiHeadNetwork {
    /// Build from the ordered `(step, option count)` capability list. The
    /// head list is fixed for the lifetime of the trained model.
    pub fn new(input_dim: usize, hidden_dim: usize, head_sizes: &[usize], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let hidden = Dense::glorot(hidden_dim, input_dim, &mut rng);
        let heads = head_sizes
            .iter()
            .map(|&classes| Dense::glorot(classes, hidden_dim, &mut rng))
            .collect();
        MultiHeadNetwork {
            input_dim,
            hidden,
            heads,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn head_count(&self) -> usize {
        self.heads.len()
    }

    /// Per-head class probability vectors for one input.
    pub fn forward(&self, input: &DVector<f32>) -> Vec<DVector<f32>> {
        let hidden = relu(&self.hidden.forward(input));
        self.heads
            .iter()
            .map(|head| softmax(&head.forward(&hidden)))
            .collect()
    }

    /// Argmax class per head for one input.
    pub fn predict(&self, input: &DVector<f32>) -> Vec<usize> {
        self.forward(input)
            .iter()
            .map(|probs| probs.argmax().0)
            .collect()
    }

    /// Evaluate without updating weights.
    pub fn evaluate(
        &self,
        features: &[DVector<f32>],
        labels: &[Vec<usize>],
        head_weights: &[f32],
    ) -> PassStats {
        let mut loss = 0.0f64;
        let mut correct = 0usize;

        for (x, row) in features.iter().zip(labels) {
            let probs = self.forward(x);
            for (k, (p, &y)) in probs.iter().zip(row).enumerate() {
                loss += f64::from(head_weights[k]) * f64::from(-(p[y].max(1e-12)).ln());
                if p.argmax().0 == y {
                    correct += 1;
                }
            }
        }

        let rows = features.len().max(1);
        let cells = (features.len() * self.heads.len()).max(1);
        PassStats {
            loss: loss / rows as f64,
            accuracy: correct as f64 / cells as f64,
        }
    }

    /// One full-batch gradient step. Returns the pre-update pass stats.
    pub fn train_epoch(
        &mut self,
        features: &[DVector<f32>],
        labels: &[Vec<usize>],
        head_weights: &[f32],
        learning_rate: f32,
    ) -> PassStats {
        let n = features.len();
        if n == 0 {
            return PassStats::default();
        }

        let mut grad_hidden_w = DMatrix::zeros(self.hidden.weights.nrows(), self.hidden.weights.ncols());
        let mut grad_hidden_b = DVector::zeros(self.hidden.bias.len());
        let mut grad_heads: Vec<(DMatrix<f32>, DVector<f32>)> = self
            .heads
            .iter()
            .map(|h| {
                (
                    DMatrix::zeros(h.weights.nrows(), h.weights.ncols()),
                    DVector::zeros(h.bias.len()),
                )
            })
            .collect();

        let mut loss = 0.0f64;
        let mut correct = 0usize;

        for (x, row) in features.iter().zip(labels) {
            let pre_activation = self.hidden.forward(x);
            let hidden = relu(&pre_activation);
            let mut grad_hidden_out: DVector<f32> = DVector::zeros(hidden.len());

            for (k, (head, &y)) in self.heads.iter().zip(row).enumerate() {
                let probs = softmax(&head.forward(&hidden));
                let w = head_weights[k];
                loss += f64::from(w) * f64::from(-(probs[y].max(1e-12)).ln());
                if probs.argmax().0 == y {
                    correct += 1;
                }

                // Softmax + cross-entropy gradient: p - onehot(y).
                let mut grad_logits = probs;
                grad_logits[y] -= 1.0;
                grad_logits *= w;

                grad_heads[k].0 += &grad_logits * hidden.transpose();
                grad_heads[k].1 += &grad_logits;
                grad_hidden_out += head.weights.transpose() * grad_logits;
            }

            // Back through the ReLU.
            let grad_pre = grad_hidden_out.zip_map(&pre_activation, |g, z| if z > 0.0 { g } else { 0.0 });
            grad_hidden_w += &grad_pre * x.transpose();
            grad_hidden_b += grad_pre;
        }

        let scale = learning_rate / n as f32;
        self.hidden.weights -= &grad_hidden_w * scale;
        self.hidden.bias -= &grad_hidden_b * scale;
        for (head, (gw, gb)) in self.heads.iter_mut().zip(&grad_heads) {
            head.weights -= gw * scale;
            head.bias -= gb * scale;
        }

        let cells = n * self.heads.len();
        PassStats {
            loss: loss / n as f64,
            accuracy: correct as f64 / cells as f64,
        }
    }
}

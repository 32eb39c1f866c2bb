//! Startup model training.
//!
//! A two-stage pipeline: per-feature standardisation followed by multinomial
//! logistic regression, fitted by full-batch gradient descent with an L2
//! penalty on the weights. Training is deterministic (zero-initialised).

use thiserror::Error;

use crate::config::ModelConfig;
use crate::inference::dataset::{self, Dataset};
use crate::inference::model::{Classifier, Prediction};
use crate::inference::FEATURE_COUNT;

/// Largest magnitude, in standard deviations, a scaled feature may take.
/// Keeps logits finite for any finite input.
pub const SCALED_FEATURE_LIMIT: f64 = 1e6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainingError {
    #[error("training set is empty")]
    EmptyDataset,

    #[error("{features} feature rows but {labels} labels")]
    LengthMismatch { features: usize, labels: usize },

    #[error("need at least two classes, found {0}")]
    TooFewClasses(usize),

    #[error("non-finite parameters after epoch {0}")]
    Diverged(usize),
}

/// Zero-mean, unit-variance scaling per feature.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    /// Fit on `rows`. Constant features get a scale of 1.
    pub fn fit(rows: &[[f64; FEATURE_COUNT]]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = [0.0; FEATURE_COUNT];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x / n;
            }
        }

        let mut scale = [0.0; FEATURE_COUNT];
        for row in rows {
            for j in 0..FEATURE_COUNT {
                scale[j] += (row[j] - mean[j]).powi(2) / n;
            }
        }
        for s in scale.iter_mut() {
            *s = s.sqrt();
            if *s == 0.0 {
                *s = 1.0;
            }
        }

        Self { mean, scale }
    }

    /// Standardise `row`, saturating at [`SCALED_FEATURE_LIMIT`].
    pub fn transform(&self, row: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            let scaled = (row[j] - self.mean[j]) / self.scale[j];
            out[j] = scaled.clamp(-SCALED_FEATURE_LIMIT, SCALED_FEATURE_LIMIT);
        }
        out
    }
}

/// Multinomial logistic regression.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftmaxRegression {
    weights: Vec<[f64; FEATURE_COUNT]>,
    bias: Vec<f64>,
}

impl SoftmaxRegression {
    pub fn fit(
        rows: &[[f64; FEATURE_COUNT]],
        labels: &[usize],
        classes: usize,
        config: &ModelConfig,
    ) -> Result<Self, TrainingError> {
        let n = rows.len() as f64;
        let mut model = Self {
            weights: vec![[0.0; FEATURE_COUNT]; classes],
            bias: vec![0.0; classes],
        };

        for epoch in 0..config.epochs {
            let mut grad_w = vec![[0.0; FEATURE_COUNT]; classes];
            let mut grad_b = vec![0.0; classes];

            for (row, &label) in rows.iter().zip(labels) {
                let probs = model.predict_proba(row);
                for k in 0..classes {
                    let err = probs[k] - if k == label { 1.0 } else { 0.0 };
                    grad_b[k] += err / n;
                    for j in 0..FEATURE_COUNT {
                        grad_w[k][j] += err * row[j] / n;
                    }
                }
            }

            for k in 0..classes {
                for j in 0..FEATURE_COUNT {
                    let penalty = config.l2 * model.weights[k][j] / n;
                    model.weights[k][j] -= config.learning_rate * (grad_w[k][j] + penalty);
                }
                model.bias[k] -= config.learning_rate * grad_b[k];
            }

            if !model.is_finite() {
                return Err(TrainingError::Diverged(epoch));
            }
        }

        Ok(model)
    }

    /// Class probabilities for an already scaled row.
    pub fn predict_proba(&self, row: &[f64; FEATURE_COUNT]) -> Vec<f64> {
        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(w, b)| b + w.iter().zip(row).map(|(wi, xi)| wi * xi).sum::<f64>())
            .collect();

        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }

    fn is_finite(&self) -> bool {
        self.bias.iter().all(|b| b.is_finite())
            && self.weights.iter().flatten().all(|w| w.is_finite())
    }
}

/// Scaler and classifier applied in sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    scaler: StandardScaler,
    classifier: SoftmaxRegression,
}

impl Pipeline {
    pub fn fit(data: &Dataset, config: &ModelConfig) -> Result<Self, TrainingError> {
        if data.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }
        if data.features.len() != data.labels.len() {
            return Err(TrainingError::LengthMismatch {
                features: data.features.len(),
                labels: data.labels.len(),
            });
        }
        let classes = data.class_count();
        if classes < 2 {
            return Err(TrainingError::TooFewClasses(classes));
        }

        let scaler = StandardScaler::fit(&data.features);
        let scaled: Vec<_> = data.features.iter().map(|row| scaler.transform(row)).collect();
        let classifier = SoftmaxRegression::fit(&scaled, &data.labels, classes, config)?;

        Ok(Self { scaler, classifier })
    }

    /// Fraction of `data` classified correctly.
    pub fn accuracy(&self, data: &Dataset) -> f64 {
        if data.is_empty() {
            return 0.0;
        }
        let correct = data
            .features
            .iter()
            .zip(&data.labels)
            .filter(|&(row, &label)| self.predict(row).class == label)
            .count();
        correct as f64 / data.len() as f64
    }
}

impl Classifier for Pipeline {
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Prediction {
        let probabilities = self.classifier.predict_proba(&self.scaler.transform(features));
        let class = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(i, _)| i);
        Prediction {
            class,
            probabilities,
        }
    }
}

/// Train the service model on the embedded Iris data.
pub fn train(config: &ModelConfig) -> Result<Pipeline, TrainingError> {
    Pipeline::fit(&dataset::iris(), config)
}

//! Model capability and readiness.
//!
//! # Responsibilities
//! - Define the capability handlers rely on: predict with probabilities
//! - Hold the process-wide model reference behind a write-once slot
//!
//! # Design Decisions
//! - The slot is written exactly once; readers never block and never see a
//!   partially built model
//! - Handlers treat an empty slot as "not ready" and fail fast

use std::sync::{Arc, OnceLock};

use serde::Serialize;
use thiserror::Error;

use crate::inference::FEATURE_COUNT;

/// Allowed drift of a probability vector's sum from 1.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Something that can classify a feature vector.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Prediction;
}

/// Predicted class and per-class probabilities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class: usize,
    pub probabilities: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model returned no probabilities")]
    EmptyDistribution,

    #[error("model returned a non-finite probability at index {0}")]
    NonFinite(usize),

    #[error("probabilities sum to {0}, expected 1")]
    Unnormalised(f64),

    #[error("predicted class {class} outside {classes} classes")]
    ClassOutOfRange { class: usize, classes: usize },

    #[error("model already installed")]
    AlreadyInstalled,
}

impl Prediction {
    /// Check the output satisfies the capability contract.
    pub fn check(&self) -> Result<(), ModelError> {
        if self.probabilities.is_empty() {
            return Err(ModelError::EmptyDistribution);
        }
        if let Some(i) = self
            .probabilities
            .iter()
            .position(|p| !p.is_finite() || *p < 0.0)
        {
            return Err(ModelError::NonFinite(i));
        }
        let sum: f64 = self.probabilities.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ModelError::Unnormalised(sum));
        }
        if self.class >= self.probabilities.len() {
            return Err(ModelError::ClassOutOfRange {
                class: self.class,
                classes: self.probabilities.len(),
            });
        }
        Ok(())
    }
}

/// Write-once handle to the shared model.
#[derive(Clone, Default)]
pub struct ModelSlot {
    inner: Arc<OnceLock<Arc<dyn Classifier>>>,
}

impl ModelSlot {
    /// An empty slot; the service is not ready until [`ModelSlot::install`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot that is ready from the start.
    pub fn ready(model: Arc<dyn Classifier>) -> Self {
        let slot = Self::new();
        let _ = slot.inner.set(model);
        slot
    }

    pub fn install(&self, model: Arc<dyn Classifier>) -> Result<(), ModelError> {
        self.inner.set(model).map_err(|_| ModelError::AlreadyInstalled)
    }

    pub fn get(&self) -> Option<Arc<dyn Classifier>> {
        self.inner.get().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.get().is_some()
    }
}

impl std::fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSlot")
            .field("ready", &self.is_ready())
            .finish()
    }
}

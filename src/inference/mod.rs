//! Inference subsystem.
//!
//! # Data Flow
//! ```text
//! startup: dataset.rs (Iris) → training.rs (scaler + softmax) → ModelSlot
//! request: JSON body → contract.rs (validate) → Classifier::predict → Prediction
//! ```

pub mod contract;
pub mod dataset;
pub mod model;
pub mod training;

/// Number of input features per sample.
pub const FEATURE_COUNT: usize = 4;

pub use contract::{PredictionInput, ValidationError, Violation, ViolationKind};
pub use model::{Classifier, ModelError, ModelSlot, Prediction};
pub use training::{train, Pipeline, TrainingError};

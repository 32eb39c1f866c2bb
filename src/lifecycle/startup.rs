//! Startup model loading.
//!
//! # Responsibilities
//! - Train the model off the async workers once the listener is bound
//! - Install the trained model into the shared [`ModelSlot`]
//! - Report the outcome as a `model_event` record
//!
//! # Design Decisions
//! - A training failure is logged at critical and leaves the slot empty; the
//!   process keeps serving 503s rather than exiting

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;

use crate::config::ModelConfig;
use crate::inference::{self, ModelSlot};
use crate::observability::{metrics, FaultReport};

/// Train and install the model in the background.
pub fn spawn_model_training(slot: ModelSlot, config: ModelConfig) -> JoinHandle<bool> {
    tokio::spawn(load_model(slot, config))
}

/// Train the model and install it into `slot`. Returns whether the slot is
/// ready afterwards.
pub async fn load_model(slot: ModelSlot, config: ModelConfig) -> bool {
    let started = Instant::now();
    metrics::record_model_ready(slot.is_ready());

    let joined = tokio::task::spawn_blocking(move || inference::train(&config)).await;
    let outcome = match joined {
        Ok(Ok(model)) => slot
            .install(Arc::new(model))
            .map_err(|err| FaultReport::from_error(&err)),
        Ok(Err(err)) => Err(FaultReport::from_error(&err)),
        Err(err) => Err(FaultReport::from_error(&err)),
    };

    match outcome {
        Ok(()) => {
            tracing::info!(
                component = "model",
                model_event = "trained",
                duration_ms = started.elapsed().as_secs_f64() * 1000.0,
                "model trained"
            );
        }
        Err(report) => {
            tracing::error!(
                severity = "critical",
                component = "model",
                model_event = "train_failed",
                "error.type" = %report.kind,
                "error.message" = %report.message,
                "error.stack" = %report.stack,
                "model training failed"
            );
        }
    }

    let ready = slot.is_ready();
    metrics::record_model_ready(ready);
    ready
}

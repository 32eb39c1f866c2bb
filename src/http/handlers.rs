//! Endpoint handlers.
//!
//! `/predict` pipeline:
//! ```text
//! body → contract (400) → model slot (503) → blocking predict (500 on fault)
//!      → distribution check (500) → {"prediction", "probabilities"}
//! ```

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::inference::{PredictionInput, ValidationError};
use crate::observability::{metrics, FaultReport, RequestContext};

#[derive(Debug, Serialize)]
pub struct PredictionBody {
    pub prediction: usize,
    pub probabilities: Vec<f64>,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    if !state.model.is_ready() {
        return Err(ApiError::Unavailable);
    }
    Ok(Json(json!({ "status": "ok" })))
}

/// `POST /predict`
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionBody>, ApiError> {
    let payload = match body {
        Ok(Json(payload)) => payload,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(ApiError::PayloadTooLarge);
        }
        Err(rejection) => return Err(ValidationError::from_rejection(&rejection).into()),
    };
    let input = PredictionInput::validate(&payload)?;

    let model = state.model.get().ok_or(ApiError::Unavailable)?;

    let prediction = RequestContext::spawn_blocking(move || model.predict(input.features()))
        .await
        .map_err(ApiError::Internal)?;

    prediction
        .check()
        .map_err(|err| ApiError::Internal(FaultReport::from_error(&err)))?;

    metrics::record_prediction(prediction.class);
    tracing::debug!(component = "model", "predicted class {}", prediction.class);

    Ok(Json(PredictionBody {
        prediction: prediction.class,
        probabilities: prediction.probabilities,
    }))
}

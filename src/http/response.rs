//! Error responses.
//!
//! # Responsibilities
//! - Map handler failures to status codes and JSON bodies
//! - Hand internal fault details to the request middleware without leaking
//!   them to the client
//! - Render panics caught by the outermost layer as a generic 500
//!
//! # Design Decisions
//! - Internal errors travel to the middleware as a [`FaultReport`] response
//!   extension; the client only ever sees `{"detail":"Internal Server Error"}`
//! - A panic re-raised by the middleware carries an [`EscapedFault`] payload
//!   so the 500 built here can still echo `X-Request-ID`

use std::any::Any;

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::http::request::{CorrelationId, X_REQUEST_ID};
use crate::inference::ValidationError;
use crate::observability::FaultReport;

/// Errors a handler may return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("model not loaded")]
    Unavailable,

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("internal fault: {0}")]
    Internal(FaultReport),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "detail": "Invalid request", "errors": err.violations })),
            )
                .into_response(),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "detail": "Model not loaded" })),
            )
                .into_response(),
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "detail": "Request body too large" })),
            )
                .into_response(),
            ApiError::Internal(report) => {
                let mut response = internal_error_body();
                response.extensions_mut().insert(report);
                response
            }
        }
    }
}

fn internal_error_body() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": "Internal Server Error" })),
    )
        .into_response()
}

/// Panic payload re-raised by the request middleware after logging.
#[derive(Debug)]
pub struct EscapedFault {
    pub correlation_id: CorrelationId,
    pub report: FaultReport,
}

/// Response for a panic that reached the outermost layer.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let mut response = internal_error_body();
    if let Some(fault) = payload.downcast_ref::<EscapedFault>() {
        if let Ok(value) = HeaderValue::from_str(fault.correlation_id.as_str()) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
    }
    response
}

//! Request observability middleware.
//!
//! # Responsibilities
//! - Resolve the correlation ID from `X-Request-ID`
//! - Scope the request's handling to that ID
//! - Emit exactly one `event=request` record per request
//! - Echo the ID on every response, including error responses
//!
//! # Design Decisions
//! - The log level follows the outcome: 5xx or a panic is `error`, 4xx is
//!   `warning`, everything else `info`
//! - Panics are caught, logged with their stack, then re-raised so the outer
//!   catch-panic layer owns the 500; the re-raised payload keeps the ID
//! - Internal errors arrive as a [`FaultReport`] response extension and are
//!   removed before the response leaves the service

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use futures_util::FutureExt;

use crate::http::request::{CorrelationId, X_REQUEST_ID};
use crate::http::response::EscapedFault;
use crate::observability::{fault, metrics, FaultReport, LogLevel, RequestContext};

/// Emit a `tracing` event at a level chosen at runtime.
macro_rules! event_at {
    ($level:expr, $($rest:tt)+) => {
        match $level {
            LogLevel::Error | LogLevel::Critical => tracing::error!($($rest)+),
            LogLevel::Warning => tracing::warn!($($rest)+),
            LogLevel::Info => tracing::info!($($rest)+),
            LogLevel::Debug => tracing::debug!($($rest)+),
        }
    };
}

/// Request attributes captured before the request is consumed.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub path: String,
    pub method: String,
    pub user_agent: Option<String>,
    pub remote_addr: Option<String>,
}

impl RequestSummary {
    pub fn from_request(request: &Request) -> Self {
        Self {
            path: request.uri().path().to_string(),
            method: request.method().to_string(),
            user_agent: request
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            remote_addr: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.to_string()),
        }
    }

    fn log(&self, status: u16, elapsed: Duration, fault: Option<&FaultReport>) {
        let level = outcome_level(status, fault.is_some());
        event_at!(
            level,
            target: "app.request",
            event = "request",
            component = "api",
            path = self.path.as_str(),
            method = self.method.as_str(),
            status = status,
            duration_ms = round_ms(elapsed),
            user_agent = self.user_agent.as_deref(),
            remote_addr = self.remote_addr.as_deref(),
            "error.type" = fault.map(|f| f.kind.as_str()),
            "error.message" = fault.map(|f| f.message.as_str()),
            "error.stack" = fault.map(|f| f.stack.as_str()),
            "request handled"
        );
        metrics::record_request(&self.method, status, elapsed);
    }
}

/// Level of the request record for a given outcome.
pub fn outcome_level(status: u16, faulted: bool) -> LogLevel {
    if faulted || status >= 500 {
        LogLevel::Error
    } else if status >= 400 {
        LogLevel::Warning
    } else {
        LogLevel::Info
    }
}

fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100_000.0).round() / 100.0
}

/// Middleware entry point, installed with `axum::middleware::from_fn`.
pub async fn request_observability(request: Request, next: Next) -> Response {
    let id = CorrelationId::from_header(request.headers().get(X_REQUEST_ID));
    RequestContext::scope(id.clone(), observe(id, request, next)).await
}

async fn observe(id: CorrelationId, request: Request, next: Next) -> Response {
    let summary = RequestSummary::from_request(&request);
    let started = Instant::now();

    let outcome = AssertUnwindSafe(next.run(request)).catch_unwind().await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(mut response) => {
            let fault = response.extensions_mut().remove::<FaultReport>();
            summary.log(response.status().as_u16(), elapsed, fault.as_ref());
            attach_request_id(&mut response, &id, &summary);
            response
        }
        Err(payload) => {
            let report = fault::take_last_panic(&id)
                .unwrap_or_else(|| FaultReport::from_panic_payload(payload.as_ref()));
            summary.log(500, elapsed, Some(&report));
            std::panic::resume_unwind(Box::new(EscapedFault {
                correlation_id: id,
                report,
            }))
        }
    }
}

fn attach_request_id(response: &mut Response, id: &CorrelationId, summary: &RequestSummary) {
    match HeaderValue::from_str(id.as_str()) {
        Ok(value) => {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        Err(err) => {
            tracing::warn!(
                target: "app.request",
                event = "request_id_header_error",
                component = "api",
                path = summary.path.as_str(),
                method = summary.method.as_str(),
                "error.type" = "InvalidHeaderValue",
                "error.message" = %err,
                "failed to set X-Request-ID response header"
            );
        }
    }
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `inference_requests_total` (counter): requests by method, status
//! - `inference_request_duration_seconds` (histogram): latency by method
//! - `inference_predictions_total` (counter): predictions by class
//! - `inference_model_ready` (gauge): 1 once the model is installed
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within the tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(component = "metrics", "metrics exporter listening on {addr}");
    Ok(())
}

pub fn record_request(method: &str, status: u16, elapsed: Duration) {
    counter!(
        "inference_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("inference_request_duration_seconds", "method" => method.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_prediction(class: usize) {
    counter!("inference_predictions_total", "class" => class.to_string()).increment(1);
}

pub fn record_model_ready(ready: bool) {
    gauge!("inference_model_ready").set(if ready { 1.0 } else { 0.0 });
}

//! Structured logging.
//!
//! # Responsibilities
//! - Install the process-wide `tracing` subscriber
//! - Render every event as one [`StructuredLogRecord`] JSON line
//! - Stamp records with the current request's correlation ID
//! - Enforce the configured minimum level, including `critical`
//!
//! # Design Decisions
//! - Call sites use plain `tracing` macros; the record schema lives here
//! - Fields outside the record schema are dropped
//! - `severity = "critical"` on an ERROR event promotes it to critical, since
//!   `tracing` has no level above ERROR
//! - Each line is handed to the writer in a single `write_all`

use std::fmt;
use std::io::Write;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::ObservabilityConfig;
use crate::observability::context::RequestContext;
use crate::observability::record::{ErrorDetail, LogLevel, ServiceMeta, StructuredLogRecord};

/// Layer writing [`StructuredLogRecord`] lines to `W`.
pub struct JsonLogLayer<W> {
    meta: ServiceMeta,
    min_level: LogLevel,
    make_writer: W,
}

impl<W> JsonLogLayer<W>
where
    W: for<'a> MakeWriter<'a> + 'static,
{
    pub fn new(meta: ServiceMeta, min_level: LogLevel, make_writer: W) -> Self {
        Self {
            meta,
            min_level,
            make_writer,
        }
    }
}

impl<S, W> Layer<S> for JsonLogLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let mut level = LogLevel::from_tracing(metadata.level());
        if level == LogLevel::Error && visitor.severity.as_deref() == Some("critical") {
            level = LogLevel::Critical;
        }
        if level < self.min_level {
            return;
        }

        let mut record = StructuredLogRecord::new(
            &self.meta,
            level,
            metadata.target(),
            visitor.message.take().unwrap_or_default(),
        );
        record.request_id = RequestContext::current().map(|id| id.to_string());
        visitor.apply(&mut record);

        let Ok(line) = record.to_line() else {
            return;
        };
        let mut writer = self.make_writer.make_writer_for(metadata);
        let _ = writer.write_all(line.as_bytes());
    }
}

/// Collects the event fields that map onto the record schema.
#[derive(Default)]
struct RecordVisitor {
    message: Option<String>,
    severity: Option<String>,
    event: Option<String>,
    path: Option<String>,
    method: Option<String>,
    status: Option<u16>,
    duration_ms: Option<f64>,
    component: Option<String>,
    remote_addr: Option<String>,
    user_agent: Option<String>,
    model_event: Option<String>,
    error_kind: Option<String>,
    error_message: Option<String>,
    error_stack: Option<String>,
}

impl RecordVisitor {
    fn set_text(&mut self, name: &str, value: String) {
        match name {
            "message" => self.message = Some(value),
            "severity" => self.severity = Some(value),
            "event" => self.event = Some(value),
            "path" => self.path = Some(value),
            "method" => self.method = Some(value),
            "status" => self.status = value.parse().ok(),
            "duration_ms" => self.duration_ms = value.parse().ok(),
            "component" => self.component = Some(value),
            "remote_addr" => self.remote_addr = Some(value),
            "user_agent" => self.user_agent = Some(value),
            "model_event" => self.model_event = Some(value),
            "error.type" => self.error_kind = Some(value),
            "error.message" => self.error_message = Some(value),
            "error.stack" => self.error_stack = Some(value),
            _ => {}
        }
    }

    fn apply(self, record: &mut StructuredLogRecord) {
        record.event = self.event;
        record.path = self.path;
        record.method = self.method;
        record.status = self.status;
        record.duration_ms = self.duration_ms;
        record.component = self.component;
        record.remote_addr = self.remote_addr;
        record.user_agent = self.user_agent;
        record.model_event = self.model_event;

        if self.error_kind.is_some() || self.error_message.is_some() {
            record.error = Some(ErrorDetail {
                kind: self.error_kind.unwrap_or_else(|| "UnknownError".to_string()),
                message: self.error_message.unwrap_or_default(),
                stack: self.error_stack.unwrap_or_default(),
            });
        }
    }
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.set_text(field.name(), value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "status" => self.status = u16::try_from(value).ok(),
            "duration_ms" => self.duration_ms = Some(value as f64),
            name => self.set_text(name, value.to_string()),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        match field.name() {
            "status" => self.status = u16::try_from(value).ok(),
            "duration_ms" => self.duration_ms = Some(value as f64),
            name => self.set_text(name, value.to_string()),
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        match field.name() {
            "duration_ms" => self.duration_ms = Some(value),
            name => self.set_text(name, value.to_string()),
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.set_text(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.set_text(field.name(), format!("{value:?}"));
    }
}

/// Install the global subscriber writing JSON lines to stdout.
///
/// `RUST_LOG`, when set, overrides the per-target filter; the configured
/// minimum level is always enforced on top of it.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let min_level = config.min_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.filter_directive()));

    tracing_subscriber::registry()
        .with(filter)
        .with(JsonLogLayer::new(config.service_meta(), min_level, std::io::stdout))
        .try_init()
}

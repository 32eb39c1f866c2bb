//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http middleware
//!     → context.rs (correlation ID scoped to the request)
//!     → tracing events from any subsystem
//!     → logging.rs (JsonLogLayer renders record.rs lines to stdout)
//!
//! Faults:
//!     panic hook / handler errors → fault.rs (FaultReport) → error object
//!
//! Counters:
//!     → metrics.rs (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - One JSON object per line, absent fields omitted
//! - The correlation ID is read from context at emit time, never passed by hand
//! - Context isolation is per task, with a thread-local fallback for blocking work

pub mod context;
pub mod fault;
pub mod logging;
pub mod metrics;
pub mod record;

pub use context::{ContextToken, RequestContext};
pub use fault::{install_panic_hook, FaultReport};
pub use logging::{init_logging, JsonLogLayer};
pub use record::{LogLevel, ServiceMeta, StructuredLogRecord};

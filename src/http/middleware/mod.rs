//! Request middleware.

pub mod observability;

pub use observability::{outcome_level, request_observability, RequestSummary};

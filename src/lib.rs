//! Iris inference service library.

pub mod config;
pub mod http;
pub mod inference;
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use inference::ModelSlot;
pub use lifecycle::Shutdown;

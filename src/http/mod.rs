//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → middleware/observability.rs (correlation ID, request record)
//!     → request.rs (X-Request-ID resolution)
//!     → handlers.rs (/health, /predict)
//!     → response.rs (error bodies, panic 500s)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{CorrelationId, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{with_request_layers, AppState, HttpServer};

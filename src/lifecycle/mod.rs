//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Listener bound → Train model on the blocking pool → Install into ModelSlot
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → HTTP server stops accepting → In-flight requests drain → Exit
//! ```
//!
//! # Design Decisions
//! - Traffic is accepted before the model is ready; readiness is reported
//!   per request, not by delaying the bind
//! - A failed training run is fatal to readiness but not to the process

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_termination;
pub use startup::spawn_model_training;

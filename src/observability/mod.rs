//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! controller components
//!     → tracing macros (structured fields)
//!     → logging.rs subscriber (pretty or JSON, stdout)
//!
//! nginx workers
//!     → named pipe
//!     → log_drain.rs (always-on reader)
//!     → LineSink (tracing, target "nginx")
//! ```

pub mod log_drain;
pub mod logging;

pub use log_drain::{LineSink, LogDrain, TracingSink};

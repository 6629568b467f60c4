//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → reconciliation loop stops after the current tick
//!             → log drain stops reading
//!             → liveness endpoint drains and closes
//! ```
//!
//! # Design Decisions
//! - A tick in flight always runs to completion
//! - The managed nginx process is left running on controller exit

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

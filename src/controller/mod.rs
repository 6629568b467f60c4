//! Reconciliation loop.
//!
//! # State Machine
//! ```text
//! Initializing:
//!     status() → Running?  yes → Steady
//!                          no  → set_config(empty) → start() → Steady
//!     any error → fatal
//!
//! Steady (first tick immediately, then every refresh interval):
//!     fetch_topology() → set_config(snapshot)
//!     any error → logged, previous config stays live, retry next tick
//! ```
//!
//! # Design Decisions
//! - Ticks never overlap: the next sleep starts after the current tick returns
//! - Shutdown is only observed between ticks
//! - The log drain is started by the caller before `run`

pub mod reconciler;

pub use reconciler::Controller;

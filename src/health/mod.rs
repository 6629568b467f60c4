//! Controller liveness subsystem.
//!
//! # Data Flow
//! ```text
//! reconciliation loop
//!     → state.rs (publish StatusReport via ArcSwap)
//!
//! probe (kubelet, load balancer)
//!     → server.rs (GET /health, GET /status)
//!     → reads latest StatusReport
//! ```
//!
//! # Design Decisions
//! - Runs on its own task; never blocks or is blocked by reconciliation
//! - Purely informational: `/health` answers 200 as long as the process lives

pub mod server;
pub mod state;

pub use server::HealthServer;
pub use state::{Phase, StatusHandle, StatusReport};

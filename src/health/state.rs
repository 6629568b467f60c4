//! Controller status shared with the liveness endpoint.
//!
//! # States
//! ```text
//! Initializing → Steady → Stopped
//! ```
//!
//! # Design Decisions
//! - Written only by the reconciliation loop, read by HTTP handlers
//! - Lock-free: each update publishes a fresh immutable report via `ArcSwap`

use arc_swap::ArcSwap;
use serde::Serialize;
use std::sync::Arc;

use crate::proxy::ApplyOutcome;

/// Reconciliation loop phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Initializing,
    Steady,
    Stopped,
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct StatusReport {
    pub phase: Phase,
    /// Completed reconciliation ticks, successful or not.
    pub ticks: u64,
    pub last_outcome: Option<ApplyOutcome>,
    pub last_error: Option<String>,
    pub consecutive_failures: u64,
}

/// Cheaply cloneable handle to the current report.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    inner: Arc<ArcSwap<StatusReport>>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(StatusReport::default())),
        }
    }

    pub fn load(&self) -> Arc<StatusReport> {
        self.inner.load_full()
    }

    /// Publish a modified copy of the current report.
    pub fn update(&self, f: impl FnOnce(&mut StatusReport)) {
        let mut next = StatusReport::clone(&self.inner.load());
        f(&mut next);
        self.inner.store(Arc::new(next));
    }
}

impl Default for StatusHandle {
    fn default() -> Self {
        Self::new()
    }
}

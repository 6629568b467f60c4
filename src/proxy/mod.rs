//! Proxy process management subsystem.
//!
//! # State Machine
//! ```text
//! status():  pid file absent → Stopped
//!            pid file present → Running
//!            probe error      → Unknown (Err)
//!
//! set_config(snapshot):
//!     render → unchanged since last apply? → done
//!            → stage to <config>.pending
//!            → Running? validate staged → rename over config → reload
//!            → Stopped? rename over config, baseline stays unset
//!
//! start():   validate live config → launch → wait for pid file
//! ```
//!
//! # Design Decisions
//! - Validate before apply: a rejected config never replaces the live file
//! - Renames are atomic, so nginx never reads a half-written config
//! - The baseline only records bytes a running nginx has loaded, so the first
//!   apply against a running process always validates and reloads
//! - Real and dry-run managers share the trait, never state

pub mod dry_run;
pub mod nginx;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::topology::Snapshot;

pub use dry_run::{Action, ActionJournal, DryRunManager};
pub use nginx::NginxManager;

/// Observed lifecycle state of the proxy process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyState {
    Stopped,
    Running,
    /// The probe failed for a reason other than "not running".
    Unknown,
}

/// What `set_config` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyOutcome {
    /// Rendered bytes matched the applied artifact; nothing touched.
    Unchanged,
    /// Written to disk with no running process to reload.
    Written,
    /// Written, validated and reloaded.
    Reloaded,
}

/// Lifecycle control over an external proxy process.
///
/// Called from the reconciliation loop only; implementations need no
/// internal locking.
#[async_trait]
pub trait ProxyManager: Send + Sync {
    /// Probe whether the proxy is running. An `Err` means `ProxyState::Unknown`.
    async fn status(&self) -> Result<ProxyState>;

    /// Render `snapshot`, persist it and reload if it differs from the applied config.
    async fn set_config(&mut self, snapshot: &Snapshot) -> Result<ApplyOutcome>;

    /// Validate the written config and launch the proxy unless already running.
    async fn start(&mut self) -> Result<()>;

    /// Re-validate the installed config and gracefully reload the running proxy.
    async fn reload(&mut self) -> Result<()>;
}

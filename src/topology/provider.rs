//! Topology provider seam.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::topology::Snapshot;

/// Produces a snapshot of the current routing topology.
///
/// Implementations must be side-effect free: calling `fetch_topology` twice
/// against unchanged cluster state yields equal snapshots.
#[async_trait]
pub trait TopologyProvider: Send + Sync {
    async fn fetch_topology(&self) -> Result<Snapshot>;
}

/// Serves a fixed snapshot or a fixed failure.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    outcome: std::result::Result<Snapshot, String>,
}

impl StaticProvider {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            outcome: Ok(snapshot),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(reason.into()),
        }
    }
}

#[async_trait]
impl TopologyProvider for StaticProvider {
    async fn fetch_topology(&self) -> Result<Snapshot> {
        self.outcome.clone().map_err(Error::TopologyFetch)
    }
}

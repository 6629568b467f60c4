//! Routing topology subsystem.
//!
//! # Data Flow
//! ```text
//! cluster objects (manifest.rs)
//!     → opt-in filter (annotation prefix)
//!     → normalization into model.rs types
//!     → Snapshot::new (invariant checks)
//!     → handed to the renderer, replaced wholesale next tick
//! ```

pub mod manifest;
pub mod model;
pub mod provider;

pub use manifest::ManifestProvider;
pub use model::{Endpoint, HttpService, HttpServiceGroup, Snapshot, SnapshotError, TcpService};
pub use provider::{StaticProvider, TopologyProvider};

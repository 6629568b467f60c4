//! Configuration rendering subsystem.
//!
//! # Data Flow
//! ```text
//! static templates (compiled once at startup, template.rs)
//!     + StaticConfig (ports, paths, cluster zone)
//!     + Snapshot
//!     → nginx.rs (expand blocks in snapshot order)
//!     → nginx.conf bytes
//! ```
//!
//! # Design Decisions
//! - Rendering is a pure function of (snapshot, static config)
//! - Identical inputs produce identical bytes, which is what lets the proxy
//!   manager skip reloads when nothing changed

pub mod nginx;
pub mod template;

pub use nginx::{Renderer, StaticConfig};
pub use template::{Template, TemplateError};

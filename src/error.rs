//! Controller error taxonomy.
//!
//! # Propagation
//! ```text
//! startup phase:   any error                  → fatal (process exit)
//! log drain:       LogDrain                   → fatal
//! steady state:    TopologyFetch, ConfigWrite,
//!                  ReloadValidation, Status   → logged, retried next tick
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::render::TemplateError;
use crate::topology::SnapshotError;

/// Errors produced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The topology provider could not produce a snapshot.
    #[error("topology fetch failed: {0}")]
    TopologyFetch(String),

    /// A static template is malformed or was expanded without a variable.
    #[error("render failed: {0}")]
    Render(#[from] TemplateError),

    /// The rendered artifact could not be written to disk.
    #[error("failed writing config to {path:?}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// nginx rejected the candidate configuration; the live one is untouched.
    #[error("config validation rejected {path:?}: {reason}")]
    ReloadValidation { path: PathBuf, reason: String },

    /// nginx could not be started.
    #[error("failed starting proxy: {0}")]
    ProcessStart(String),

    /// The log drain stopped reading.
    #[error("log drain on {path:?} failed: {reason}")]
    LogDrain { path: PathBuf, reason: String },

    /// The liveness marker could not be probed.
    #[error("status probe of {path:?} failed: {source}")]
    Status {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Whether this error must terminate the controller regardless of phase.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Render(_) | Error::ProcessStart(_) | Error::LogDrain { .. })
    }
}

impl From<SnapshotError> for Error {
    fn from(e: SnapshotError) -> Self {
        Error::TopologyFetch(e.to_string())
    }
}

/// Failure modes of a single nginx invocation.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("could not spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, Error>;

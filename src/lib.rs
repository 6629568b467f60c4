//! Cluster-aware nginx gateway controller library

pub mod config;
pub mod controller;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod render;
pub mod topology;

pub use config::schema::GatewayConfig;
pub use controller::Controller;
pub use error::{Error, Result};
pub use lifecycle::Shutdown;

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → args.rs (flags / GATEWAY_CONTROLLER_* env overlay)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed by reference to each component at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod args;
pub mod loader;
pub mod schema;
pub mod validation;

pub use args::Args;
pub use schema::GatewayConfig;
pub use schema::ControllerConfig;
pub use schema::NginxConfig;
pub use schema::HealthConfig;
pub use schema::ObservabilityConfig;
pub use schema::LogFormat;

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, ports valid and distinct)
//! - Check that every filesystem artifact has a path
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before any component is constructed

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{first} and {second} both use port {port}")]
    PortConflict {
        first: &'static str,
        second: &'static str,
        port: u16,
    },

    #[error("health.bind_address {0:?} is not a socket address")]
    BindAddress(String),
}

/// Check `config` for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.controller.refresh_interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "controller.refresh_interval_secs" });
    }
    if config.nginx.command_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "nginx.command_timeout_secs" });
    }
    if config.nginx.worker_connections == 0 {
        errors.push(ValidationError::Zero { field: "nginx.worker_connections" });
    }

    let required = [
        ("controller.cluster_zone", config.controller.cluster_zone.is_empty()),
        ("controller.annotation_prefix", config.controller.annotation_prefix.is_empty()),
        ("nginx.binary", config.nginx.binary.as_os_str().is_empty()),
        ("nginx.config_file", config.nginx.config_file.as_os_str().is_empty()),
        ("nginx.pid_file", config.nginx.pid_file.as_os_str().is_empty()),
        ("nginx.log_pipe", config.nginx.log_pipe.as_os_str().is_empty()),
    ];
    for (field, empty) in required {
        if empty {
            errors.push(ValidationError::Empty { field });
        }
    }

    let mut ports: Vec<(&'static str, u16)> = vec![
        ("nginx.health_port", config.nginx.health_port),
        ("nginx.http_port", config.nginx.http_port),
    ];
    match config.health.bind_address.parse::<SocketAddr>() {
        Ok(addr) => ports.push(("health.bind_address", addr.port())),
        Err(_) => errors.push(ValidationError::BindAddress(config.health.bind_address.clone())),
    }
    for (field, port) in &ports {
        if *port == 0 {
            errors.push(ValidationError::Zero { field: *field });
        }
    }
    for (i, (first, a)) in ports.iter().enumerate() {
        for (second, b) in &ports[i + 1..] {
            if a == b && *a != 0 {
                errors.push(ValidationError::PortConflict {
                    first: *first,
                    second: *second,
                    port: *a,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

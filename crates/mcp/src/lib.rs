//! MCP client fleet management.
//!
//! Drives a set of named Model Context Protocol server connections through a
//! shared lifecycle: configuration, concurrent connect and disconnect,
//! per-connection status tracking, and background health monitoring with
//! automatic reconnects.
//!
//! The transport layer sits behind the [`ConnectionHandle`] and
//! [`ConnectionFactory`] traits; everything here is transport-agnostic.

pub mod config;
pub mod error;
pub mod health;
pub mod manager;
pub mod status;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use {
    config::{FleetConfig, ServerConfig, TransportType, ValidationReport},
    error::{log_error, Context, ErrorKind, McpError, Result},
    health::{HealthConfig, HealthMonitor},
    manager::{Lifecycle, McpManager},
    status::{ConnectionState, ConnectionStatus, LastError, StatusRegistry},
    traits::{ConnectionFactory, ConnectionHandle},
};

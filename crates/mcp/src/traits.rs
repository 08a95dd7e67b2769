//! Seams between the orchestrator and the transport layer.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{config::ServerConfig, error::Result, status::ConnectionState};

/// A live, named connection to one MCP server.
///
/// Handles are shared across tasks; all methods take `&self`.
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    /// Name of the server this handle talks to. Stable for the lifetime of
    /// the handle.
    fn server_name(&self) -> &str;

    /// Establish the connection. Idempotent: connecting an already connected
    /// handle is a no-op success.
    async fn connect(&self) -> Result<()>;

    /// Tear the connection down. Idempotent, same as [`connect`].
    ///
    /// [`connect`]: ConnectionHandle::connect
    async fn disconnect(&self) -> Result<()>;

    /// Current transport-level state. Never performs I/O.
    fn state(&self) -> ConnectionState;
}

/// Builds [`ConnectionHandle`]s from server configuration.
///
/// Building a handle must not connect it; the orchestrator drives connect
/// and disconnect explicitly.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn build(&self, config: &ServerConfig) -> Result<Arc<dyn ConnectionHandle>>;
}

//! Error taxonomy for MCP connection management.
//!
//! Every failure is classified into one of fourteen [`ErrorKind`]s. Each kind
//! carries fixed severity, retryability, and category metadata computed purely
//! from the kind; the metadata drives logging verbosity and whether the health
//! monitor re-attempts an operation.

use std::error::Error as StdError;

use {
    serde::{Deserialize, Serialize},
    tracing::{error, warn},
};

/// Classification of MCP client failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    ConnectionFailed,
    ProtocolError,
    ToolNotFound,
    ResourceNotFound,
    PermissionDenied,
    Timeout,
    InvalidParameters,
    ServerError,
    ClientError,
    ConfigurationError,
    InitializationFailed,
    SerializationError,
    ValidationError,
    Unknown,
}

impl ErrorKind {
    /// Short human-readable name used in rendered messages.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::ConnectionFailed => "connection failed",
            Self::ProtocolError => "protocol error",
            Self::ToolNotFound => "tool not found",
            Self::ResourceNotFound => "resource not found",
            Self::PermissionDenied => "permission denied",
            Self::Timeout => "timeout",
            Self::InvalidParameters => "invalid parameters",
            Self::ServerError => "server error",
            Self::ClientError => "client error",
            Self::ConfigurationError => "configuration error",
            Self::InitializationFailed => "initialization failed",
            Self::SerializationError => "serialization error",
            Self::ValidationError => "validation error",
            Self::Unknown => "unknown error",
        }
    }

    /// Severity from 1 (mild) to 5 (fatal).
    #[must_use]
    pub fn severity(self) -> u8 {
        match self {
            Self::ValidationError | Self::InvalidParameters => 1,
            Self::ToolNotFound | Self::ResourceNotFound | Self::PermissionDenied => 2,
            Self::Timeout | Self::SerializationError => 3,
            Self::ClientError | Self::ServerError | Self::ProtocolError => 4,
            Self::ConnectionFailed
            | Self::InitializationFailed
            | Self::ConfigurationError
            | Self::Unknown => 5,
        }
    }

    /// Whether re-attempting the same operation without changing inputs has a
    /// reasonable chance of succeeding. Parameter, permission, protocol, and
    /// configuration errors are non-transient: retrying cannot help.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed | Self::Timeout | Self::ServerError | Self::Unknown
        )
    }

    #[must_use]
    pub fn is_connection_error(self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed | Self::Timeout | Self::InitializationFailed
        )
    }

    #[must_use]
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            Self::ClientError
                | Self::InvalidParameters
                | Self::SerializationError
                | Self::ValidationError
        )
    }

    #[must_use]
    pub fn is_server_error(self) -> bool {
        matches!(self, Self::ServerError | Self::ProtocolError)
    }

    #[must_use]
    pub fn is_permission_error(self) -> bool {
        matches!(self, Self::PermissionDenied)
    }

    #[must_use]
    pub fn is_configuration_error(self) -> bool {
        matches!(self, Self::ConfigurationError)
    }

    #[must_use]
    pub fn is_resource_error(self) -> bool {
        matches!(self, Self::ToolNotFound | Self::ResourceNotFound)
    }
}

/// A classified MCP failure, optionally scoped to one connection.
///
/// Construction never fails; everything besides `kind` and `message` is
/// optional. Manager-level errors leave `connection` unset.
#[derive(Debug, thiserror::Error)]
#[error("{}", self.user_friendly_message())]
pub struct McpError {
    kind: ErrorKind,
    connection: Option<String>,
    message: String,
    details: Option<String>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl McpError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            connection: None,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    // ── Per-kind factories ──────────────────────────────────────────

    #[must_use]
    pub fn connection_failed(connection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailed, message).with_connection(connection)
    }

    #[must_use]
    pub fn protocol_error(connection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolError, message).with_connection(connection)
    }

    #[must_use]
    pub fn tool_not_found(connection: impl Into<String>, tool: &str) -> Self {
        Self::new(ErrorKind::ToolNotFound, format!("tool '{tool}' not found"))
            .with_connection(connection)
    }

    #[must_use]
    pub fn resource_not_found(connection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceNotFound, message).with_connection(connection)
    }

    #[must_use]
    pub fn permission_denied(connection: impl Into<String>, operation: &str) -> Self {
        Self::new(
            ErrorKind::PermissionDenied,
            format!("operation '{operation}' denied"),
        )
        .with_connection(connection)
    }

    #[must_use]
    pub fn timeout(connection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message).with_connection(connection)
    }

    #[must_use]
    pub fn invalid_parameters(connection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameters, message).with_connection(connection)
    }

    #[must_use]
    pub fn server_error(connection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerError, message).with_connection(connection)
    }

    #[must_use]
    pub fn client_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClientError, message)
    }

    #[must_use]
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigurationError, message)
    }

    #[must_use]
    pub fn initialization_failed(connection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InitializationFailed, message).with_connection(connection)
    }

    #[must_use]
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationError, message)
    }

    #[must_use]
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    // ── Builders ────────────────────────────────────────────────────

    /// Attach the connection name. Keeps an already-set name, so callers can
    /// stamp the name they know onto errors bubbling up from deeper layers
    /// without clobbering a more precise attribution.
    #[must_use]
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        if self.connection.is_none() {
            self.connection = Some(connection.into());
        }
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    #[must_use]
    pub fn severity(&self) -> u8 {
        self.kind.severity()
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    // ── Rendering ───────────────────────────────────────────────────

    /// `[connection] kind: message`, omitting the bracketed name when absent.
    #[must_use]
    pub fn user_friendly_message(&self) -> String {
        let mut out = String::new();
        if let Some(connection) = &self.connection {
            out.push_str(&format!("[{connection}] "));
        }
        out.push_str(self.kind.display_name());
        if !self.message.is_empty() {
            out.push_str(": ");
            out.push_str(&self.message);
        }
        out
    }

    /// The user-friendly message plus details and cause on separate lines.
    #[must_use]
    pub fn detailed_message(&self) -> String {
        let mut out = self.user_friendly_message();
        if let Some(details) = &self.details {
            out.push_str("\ndetails: ");
            out.push_str(details);
        }
        if let Some(source) = &self.source {
            out.push_str("\ncaused by: ");
            out.push_str(&source.to_string());
        }
        out
    }
}

/// Log an error at a level chosen from its severity: mild findings are
/// warnings, everything else is an error, and severity 4-5 gets the detailed
/// rendering with the cause chain.
pub fn log_error(err: &McpError) {
    let kind = err.kind();
    match kind.severity() {
        1 | 2 => warn!(
            kind = ?kind,
            connection = err.connection(),
            retryable = kind.is_retryable(),
            "{}",
            err.user_friendly_message()
        ),
        3 => error!(
            kind = ?kind,
            connection = err.connection(),
            retryable = kind.is_retryable(),
            "{}",
            err.user_friendly_message()
        ),
        _ => error!(
            kind = ?kind,
            connection = err.connection(),
            retryable = kind.is_retryable(),
            critical = true,
            "{}",
            err.detailed_message()
        ),
    }
}

impl lodestone_common::FromMessage for McpError {
    fn from_message(message: String) -> Self {
        Self::client_error(message)
    }
}

pub type Result<T> = std::result::Result<T, McpError>;

lodestone_common::impl_context!(McpError);

//! Fleet configuration: named server entries plus the master enable switch.
//!
//! Validation happens at configuration-build time. The orchestrator assumes
//! any [`FleetConfig`] it receives has unique, well-formed server entries.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{McpError, Result};

/// Transport used to reach an MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    #[default]
    Stdio,
    Sse,
}

/// Configuration for a single MCP server connection.
///
/// Immutable once constructed; compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Unique, stable key for this connection.
    pub name: String,
    #[serde(default)]
    pub transport: TransportType,
    /// Launch command for stdio transport.
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Endpoint for SSE transport. Required when `transport` is `Sse`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

fn default_true() -> bool {
    true
}

impl ServerConfig {
    /// Stdio-transport server launched as a child process.
    #[must_use]
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportType::Stdio,
            command: command.into(),
            args,
            env: HashMap::new(),
            url: None,
            enabled: true,
            description: String::new(),
        }
    }

    /// SSE-transport server reached over HTTP.
    #[must_use]
    pub fn sse(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportType::Sse,
            command: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            url: Some(url.into()),
            enabled: true,
            description: String::new(),
        }
    }

    fn collect_findings(&self, report: &mut ValidationReport) {
        if self.name.trim().is_empty() {
            report.error("server with an empty name");
            return;
        }
        match self.transport {
            TransportType::Stdio => {
                if self.command.trim().is_empty() {
                    report.error(format!(
                        "server '{}': stdio transport requires a command",
                        self.name
                    ));
                }
                if self.url.is_some() {
                    report.warning(format!(
                        "server '{}': url is ignored for stdio transport",
                        self.name
                    ));
                }
            },
            TransportType::Sse => match self.url.as_deref() {
                None | Some("") => report.error(format!(
                    "server '{}': sse transport requires a url",
                    self.name
                )),
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    report.error(format!("server '{}': sse url must be http(s)", self.name));
                },
                Some(url) if url.starts_with("http://") => {
                    report.warning(format!("server '{}': sse url is not https", self.name));
                },
                Some(_) => {},
            },
        }
    }
}

/// Validation findings for a fleet configuration.
///
/// Errors make the configuration unusable; warnings are advisory.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationReport {
    pub fn error(&mut self, finding: impl Into<String>) {
        self.errors.push(finding.into());
    }

    pub fn warning(&mut self, finding: impl Into<String>) {
        self.warnings.push(finding.into());
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// One finding per line, errors first.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::with_capacity(self.errors.len() + self.warnings.len());
        for finding in &self.errors {
            lines.push(format!("error: {finding}"));
        }
        for finding in &self.warnings {
            lines.push(format!("warning: {finding}"));
        }
        lines.join("\n")
    }
}

/// The full set of configured MCP servers.
///
/// Treated as immutable while active; the orchestrator holds it behind an
/// `Arc` and swaps the whole value on reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Master switch. When false the fleet initializes empty; disabling MCP
    /// is a legal configuration, not an error.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl FleetConfig {
    /// Empty, disabled fleet.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            servers: Vec::new(),
        }
    }

    /// Build a fleet configuration, rejecting duplicate names and invalid
    /// server entries.
    pub fn new(enabled: bool, servers: Vec<ServerConfig>) -> Result<Self> {
        let config = Self { enabled, servers };
        config.ensure_valid()?;
        Ok(config)
    }

    /// Parse and validate a JSON rendition of the fleet configuration.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|e| {
            McpError::serialization_error("invalid MCP fleet configuration").with_source(e)
        })?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Collect validation findings without failing.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut seen = HashSet::new();
        for server in &self.servers {
            if !server.name.trim().is_empty() && !seen.insert(server.name.as_str()) {
                report.error(format!("duplicate server name '{}'", server.name));
            }
            server.collect_findings(&mut report);
        }
        report
    }

    /// Fail with a configuration error when any hard finding exists.
    pub fn ensure_valid(&self) -> Result<()> {
        let report = self.validate();
        if report.is_ok() {
            Ok(())
        } else {
            Err(McpError::configuration_error("invalid MCP fleet configuration")
                .with_details(report.summary()))
        }
    }

    #[must_use]
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }

    #[must_use]
    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name.as_str()).collect()
    }

    /// Servers the orchestrator should actually build connections for.
    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter().filter(|s| s.enabled)
    }
}
